use std::fmt;

use hdrhistogram::Histogram;

use crate::error::{LatencyError, Result};

/// Cut points printed at the end of every run.
pub const REPORT_PERCENTILES: [u8; 6] = [5, 10, 25, 50, 70, 90];

/// Linearly interpolated percentile of an ascending-sorted slice,
/// rounded to the nearest μs.
pub fn percentile(p: f64, sorted: &[i64]) -> Result<i64> {
    let (first, last) = match (sorted.first(), sorted.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return Err(LatencyError::InsufficientData),
    };
    if p <= 0.0 {
        return Ok(first);
    }
    if p >= 100.0 {
        return Ok(last);
    }

    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return Ok(sorted[lo]);
    }

    let weight = rank - lo as f64;
    let value = sorted[lo] as f64 * (1.0 - weight) + sorted[hi] as f64 * weight;
    Ok(value.round() as i64)
}

// ─── Final report ────────────────────────────────────────────────

/// Percentile breakdown over the full sample set.
#[derive(Debug, Clone, PartialEq)]
pub struct PercentileReport {
    pub count: usize,
    pub entries: Vec<(u8, i64)>,
}

impl PercentileReport {
    /// Sort a copy of `samples` and evaluate every reporting cut point.
    pub fn from_samples(samples: &[i64]) -> Result<Self> {
        let mut sorted = samples.to_vec();
        sorted.sort_unstable();
        Self::from_sorted(&sorted)
    }

    pub fn from_sorted(sorted: &[i64]) -> Result<Self> {
        let entries = REPORT_PERCENTILES
            .iter()
            .map(|&p| percentile(f64::from(p), sorted).map(|v| (p, v)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            count: sorted.len(),
            entries,
        })
    }

    pub fn get(&self, p: u8) -> Option<i64> {
        self.entries
            .iter()
            .find(|(cut, _)| *cut == p)
            .map(|(_, v)| *v)
    }
}

impl fmt::Display for PercentileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (p, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{p}th percentile: {value}")?;
        }
        Ok(())
    }
}

// ─── Histogram summary ───────────────────────────────────────────

/// Coarse min/max/mean view taken from the collector's HdrHistogram.
#[derive(Debug, Clone)]
pub struct LatencySummary {
    pub count: u64,
    pub min: u64,
    pub max: u64,
    pub mean: f64,
}

impl LatencySummary {
    /// Returns zeroed values if the histogram is empty.
    pub fn from_histogram(hist: &Histogram<u64>) -> Self {
        if hist.len() == 0 {
            return Self::empty();
        }

        Self {
            count: hist.len(),
            min: hist.min(),
            max: hist.max(),
            mean: hist.mean(),
        }
    }

    pub fn empty() -> Self {
        Self {
            count: 0,
            min: 0,
            max: 0,
            mean: 0.0,
        }
    }

    pub fn has_data(&self) -> bool {
        self.count > 0
    }
}
