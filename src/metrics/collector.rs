use hdrhistogram::Histogram;
use parking_lot::Mutex;

use super::percentiles::LatencySummary;

// ─── Configuration ───────────────────────────────────────────────

/// HdrHistogram range: 1 μs → 60 s, 3 significant figures
const HIST_LOW: u64 = 1;
const HIST_HIGH: u64 = 60_000_000;
const HIST_SIGFIG: u8 = 3;

// ─── Running batch ───────────────────────────────────────────────

/// One running-average line, emitted per full batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressReport {
    pub source_port: u16,
    /// Floor of `sum / batch_size`, in μs
    pub average_us: i64,
}

/// Sum/count accumulator reset every `size` samples.
#[derive(Debug, Clone)]
pub struct RunningBatch {
    // wide enough that no batch of i64 latencies can overflow
    sum: i128,
    count: u32,
    size: u32,
}

impl RunningBatch {
    pub fn new(size: u32) -> Self {
        Self {
            sum: 0,
            count: 0,
            size: size.max(1),
        }
    }

    /// Add one latency. Returns the batch average when this sample
    /// completes the batch, after which the batch is empty again.
    pub fn push(&mut self, latency_us: i64) -> Option<i64> {
        self.sum += i128::from(latency_us);
        self.count += 1;

        if self.count < self.size {
            return None;
        }

        // floor of a mean of i64 values is itself within i64 range
        let average = self.sum.div_euclid(i128::from(self.size)) as i64;
        self.sum = 0;
        self.count = 0;
        Some(average)
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn size(&self) -> u32 {
        self.size
    }
}

// ─── Sample set ──────────────────────────────────────────────────

/// Thread-safe sample store.
/// The measurement loop calls `record()`; the reporter reads
/// `samples()` once the loop is done (or abandoned after the grace
/// period).
pub struct MetricsCollector {
    inner: Mutex<Inner>,
}

struct Inner {
    // Raw latencies in arrival order, fed to the percentile reporter
    samples: Vec<i64>,
    cap: Option<usize>,

    // Clamped copy for the min/max/mean summary
    hist: Histogram<u64>,
}

impl MetricsCollector {
    /// `cap` bounds the number of stored samples; `None` is unbounded.
    pub fn new(cap: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(Inner::new(cap)),
        }
    }

    /// Append one latency. Returns `false` (and stores nothing) once
    /// the cap is reached.
    pub fn record(&self, latency_us: i64) -> bool {
        self.inner.lock().record(latency_us)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        let inner = self.inner.lock();
        inner.cap.is_some_and(|cap| inner.samples.len() >= cap)
    }

    /// Copy of the arrival-ordered sample set.
    pub fn samples(&self) -> Vec<i64> {
        self.inner.lock().samples.clone()
    }

    pub fn summary(&self) -> LatencySummary {
        LatencySummary::from_histogram(&self.inner.lock().hist)
    }
}

impl Inner {
    fn new(cap: Option<usize>) -> Self {
        Self {
            samples: Vec::with_capacity(cap.unwrap_or(1024)),
            cap,
            hist: Histogram::<u64>::new_with_bounds(HIST_LOW, HIST_HIGH, HIST_SIGFIG)
                .expect("histogram creation"),
        }
    }

    fn record(&mut self, latency_us: i64) -> bool {
        if self.cap.is_some_and(|cap| self.samples.len() >= cap) {
            return false;
        }
        self.samples.push(latency_us);

        // Histogram is u64-only: clamp to ≥ 1 μs, raw set keeps the sign
        let clamped = u64::try_from(latency_us).unwrap_or(0).max(HIST_LOW);
        self.hist.saturating_record(clamped);
        true
    }
}
