use futures::{future, Stream, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use super::Sample;
use crate::error::{LatencyError, Result};

/// Turn raw WebSocket frames into a lazy stream of decoded samples.
///
/// Control frames are skipped. A close frame, a transport error or a
/// frame that is not a valid sample is yielded as `Err`; the consumer
/// is expected to stop there.
pub fn sample_stream<S, E>(frames: S) -> impl Stream<Item = Result<Sample>>
where
    S: Stream<Item = std::result::Result<Message, E>>,
    E: Into<LatencyError>,
{
    frames.filter_map(|frame| future::ready(decode_frame(frame.map_err(Into::into))))
}

fn decode_frame(frame: Result<Message>) -> Option<Result<Sample>> {
    match frame {
        Ok(Message::Text(text)) => Some(parse(text.as_bytes())),
        Ok(Message::Binary(bytes)) => Some(parse(&bytes)),
        Ok(Message::Close(frame)) => {
            if let Some(frame) = frame {
                tracing::debug!(code = u16::from(frame.code), reason = %frame.reason, "close frame received");
            }
            Some(Err(LatencyError::ChannelClosed))
        }
        Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => None,
        Err(e) => Some(Err(e)),
    }
}

fn parse(payload: &[u8]) -> Result<Sample> {
    serde_json::from_slice(payload).map_err(|e| LatencyError::Malformed(e.to_string()))
}
