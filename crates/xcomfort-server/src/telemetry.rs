//! Telemetry sources
//!
//! The bridge connection itself lives outside this service; telemetry
//! arrives as newline-delimited JSON, one [`Telemetry`] message per line.

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::warn;
use xcomfort_core::Telemetry;

/// A stream of bridge telemetry
#[async_trait]
pub trait TelemetrySource: Send {
    /// Next message, `None` once the source is exhausted
    async fn next_message(&mut self) -> std::io::Result<Option<Telemetry>>;
}

/// Newline-delimited JSON telemetry
///
/// Blank lines and lines starting with `#` are skipped. Malformed lines
/// are logged and skipped.
pub struct LineSource<R> {
    lines: Lines<R>,
    line_no: usize,
}

impl<R: AsyncBufRead + Unpin + Send> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> TelemetrySource for LineSource<R> {
    async fn next_message(&mut self) -> std::io::Result<Option<Telemetry>> {
        while let Some(raw) = self.lines.next_line().await? {
            self.line_no += 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match Telemetry::from_json(line) {
                Ok(telemetry) => return Ok(Some(telemetry)),
                Err(e) => warn!("Skipping telemetry line {}: {}", self.line_no, e),
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[test]
    fn test_reads_messages_and_skips_malformed() {
        let input = br#"
# replayed from the bridge
{"type": "room_power", "room_id": "1", "power": 0.0}
{"type": "room_power", "room_id": 1
not json
{"type": "heater_state", "device_id": 11, "power": 950.0}
"#;

        tokio_test::block_on(async {
            let mut source = LineSource::new(BufReader::new(&input[..]));

            assert_eq!(
                source.next_message().await.unwrap(),
                Some(Telemetry::room_power("1", 0.0))
            );
            assert_eq!(
                source.next_message().await.unwrap(),
                Some(Telemetry::heater_power("11", 950.0))
            );
            assert_eq!(source.next_message().await.unwrap(), None);
            assert_eq!(source.line_no, 6);
        });
    }
}
