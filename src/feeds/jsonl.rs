//! JSON-lines feed over any async reader (stdin, a socket, a file)

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::error;

use crate::core::{MarketData, MarketFeed, Result};

use super::decode_record;

/// Reads one wire record per line. Blank lines are ignored.
pub struct JsonLinesFeed<R> {
    name: String,
    lines: Lines<R>,
    closed: bool,
}

impl<R: AsyncBufRead + Unpin + Send> JsonLinesFeed<R> {
    pub fn new(name: impl Into<String>, reader: R) -> Self {
        Self {
            name: name.into(),
            lines: reader.lines(),
            closed: false,
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> MarketFeed for JsonLinesFeed<R> {
    async fn next_tick(&mut self) -> Option<Result<MarketData>> {
        while !self.closed {
            match self.lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => return Some(decode_record(&line)),
                Ok(None) => self.closed = true,
                Err(e) => {
                    error!("Feed {} read failed: {}", self.name, e);
                    self.closed = true;
                    return Some(Err(e.into()));
                }
            }
        }
        None
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_reads_records_and_flags_bad_lines() {
        let input: &[u8] = b"{\"symbol\":\"AAPL\",\"price\":145}\n\nnope\n{\"symbol\":\"MSFT\",\"price\":300,\"volume\":5}\n";
        let mut feed = JsonLinesFeed::new("test", input);

        assert_eq!(feed.next_tick().await.unwrap().unwrap().price(), dec!(145));
        assert!(feed.next_tick().await.unwrap().is_err());
        assert_eq!(feed.next_tick().await.unwrap().unwrap().symbol().as_str(), "MSFT");
        assert!(feed.next_tick().await.is_none());
        assert!(feed.next_tick().await.is_none());
    }
}
