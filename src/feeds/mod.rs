//! Market data feeds - in-process pub/sub and JSON-lines ingestion

pub mod bus;
pub mod jsonl;

pub use bus::{ForwardStats, MarketDataBus, Subscription};
pub use jsonl::JsonLinesFeed;

use rust_decimal::Decimal;

use crate::core::{Error, MarketData, Result};

/// Decode one wire record `{ "symbol": .., "price": .., "volume": .. }`.
pub fn decode_record(payload: &str) -> Result<MarketData> {
    let data: MarketData = serde_json::from_str(payload.trim())?;
    if data.symbol().as_str().is_empty() {
        return Err(Error::Feed("record without symbol".into()));
    }
    if data.price() <= Decimal::ZERO {
        return Err(Error::Feed(format!(
            "non-positive price {} for {}",
            data.price(),
            data.symbol()
        )));
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_decode_record() {
        let data = decode_record(r#" { "symbol": "AAPL", "price": 150.25, "volume": 1000 } "#).unwrap();
        assert_eq!(data.symbol().as_str(), "AAPL");
        assert_eq!(data.price(), dec!(150.25));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_record("{oops"), Err(Error::Serialization(_))));
        assert!(matches!(decode_record(r#"{"price": 1}"#), Err(Error::Serialization(_))));
        assert!(matches!(decode_record(r#"{"symbol": "  ", "price": 1}"#), Err(Error::Feed(_))));
        assert!(matches!(decode_record(r#"{"symbol": "AAPL", "price": 0}"#), Err(Error::Feed(_))));
    }
}
