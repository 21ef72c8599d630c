use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Where a quote was observed. WS quotes are preferred over REST when both
/// are present; REST is used for consistency cross-checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuoteSource {
    Ws,
    Rest,
}

/// Best bid/offer snapshot for one venue/symbol at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bbo {
    pub bid: Decimal,
    pub ask: Decimal,
    pub timestamp_ms: i64,
    pub source: QuoteSource,
}

impl Bbo {
    pub fn new(bid: Decimal, ask: Decimal, timestamp_ms: i64, source: QuoteSource) -> Self {
        Self {
            bid,
            ask,
            timestamp_ms,
            source,
        }
    }

    /// A BBO is only usable when both sides are positive and crossed the
    /// normal way; anything else must be treated as absent by callers.
    pub fn valid(&self) -> bool {
        self.bid > Decimal::ZERO && self.ask > Decimal::ZERO && self.bid < self.ask
    }

    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::TWO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn valid_requires_bid_below_ask_and_both_positive() {
        let ok = Bbo::new(dec!(100.0), dec!(100.2), 1, QuoteSource::Ws);
        assert!(ok.valid());

        let crossed = Bbo::new(dec!(100.2), dec!(100.0), 1, QuoteSource::Ws);
        assert!(!crossed.valid());

        let zero = Bbo::new(Decimal::ZERO, dec!(1.0), 1, QuoteSource::Ws);
        assert!(!zero.valid());
    }

    #[test]
    fn mid_is_average_of_bid_and_ask() {
        let b = Bbo::new(dec!(100.0), dec!(100.2), 1, QuoteSource::Ws);
        assert_eq!(b.mid(), dec!(100.1));
    }
}
