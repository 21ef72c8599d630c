use rust_decimal::Decimal;

/// Official fallback fee rate used when a venue does not report one: 2 bps.
pub const DEFAULT_FEE_BPS: i64 = 2;

/// Taker/maker fee rate for one venue/symbol, in basis points.
#[derive(Debug, Clone, Copy)]
pub struct FeeProfile {
    pub taker_bps: Decimal,
    pub maker_bps: Decimal,
}

impl FeeProfile {
    pub fn fallback() -> Self {
        Self {
            taker_bps: Decimal::from(DEFAULT_FEE_BPS),
            maker_bps: Decimal::from(DEFAULT_FEE_BPS),
        }
    }

    pub fn as_rate_taker(&self) -> Decimal {
        self.taker_bps / Decimal::from(10_000)
    }

    pub fn as_rate_maker(&self) -> Decimal {
        self.maker_bps / Decimal::from(10_000)
    }
}

/// `total_fee_rate = fee_A_taker + fee_B_maker`, each falling back to the
/// official 2 bps default if the venue didn't report one.
pub fn total_fee_rate(venue_a: Option<FeeProfile>, venue_b: Option<FeeProfile>) -> Decimal {
    let a = venue_a.unwrap_or_else(FeeProfile::fallback).as_rate_taker();
    let b = venue_b.unwrap_or_else(FeeProfile::fallback).as_rate_maker();
    a + b
}

/// `min(clamp(A.max_lev,1,200), clamp(B.max_lev,1,200))`.
pub fn effective_leverage(venue_a_max: Decimal, venue_b_max: Decimal) -> Decimal {
    let lo = Decimal::ONE;
    let hi = Decimal::from(200);
    venue_a_max.clamp(lo, hi).min(venue_b_max.clamp(lo, hi))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn missing_fee_profiles_fall_back_to_two_bps_each() {
        let rate = total_fee_rate(None, None);
        assert_eq!(rate, Decimal::new(4, 4));
    }

    #[test]
    fn effective_leverage_clamps_then_takes_min() {
        assert_eq!(effective_leverage(dec!(20), dec!(500)), dec!(20));
        assert_eq!(effective_leverage(dec!(0.1), dec!(100)), dec!(1));
    }
}
