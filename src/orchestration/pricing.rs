use crate::config::PricingConfig;

/// Quote an order in integer cents.
///
/// Records up to the tier threshold cost `first_tier_rate_cents` each, records beyond it
/// `second_tier_rate_millicents / 1000` cents each, and every add-on adds
/// `addon_rate_cents` per record. Fractional cents round half up.
pub fn quote_price_cents(total_records: u64, addon_count: usize, pricing: &PricingConfig) -> i64 {
    let total = u128::from(total_records);
    let threshold = u128::from(pricing.tier_threshold);

    let first_tier = total.min(threshold) * u128::from(pricing.first_tier_rate_cents);
    let second_tier_millicents =
        total.saturating_sub(threshold) * u128::from(pricing.second_tier_rate_millicents);
    let second_tier = (second_tier_millicents + 500) / 1000;
    let add_ons = total * addon_count as u128 * u128::from(pricing.addon_rate_cents);

    i64::try_from(first_tier + second_tier + add_ons).unwrap_or(i64::MAX)
}

/// Whether a client-submitted price agrees with the quote
pub fn price_matches(quoted_cents: i64, submitted_cents: i64, pricing: &PricingConfig) -> bool {
    (quoted_cents - submitted_cents).abs() <= pricing.price_tolerance_cents
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_tier_only() {
        let pricing = PricingConfig::default();
        assert_eq!(quote_price_cents(250, 0, &pricing), 250);
        assert_eq!(quote_price_cents(100_000, 0, &pricing), 100_000);
    }

    #[test]
    fn test_second_tier_rounds_half_up() {
        let pricing = PricingConfig::default();
        // 100_000 at 1c + 1 at 0.5c
        assert_eq!(quote_price_cents(100_001, 0, &pricing), 100_001);
        assert_eq!(quote_price_cents(100_002, 0, &pricing), 100_001);
        assert_eq!(quote_price_cents(1_000_000, 0, &pricing), 550_000);
    }

    #[test]
    fn test_addons_priced_per_record() {
        let pricing = PricingConfig::default();
        assert_eq!(quote_price_cents(1_000, 2, &pricing), 3_000);
    }

    #[test]
    fn test_tolerance() {
        let pricing = PricingConfig::default();
        assert!(price_matches(250, 251, &pricing));
        assert!(!price_matches(250, 252, &pricing));
    }
}
