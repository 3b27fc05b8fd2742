use crate::constants::COUNTRY_ALIASES;

/// Map a country to the spelling stored in the dataset; unknown values pass through trimmed
pub fn normalize_country(country: &str) -> String {
    let trimmed = country.trim();
    COUNTRY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == trimmed)
        .map(|(_, canonical)| (*canonical).to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::CANONICAL_US;

    #[test]
    fn test_us_aliases_collapse() {
        assert_eq!(normalize_country("USA"), CANONICAL_US);
        assert_eq!(normalize_country(" US "), CANONICAL_US);
        assert_eq!(normalize_country("United States"), CANONICAL_US);
        assert_eq!(normalize_country(CANONICAL_US), CANONICAL_US);
    }

    #[test]
    fn test_canada_alias() {
        assert_eq!(normalize_country("CAN"), "Canada");
    }

    #[test]
    fn test_unknown_country_passes_through() {
        assert_eq!(normalize_country("Atlantis"), "Atlantis");
        assert_eq!(normalize_country("  India "), "India");
    }
}
