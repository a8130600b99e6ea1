// src/table/columns.rs

/// Substring tiers used to find the join-key column, strongest first.
/// Codes (`Code`, `iso_code`, `Country Code`) beat human names.
pub const KEY_CANDIDATES: &[&[&str]] = &[&["code", "iso"], &["entity"], &["country"], &["name"]];

/// Case-insensitive names of columns that describe the row rather than
/// measure anything.
pub const PERIOD_COLUMNS: &[&str] = &["year", "period"];
pub const STRUCTURAL_COLUMNS: &[&str] = &["entity", "name", "country"];

/// Index of the first header matching the earliest tier of `tiers`.
///
/// Within a tier, headers are scanned in order and a header matches if its
/// lowercase form contains any of the tier's substrings. Later tiers are
/// only consulted when every earlier tier found nothing.
pub fn find_column<S: AsRef<str>>(headers: &[S], tiers: &[&[&str]]) -> Option<usize> {
    let lowered: Vec<String> = headers.iter().map(|h| h.as_ref().to_lowercase()).collect();
    tiers.iter().find_map(|tier| {
        lowered
            .iter()
            .position(|h| tier.iter().any(|needle| h.contains(needle)))
    })
}

/// Index of the first header equal (ignoring case) to one of `names`.
pub fn find_exact<S: AsRef<str>>(headers: &[S], names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.iter().any(|n| h.as_ref().eq_ignore_ascii_case(n)))
}

pub fn is_period(header: &str) -> bool {
    PERIOD_COLUMNS
        .iter()
        .any(|n| header.eq_ignore_ascii_case(n))
}

pub fn is_structural(header: &str) -> bool {
    STRUCTURAL_COLUMNS
        .iter()
        .any(|n| header.eq_ignore_ascii_case(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_like_headers_win_over_names() {
        let headers = ["Entity", "ISO_CODE", "Year", "Forest area"];
        assert_eq!(find_column(&headers, KEY_CANDIDATES), Some(1));
    }

    #[test]
    fn iso_matches_case_insensitively() {
        assert_eq!(find_column(&["Iso_Code", "v"], KEY_CANDIDATES), Some(0));
        assert_eq!(find_column(&["value", "ISO3"], KEY_CANDIDATES), Some(1));
    }

    #[test]
    fn name_fallback_follows_tier_order_not_column_order() {
        let headers = ["Country name", "Entity", "Year"];
        // "entity" tier is consulted before "country"
        assert_eq!(find_column(&headers, KEY_CANDIDATES), Some(1));
        assert_eq!(find_column(&["Name", "Country"], KEY_CANDIDATES), Some(1));
    }

    #[test]
    fn no_candidate_returns_none() {
        assert_eq!(find_column(&["Year", "Value"], KEY_CANDIDATES), None);
        assert_eq!(find_column::<&str>(&[], KEY_CANDIDATES), None);
    }

    #[test]
    fn exact_lookup_ignores_case() {
        assert_eq!(find_exact(&["Code", "YEAR"], PERIOD_COLUMNS), Some(1));
        assert_eq!(find_exact(&["Years"], PERIOD_COLUMNS), None);
        assert!(is_period("Period"));
        assert!(!is_period("Year code"));
        assert!(is_structural("ENTITY"));
        assert!(!is_structural("Entity name"));
    }
}
