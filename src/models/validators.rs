use chrono::{Datelike, Utc};

/// Earliest build year worth scraping. Vessels older than this never show
/// up in the trades we cover.
pub const MIN_BUILD_YEAR: u32 = 1942;

/// Check an IMO number candidate: exactly seven digits, not a zero filler.
///
/// Some vessels navigating only within the European Union carry an ENI
/// instead of an IMO; those are rejected here on purpose since downstream
/// consumers treat them as something different.
pub fn is_valid_imo(candidate: &str) -> bool {
    candidate.len() == 7
        && candidate.bytes().all(|b| b.is_ascii_digit())
        && candidate != "0000000"
}

/// Check if the given build year makes sense. Registries can list coming
/// new builds, hence the tolerance into the near future.
pub fn is_valid_build_year(candidate: u32) -> bool {
    let max = Utc::now().year() as u32 + 3;
    (MIN_BUILD_YEAR..=max).contains(&candidate)
}

/// Useful when not much assumption is needed but we still don't want
/// garbage: zero and negatives are rejected.
pub fn is_positive(candidate: f64) -> bool {
    candidate > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn imo_accepts_seven_digits() {
        assert!(is_valid_imo("9232876"));
        assert!(is_valid_imo("6510215"));
    }

    #[test]
    fn imo_rejects_garbage() {
        assert!(!is_valid_imo(""));
        assert!(!is_valid_imo("923287"));
        assert!(!is_valid_imo("92328761"));
        assert!(!is_valid_imo("92A2876"));
        assert!(!is_valid_imo("0000000"));
    }

    #[test]
    fn build_year_bounds() {
        assert!(is_valid_build_year(1978));
        assert!(is_valid_build_year(2020));
        assert!(!is_valid_build_year(1789));
        assert!(!is_valid_build_year(Utc::now().year() as u32 + 4));
    }

    #[test]
    fn positive_numbers() {
        assert!(is_positive(34.0));
        assert!(!is_positive(0.0));
        assert!(!is_positive(-1.0));
    }
}
