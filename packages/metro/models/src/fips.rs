//! State and county FIPS code helpers.

/// Maps a two-digit state FIPS code to its postal abbreviation.
///
/// Returns `"??"` for codes outside the 50 states + DC.
#[must_use]
pub fn state_abbr(fips: &str) -> &'static str {
    match fips {
        "01" => "AL",
        "02" => "AK",
        "04" => "AZ",
        "05" => "AR",
        "06" => "CA",
        "08" => "CO",
        "09" => "CT",
        "10" => "DE",
        "11" => "DC",
        "12" => "FL",
        "13" => "GA",
        "15" => "HI",
        "16" => "ID",
        "17" => "IL",
        "18" => "IN",
        "19" => "IA",
        "20" => "KS",
        "21" => "KY",
        "22" => "LA",
        "23" => "ME",
        "24" => "MD",
        "25" => "MA",
        "26" => "MI",
        "27" => "MN",
        "28" => "MS",
        "29" => "MO",
        "30" => "MT",
        "31" => "NE",
        "32" => "NV",
        "33" => "NH",
        "34" => "NJ",
        "35" => "NM",
        "36" => "NY",
        "37" => "NC",
        "38" => "ND",
        "39" => "OH",
        "40" => "OK",
        "41" => "OR",
        "42" => "PA",
        "44" => "RI",
        "45" => "SC",
        "46" => "SD",
        "47" => "TN",
        "48" => "TX",
        "49" => "UT",
        "50" => "VT",
        "51" => "VA",
        "53" => "WA",
        "54" => "WV",
        "55" => "WI",
        "56" => "WY",
        _ => "??",
    }
}

/// Returns `true` if `code` is exactly `len` ASCII digits.
#[must_use]
pub fn is_numeric_code(code: &str, len: usize) -> bool {
    code.len() == len && code.bytes().all(|b| b.is_ascii_digit())
}

/// Returns `true` for a two-digit code naming one of the 50 states or DC.
#[must_use]
pub fn is_state_fips(code: &str) -> bool {
    is_numeric_code(code, 2) && state_abbr(code) != "??"
}

/// Returns `true` for a syntactically valid three-digit county code.
#[must_use]
pub fn is_county_fips(code: &str) -> bool {
    is_numeric_code(code, 3)
}

/// Left-pads a numeric code with zeros to `width` characters.
///
/// Census and Zillow occasionally drop leading zeros (`"501"` for ZIP
/// `"00501"`). Values already at or beyond `width` are returned trimmed.
#[must_use]
pub fn zero_pad(code: &str, width: usize) -> String {
    let trimmed = code.trim();
    format!("{trimmed:0>width$}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_and_unknown_states() {
        assert_eq!(state_abbr("04"), "AZ");
        assert_eq!(state_abbr("47"), "TN");
        assert_eq!(state_abbr("99"), "??");
        assert!(is_state_fips("28"));
        assert!(!is_state_fips("03"));
        assert!(!is_state_fips("4"));
    }

    #[test]
    fn county_codes() {
        assert!(is_county_fips("013"));
        assert!(!is_county_fips("13"));
        assert!(!is_county_fips("01a"));
    }

    #[test]
    fn pads_codes() {
        assert_eq!(zero_pad("501", 5), "00501");
        assert_eq!(zero_pad(" 85001 ", 5), "85001");
        assert_eq!(zero_pad("123456", 5), "123456");
    }
}
