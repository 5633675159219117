//! Compile-time registry of metro definitions.
//!
//! Each entry is a `(name, toml_content)` pair embedded via `include_str!`.

use zcta_metro_models::MetroConfig;

use crate::{MetroError, validate};

/// Number of registered metros. Enforced by a test.
#[cfg(test)]
const EXPECTED_METRO_COUNT: usize = 4;

/// Embedded TOML metro definitions.
const METRO_TOMLS: &[(&str, &str)] = &[
    ("phoenix", include_str!("../metros/phoenix.toml")),
    ("memphis", include_str!("../metros/memphis.toml")),
    ("los_angeles", include_str!("../metros/los_angeles.toml")),
    ("dallas", include_str!("../metros/dallas.toml")),
];

/// Parses and validates every registered metro.
///
/// # Errors
///
/// Returns [`MetroError`] if any embedded definition fails to parse or
/// validate.
pub fn all_metros() -> Result<Vec<MetroConfig>, MetroError> {
    METRO_TOMLS
        .iter()
        .map(|(name, toml_str)| parse_metro(name, toml_str))
        .collect()
}

/// Keys of all registered metros, in registry order.
#[must_use]
pub fn metro_keys() -> Vec<&'static str> {
    METRO_TOMLS.iter().map(|(name, _)| *name).collect()
}

/// Looks up a single metro by key.
///
/// Only the requested definition is parsed.
///
/// # Errors
///
/// Returns [`MetroError::UnknownMetro`] for an unregistered key, or a
/// parse/validation error for a malformed definition.
pub fn find_metro(key: &str) -> Result<MetroConfig, MetroError> {
    let Some((name, toml_str)) = METRO_TOMLS.iter().find(|(name, _)| *name == key) else {
        return Err(MetroError::UnknownMetro {
            key: key.to_string(),
            available: metro_keys().join(", "),
        });
    };

    let metro = parse_metro(name, toml_str)?;
    log::debug!(
        "Loaded metro {} ({}) with {} counties",
        metro.key,
        metro.name,
        metro.counties.len()
    );
    Ok(metro)
}

fn parse_metro(name: &str, toml_str: &str) -> Result<MetroConfig, MetroError> {
    let metro: MetroConfig = toml::de::from_str(toml_str).map_err(|source| MetroError::Parse {
        name: name.to_string(),
        source,
    })?;

    if metro.key != name {
        return Err(MetroError::Invalid {
            key: metro.key,
            message: format!("registered under '{name}' but declares a different key"),
        });
    }

    validate(&metro)?;
    Ok(metro)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn loads_all_metros() {
        let metros = all_metros().unwrap();
        assert_eq!(
            metros.len(),
            EXPECTED_METRO_COUNT,
            "Expected {EXPECTED_METRO_COUNT} metros, found {}. \
             Update EXPECTED_METRO_COUNT after adding/removing metros.",
            metros.len()
        );
    }

    #[test]
    fn metro_keys_are_unique() {
        let mut seen = BTreeSet::new();
        for key in metro_keys() {
            assert!(seen.insert(key), "Duplicate metro key: {key}");
        }
    }

    #[test]
    fn memphis_spans_three_states() {
        let memphis = find_metro("memphis").unwrap();
        assert_eq!(memphis.state_fips_codes(), vec!["05", "28", "47"]);
        assert_eq!(memphis.counties.len(), 4);
        assert_eq!(memphis.utm_epsg, 32616);
    }

    #[test]
    fn phoenix_matches_original_definition() {
        let phoenix = find_metro("phoenix").unwrap();
        assert_eq!(phoenix.cbsa_code, "38060");
        assert_eq!(phoenix.zip_prefixes, vec!["85".to_string()]);
        assert_eq!(phoenix.counties[0].geoid(), "04013");
    }

    #[test]
    fn unknown_metro_lists_available_keys() {
        let err = find_metro("gotham").unwrap_err();
        assert!(matches!(err, MetroError::UnknownMetro { .. }));
        let message = err.to_string();
        assert!(message.contains("phoenix"), "{message}");
        assert!(message.contains("dallas"), "{message}");
    }
}
