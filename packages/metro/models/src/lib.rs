#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Metro area configuration types.
//!
//! A [`MetroConfig`] describes everything the pipeline needs to know about
//! a single metro: its CBSA boundary code, the counties whose tracts and
//! ACS rows make up the metro (possibly spanning several states), the ZIP
//! prefixes used to over-fetch ZCTAs and filter the rent index, and the
//! UTM zone used for area calculations.

pub mod fips;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Static description of one metro area, deserialized from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetroConfig {
    /// Registry key used on the command line (e.g. `"phoenix"`).
    pub key: String,
    /// Display name (e.g. "Phoenix-Mesa-Chandler, AZ").
    pub name: String,
    /// Five-digit Core-Based Statistical Area code.
    pub cbsa_code: String,
    /// Counties that make up the metro, in query order.
    pub counties: Vec<CountyRef>,
    /// ZIP code prefixes covering the metro (e.g. `["85"]`).
    pub zip_prefixes: Vec<String>,
    /// EPSG code of the WGS84 UTM zone used for projected areas
    /// (e.g. `32612` for zone 12N).
    pub utm_epsg: u32,
}

impl MetroConfig {
    /// Distinct state FIPS codes across all counties, sorted.
    #[must_use]
    pub fn state_fips_codes(&self) -> Vec<&str> {
        self.counties
            .iter()
            .map(|c| c.state_fips.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Returns `true` if `zip` starts with any of the metro's prefixes.
    #[must_use]
    pub fn matches_zip_prefix(&self, zip: &str) -> bool {
        self.zip_prefixes.iter().any(|p| zip.starts_with(p.as_str()))
    }

    /// The UTM zone described by [`Self::utm_epsg`], if it is one.
    #[must_use]
    pub const fn utm_zone(&self) -> Option<UtmZone> {
        UtmZone::from_epsg(self.utm_epsg)
    }
}

/// A `(state, county)` FIPS pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CountyRef {
    /// Two-digit state FIPS code.
    pub state_fips: String,
    /// Three-digit county FIPS code.
    pub county_fips: String,
    /// County name, for log output only.
    #[serde(default)]
    pub name: Option<String>,
}

impl CountyRef {
    /// Five-digit county GEOID (state + county).
    #[must_use]
    pub fn geoid(&self) -> String {
        format!("{}{}", self.state_fips, self.county_fips)
    }

    /// Human-readable label such as `"AZ county 013 (Maricopa)"`.
    #[must_use]
    pub fn label(&self) -> String {
        let abbr = fips::state_abbr(&self.state_fips);
        match &self.name {
            Some(name) => format!("{abbr} county {} ({name})", self.county_fips),
            None => format!("{abbr} county {}", self.county_fips),
        }
    }
}

/// A WGS84 UTM zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtmZone {
    /// Zone number, 1 through 60.
    pub number: u8,
    /// Northern hemisphere (`EPSG:326zz`) or southern (`EPSG:327zz`).
    pub north: bool,
}

impl UtmZone {
    /// Parses a WGS84 UTM EPSG code (`32601..=32660`, `32701..=32760`).
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_epsg(epsg: u32) -> Option<Self> {
        let (base, north) = match epsg {
            32601..=32660 => (32600, true),
            32701..=32760 => (32700, false),
            _ => return None,
        };
        Some(Self {
            number: (epsg - base) as u8,
            north,
        })
    }

    /// EPSG code for this zone.
    #[must_use]
    pub const fn epsg(self) -> u32 {
        if self.north {
            32600 + self.number as u32
        } else {
            32700 + self.number as u32
        }
    }

    /// Longitude of the zone's central meridian, in degrees.
    #[must_use]
    pub fn central_meridian(self) -> f64 {
        f64::from(self.number) * 6.0 - 183.0
    }
}
