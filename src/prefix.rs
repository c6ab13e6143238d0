//! Plate-prefix to administrative region lookup.
//!
//! Polish registrations encode the issuing area in the first characters:
//! the first letter names the voivodeship, two or three letters narrow it to
//! a city or county. The map lives in a JSON data file and is loaded once
//! per session; a missing or corrupt file simply resolves every lookup to
//! absent.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::plate::Plate;

/// Prefix lookup table, most specific prefix first.
#[derive(Debug, Default, Deserialize)]
pub struct PrefixMap {
    /// Full two/three-letter prefixes (e.g. KR, WA, ERA)
    #[serde(default, rename = "known_prefixes_optional")]
    known_prefixes: HashMap<String, String>,
    /// Fallback by voivodeship letter (e.g. E)
    #[serde(default, rename = "voivodeship_by_first_letter")]
    by_first_letter: HashMap<String, String>,
}

impl PrefixMap {
    /// Loads the map from a JSON file; any failure degrades to an empty map.
    pub fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => {
                crate::log(&format!(
                    "Prefix map {} not found; regions will be unresolved",
                    path.display()
                ));
                return Self::default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(map) => map,
            Err(e) => {
                crate::log(&format!(
                    "Prefix map {} is corrupt ({}); regions will be unresolved",
                    path.display(),
                    e
                ));
                Self::default()
            }
        }
    }

    /// Resolves the administrative region for a plate: 3-character prefix,
    /// then 2-character, then the single-letter voivodeship fallback.
    pub fn region_for(&self, plate: &Plate) -> Option<String> {
        let p = plate.as_str();

        if p.len() >= 3 {
            if let Some(region) = self.known_prefixes.get(&p[..3]) {
                return Some(region.clone());
            }
        }
        if p.len() >= 2 {
            if let Some(region) = self.known_prefixes.get(&p[..2]) {
                return Some(region.clone());
            }
        }
        self.by_first_letter.get(&p[..1]).cloned()
    }
}
