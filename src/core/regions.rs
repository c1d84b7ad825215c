use std::collections::{HashMap, HashSet};

use crate::models::{LocationId, RegionId};

/// Matchmaking regions Gameye can host, and where.
///
/// See https://docs.gameye.com/docs/choosing-your-server-locations
const BUILTIN_LOCATIONS: &[(&str, &str)] = &[
    ("ChinaEast2", "china-east"),
    ("ChinaNorth2", "china-north"),
];

/// Matchmaking regions with no Gameye location
const UNSUPPORTED_REGIONS: &[&str] = &[
    "NorthEurope",
    "WestEurope",
    "AustraliaEast",
    "AustraliaSoutheast",
    "SoutheastAsia",
    "BrazilSouth",
    "NorthCentralUs",
    "CentralUs",
    "SouthCentralUs",
    "EastAsia",
    "JapanEast",
    "JapanWest",
    "EastUs",
    "EastUs2",
    "SouthAfricaNorth",
    "WestUs",
];

/// Translates matchmaking regions into hosting locations
#[derive(Debug, Clone)]
pub struct RegionMapper {
    table: HashMap<RegionId, LocationId>,
}

impl RegionMapper {
    /// Mapper with the built-in table only
    pub fn new() -> Self {
        let table = BUILTIN_LOCATIONS
            .iter()
            .map(|(region, location)| (region.to_string(), location.to_string()))
            .collect();
        Self { table }
    }

    /// Built-in table extended by operator overrides.
    ///
    /// An override with an empty location removes the region from the table.
    pub fn with_overrides<I>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (RegionId, LocationId)>,
    {
        let mut mapper = Self::new();
        for (region, location) in overrides {
            if location.is_empty() {
                mapper.table.remove(&region);
            } else {
                mapper.table.insert(region, location);
            }
        }
        mapper
    }

    pub fn location_for(&self, region: &str) -> Option<&str> {
        self.table.get(region).map(String::as_str)
    }

    /// Map regions to locations, keeping first-seen order and dropping
    /// duplicates and unmapped regions.
    pub fn map(&self, regions: &[RegionId]) -> Vec<LocationId> {
        let mut seen = HashSet::new();
        let mut locations = Vec::with_capacity(regions.len());

        for region in regions {
            match self.location_for(region) {
                Some(location) => {
                    if seen.insert(location) {
                        locations.push(location.to_string());
                    }
                }
                None if UNSUPPORTED_REGIONS.contains(&region.as_str()) => {
                    tracing::debug!("Region {} has no Gameye location, skipping", region);
                }
                None => {
                    tracing::debug!("Unknown region {}, skipping", region);
                }
            }
        }

        locations
    }
}

impl Default for RegionMapper {
    fn default() -> Self {
        Self::new()
    }
}
