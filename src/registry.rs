//! Static vantage-point registry.
//!
//! Each vantage point is an edge node reachable at `<id>.<service-domain>`.
//! `Direct` entries are pinned to one colo (ingress == egress); `Hinted`
//! entries carry a provider-region hint and may execute at a different colo
//! than the one that accepted the request.

use serde::{Deserialize, Serialize};

use crate::sim::Coord;

/// How a vantage point's execution location relates to its routing address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    Direct,
    Hinted,
}

impl Placement {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Hinted => "hinted",
        }
    }
}

/// A probing location
#[derive(Debug, Clone, Copy)]
pub struct VantagePoint {
    pub id: &'static str,
    pub city: &'static str,
    pub country: &'static str,
    pub placement: Placement,
    pub lat: f64,
    pub lon: f64,
}

impl VantagePoint {
    pub fn coord(&self) -> Coord {
        Coord {
            lat: self.lat,
            lon: self.lon,
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} ({})", self.city, self.country)
    }
}

use Placement::{Direct, Hinted};

/// All known vantage points. Direct entries use airport colo codes; hinted
/// entries use provider region-hint names.
pub const VANTAGE_POINTS: &[VantagePoint] = &[
    VantagePoint { id: "iad", city: "Ashburn", country: "US", placement: Direct, lat: 38.95, lon: -77.45 },
    VantagePoint { id: "ord", city: "Chicago", country: "US", placement: Direct, lat: 41.98, lon: -87.90 },
    VantagePoint { id: "dfw", city: "Dallas", country: "US", placement: Direct, lat: 32.90, lon: -97.04 },
    VantagePoint { id: "sfo", city: "San Francisco", country: "US", placement: Direct, lat: 37.62, lon: -122.38 },
    VantagePoint { id: "yyz", city: "Toronto", country: "CA", placement: Direct, lat: 43.68, lon: -79.61 },
    VantagePoint { id: "gru", city: "Sao Paulo", country: "BR", placement: Direct, lat: -23.43, lon: -46.47 },
    VantagePoint { id: "lhr", city: "London", country: "GB", placement: Direct, lat: 51.47, lon: -0.45 },
    VantagePoint { id: "fra", city: "Frankfurt", country: "DE", placement: Direct, lat: 50.04, lon: 8.56 },
    VantagePoint { id: "ams", city: "Amsterdam", country: "NL", placement: Direct, lat: 52.31, lon: 4.76 },
    VantagePoint { id: "sin", city: "Singapore", country: "SG", placement: Direct, lat: 1.36, lon: 103.99 },
    VantagePoint { id: "nrt", city: "Tokyo", country: "JP", placement: Direct, lat: 35.76, lon: 140.39 },
    VantagePoint { id: "bom", city: "Mumbai", country: "IN", placement: Direct, lat: 19.09, lon: 72.87 },
    VantagePoint { id: "syd", city: "Sydney", country: "AU", placement: Direct, lat: -33.95, lon: 151.18 },
    VantagePoint { id: "jnb", city: "Johannesburg", country: "ZA", placement: Direct, lat: -26.14, lon: 28.25 },
    VantagePoint { id: "wnam", city: "Western North America", country: "region", placement: Hinted, lat: 39.0, lon: -120.0 },
    VantagePoint { id: "enam", city: "Eastern North America", country: "region", placement: Hinted, lat: 40.0, lon: -75.0 },
    VantagePoint { id: "weur", city: "Western Europe", country: "region", placement: Hinted, lat: 48.0, lon: 2.0 },
    VantagePoint { id: "apac", city: "Asia-Pacific", country: "region", placement: Hinted, lat: 10.0, lon: 110.0 },
    VantagePoint { id: "oc", city: "Oceania", country: "region", placement: Hinted, lat: -27.0, lon: 133.0 },
    VantagePoint { id: "sam", city: "South America", country: "region", placement: Hinted, lat: -15.0, lon: -55.0 },
];

/// Look up a vantage point by id
pub fn get(id: &str) -> Option<&'static VantagePoint> {
    VANTAGE_POINTS.iter().find(|vp| vp.id == id)
}

/// Resolve a selection of ids to vantage points (empty selection = all).
/// Unknown ids are reported as an error rather than silently dropped.
pub fn select(ids: &[String]) -> Result<Vec<&'static VantagePoint>, String> {
    if ids.is_empty() {
        return Ok(VANTAGE_POINTS.iter().collect());
    }
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        match get(id) {
            Some(vp) => out.push(vp),
            None => return Err(format!("Unknown vantage point: {}", id)),
        }
    }
    Ok(out)
}

/// Map a colo code to a display city, falling back through the registry
pub fn city_for_colo(colo: &str) -> Option<&'static str> {
    get(&colo.to_lowercase()).map(|vp| vp.city)
}
