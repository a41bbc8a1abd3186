use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::cli::{parse_coord, Args};
use crate::sim::Coord;

/// Runtime configuration derived from CLI args
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Number of rounds to run (None = infinite)
    pub count: Option<u64>,
    /// Interval between probe rounds
    #[serde(with = "duration_serde")]
    pub interval: Duration,
    /// Per-probe timeout
    #[serde(with = "duration_serde")]
    pub timeout: Duration,
    /// Service domain hosting the edge nodes
    pub domain: String,
    /// Single local endpoint overriding per-vantage-point addressing
    pub local_endpoint: Option<String>,
    /// Vantage point ids to probe (empty = all)
    pub regions: Vec<String>,
    /// ASN that targets must not resolve into
    pub operator_asn: u32,
    /// Whether the ASN safety check is enabled
    pub asn_guard: bool,
    /// Origin coordinate for the map animation
    pub origin: Option<Coord>,
    /// Target coordinate for the map animation
    pub target_coord: Option<Coord>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            count: None,
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(10),
            domain: "edgeping.net".to_string(),
            local_endpoint: None,
            regions: Vec::new(),
            operator_asn: 13335,
            asn_guard: true,
            origin: None,
            target_coord: None,
        }
    }
}

impl From<&Args> for Config {
    fn from(args: &Args) -> Self {
        let coord = |spec: &Option<String>| {
            spec.as_deref()
                .and_then(parse_coord)
                .map(|(lat, lon)| Coord { lat, lon })
        };

        Self {
            count: if args.count == 0 { None } else { Some(args.count) },
            interval: args.interval_duration(),
            timeout: args.timeout_duration(),
            domain: args.domain.clone(),
            local_endpoint: args.local_endpoint.clone(),
            regions: args.regions.clone(),
            operator_asn: args.operator_asn,
            asn_guard: !args.no_asn_guard,
            origin: coord(&args.origin),
            target_coord: coord(&args.target_coord),
        }
    }
}

/// Serde helper for Duration
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs))
    }
}
