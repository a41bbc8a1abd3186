use clap::Parser;
use std::time::Duration;

/// TCP reachability and latency from distributed vantage points, with an
/// animated world-map TUI
#[derive(Parser, Debug, Clone)]
#[command(name = "edgeping")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Target host (IP address or hostname). Optional in TUI mode, required for batch.
    pub host: Option<String>,

    /// Target port
    #[arg(short = 'P', long = "port", default_value = "443")]
    pub port: u16,

    /// Number of probe rounds to run (0 = infinite)
    #[arg(short = 'c', long = "count", default_value = "0")]
    pub count: u64,

    /// Interval between rounds in seconds
    #[arg(short = 'i', long = "interval", default_value = "5.0")]
    pub interval: f64,

    /// Per-probe timeout in seconds
    #[arg(long = "timeout", default_value = "10")]
    pub timeout: f64,

    /// Service domain hosting the edge nodes (each vantage point at <id>.<domain>)
    #[arg(long = "domain", default_value = "edgeping.net")]
    pub domain: String,

    /// Send all probes to a single local endpoint instead of per-vantage-point
    /// subdomains (e.g. 127.0.0.1:8787)
    #[arg(long = "local-endpoint")]
    pub local_endpoint: Option<String>,

    /// Comma-separated vantage point ids to probe (default: all)
    #[arg(long = "regions", value_delimiter = ',')]
    pub regions: Vec<String>,

    /// Operator ASN that targets must not resolve into
    #[arg(long = "operator-asn", default_value = "13335")]
    pub operator_asn: u32,

    /// Skip the target ASN safety check
    #[arg(long = "no-asn-guard")]
    pub no_asn_guard: bool,

    /// Origin coordinate for the map animation, as "lat,lon"
    #[arg(long = "origin")]
    pub origin: Option<String>,

    /// Target coordinate for the map animation, as "lat,lon"
    #[arg(long = "target-coord")]
    pub target_coord: Option<String>,

    /// Disable TUI (streaming output mode)
    #[arg(long = "no-tui")]
    pub no_tui: bool,

    /// Output JSON (batch mode, requires -c)
    #[arg(long = "json")]
    pub json: bool,

    /// Output CSV (batch mode, requires -c)
    #[arg(long = "csv")]
    pub csv: bool,

    /// Report mode (batch, requires -c)
    #[arg(long = "report")]
    pub report: bool,

    /// Color theme (default, cyber, dracula, nord, monochrome)
    #[arg(long = "theme", default_value = "default")]
    pub theme: String,

    /// Run as an edge-node dispatcher instead of a client
    #[arg(long = "serve")]
    pub serve: bool,

    /// Bind address for --serve
    #[arg(long = "bind", default_value = "0.0.0.0:8787")]
    pub bind: String,

    /// Colo identifier reported by this node in --serve mode
    #[arg(long = "colo")]
    pub colo: Option<String>,

    /// Placement hint this node executes under (sets the cf-placement header)
    #[arg(long = "placement")]
    pub placement: Option<String>,
}

impl Args {
    /// Get round interval as Duration
    pub fn interval_duration(&self) -> Duration {
        Duration::from_secs_f64(self.interval)
    }

    /// Get per-probe timeout as Duration
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs_f64(self.timeout)
    }

    /// Check if running in batch mode (non-interactive)
    pub fn is_batch_mode(&self) -> bool {
        self.json || self.csv || self.report
    }

    /// Validate arguments
    pub fn validate(&self) -> Result<(), String> {
        if self.serve {
            if self.bind.parse::<std::net::SocketAddr>().is_err() {
                return Err(format!("Invalid bind address: {}", self.bind));
            }
            return Ok(());
        }

        if self.is_batch_mode() && self.count == 0 {
            return Err("Batch output modes (--json, --csv, --report) require -c to be set".into());
        }

        if (self.is_batch_mode() || self.no_tui) && self.host.is_none() {
            return Err("A target host is required outside the TUI".into());
        }

        if self.port == 0 {
            return Err("Port must be in 1-65535".into());
        }

        if self.interval <= 0.0 {
            return Err("Interval must be positive".into());
        }

        if self.timeout <= 0.0 {
            return Err("Timeout must be positive".into());
        }

        for spec in [&self.origin, &self.target_coord].into_iter().flatten() {
            if parse_coord(spec).is_none() {
                return Err(format!("Invalid coordinate: {} (expected \"lat,lon\")", spec));
            }
        }

        Ok(())
    }
}

/// Parse a "lat,lon" pair
pub fn parse_coord(s: &str) -> Option<(f64, f64)> {
    let (lat, lon) = s.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lon: f64 = lon.trim().parse().ok()?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return None;
    }
    Some((lat, lon))
}
