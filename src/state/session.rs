use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::registry::{Placement, VantagePoint};

/// Connection status of a vantage point within the current run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionStatus {
    Pending,
    Connected,
    Failed,
}

/// Result of one probe attempt, as observed by the client.
/// Produced exactly once per attempt and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub succeeded: bool,
    pub target_host: String,
    pub target_port: u16,
    pub vantage_point_id: String,
    pub latency_ms: Option<u64>,
    pub error_message: Option<String>,
    pub completed_at_ms: i64,
    pub trace_id: Option<String>,
    pub ingress_colo: Option<String>,
    pub egress_colo: Option<String>,
}

/// Running per-vantage-point record for the duration of a test run.
///
/// Counters are merged in response-arrival order; `received <= sent` always
/// holds because both are only incremented here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionRecord {
    pub id: String,
    pub display_name: String,
    pub placement: Placement,
    pub status: RegionStatus,
    pub sent: u64,
    pub received: u64,
    /// Append-only, arrival order
    pub latency_history: Vec<u64>,
    pub last_error: Option<String>,
    pub ingress_colo: Option<String>,
    pub egress_colo: Option<String>,
}

impl RegionRecord {
    pub fn new(vp: &VantagePoint) -> Self {
        Self {
            id: vp.id.to_string(),
            display_name: vp.display_name(),
            placement: vp.placement,
            status: RegionStatus::Pending,
            sent: 0,
            received: 0,
            latency_history: Vec::new(),
            last_error: None,
            ingress_colo: None,
            egress_colo: None,
        }
    }

    /// Merge one probe result into the record
    pub fn merge(&mut self, result: &ProbeResult) {
        self.sent += 1;

        if result.succeeded {
            self.received += 1;
            if let Some(latency) = result.latency_ms {
                self.latency_history.push(latency);
            }
            self.status = RegionStatus::Connected;
            self.last_error = None;
        } else {
            self.status = RegionStatus::Failed;
            self.last_error = result.error_message.clone();
        }

        // Location metadata: update when present, retain prior otherwise
        if result.ingress_colo.is_some() {
            self.ingress_colo = result.ingress_colo.clone();
        }
        if result.egress_colo.is_some() {
            self.egress_colo = result.egress_colo.clone();
        }
    }

    /// Loss percentage
    pub fn loss_pct(&self) -> f64 {
        if self.sent == 0 {
            0.0
        } else {
            (1.0 - (self.received as f64 / self.sent as f64)) * 100.0
        }
    }

    /// Loss percentage rounded to a whole number, as exported
    pub fn loss_pct_rounded(&self) -> u64 {
        self.loss_pct().round() as u64
    }

    pub fn last_ms(&self) -> Option<u64> {
        self.latency_history.last().copied()
    }

    pub fn avg_ms(&self) -> Option<f64> {
        if self.latency_history.is_empty() {
            return None;
        }
        let sum: u64 = self.latency_history.iter().sum();
        Some(sum as f64 / self.latency_history.len() as f64)
    }

    pub fn best_ms(&self) -> Option<u64> {
        self.latency_history.iter().min().copied()
    }

    pub fn worst_ms(&self) -> Option<u64> {
        self.latency_history.iter().max().copied()
    }
}

/// Target of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSpec {
    pub host: String,
    pub port: u16,
}

impl TargetSpec {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl std::fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A complete probing run across the selected vantage points
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub target: TargetSpec,
    pub started_at: DateTime<Utc>,
    pub records: Vec<RegionRecord>,
    pub config: Config,
    /// Rounds fired so far
    pub rounds: u64,
    pub paused: bool,
}

impl Session {
    pub fn new(target: TargetSpec, config: Config, vps: &[&VantagePoint]) -> Self {
        Self {
            target,
            started_at: Utc::now(),
            records: vps.iter().map(|vp| RegionRecord::new(vp)).collect(),
            config,
            rounds: 0,
            paused: false,
        }
    }

    pub fn record(&self, id: &str) -> Option<&RegionRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn record_mut(&mut self, id: &str) -> Option<&mut RegionRecord> {
        self.records.iter_mut().find(|r| r.id == id)
    }

    /// Merge an arrived probe result into its vantage point's record.
    /// Results for unknown vantage points (e.g. after `clear`) are dropped.
    pub fn merge(&mut self, result: &ProbeResult) {
        if let Some(record) = self.record_mut(&result.vantage_point_id) {
            record.merge(result);
        }
    }

    /// Discard all per-vantage-point state, keeping the target and config
    pub fn clear(&mut self) {
        self.records.clear();
        self.rounds = 0;
    }

    pub fn total_sent(&self) -> u64 {
        self.records.iter().map(|r| r.sent).sum()
    }

    pub fn total_received(&self) -> u64 {
        self.records.iter().map(|r| r.received).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry;

    fn result_for(id: &str, succeeded: bool, latency_ms: Option<u64>) -> ProbeResult {
        ProbeResult {
            succeeded,
            target_host: "example.com".to_string(),
            target_port: 443,
            vantage_point_id: id.to_string(),
            latency_ms,
            error_message: if succeeded {
                None
            } else {
                Some("connection refused".to_string())
            },
            completed_at_ms: 0,
            trace_id: None,
            ingress_colo: None,
            egress_colo: None,
        }
    }

    fn test_session() -> Session {
        let vps = registry::select(&[]).unwrap();
        Session::new(TargetSpec::new("example.com", 443), Config::default(), &vps)
    }

    #[test]
    fn test_record_initial_state() {
        let vp = registry::get("lhr").unwrap();
        let record = RegionRecord::new(vp);

        assert_eq!(record.status, RegionStatus::Pending);
        assert_eq!(record.sent, 0);
        assert_eq!(record.received, 0);
        assert!(record.latency_history.is_empty());
        assert_eq!(record.loss_pct(), 0.0);
    }

    #[test]
    fn test_merge_success_and_failure_sequence() {
        let vp = registry::get("fra").unwrap();
        let mut record = RegionRecord::new(vp);

        // Round 1 succeeds, round 2 fails, round 3 succeeds
        record.merge(&result_for("fra", true, Some(12)));
        record.merge(&result_for("fra", false, None));
        record.merge(&result_for("fra", true, Some(18)));

        assert_eq!(record.sent, 3);
        assert_eq!(record.received, 2);
        assert_eq!(record.latency_history, vec![12, 18]);
        assert_eq!(record.status, RegionStatus::Connected);
        // Final success cleared the round-2 error
        assert!(record.last_error.is_none());
    }

    #[test]
    fn test_failure_sets_error_and_status() {
        let vp = registry::get("sin").unwrap();
        let mut record = RegionRecord::new(vp);

        record.merge(&result_for("sin", false, None));

        assert_eq!(record.sent, 1);
        assert_eq!(record.received, 0);
        assert_eq!(record.status, RegionStatus::Failed);
        assert_eq!(record.last_error.as_deref(), Some("connection refused"));
        assert_eq!(record.loss_pct(), 100.0);
    }

    #[test]
    fn test_colo_metadata_retained_when_absent() {
        let vp = registry::get("wnam").unwrap();
        let mut record = RegionRecord::new(vp);

        let mut first = result_for("wnam", true, Some(30));
        first.ingress_colo = Some("SEA".to_string());
        first.egress_colo = Some("LAX".to_string());
        record.merge(&first);

        // Second response carries no placement metadata
        record.merge(&result_for("wnam", true, Some(31)));

        assert_eq!(record.ingress_colo.as_deref(), Some("SEA"));
        assert_eq!(record.egress_colo.as_deref(), Some("LAX"));
    }

    #[test]
    fn test_derived_stats() {
        let vp = registry::get("iad").unwrap();
        let mut record = RegionRecord::new(vp);
        for ms in [20, 10, 30] {
            record.merge(&result_for("iad", true, Some(ms)));
        }

        assert_eq!(record.last_ms(), Some(30));
        assert_eq!(record.best_ms(), Some(10));
        assert_eq!(record.worst_ms(), Some(30));
        assert_eq!(record.avg_ms(), Some(20.0));
    }

    #[test]
    fn test_loss_rounding() {
        let vp = registry::get("ord").unwrap();
        let mut record = RegionRecord::new(vp);
        record.merge(&result_for("ord", true, Some(5)));
        record.merge(&result_for("ord", true, Some(5)));
        record.merge(&result_for("ord", false, None));

        // 1/3 lost
        assert_eq!(record.loss_pct_rounded(), 33);
    }

    #[test]
    fn test_session_merge_routes_by_vantage_point() {
        let mut session = test_session();

        session.merge(&result_for("lhr", true, Some(9)));
        session.merge(&result_for("nrt", false, None));

        assert_eq!(session.record("lhr").unwrap().received, 1);
        assert_eq!(session.record("nrt").unwrap().sent, 1);
        assert_eq!(session.record("nrt").unwrap().received, 0);
        assert_eq!(session.record("syd").unwrap().sent, 0);
    }

    #[test]
    fn test_session_clear_discards_records() {
        let mut session = test_session();
        session.merge(&result_for("lhr", true, Some(9)));

        session.clear();

        assert!(session.records.is_empty());
        // A straggler result after clear is dropped, not a panic
        session.merge(&result_for("lhr", true, Some(9)));
        assert!(session.records.is_empty());
    }

    #[test]
    fn test_session_serialization_roundtrip() {
        let mut session = test_session();
        session.merge(&result_for("gru", true, Some(120)));

        let json = serde_json::to_string(&session).unwrap();
        let restored: Session = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.target.host, "example.com");
        assert_eq!(restored.record("gru").unwrap().latency_history, vec![120]);
    }
}
