//! HTTP client addressing the per-vantage-point edge nodes.
//!
//! Location selection happens through addressing, not request content:
//! every vantage point is a distinct subdomain bound to that location
//! (`https://<id>.<domain>/api/check`). With `--local-endpoint` all
//! vantage points collapse onto one local dispatcher.

use anyhow::Result;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::registry::{Placement, VantagePoint};
use crate::state::ProbeResult;

/// Wire request for `POST /api/check`
#[derive(Debug, Serialize)]
pub struct CheckRequest<'a> {
    pub host: &'a str,
    pub port: u16,
    pub timeout: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<&'a str>,
}

/// Wire response from `POST /api/check`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResponse {
    pub success: bool,
    pub host: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(rename = "latencyMs", skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: i64,
    #[serde(rename = "cfRay", skip_serializing_if = "Option::is_none")]
    pub cf_ray: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colo: Option<String>,
}

/// The colo that accepted the request, encoded as the trace id's suffix
/// ("0123abc-LHR" -> "LHR")
pub fn ingress_from_ray(ray: &str) -> Option<String> {
    ray.rsplit_once('-')
        .map(|(_, colo)| colo.to_string())
        .filter(|c| !c.is_empty())
}

pub struct ProbeClient {
    http: Client,
    domain: String,
    local_endpoint: Option<String>,
}

impl ProbeClient {
    pub fn new(domain: String, local_endpoint: Option<String>, probe_timeout: Duration) -> Result<Self> {
        // Leave the edge node room to report its own timeout result before
        // the transport gives up
        let http = Client::builder()
            .timeout(probe_timeout + Duration::from_secs(5))
            .build()?;

        Ok(Self {
            http,
            domain,
            local_endpoint,
        })
    }

    /// Endpoint URL serving a vantage point
    pub fn endpoint(&self, vp: &VantagePoint) -> String {
        match &self.local_endpoint {
            Some(local) => format!("http://{}/api/check", local),
            None => format!("https://{}.{}/api/check", vp.id, self.domain),
        }
    }

    /// Dispatch one probe through `vp` and normalize the outcome.
    ///
    /// Transport failures (the request to the vantage point itself failing)
    /// are folded into a failed probe result; this never returns an error.
    pub async fn check(
        &self,
        vp: &VantagePoint,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> ProbeResult {
        let request = CheckRequest {
            host,
            port,
            timeout: timeout.as_millis() as u64,
            region: match vp.placement {
                Placement::Hinted => Some(vp.id),
                Placement::Direct => None,
            },
        };

        let response = self
            .http
            .post(self.endpoint(vp))
            .json(&request)
            .send()
            .await;

        let (body, placement_header) = match response {
            Ok(resp) => {
                let placement = resp
                    .headers()
                    .get("cf-placement")
                    .and_then(|v| v.to_str().ok())
                    .map(|s| s.to_string());
                match resp.json::<CheckResponse>().await {
                    Ok(body) => (body, placement),
                    Err(e) => return self.transport_failure(vp, host, port, e.to_string()),
                }
            }
            Err(e) => return self.transport_failure(vp, host, port, e.to_string()),
        };

        // Ingress is where the request landed; egress is where the probe
        // actually executed. For direct placement the two coincide, for
        // hinted placement the node reports its execution colo.
        let ingress = body.cf_ray.as_deref().and_then(ingress_from_ray);
        let egress = body
            .colo
            .clone()
            .or_else(|| placement_header.and_then(|p| trailing_colo(&p)));

        ProbeResult {
            succeeded: body.success,
            target_host: host.to_string(),
            target_port: port,
            vantage_point_id: vp.id.to_string(),
            latency_ms: body.latency_ms,
            // Remote-supplied text goes straight to the terminal later
            error_message: body.error.map(|e| crate::lookup::sanitize_display(&e)),
            completed_at_ms: body.timestamp,
            trace_id: body.cf_ray,
            ingress_colo: ingress,
            egress_colo: egress,
        }
    }

    fn transport_failure(
        &self,
        vp: &VantagePoint,
        host: &str,
        port: u16,
        error: String,
    ) -> ProbeResult {
        ProbeResult {
            succeeded: false,
            target_host: host.to_string(),
            target_port: port,
            vantage_point_id: vp.id.to_string(),
            latency_ms: None,
            error_message: Some(error),
            completed_at_ms: Utc::now().timestamp_millis(),
            trace_id: None,
            ingress_colo: None,
            egress_colo: None,
        }
    }
}

/// Placement header values look like "remote-LHR"; keep the colo part
fn trailing_colo(placement: &str) -> Option<String> {
    placement
        .rsplit_once('-')
        .map(|(_, colo)| colo.to_string())
        .or_else(|| Some(placement.to_string()))
        .filter(|c| !c.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry;

    fn client(local: Option<&str>) -> ProbeClient {
        ProbeClient::new(
            "edgeping.net".to_string(),
            local.map(|s| s.to_string()),
            Duration::from_secs(10),
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint_subdomain_addressing() {
        let vp = registry::get("fra").unwrap();
        assert_eq!(
            client(None).endpoint(vp),
            "https://fra.edgeping.net/api/check"
        );
    }

    #[test]
    fn test_endpoint_local_override() {
        let vp = registry::get("fra").unwrap();
        assert_eq!(
            client(Some("127.0.0.1:8787")).endpoint(vp),
            "http://127.0.0.1:8787/api/check"
        );
    }

    #[test]
    fn test_ingress_from_ray() {
        assert_eq!(ingress_from_ray("8c4f12ab3cd-LHR"), Some("LHR".to_string()));
        assert_eq!(ingress_from_ray("no_suffix"), None);
        assert_eq!(ingress_from_ray("dangling-"), None);
    }

    #[test]
    fn test_trailing_colo() {
        assert_eq!(trailing_colo("remote-SIN"), Some("SIN".to_string()));
        assert_eq!(trailing_colo("SIN"), Some("SIN".to_string()));
        assert_eq!(trailing_colo(""), None);
    }

    #[test]
    fn test_check_response_wire_names() {
        let json = r#"{
            "success": true,
            "host": "example.com",
            "port": 443,
            "latencyMs": 42,
            "timestamp": 1700000000000,
            "cfRay": "abc123-SYD",
            "colo": "SYD"
        }"#;
        let body: CheckResponse = serde_json::from_str(json).unwrap();
        assert_eq!(body.latency_ms, Some(42));
        assert_eq!(body.cf_ray.as_deref(), Some("abc123-SYD"));
    }
}
