//! Target safety validation.
//!
//! Blocks runs whose target resolves into the operator's own network, and
//! gives early inline feedback on malformed hosts. Every input change starts
//! a fresh debounced check; the previous check's cancellation token is
//! cancelled first so a stale result can never overwrite newer state.

use parking_lot::{Mutex, RwLock};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::lookup::asn::AsnLookup;

const DEBOUNCE: Duration = Duration::from_millis(500);

/// Syntactic shape of a host input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKind {
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    Hostname,
}

/// Classify a host input as an IPv4 literal, IPv6 literal or hostname.
/// None means the input matches none of the three.
pub fn classify_host(input: &str) -> Option<HostKind> {
    if let Ok(ip) = input.parse::<Ipv4Addr>() {
        return Some(HostKind::Ipv4(ip));
    }
    if let Ok(ip) = input.trim_matches(['[', ']']).parse::<Ipv6Addr>() {
        return Some(HostKind::Ipv6(ip));
    }
    if is_valid_hostname(input) {
        return Some(HostKind::Hostname);
    }
    None
}

fn is_valid_hostname(s: &str) -> bool {
    if s.is_empty() || s.len() > 253 {
        return false;
    }
    s.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

/// Gating state exposed to the start action
#[derive(Debug, Clone, Default)]
pub struct GateState {
    /// A check is debouncing or in flight; start is blocked until it settles
    pub validating: bool,
    /// Blocking validation or policy error, shown inline
    pub error: Option<String>,
}

pub struct SafetyValidator {
    lookup: Arc<AsnLookup>,
    operator_asn: u32,
    enabled: bool,
    state: Arc<RwLock<GateState>>,
    current: Mutex<Option<CancellationToken>>,
}

impl SafetyValidator {
    pub fn new(lookup: Arc<AsnLookup>, operator_asn: u32, enabled: bool) -> Self {
        Self {
            lookup,
            operator_asn,
            enabled,
            state: Arc::new(RwLock::new(GateState::default())),
            current: Mutex::new(None),
        }
    }

    pub fn state(&self) -> GateState {
        self.state.read().clone()
    }

    /// Whether the start action is currently allowed to proceed
    pub fn allows_start(&self) -> bool {
        let state = self.state.read();
        !state.validating && state.error.is_none()
    }

    /// Submit a new host input. Cancels any in-flight check, then runs a
    /// debounced classification + ASN check in the background. Typing is
    /// never blocked; only the start action waits on the outcome.
    pub fn submit(self: &Arc<Self>, input: String) {
        let token = CancellationToken::new();
        {
            let mut current = self.current.lock();
            if let Some(prev) = current.replace(token.clone()) {
                prev.cancel();
            }
        }

        if input.is_empty() {
            *self.state.write() = GateState::default();
            return;
        }

        *self.state.write() = GateState {
            validating: true,
            error: None,
        };

        let validator = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = validator.check(input, &token) => {}
            }
        });
    }

    async fn check(&self, input: String, cancel: &CancellationToken) {
        tokio::time::sleep(DEBOUNCE).await;

        let verdict = match classify_host(&input) {
            None => Verdict::Invalid,
            Some(_) if !self.enabled => Verdict::Allow,
            Some(kind) => self.asn_verdict(&input, kind).await,
        };

        // A cancelled check must not touch state; the superseding submit
        // already owns it
        if cancel.is_cancelled() {
            return;
        }

        let mut state = self.state.write();
        state.validating = false;
        state.error = match verdict {
            Verdict::Allow => None,
            Verdict::Invalid => Some(format!("Invalid host: {}", input)),
            Verdict::Blocked(ip) => Some(blocked_message(&input, ip)),
        };
    }

    async fn asn_verdict(&self, input: &str, kind: HostKind) -> Verdict {
        asn_verdict(&self.lookup, self.operator_asn, input, kind).await
    }
}

async fn asn_verdict(lookup: &AsnLookup, operator_asn: u32, input: &str, kind: HostKind) -> Verdict {
    let ip: IpAddr = match kind {
        HostKind::Ipv4(ip) => ip.into(),
        HostKind::Ipv6(ip) => ip.into(),
        HostKind::Hostname => match lookup.resolve_ipv4(input).await {
            Some(ip) => ip.into(),
            // No answer: unvalidated, allow rather than error
            None => return Verdict::Allow,
        },
    };

    match lookup.origin_asn(ip).await {
        Some(asn) if asn == operator_asn => Verdict::Blocked(ip),
        // Lookup failure or foreign ASN: fail open
        _ => Verdict::Allow,
    }
}

/// One-shot variant of the safety check for non-interactive modes:
/// classify, resolve, compare ASN, fail open on lookup trouble.
pub async fn check_target_once(
    lookup: &AsnLookup,
    operator_asn: u32,
    host: &str,
) -> std::result::Result<(), String> {
    let kind = match classify_host(host) {
        Some(kind) => kind,
        None => return Err(format!("Invalid host: {}", host)),
    };

    match asn_verdict(lookup, operator_asn, host, kind).await {
        Verdict::Allow => Ok(()),
        Verdict::Invalid => Err(format!("Invalid host: {}", host)),
        Verdict::Blocked(ip) => Err(blocked_message(host, ip)),
    }
}

enum Verdict {
    Allow,
    Invalid,
    Blocked(IpAddr),
}

fn blocked_message(input: &str, ip: IpAddr) -> String {
    if input == ip.to_string() {
        format!("{} is part of the operator network and cannot be probed", ip)
    } else {
        format!(
            "{} resolves to {} inside the operator network and cannot be probed",
            input, ip
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_ipv4() {
        assert_eq!(
            classify_host("192.0.2.1"),
            Some(HostKind::Ipv4("192.0.2.1".parse().unwrap()))
        );
    }

    #[test]
    fn test_classify_ipv6() {
        assert_eq!(
            classify_host("2001:db8::1"),
            Some(HostKind::Ipv6("2001:db8::1".parse().unwrap()))
        );
        assert_eq!(
            classify_host("[2001:db8::1]"),
            Some(HostKind::Ipv6("2001:db8::1".parse().unwrap()))
        );
    }

    #[test]
    fn test_classify_hostname() {
        assert_eq!(classify_host("example.com"), Some(HostKind::Hostname));
        assert_eq!(classify_host("a-b.example.co.uk"), Some(HostKind::Hostname));
        assert_eq!(classify_host("localhost"), Some(HostKind::Hostname));
    }

    #[test]
    fn test_classify_rejects_garbage() {
        assert_eq!(classify_host(""), None);
        assert_eq!(classify_host("bad host"), None);
        assert_eq!(classify_host("-leading.example.com"), None);
        assert_eq!(classify_host("trailing-.example.com"), None);
        assert_eq!(classify_host("double..dot"), None);
    }

    #[test]
    fn test_blocked_message_names_resolved_ip() {
        let ip: IpAddr = "104.16.1.1".parse().unwrap();
        let msg = blocked_message("example.com", ip);
        assert!(msg.contains("example.com"));
        assert!(msg.contains("104.16.1.1"));

        let literal = blocked_message("104.16.1.1", ip);
        assert!(literal.starts_with("104.16.1.1 is part"));
    }

    #[tokio::test]
    async fn test_empty_input_clears_state() {
        let lookup = Arc::new(AsnLookup::new().unwrap());
        let validator = Arc::new(SafetyValidator::new(lookup, 13335, true));

        validator.submit(String::new());
        let state = validator.state();
        assert!(!state.validating);
        assert!(state.error.is_none());
        assert!(validator.allows_start());
    }

    #[tokio::test]
    async fn test_submit_sets_validating_until_settled() {
        let lookup = Arc::new(AsnLookup::new().unwrap());
        // Guard disabled: the check settles without any network traffic
        let validator = Arc::new(SafetyValidator::new(lookup, 13335, false));

        validator.submit("example.com".to_string());
        assert!(validator.state().validating);
        assert!(!validator.allows_start());

        tokio::time::sleep(DEBOUNCE + Duration::from_millis(100)).await;
        let state = validator.state();
        assert!(!state.validating);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_invalid_host_reports_inline_error() {
        let lookup = Arc::new(AsnLookup::new().unwrap());
        let validator = Arc::new(SafetyValidator::new(lookup, 13335, false));

        validator.submit("not a host".to_string());
        tokio::time::sleep(DEBOUNCE + Duration::from_millis(100)).await;

        let state = validator.state();
        assert!(state.error.as_deref().unwrap_or("").contains("Invalid host"));
        assert!(!validator.allows_start());
    }

    #[tokio::test]
    async fn test_new_submit_cancels_prior_check() {
        let lookup = Arc::new(AsnLookup::new().unwrap());
        let validator = Arc::new(SafetyValidator::new(lookup, 13335, false));

        validator.submit("not a host".to_string());
        // Supersede before the first debounce elapses
        tokio::time::sleep(Duration::from_millis(100)).await;
        validator.submit("example.com".to_string());

        tokio::time::sleep(DEBOUNCE + Duration::from_millis(200)).await;
        // The stale "Invalid host" verdict must not have landed
        let state = validator.state();
        assert!(state.error.is_none());
        assert!(!state.validating);
    }
}
