use anyhow::Result;
use hickory_resolver::config::ResolverConfig;
use hickory_resolver::{Resolver, TokioResolver};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::{Duration, Instant};

/// ASN cache entry
struct CacheEntry {
    asn: Option<u32>,
    cached_at: Instant,
}

/// Origin-ASN lookup via Team Cymru DNS
pub struct AsnLookup {
    resolver: TokioResolver,
    cache: RwLock<HashMap<IpAddr, CacheEntry>>,
    cache_ttl: Duration,
}

impl AsnLookup {
    pub fn new() -> Result<Self> {
        // Try system DNS config first, fall back to Google DNS if unavailable
        let resolver = match Resolver::builder_tokio() {
            Ok(builder) => builder.build(),
            Err(_) => {
                eprintln!("Warning: System DNS config unavailable, using Google DNS (8.8.8.8)");
                Resolver::builder_with_config(
                    ResolverConfig::google(),
                    hickory_resolver::name_server::TokioConnectionProvider::default(),
                )
                .build()
            }
        };

        Ok(Self {
            resolver,
            cache: RwLock::new(HashMap::new()),
            cache_ttl: Duration::from_secs(3600), // 1 hour
        })
    }

    /// Resolve a hostname to its first IPv4 address. None when the name
    /// has no A records or resolution fails.
    pub async fn resolve_ipv4(&self, host: &str) -> Option<Ipv4Addr> {
        let lookup = self.resolver.ipv4_lookup(host).await.ok()?;
        lookup.iter().next().map(|a| a.0)
    }

    /// Look up the origin ASN announcing `ip`, using the cache
    pub async fn origin_asn(&self, ip: IpAddr) -> Option<u32> {
        {
            let cache = self.cache.read();
            if let Some(entry) = cache.get(&ip) {
                if entry.cached_at.elapsed() < self.cache_ttl {
                    return entry.asn;
                }
            }
        }

        let asn = self.do_lookup(ip).await;

        {
            let mut cache = self.cache.write();
            cache.insert(
                ip,
                CacheEntry {
                    asn,
                    cached_at: Instant::now(),
                },
            );
        }

        asn
    }

    /// Perform the actual DNS lookup
    async fn do_lookup(&self, ip: IpAddr) -> Option<u32> {
        let query_name = build_origin_query(ip);

        // Query TXT record at <reversed>.origin.asn.cymru.com
        // Format: "AS | IP | BGP Prefix | CC | Registry | Allocated"
        // Example: "15169 | 8.8.8.8 | 8.8.8.0/24 | US | arin | 1992-12-01"
        let txt_records = self.resolver.txt_lookup(query_name).await.ok()?;
        let txt = txt_records.iter().next()?;

        // TXT records may be quoted or split into multiple strings - join and strip quotes
        let txt_str: String = txt
            .txt_data()
            .iter()
            .filter_map(|bytes| std::str::from_utf8(bytes).ok())
            .collect::<Vec<_>>()
            .join("");

        parse_origin_txt(&txt_str)
    }
}

/// Parse the first `|`-delimited field of a Cymru origin TXT answer as an ASN
pub fn parse_origin_txt(txt: &str) -> Option<u32> {
    let txt = txt.trim().trim_matches('"');
    let first = txt.split('|').next()?.trim();
    // A multi-origin answer lists ASNs space-separated; take the first
    let first = first.split_whitespace().next()?;
    first.trim_start_matches("AS").parse().ok()
}

/// Build the DNS query name for origin lookup
pub fn build_origin_query(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(ipv4) => build_ipv4_origin_query(ipv4),
        IpAddr::V6(ipv6) => build_ipv6_origin_query(ipv6),
    }
}

/// IPv4 origin query: reverse the dotted octets
/// 192.0.2.1 -> "1.2.0.192.origin.asn.cymru.com"
fn build_ipv4_origin_query(ip: Ipv4Addr) -> String {
    let octets = ip.octets();
    format!(
        "{}.{}.{}.{}.origin.asn.cymru.com",
        octets[3], octets[2], octets[1], octets[0]
    )
}

/// IPv6 origin query: expand to 32 nibbles (zero-padding `::` compression),
/// reverse, dot-join
fn build_ipv6_origin_query(ip: Ipv6Addr) -> String {
    let segments = ip.segments();
    let mut nibbles = Vec::with_capacity(32);

    // Expand each segment to 4 hex nibbles
    for segment in segments {
        nibbles.push((segment >> 12) & 0xf);
        nibbles.push((segment >> 8) & 0xf);
        nibbles.push((segment >> 4) & 0xf);
        nibbles.push(segment & 0xf);
    }

    nibbles.reverse();
    let nibble_str: String = nibbles
        .iter()
        .map(|n| format!("{:x}", n))
        .collect::<Vec<_>>()
        .join(".");

    format!("{}.origin6.asn.cymru.com", nibble_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_reverse_format() {
        let ip: IpAddr = "192.0.2.1".parse().unwrap();
        assert_eq!(build_origin_query(ip), "1.2.0.192.origin.asn.cymru.com");
    }

    #[test]
    fn test_ipv6_expands_compression_to_32_labels() {
        let ip: IpAddr = "2001:db8::1".parse().unwrap();
        let query = build_origin_query(ip);

        assert!(query.ends_with(".origin6.asn.cymru.com"));
        let name = query.trim_end_matches(".origin6.asn.cymru.com");
        let labels: Vec<&str> = name.split('.').collect();
        assert_eq!(labels.len(), 32);

        // 2001:0db8:0000:...:0001 reversed starts with the final nibble
        assert!(name.starts_with("1.0.0.0."));
        assert!(name.ends_with(".1.0.0.2"));
    }

    #[test]
    fn test_parse_origin_txt() {
        assert_eq!(
            parse_origin_txt("15169 | 8.8.8.8 | 8.8.8.0/24 | US | arin | 1992-12-01"),
            Some(15169)
        );
        assert_eq!(
            parse_origin_txt("\"13335 | 1.1.1.0/24 | US | arin | 2010-07-14\""),
            Some(13335)
        );
        // Multi-origin answers list ASNs space-separated
        assert_eq!(parse_origin_txt("64496 64497 | 203.0.113.0/24 | AU"), Some(64496));
        assert_eq!(parse_origin_txt("garbage"), None);
        assert_eq!(parse_origin_txt(""), None);
    }
}
