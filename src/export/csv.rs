use anyhow::Result;
use std::io::Write;
use std::path::Path;

use crate::registry;
use crate::state::Session;

/// Export session to CSV format, one row per vantage point record
pub fn export_csv<W: Write>(session: &Session, mut writer: W) -> Result<()> {
    writeln!(
        writer,
        "Region,Sent,Loss%,Last(ms),Avg(ms),Best(ms),Worst(ms),Ingress Colo,Ingress City,Egress Colo,Egress City"
    )?;

    for record in &session.records {
        let loss = if record.sent > 0 {
            record.loss_pct_rounded().to_string()
        } else {
            String::new()
        };

        let fmt_opt = |v: Option<u64>| v.map(|v| v.to_string()).unwrap_or_default();
        let avg = record
            .avg_ms()
            .map(|v| format!("{:.1}", v))
            .unwrap_or_default();

        let colo_city = |colo: &Option<String>| {
            colo.as_deref()
                .and_then(registry::city_for_colo)
                .unwrap_or("")
        };

        writeln!(
            writer,
            "{},{},{},{},{},{},{},{},{},{},{}",
            escape_csv(&record.display_name),
            record.sent,
            loss,
            fmt_opt(record.last_ms()),
            avg,
            fmt_opt(record.best_ms()),
            fmt_opt(record.worst_ms()),
            record.ingress_colo.as_deref().unwrap_or(""),
            escape_csv(colo_city(&record.ingress_colo)),
            record.egress_colo.as_deref().unwrap_or(""),
            escape_csv(colo_city(&record.egress_colo)),
        )?;
    }

    Ok(())
}

/// Export session CSV to a file path
pub fn export_csv_file(session: &Session, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    export_csv(session, std::io::BufWriter::new(file))
}

/// Escape a string for CSV (quote if contains comma, quote, or newline)
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::state::{ProbeResult, TargetSpec};

    fn result_for(id: &str, succeeded: bool, latency_ms: Option<u64>) -> ProbeResult {
        ProbeResult {
            succeeded,
            target_host: "example.com".to_string(),
            target_port: 443,
            vantage_point_id: id.to_string(),
            latency_ms,
            error_message: (!succeeded).then(|| "timeout".to_string()),
            completed_at_ms: 0,
            trace_id: None,
            ingress_colo: Some(id.to_uppercase()),
            egress_colo: Some(id.to_uppercase()),
        }
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("simple"), "simple");
        assert_eq!(escape_csv("with,comma"), "\"with,comma\"");
        assert_eq!(escape_csv("with\"quote"), "\"with\"\"quote\"");
    }

    #[test]
    fn test_csv_shape_and_loss_roundtrip() {
        let vps = registry::select(&["iad".to_string(), "lhr".to_string(), "sin".to_string()])
            .unwrap();
        let mut session = Session::new(TargetSpec::new("example.com", 443), Config::default(), &vps);

        // iad: 3 sent / 2 received; lhr: all good; sin: untouched
        session.merge(&result_for("iad", true, Some(10)));
        session.merge(&result_for("iad", false, None));
        session.merge(&result_for("iad", true, Some(20)));
        session.merge(&result_for("lhr", true, Some(7)));

        let mut buf = Vec::new();
        export_csv(&session, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        let lines: Vec<&str> = text.trim_end().lines().collect();
        // header + one row per record
        assert_eq!(lines.len(), 1 + 3);
        assert!(lines[0].starts_with("Region,Sent,Loss%"));

        // Loss% column matches round((sent-received)/sent*100) for each row
        for (line, record) in lines[1..].iter().zip(&session.records) {
            let fields: Vec<&str> = line.split(',').collect();
            assert_eq!(fields[1], record.sent.to_string());
            if record.sent > 0 {
                assert_eq!(fields[2], record.loss_pct_rounded().to_string());
            } else {
                assert_eq!(fields[2], "");
            }
        }

        // 1 of 3 lost -> 33
        assert!(lines[1].contains(",3,33,"));
        // Colo city resolved through the registry
        assert!(lines[1].contains("IAD,Ashburn"));
    }
}
