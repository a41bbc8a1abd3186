use std::io::Write;

use crate::state::Session;

/// Generate a text report of a run, one line per vantage point
pub fn generate_report<W: Write>(session: &Session, mut writer: W) -> std::io::Result<()> {
    writeln!(
        writer,
        "edgeping report for {} ({} rounds)",
        session.target, session.rounds
    )?;
    writeln!(
        writer,
        "Started: {}",
        session.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    writeln!(writer)?;

    writeln!(
        writer,
        "{:<28} {:>6} {:>6} {:>8} {:>8} {:>8} {:>8}  {:<6} {:<6}",
        "Region", "Sent", "Loss%", "Last", "Avg", "Best", "Worst", "In", "Out"
    )?;
    writeln!(writer, "{}", "-".repeat(96))?;

    for record in &session.records {
        let fmt_ms = |v: Option<u64>| {
            v.map(|v| format!("{}ms", v))
                .unwrap_or_else(|| "-".to_string())
        };
        let avg = record
            .avg_ms()
            .map(|v| format!("{:.1}ms", v))
            .unwrap_or_else(|| "-".to_string());

        writeln!(
            writer,
            "{:<28} {:>6} {:>5.1}% {:>8} {:>8} {:>8} {:>8}  {:<6} {:<6}",
            record.display_name,
            record.sent,
            record.loss_pct(),
            fmt_ms(record.last_ms()),
            avg,
            fmt_ms(record.best_ms()),
            fmt_ms(record.worst_ms()),
            record.ingress_colo.as_deref().unwrap_or("-"),
            record.egress_colo.as_deref().unwrap_or("-"),
        )?;
    }

    Ok(())
}

/// Generate report to string
#[allow(dead_code)]
pub fn generate_report_string(session: &Session) -> String {
    let mut buf = Vec::new();
    generate_report(session, &mut buf).expect("report to Vec cannot fail");
    String::from_utf8(buf).expect("report is valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::registry;
    use crate::state::TargetSpec;

    #[test]
    fn test_report_lists_every_record() {
        let vps = registry::select(&[]).unwrap();
        let session = Session::new(TargetSpec::new("example.com", 443), Config::default(), &vps);

        let report = generate_report_string(&session);

        assert!(report.contains("example.com:443"));
        for vp in registry::VANTAGE_POINTS {
            assert!(report.contains(vp.city), "missing {}", vp.city);
        }
    }
}
