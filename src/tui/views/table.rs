use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Style, Stylize};
use ratatui::widgets::{Block, Borders, Cell, Row, Table, Widget};

use crate::state::{RegionStatus, Session};
use crate::tui::theme::Theme;
use crate::tui::widgets::latency_sparkline;

/// Truncate a string to max_len characters, adding ellipsis if truncated
fn truncate_with_ellipsis(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 1).collect();
        format!("{}…", truncated)
    }
}

/// Per-vantage-point stats table
pub struct TableView<'a> {
    session: &'a Session,
    theme: &'a Theme,
}

impl<'a> TableView<'a> {
    pub fn new(session: &'a Session, theme: &'a Theme) -> Self {
        Self { session, theme }
    }
}

impl Widget for TableView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = format!(
            " {} probes ── {} received ",
            self.session.total_sent(),
            self.session.total_received()
        );
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.border));

        let header = Row::new(vec![
            Cell::from("Region").style(Style::default().bold()),
            Cell::from("St").style(Style::default().bold()),
            Cell::from("Sent").style(Style::default().bold()),
            Cell::from("Loss%").style(Style::default().bold()),
            Cell::from("Last").style(Style::default().bold()),
            Cell::from("Avg").style(Style::default().bold()),
            Cell::from("Best").style(Style::default().bold()),
            Cell::from("Worst").style(Style::default().bold()),
            Cell::from("In→Out").style(Style::default().bold()),
            Cell::from("").style(Style::default().bold()),
        ])
        .height(1);

        let rows: Vec<Row> = self
            .session
            .records
            .iter()
            .map(|record| {
                let (status_char, status_color) = match record.status {
                    RegionStatus::Pending => ("○", self.theme.text_dim),
                    RegionStatus::Connected => ("●", self.theme.success),
                    RegionStatus::Failed => ("✕", self.theme.error),
                };

                let fmt_ms = |v: Option<u64>| {
                    v.map(|v| format!("{}", v)).unwrap_or_else(|| "-".into())
                };
                let avg = record
                    .avg_ms()
                    .map(|v| format!("{:.0}", v))
                    .unwrap_or_else(|| "-".into());

                let loss = if record.sent > 0 {
                    format!("{:.0}", record.loss_pct())
                } else {
                    "-".into()
                };
                let loss_color = if record.loss_pct() > 50.0 {
                    self.theme.error
                } else if record.loss_pct() > 10.0 {
                    self.theme.warning
                } else {
                    self.theme.text
                };

                let route = match (&record.ingress_colo, &record.egress_colo) {
                    (Some(i), Some(e)) if i != e => format!("{}→{}", i, e),
                    (Some(i), _) => i.clone(),
                    (None, Some(e)) => format!("→{}", e),
                    (None, None) => "-".into(),
                };

                // Failed regions show the error where the sparkline would be
                let tail = if record.status == RegionStatus::Failed {
                    Cell::from(truncate_with_ellipsis(
                        record.last_error.as_deref().unwrap_or(""),
                        24,
                    ))
                    .style(Style::default().fg(self.theme.error))
                } else {
                    Cell::from(latency_sparkline(&record.latency_history, 24))
                        .style(Style::default().fg(self.theme.success))
                };

                Row::new(vec![
                    Cell::from(truncate_with_ellipsis(&record.display_name, 22))
                        .style(Style::default().fg(self.theme.text)),
                    Cell::from(status_char).style(Style::default().fg(status_color)),
                    Cell::from(record.sent.to_string()),
                    Cell::from(loss).style(Style::default().fg(loss_color)),
                    Cell::from(fmt_ms(record.last_ms())),
                    Cell::from(avg),
                    Cell::from(fmt_ms(record.best_ms())),
                    Cell::from(fmt_ms(record.worst_ms())),
                    Cell::from(route).style(Style::default().fg(self.theme.text_dim)),
                    tail,
                ])
            })
            .collect();

        let widths = [
            Constraint::Length(22),
            Constraint::Length(2),
            Constraint::Length(5),
            Constraint::Length(5),
            Constraint::Length(5),
            Constraint::Length(5),
            Constraint::Length(5),
            Constraint::Length(5),
            Constraint::Length(10),
            Constraint::Min(10),
        ];

        Table::new(rows, widths)
            .header(header)
            .block(block)
            .render(area, buf);
    }
}
