use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Widget};

use crate::tui::theme::Theme;

/// Help overlay listing keyboard shortcuts
pub struct HelpView<'a> {
    theme: &'a Theme,
}

impl<'a> HelpView<'a> {
    pub fn new(theme: &'a Theme) -> Self {
        Self { theme }
    }
}

const SHORTCUTS: &[(&str, &str)] = &[
    ("s", "start / stop probing"),
    ("e", "edit target host"),
    ("p", "pause / resume rounds"),
    ("c", "clear results"),
    ("w", "write CSV export"),
    ("t", "cycle theme"),
    ("?", "toggle this help"),
    ("q", "quit"),
];

impl Widget for HelpView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let popup_width = 44.min(area.width.saturating_sub(4));
        let popup_height = (SHORTCUTS.len() as u16 + 4).min(area.height.saturating_sub(2));
        let popup_x = (area.width.saturating_sub(popup_width)) / 2 + area.x;
        let popup_y = (area.height.saturating_sub(popup_height)) / 2 + area.y;
        let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

        Clear.render(popup_area, buf);

        let block = Block::default()
            .title(" Help ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.border));

        let mut lines = vec![Line::from("")];
        for (key, desc) in SHORTCUTS {
            lines.push(Line::from(vec![
                Span::styled(format!("  {:<4}", key), Style::default().fg(self.theme.shortcut)),
                Span::styled(*desc, Style::default().fg(self.theme.text)),
            ]));
        }

        Paragraph::new(lines).block(block).render(popup_area, buf);
    }
}
