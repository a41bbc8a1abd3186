use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::symbols::Marker;
use ratatui::text::Span;
use ratatui::widgets::canvas::{Canvas, Circle, Context, Line as CanvasLine, Map as WorldMap, MapResolution, Points};
use ratatui::widgets::{Block, Borders, Widget};
use std::time::Instant;

use crate::registry::{self, Placement};
use crate::sim::{Coord, Leg, Simulation};
use crate::state::{RegionStatus, Session};
use crate::tui::theme::Theme;

/// Segments sampled per great-circle leg
const ARC_STEPS: usize = 24;

/// World map with in-flight packets, trails, ripples and status dots
pub struct MapView<'a> {
    session: &'a Session,
    sim: &'a Simulation,
    theme: &'a Theme,
    now: Instant,
}

impl<'a> MapView<'a> {
    pub fn new(session: &'a Session, sim: &'a Simulation, theme: &'a Theme, now: Instant) -> Self {
        Self {
            session,
            sim,
            theme,
            now,
        }
    }

    fn packet_color(&self, placement: Placement, failed: bool) -> Color {
        if failed {
            self.theme.error
        } else {
            match placement {
                Placement::Direct => self.theme.packet_direct,
                Placement::Hinted => self.theme.packet_hinted,
            }
        }
    }

    fn paint(&self, ctx: &mut Context) {
        ctx.draw(&WorldMap {
            color: self.theme.landmass,
            resolution: MapResolution::High,
        });
        draw_graticule(ctx, self.theme.graticule);
        ctx.layer();

        // Faded residue of completed flights
        for trail in self.sim.trails() {
            let color = if trail.opacity(self.now) > 0.5 {
                self.packet_color(trail.placement, trail.failed)
            } else {
                self.theme.text_dim
            };
            for leg in &trail.legs {
                draw_arc(ctx, leg.from, leg.to, 0.0, 1.0, color);
            }
        }

        // In-flight packets: ghost of completed legs, live leg, head glow
        for packet in self.sim.packets() {
            let color = self.packet_color(packet.placement, packet.failed);
            for leg in packet.completed_legs() {
                draw_arc(ctx, leg.from, leg.to, 0.0, 1.0, self.theme.text_dim);
            }

            let live: &Leg = &packet.legs[packet.current_leg];
            let progress = packet.progress(self.now);
            draw_arc(ctx, live.from, live.to, 0.0, progress, color);

            let head = packet.position(self.now);
            ctx.draw(&Circle {
                x: head.lon,
                y: head.lat,
                radius: 1.2,
                color,
            });
            ctx.draw(&Points {
                coords: &[(head.lon, head.lat)],
                color,
            });
        }

        // Expanding impact ripples
        for ripple in self.sim.ripples() {
            let color = if ripple.failed {
                self.theme.error
            } else {
                self.theme.success
            };
            ctx.draw(&Circle {
                x: ripple.at.lon,
                y: ripple.at.lat,
                radius: 1.0 + ripple.progress(self.now) * 4.0,
                color,
            });
        }

        ctx.layer();

        // Static vantage-point status dots
        for record in &self.session.records {
            if let Some(vp) = registry::get(&record.id) {
                let color = match record.status {
                    RegionStatus::Pending => self.theme.text_dim,
                    RegionStatus::Connected => self.theme.success,
                    RegionStatus::Failed => self.theme.error,
                };
                ctx.print(
                    vp.lon,
                    vp.lat,
                    Span::styled("●".to_string(), Style::default().fg(color)),
                );
            }
        }

        // Origin and target markers
        let marker = Style::default().fg(self.theme.marker);
        if let Some(origin) = self.session.config.origin {
            ctx.print(origin.lon, origin.lat, Span::styled("▲".to_string(), marker));
        }
        if let Some(target) = self.session.config.target_coord {
            ctx.print(target.lon, target.lat, Span::styled("◎".to_string(), marker));
        }

        // Legend
        ctx.print(
            -175.0,
            -82.0,
            Span::styled(
                "● direct".to_string(),
                Style::default().fg(self.theme.packet_direct),
            ),
        );
        ctx.print(
            -130.0,
            -82.0,
            Span::styled(
                "● hinted".to_string(),
                Style::default().fg(self.theme.packet_hinted),
            ),
        );
        ctx.print(
            -85.0,
            -82.0,
            Span::styled("● failed".to_string(), Style::default().fg(self.theme.error)),
        );
    }
}

impl Widget for MapView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = format!(" edgeping ── {} ", self.session.target);
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.border));

        Canvas::default()
            .block(block)
            .marker(Marker::Braille)
            .x_bounds([-180.0, 180.0])
            .y_bounds([-90.0, 90.0])
            .paint(|ctx| self.paint(ctx))
            .render(area, buf);
    }
}

/// Sampled great-circle arc between fractions `t0..t1` of the leg.
/// Segments that wrap the dateline are skipped rather than smeared
/// across the whole map.
fn draw_arc(ctx: &mut Context, from: Coord, to: Coord, t0: f64, t1: f64, color: Color) {
    if t1 <= t0 {
        return;
    }

    let mut prev = crate::sim::intermediate(from, to, t0);
    for step in 1..=ARC_STEPS {
        let t = t0 + (t1 - t0) * (step as f64 / ARC_STEPS as f64);
        let point = crate::sim::intermediate(from, to, t);
        if (point.lon - prev.lon).abs() < 180.0 {
            ctx.draw(&CanvasLine {
                x1: prev.lon,
                y1: prev.lat,
                x2: point.lon,
                y2: point.lat,
                color,
            });
        }
        prev = point;
    }
}

/// Light reference lines every 60 degrees of longitude plus the equator
fn draw_graticule(ctx: &mut Context, color: Color) {
    let mut lon = -180.0;
    while lon <= 180.0 {
        ctx.draw(&CanvasLine {
            x1: lon,
            y1: -80.0,
            x2: lon,
            y2: 80.0,
            color,
        });
        lon += 60.0;
    }
    ctx.draw(&CanvasLine {
        x1: -180.0,
        y1: 0.0,
        x2: 180.0,
        y2: 0.0,
        color,
    });
}
