//! Packet-flight simulation backing the world-map view.
//!
//! Turns the stream of probe outcomes into packets traveling great-circle
//! legs between origin, vantage point and target, with residual trails and
//! impact ripples. All timing is expressed through `Instant`s passed in by
//! the caller, so the state machine is deterministic under test.

use std::time::{Duration, Instant};

use crate::registry::{Placement, VantagePoint};
use crate::sim::geo::{distance_km, intermediate, Coord};

/// Maximum concurrently animated packets; oldest is evicted beyond this
pub const PACKET_CAP: usize = 50;
/// Per-leg on-screen duration floor
pub const MIN_LEG_MS: u64 = 500;
/// Linear fade window for retired trails
pub const TRAIL_FADE_MS: u64 = 1500;
/// Expansion/fade window for impact ripples
pub const RIPPLE_MS: u64 = 400;
/// Animation duration stand-in when a probe produced no latency measurement
const FALLBACK_LATENCY_MS: u64 = 200;

/// One great-circle segment of an animated path
#[derive(Debug, Clone)]
pub struct Leg {
    pub from: Coord,
    pub to: Coord,
    pub duration: Duration,
}

impl Leg {
    /// Position at fraction `t` of this leg
    pub fn position(&self, t: f64) -> Coord {
        intermediate(self.from, self.to, t)
    }
}

/// An in-flight packet
#[derive(Debug, Clone)]
pub struct Packet {
    pub vantage_point_id: String,
    pub placement: Placement,
    pub failed: bool,
    pub legs: Vec<Leg>,
    pub current_leg: usize,
    pub leg_started: Instant,
}

impl Packet {
    /// Progress along the current leg, clamped to [0, 1]
    pub fn progress(&self, now: Instant) -> f64 {
        let leg = &self.legs[self.current_leg];
        let elapsed = now.saturating_duration_since(self.leg_started);
        (elapsed.as_secs_f64() / leg.duration.as_secs_f64()).clamp(0.0, 1.0)
    }

    /// Current map position
    pub fn position(&self, now: Instant) -> Coord {
        self.legs[self.current_leg].position(self.progress(now))
    }

    /// Legs already flown, drawn as a ghost behind the live leg
    pub fn completed_legs(&self) -> &[Leg] {
        &self.legs[..self.current_leg]
    }
}

/// Fading residual path of a completed packet
#[derive(Debug, Clone)]
pub struct Trail {
    pub legs: Vec<Leg>,
    pub placement: Placement,
    pub failed: bool,
    pub ended: Instant,
}

impl Trail {
    /// Remaining opacity in [0, 1]; 0 once fully faded
    pub fn opacity(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.ended).as_millis() as f64;
        (1.0 - elapsed / TRAIL_FADE_MS as f64).clamp(0.0, 1.0)
    }
}

/// Transient impact marker at a leg endpoint
#[derive(Debug, Clone)]
pub struct Ripple {
    pub at: Coord,
    pub failed: bool,
    pub started: Instant,
}

impl Ripple {
    /// Expansion progress in [0, 1]; 1 once expired
    pub fn progress(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.started).as_millis() as f64;
        (elapsed / RIPPLE_MS as f64).clamp(0.0, 1.0)
    }
}

/// The single simulation surface. Owned by the map view for the process's
/// lifetime; mutated only from the spawn trigger and the render tick.
#[derive(Debug, Default)]
pub struct Simulation {
    packets: Vec<Packet>,
    trails: Vec<Trail>,
    ripples: Vec<Ripple>,
}

impl Simulation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn packets(&self) -> &[Packet] {
        &self.packets
    }

    pub fn trails(&self) -> &[Trail] {
        &self.trails
    }

    pub fn ripples(&self) -> &[Ripple] {
        &self.ripples
    }

    /// Anything still animating? The render tick skips simulation work
    /// (and the view can skip redraws) while this is false.
    pub fn is_active(&self) -> bool {
        !self.packets.is_empty() || !self.trails.is_empty() || !self.ripples.is_empty()
    }

    /// Drop all animation state
    pub fn reset(&mut self) {
        self.packets.clear();
        self.trails.clear();
        self.ripples.clear();
    }

    /// Spawn the animation for one arrived probe result.
    ///
    /// Builds origin->vantage and vantage->target legs for whichever
    /// coordinates are known. Total flight time is
    /// `max(latency_ms * 10, 2 * MIN_LEG_MS)`, split across legs in
    /// proportion to geodesic distance with a 500 ms floor per leg.
    /// With no usable legs the impact collapses to a ripple at the
    /// vantage point.
    pub fn spawn_packet(
        &mut self,
        vp: &VantagePoint,
        latency_ms: Option<u64>,
        origin: Option<Coord>,
        target: Option<Coord>,
        failed: bool,
        now: Instant,
    ) {
        let hop = vp.coord();

        let mut spans: Vec<(Coord, Coord)> = Vec::with_capacity(2);
        if let Some(origin) = origin {
            spans.push((origin, hop));
        }
        if let Some(target) = target {
            spans.push((hop, target));
        }

        if spans.is_empty() {
            self.ripples.push(Ripple {
                at: hop,
                failed,
                started: now,
            });
            return;
        }

        let total_ms = (latency_ms.unwrap_or(FALLBACK_LATENCY_MS) * 10).max(2 * MIN_LEG_MS);
        let distances: Vec<f64> = spans.iter().map(|(a, b)| distance_km(*a, *b)).collect();
        let total_km: f64 = distances.iter().sum();

        let legs: Vec<Leg> = spans
            .iter()
            .zip(&distances)
            .map(|(&(from, to), &km)| {
                let share = if total_km > 0.0 {
                    km / total_km
                } else {
                    1.0 / spans.len() as f64
                };
                let ms = ((total_ms as f64 * share) as u64).max(MIN_LEG_MS);
                Leg {
                    from,
                    to,
                    duration: Duration::from_millis(ms),
                }
            })
            .collect();

        // At capacity: evict the oldest packet (spawn order) first
        while self.packets.len() >= PACKET_CAP {
            self.packets.remove(0);
        }

        self.packets.push(Packet {
            vantage_point_id: vp.id.to_string(),
            placement: vp.placement,
            failed,
            legs,
            current_leg: 0,
            leg_started: now,
        });
    }

    /// Advance every packet one frame and prune expired trails/ripples
    pub fn advance(&mut self, now: Instant) {
        let mut retired: Vec<Trail> = Vec::new();
        let mut impacts: Vec<Ripple> = Vec::new();

        self.packets.retain_mut(|packet| {
            if packet.progress(now) < 1.0 {
                return true;
            }

            // Leg complete: impact ripple at its endpoint
            let end = packet.legs[packet.current_leg].to;
            impacts.push(Ripple {
                at: end,
                failed: packet.failed,
                started: now,
            });

            if packet.current_leg + 1 < packet.legs.len() {
                packet.current_leg += 1;
                packet.leg_started = now;
                true
            } else {
                retired.push(Trail {
                    legs: std::mem::take(&mut packet.legs),
                    placement: packet.placement,
                    failed: packet.failed,
                    ended: now,
                });
                false
            }
        });

        self.ripples.append(&mut impacts);
        self.trails.append(&mut retired);
        self.trails.retain(|t| t.opacity(now) > 0.0);
        self.ripples.retain(|r| r.progress(now) < 1.0);
    }
}
