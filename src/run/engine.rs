//! Round orchestration.
//!
//! Fans one target out to every selected vantage point on a recurring
//! interval. Each dispatched probe is an independent task whose completion
//! merges into the shared session; stopping the engine cancels only the
//! schedule, so results of probes already in flight still land.

use anyhow::Result;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::registry::VantagePoint;
use crate::run::client::ProbeClient;
use crate::state::Session;

pub struct RunEngine {
    config: Config,
    vps: Vec<&'static VantagePoint>,
    session: Arc<RwLock<Session>>,
    client: Arc<ProbeClient>,
    cancel: CancellationToken,
}

impl RunEngine {
    pub fn new(
        config: Config,
        vps: Vec<&'static VantagePoint>,
        session: Arc<RwLock<Session>>,
        client: Arc<ProbeClient>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            vps,
            session,
            client,
            cancel,
        }
    }

    /// Spawn the engine on the runtime, returning the schedule token.
    /// Cancelling the token stops future rounds; in-flight probes keep
    /// their `Arc`s and still merge on completion.
    pub fn spawn(
        config: Config,
        vps: Vec<&'static VantagePoint>,
        session: Arc<RwLock<Session>>,
        client: Arc<ProbeClient>,
    ) -> CancellationToken {
        let cancel = CancellationToken::new();
        let engine = Self::new(config, vps, session, client, cancel.clone());
        tokio::spawn(async move {
            if let Err(e) = engine.run().await {
                eprintln!("Engine error: {}", e);
            }
        });
        cancel
    }

    /// Run rounds until the configured count is reached or the schedule
    /// is cancelled. The first round fires immediately.
    pub async fn run(self) -> Result<()> {
        let mut rounds_fired: u64 = 0;
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    break;
                }
                _ = interval.tick() => {
                    // Check if paused
                    {
                        let session = self.session.read();
                        if session.paused {
                            continue;
                        }
                    }

                    if let Some(count) = self.config.count {
                        if rounds_fired >= count {
                            self.cancel.cancel();
                            break;
                        }
                    }

                    self.fire_round();
                    rounds_fired += 1;
                    self.session.write().rounds = rounds_fired;
                }
            }
        }

        Ok(())
    }

    /// Issue one probe per vantage point without waiting between them.
    /// Counter updates happen on arrival, in arrival order.
    fn fire_round(&self) {
        let (host, port) = {
            let session = self.session.read();
            (session.target.host.clone(), session.target.port)
        };

        for &vp in &self.vps {
            let client = self.client.clone();
            let session = self.session.clone();
            let host = host.clone();
            let timeout = self.config.timeout;

            tokio::spawn(async move {
                let result = client.check(vp, &host, port, timeout).await;
                session.write().merge(&result);
            });
        }
    }
}
