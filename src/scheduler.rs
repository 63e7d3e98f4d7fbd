//! Scheduling of endpoint monitor cycles

use crate::errors::Result;
use crate::monitor::EndpointMonitor;
use tokio::time::{MissedTickBehavior, interval};
use tracing::info;

/// Runs every endpoint monitor on its own repeating loop, one tokio task
/// per endpoint, until the process is interrupted.
pub struct Scheduler {
    monitors: Vec<EndpointMonitor>,
}

impl Scheduler {
    pub fn new(monitors: Vec<EndpointMonitor>) -> Self {
        Self { monitors }
    }

    /// Spawn the per-endpoint loops and wait for shutdown. Cycles of one
    /// endpoint run strictly sequentially; endpoints never affect each
    /// other.
    pub async fn start(self) -> Result<()> {
        for mut monitor in self.monitors {
            let frequency = monitor.frequency();
            info!(
                "Starting monitor loop for [{}] every {} seconds",
                monitor.name(),
                frequency.as_secs()
            );

            tokio::spawn(async move {
                let mut ticker = interval(frequency);
                // A slow cycle delays the next tick instead of bursting.
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    ticker.tick().await;
                    monitor.run_cycle().await;
                }
            });
        }

        tokio::signal::ctrl_c().await?;

        info!("Shutting down monitor agent");
        Ok(())
    }
}
