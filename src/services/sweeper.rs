//! Background task that runs the overdue sweep on a fixed cadence

use std::time::Duration;

use tokio::{task::JoinHandle, time};

use super::circulation::CirculationService;

/// Spawn the periodic sweep. The first run happens immediately.
pub fn spawn(circulation: CirculationService, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(every);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match circulation.sweep_overdue().await {
                Ok(report) if !report.flagged.is_empty() => {
                    tracing::info!("Scheduled sweep flagged loans {:?} as overdue", report.flagged);
                }
                Ok(_) => {}
                Err(e) if e.is_infrastructure() => {
                    tracing::error!("Scheduled overdue sweep failed: {}", e)
                }
                Err(e) => tracing::warn!("Scheduled overdue sweep stopped early: {}", e),
            }
        }
    })
}
