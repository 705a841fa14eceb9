use crate::engine::ReservationEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{error, info};

/// Auto-releases reservations that stayed pending past the expiry window,
/// returning their capacity to the pool.
pub struct ReservationReaper {
    engine: Arc<ReservationEngine>,
    expiry: chrono::Duration,
    poll_interval: Duration,
}

impl ReservationReaper {
    pub fn new(
        engine: Arc<ReservationEngine>,
        expiry: chrono::Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            engine,
            expiry,
            poll_interval,
        }
    }

    pub async fn run(&self) {
        let mut interval = time::interval(self.poll_interval);

        loop {
            interval.tick().await;

            let cutoff = chrono::Utc::now() - self.expiry;
            match self.engine.release_expired(cutoff).await {
                Ok(0) => {}
                Ok(count) => info!("Released {} expired reservations", count),
                Err(e) => error!("Error releasing expired reservations: {}", e),
            }
        }
    }
}
