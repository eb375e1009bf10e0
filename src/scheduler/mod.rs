/// Expiry sweep.
/// A background pass finalizes auctions whose end time passed without a
/// sale. Readers resolve expiry lazily too, so the sweep only has to catch
/// up; every write it makes goes through the same version-guarded path as
/// bids and buy-now.
// region:    --- Imports
use crate::bidding::commands::SettlementEngine;
use crate::clock::Clock;
use crate::message_broker::EventPublisher;
use crate::store::AuctionStore;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{debug, error};

// endregion: --- Imports

// region:    --- Expiry Scheduler
pub struct ExpiryScheduler<S, P, C> {
    engine: Arc<SettlementEngine<S, P, C>>,
    period: Duration,
}

impl<S, P, C> ExpiryScheduler<S, P, C>
where
    S: AuctionStore + 'static,
    P: EventPublisher + 'static,
    C: Clock + 'static,
{
    pub fn new(engine: Arc<SettlementEngine<S, P, C>>, period: Duration) -> Self {
        Self { engine, period }
    }

    /// Spawn the sweep loop.
    pub fn start(&self) {
        let engine = Arc::clone(&self.engine);
        let period = self.period;
        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                match engine.sweep_expired().await {
                    Ok(0) => {}
                    Ok(resolved) => {
                        debug!(
                            "{:<12} --> resolved {} expired auctions",
                            "Scheduler", resolved
                        )
                    }
                    Err(e) => {
                        error!("{:<12} --> expiry sweep failed: {:?}", "Scheduler", e)
                    }
                }
            }
        });
    }
}
// endregion: --- Expiry Scheduler
