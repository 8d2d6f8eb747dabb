//! Epoch tracking and the periodic maintenance tick

use super::{ConfigKeyService, SERVICE_NAME};
use crate::common::config::period_from_secs;
use crate::common::{Error, Result};
use std::sync::atomic::Ordering;
use std::sync::{Arc, PoisonError};

impl ConfigKeyService {
    /// Enter a new consensus epoch.
    pub fn start(&self, epoch: u64) {
        self.epoch.store(epoch, Ordering::SeqCst);
        tracing::info!("{} starting epoch {}", SERVICE_NAME, epoch);
    }

    /// Leave the current epoch.
    pub fn finish(&self) {
        tracing::debug!("{} finish epoch {}", SERVICE_NAME, self.epoch());
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Arm the maintenance tick.
    pub fn init(self: &Arc<Self>) -> Result<()> {
        self.start_tick()
    }

    /// Change the tick period (seconds); applies from the next arm.
    pub fn set_update_period(&self, secs: f64) {
        *self.tick_period.lock().unwrap_or_else(PoisonError::into_inner) = secs;
    }

    /// Number of ticks run since construction
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    pub fn is_ticking(&self) -> bool {
        self.tick_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// (Re)start the tick loop; a non-positive period leaves it stopped.
    ///
    /// Each tick runs the upkeep and then re-arms with the period current at
    /// that moment.
    pub fn start_tick(self: &Arc<Self>) -> Result<()> {
        tracing::debug!("{} start_tick", SERVICE_NAME);
        self.cancel_tick();

        let Some(first) = period_from_secs(self.update_period()) else {
            return Ok(());
        };
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Internal(format!("no runtime for tick: {}", e)))?;

        let service = Arc::downgrade(self);
        let task = runtime.spawn(async move {
            let mut period = first;
            loop {
                tokio::time::sleep(period).await;
                let Some(service) = service.upgrade() else {
                    break;
                };
                service.tick();
                match period_from_secs(service.update_period()) {
                    Some(next) => period = next,
                    None => break,
                }
            }
        });
        *self.tick_task.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
        Ok(())
    }

    pub fn cancel_tick(&self) {
        if let Some(task) = self
            .tick_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
    }

    pub fn shutdown(&self) {
        tracing::info!("{} shutdown", SERVICE_NAME);
        self.cancel_tick();
    }

    fn tick(&self) {
        let n = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::trace!("{}({}) tick {}", SERVICE_NAME, self.epoch(), n);
    }

    fn update_period(&self) -> f64 {
        *self.tick_period.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
