//! Background expiry of stale position history.
//!
//! The sweeper wakes up once per interval and drops every entry older than the
//! store's ttl. An entry can therefore outlive its ttl by up to one interval.

use std::{sync::Arc, time::Duration};

use tokio::{sync::broadcast, task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, info};

use crate::memory::InMemoryStore;

pub struct Sweeper {
    store: Arc<InMemoryStore>,
    interval: Duration,
    shutdown_rx: broadcast::Receiver<()>,
    tick_count: u64,
}

impl Sweeper {
    pub fn new(
        store: Arc<InMemoryStore>,
        interval: Duration,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        Sweeper {
            store,
            interval,
            shutdown_rx,
            tick_count: 0,
        }
    }

    /// Spawns the sweep loop. It runs until a value is sent on, or every
    /// sender of, the shutdown channel is dropped.
    pub fn spawn(
        store: Arc<InMemoryStore>,
        interval: Duration,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let sweeper = Self::new(store, interval, shutdown_rx);
        tokio::spawn(async move {
            sweeper.run().await;
        })
    }

    pub async fn run(mut self) {
        info!(
            interval_secs = self.interval.as_secs(),
            ttl_secs = self.store.ttl(),
            "Expiry sweeper started"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!(ticks = self.tick_count, "Expiry sweeper shutting down");
                    break;
                }
                _ = interval.tick() => {
                    self.tick();
                }
            }
        }
    }

    /// Runs a single sweep and returns the number of expired entries.
    pub fn tick(&mut self) -> usize {
        self.tick_count += 1;
        let removed = self.store.expire();
        if removed > 0 {
            debug!(
                removed,
                orders = self.store.len(),
                tick = self.tick_count,
                "Expired location entries"
            );
        }
        removed
    }
}
