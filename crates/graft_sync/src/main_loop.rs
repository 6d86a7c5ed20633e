//! The authoritative main loop.
//!
//! Each tick:
//!
//! 1. Apply queued sync payloads, in arrival order.
//! 2. Tick every hosted container on this loop's side.
//! 3. Advance the tick counter.

use std::time::{Duration, Instant};

use graft_component::{ComponentContainer, TickSide};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::dispatcher::{ApplyReport, ContainerHost, SyncApplier};
use crate::error::SyncError;

/// Configuration for the main loop.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Target ticks per second.
    pub tick_rate: f64,
    /// Maximum number of ticks to run (0 = unlimited).
    pub max_ticks: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            max_ticks: 0,
        }
    }
}

impl TickConfig {
    fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate)
    }
}

/// The main loop state.
#[derive(Debug)]
pub struct MainLoop {
    /// Current tick counter.
    tick_id: u64,
    config: TickConfig,
    side: TickSide,
    applier: SyncApplier,
}

impl MainLoop {
    /// Create a main loop that ticks components on `side`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidTickRate`] unless `config.tick_rate` is
    /// finite and positive.
    pub fn new(config: TickConfig, side: TickSide, applier: SyncApplier) -> Result<Self, SyncError> {
        if !(config.tick_rate.is_finite() && config.tick_rate > 0.0) {
            return Err(SyncError::InvalidTickRate(config.tick_rate));
        }
        Ok(Self {
            tick_id: 0,
            config,
            side,
            applier,
        })
    }

    /// Returns the current tick counter.
    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    #[must_use]
    pub fn config(&self) -> &TickConfig {
        &self.config
    }

    #[must_use]
    pub fn side(&self) -> TickSide {
        self.side
    }

    /// Run one tick against `host`.
    pub fn tick(&mut self, host: &mut dyn ContainerHost) -> ApplyReport {
        self.tick_id += 1;
        let report = self.applier.drain(host);

        let side = self.side;
        let mut containers = 0usize;
        host.for_each_container(&mut |container: &mut dyn ComponentContainer| {
            container.tick_components(side);
            containers += 1;
        });

        debug!(
            tick_id = self.tick_id,
            applied = report.applied,
            containers,
            "tick"
        );
        report
    }

    /// Run the loop for the configured number of ticks, or indefinitely.
    ///
    /// Blocks the calling thread between ticks.
    pub fn run(&mut self, host: &mut dyn ContainerHost) {
        let tick_duration = self.config.tick_duration();
        let mut tick_count = 0u64;

        info!(
            tick_rate = self.config.tick_rate,
            max_ticks = self.config.max_ticks,
            "starting main loop"
        );

        loop {
            let start = Instant::now();
            self.tick(host);

            tick_count += 1;
            if self.config.max_ticks > 0 && tick_count >= self.config.max_ticks {
                info!(ticks = tick_count, "main loop complete");
                break;
            }

            let elapsed = start.elapsed();
            if elapsed < tick_duration {
                std::thread::sleep(tick_duration - elapsed);
            } else {
                self.warn_overrun(elapsed, tick_duration);
            }
        }
    }

    /// Async variant of [`MainLoop::run`] paced by a tokio interval.
    ///
    /// Lets transport listeners on the same runtime make progress between
    /// ticks.
    pub async fn run_async(&mut self, host: &mut dyn ContainerHost) {
        let tick_duration = self.config.tick_duration();
        let mut interval = time::interval(tick_duration);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tick_count = 0u64;

        info!(
            tick_rate = self.config.tick_rate,
            max_ticks = self.config.max_ticks,
            "starting main loop"
        );

        loop {
            interval.tick().await;
            let start = Instant::now();
            self.tick(host);

            tick_count += 1;
            if self.config.max_ticks > 0 && tick_count >= self.config.max_ticks {
                info!(ticks = tick_count, "main loop complete");
                break;
            }

            let elapsed = start.elapsed();
            if elapsed > tick_duration {
                self.warn_overrun(elapsed, tick_duration);
            }
        }
    }

    fn warn_overrun(&self, elapsed: Duration, budget: Duration) {
        warn!(
            tick_id = self.tick_id,
            elapsed_ms = elapsed.as_millis() as u64,
            budget_ms = budget.as_millis() as u64,
            "tick exceeded time budget"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use graft_component::{
        AutoSynced, Component, ComponentKey, ComponentRegistry, ContainerExt, OwnerRef, PeerId,
        SparseContainer, Ticking, capabilities, impl_serde_tag,
    };
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::dispatcher::{SyncDispatcher, channel};
    use crate::messages::ComponentSyncPayload;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Mana {
        amount: u32,
    }
    impl_serde_tag!(Mana);
    impl AutoSynced for Mana {}
    impl Ticking for Mana {
        fn server_tick(&mut self) {
            self.amount += 1;
        }
        fn client_tick(&mut self) {
            self.amount += 100;
        }
    }
    impl Component for Mana {
        capabilities!(serializable, synced, ticking);
    }

    fn setup(side: TickSide, max_ticks: u64) -> (ComponentKey<Mana>, SyncDispatcher, MainLoop) {
        let mut registry = ComponentRegistry::new();
        let mana = registry.register::<Mana>("mana").unwrap();
        let (dispatcher, applier) = channel(Arc::new(registry));
        let config = TickConfig {
            tick_rate: 1000.0, // fast for testing
            max_ticks,
        };
        (mana, dispatcher, MainLoop::new(config, side, applier).unwrap())
    }

    fn host(mana: &ComponentKey<Mana>) -> (OwnerRef, HashMap<OwnerRef, SparseContainer>) {
        let owner = OwnerRef::new();
        let mut container = SparseContainer::new();
        container.put(mana, Mana::default()).unwrap();
        (owner, HashMap::from([(owner, container)]))
    }

    #[test]
    fn test_rejects_unusable_tick_rates() {
        for tick_rate in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let (_, applier) = channel(Arc::new(ComponentRegistry::new()));
            let config = TickConfig { tick_rate, max_ticks: 1 };
            assert!(matches!(
                MainLoop::new(config, TickSide::Server, applier),
                Err(SyncError::InvalidTickRate(_))
            ));
        }
    }

    #[test]
    fn test_tick_advances_counter_and_ticks_side() {
        let (mana, _dispatcher, mut main_loop) = setup(TickSide::Server, 0);
        let (owner, mut host) = host(&mana);

        assert_eq!(main_loop.tick_id(), 0);
        main_loop.tick(&mut host);
        main_loop.tick(&mut host);
        assert_eq!(main_loop.tick_id(), 2);
        assert_eq!(host[&owner].get(&mana), Some(&Mana { amount: 2 }));
    }

    #[test]
    fn test_sync_applied_before_components_tick() {
        let (mana, dispatcher, mut main_loop) = setup(TickSide::Client, 0);
        let (owner, mut host) = host(&mana);

        let data = Mana { amount: 5 }.write_sync_packet(PeerId::new()).unwrap();
        dispatcher
            .receive(ComponentSyncPayload {
                target: owner,
                key_id: "mana".to_string(),
                data,
            })
            .unwrap();

        let report = main_loop.tick(&mut host);
        assert_eq!(report.applied, 1);
        assert_eq!(host[&owner].get(&mana), Some(&Mana { amount: 105 }));
    }

    #[test]
    fn test_run_limited_ticks() {
        let (mana, _dispatcher, mut main_loop) = setup(TickSide::Server, 5);
        let (owner, mut host) = host(&mana);
        main_loop.run(&mut host);
        assert_eq!(main_loop.tick_id(), 5);
        assert_eq!(host[&owner].get(&mana), Some(&Mana { amount: 5 }));
    }

    #[tokio::test]
    async fn test_run_async_limited_ticks() {
        let (mana, _dispatcher, mut main_loop) = setup(TickSide::Server, 3);
        let (_owner, mut host) = host(&mana);
        main_loop.run_async(&mut host).await;
        assert_eq!(main_loop.tick_id(), 3);
    }

    #[test]
    fn test_default_config() {
        let config = TickConfig::default();
        assert_eq!(config.max_ticks, 0);
        assert!((config.tick_rate - 60.0).abs() < f64::EPSILON);
    }
}
