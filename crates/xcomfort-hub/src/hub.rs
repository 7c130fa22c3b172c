//! The xComfort Bridge hub
//!
//! Owns the device registry and the update task of one bridge. `setup()`
//! builds the sensors and the fallback engine and starts the task;
//! `unload()` stops it and persists energy totals.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use xcomfort_config::{PowerEnergyOptions, XComfortConfig};
use xcomfort_event_bus::SharedEventBus;
use xcomfort_fallback::{FallbackEngine, HeaterRoomMapping};
use xcomfort_registry::{
    DeviceRegistry, EnergySnapshot, HeaterEntry, RoomEntry, SharedDeviceRegistry, Storage,
};
use xcomfort_sensor::SensorPlatform;
use xcomfort_state_store::SharedStateStore;

use crate::error::HubResult;
use crate::state::HubState;
use crate::update::UpdateTask;

pub struct XComfortHub {
    identifier: String,
    options: PowerEnergyOptions,
    storage: Storage,
    bus: SharedEventBus,
    states: SharedStateStore,
    registry: SharedDeviceRegistry,
    state: HubState,
    /// Heater → room mapping of the current setup
    mapping: HeaterRoomMapping,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    task: Option<JoinHandle<UpdateTask>>,
}

impl XComfortHub {
    pub fn new(
        config: &XComfortConfig,
        config_dir: impl AsRef<Path>,
        bus: SharedEventBus,
        states: SharedStateStore,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            identifier: config.identifier.clone(),
            options: config.power_energy,
            storage: Storage::new(config_dir),
            bus,
            states,
            registry: Arc::new(DeviceRegistry::from_snapshot(&config.devices)),
            state: HubState::NotLoaded,
            mapping: HeaterRoomMapping::default(),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            task: None,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn state(&self) -> HubState {
        self.state
    }

    pub fn registry(&self) -> SharedDeviceRegistry {
        self.registry.clone()
    }

    pub fn options(&self) -> &PowerEnergyOptions {
        &self.options
    }

    /// Replace the options; they take effect on the next setup or reload
    pub fn set_options(&mut self, options: PowerEnergyOptions) {
        self.options = options;
    }

    /// Heater → room mapping computed by the last setup
    pub fn mapping(&self) -> &HeaterRoomMapping {
        &self.mapping
    }

    /// Whether the update task is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Build sensors and the fallback engine, then start the update task
    pub async fn setup(&mut self) -> HubResult<()> {
        self.state = self.state.try_transition(HubState::SetupInProgress)?;
        info!("Setting up xComfort Bridge {}", self.identifier);

        match self.start().await {
            Ok(()) => {
                self.state = self.state.try_transition(HubState::Loaded)?;
                Ok(())
            }
            Err(e) => {
                error!("Setup of xComfort Bridge {} failed: {}", self.identifier, e);
                self.state = self.state.try_transition(HubState::SetupError)?;
                Err(e)
            }
        }
    }

    async fn start(&mut self) -> HubResult<()> {
        let now = Instant::now();
        let energy: EnergySnapshot = self.storage.load_data().await?;

        let platform = SensorPlatform::setup(
            self.states.clone(),
            &self.storage,
            &self.registry,
            &self.options,
            &energy,
            now,
        )
        .await?;

        let heaters: Vec<_> = self.registry.heaters().iter().map(HeaterEntry::info).collect();
        let rooms: Vec<_> = self.registry.rooms().iter().map(RoomEntry::info).collect();
        let mut engine = FallbackEngine::new(
            &heaters,
            &rooms,
            self.options.heater_power_stale_protection,
            now,
        );

        let mut restored = 0;
        for heater in &heaters {
            let total = platform
                .heater_energy_unique_id(&heater.device_id)
                .and_then(|unique_id| energy.get(unique_id));
            if let Some(kwh) = total {
                if engine.restore_energy(&heater.device_id, kwh) {
                    restored += 1;
                }
            }
        }
        if restored > 0 {
            debug!("Restored energy totals of {} heaters", restored);
        }

        self.mapping = engine.mapping().clone();

        let mut task = UpdateTask::new(engine, platform, self.registry.clone(), self.bus.clone());
        task.publish_all(now);

        // Subscribe before spawning: telemetry sent right after setup must reach the task
        let telemetry_rx = self.bus.subscribe_telemetry();
        let shutdown_rx = self.shutdown_tx.subscribe();
        self.running.store(true, Ordering::SeqCst);
        self.task = Some(tokio::spawn(task.run(
            telemetry_rx,
            shutdown_rx,
            self.running.clone(),
        )));

        Ok(())
    }

    /// Stop the update task and persist energy totals
    ///
    /// No sensor is updated by this hub after `unload` returns.
    pub async fn unload(&mut self) -> HubResult<()> {
        self.state = self.state.try_transition(HubState::UnloadInProgress)?;
        info!("Unloading xComfort Bridge {}", self.identifier);

        let result = self.stop().await;
        self.state = self.state.try_transition(HubState::NotLoaded)?;
        result
    }

    async fn stop(&mut self) -> HubResult<()> {
        let Some(handle) = self.task.take() else {
            return Ok(());
        };

        if self.shutdown_tx.send(()).is_err() {
            warn!("Update task already stopped");
        }
        let task = handle.await?;

        let mut snapshot = EnergySnapshot::default();
        task.collect_energy(&mut snapshot);
        snapshot.stamp();
        self.storage.save_data(&snapshot).await?;
        debug!("Saved {} energy totals", snapshot.len());

        Ok(())
    }

    /// Unload and set up again, recomputing the heater → room mapping
    pub async fn reload(&mut self) -> HubResult<()> {
        if self.state != HubState::NotLoaded {
            self.unload().await?;
        }
        self.setup().await
    }
}

impl Drop for XComfortHub {
    fn drop(&mut self) {
        if let Some(handle) = self.task.take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for XComfortHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XComfortHub")
            .field("identifier", &self.identifier)
            .field("state", &self.state)
            .field("running", &self.is_running())
            .finish()
    }
}
