//! The hub's update task
//!
//! One task owns the fallback engine and the sensor platform. Telemetry and
//! the periodic tick are serialized by `select!`, so the engine never sees
//! two updates at once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};
use xcomfort_core::events::{HeaterPowerRestoredData, HeaterPowerSuppressedData};
use xcomfort_core::{valid_watts, Context, DeviceId, Event, Telemetry};
use xcomfort_event_bus::SharedEventBus;
use xcomfort_fallback::{FallbackEngine, StateChange, Transition, FALLBACK_TICK_INTERVAL};
use xcomfort_registry::{EnergySnapshot, SharedDeviceRegistry};
use xcomfort_sensor::SensorPlatform;

pub(crate) struct UpdateTask {
    engine: FallbackEngine,
    platform: SensorPlatform,
    registry: SharedDeviceRegistry,
    bus: SharedEventBus,
}

impl UpdateTask {
    pub(crate) fn new(
        engine: FallbackEngine,
        platform: SensorPlatform,
        registry: SharedDeviceRegistry,
        bus: SharedEventBus,
    ) -> Self {
        Self {
            engine,
            platform,
            registry,
            bus,
        }
    }

    /// Publish every sensor from the registry's cached readings
    pub(crate) fn publish_all(&mut self, now: Instant) {
        let context = Context::new();
        for room in self.registry.rooms() {
            self.platform
                .publish_room(&room.room_id, room.power, now, &context);
        }
        for heater in self.registry.heaters() {
            let output = self.engine.heater_output(&heater.device_id);
            self.platform
                .publish_heater(&heater, output.as_ref(), &context);
        }
        for light in self.registry.lights() {
            self.platform
                .publish_light(&light.device_id, light.power, now, &context);
        }
    }

    /// Run until a shutdown signal arrives, handing the task state back
    pub(crate) async fn run(
        mut self,
        mut telemetry_rx: broadcast::Receiver<Event<Telemetry>>,
        mut shutdown_rx: broadcast::Receiver<()>,
        running: Arc<AtomicBool>,
    ) -> Self {
        let mut ticker = interval(FALLBACK_TICK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => {
                    info!("Received shutdown signal");
                    // Telemetry published before the signal is still applied
                    loop {
                        match telemetry_rx.try_recv() {
                            Ok(event) => {
                                self.handle_telemetry(&event.data, &event.context, Instant::now());
                            }
                            Err(TryRecvError::Lagged(n)) => {
                                warn!("Update task lagged by {} telemetry messages", n);
                            }
                            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
                        }
                    }
                    break;
                }
                result = telemetry_rx.recv() => {
                    match result {
                        Ok(event) => {
                            self.handle_telemetry(&event.data, &event.context, Instant::now());
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Update task lagged by {} telemetry messages", n);
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            info!("Telemetry bus closed, stopping update task");
                            break;
                        }
                    }
                }
                _ = ticker.tick() => self.tick(Instant::now()),
            }
        }

        running.store(false, Ordering::SeqCst);
        info!("Update task stopped");
        self
    }

    /// Apply one telemetry message; sensor states written because of it
    /// carry a child of `context`
    pub(crate) fn handle_telemetry(
        &mut self,
        telemetry: &Telemetry,
        context: &Context,
        now: Instant,
    ) {
        trace!(event_type = telemetry.event_type(), "Handling telemetry");

        match telemetry {
            Telemetry::RoomPower(data) => {
                let Some(watts) = self.registry.update_room_power(&data.room_id, data.power) else {
                    debug!(
                        "Ignoring room power {:?} for room {}",
                        data.power, data.room_id
                    );
                    return;
                };
                self.platform
                    .publish_room(&data.room_id, Some(watts), now, context);
                let changes = self.engine.on_room_power(&data.room_id, watts, now);
                self.apply(changes, context);
            }
            Telemetry::HeaterState(data) => {
                let Some(heater) = self.registry.update_heater(data) else {
                    debug!("Ignoring state of unknown heater {}", data.device_id);
                    return;
                };
                let output = match valid_watts(data.power) {
                    Some(watts) => self.engine.on_heater_power(&heater.device_id, watts, now),
                    None => self.engine.heater_output(&heater.device_id),
                };
                self.platform
                    .publish_heater(&heater, output.as_ref(), context);
            }
            Telemetry::LightState(data) => {
                let Some(light) = self.registry.update_light(data) else {
                    debug!("Ignoring state of unknown light {}", data.device_id);
                    return;
                };
                self.platform
                    .publish_light(&light.device_id, light.power, now, context);
            }
        }
    }

    /// Periodic re-evaluation; also brings every energy total up to `now`
    pub(crate) fn tick(&mut self, now: Instant) {
        let context = Context::new();
        let changes = self.engine.tick(now);
        self.apply(changes, &context);

        self.platform.tick(now, &context);
        let heater_ids: Vec<DeviceId> = self.engine.heater_ids().cloned().collect();
        for device_id in heater_ids {
            self.publish_heater(&device_id, &context);
        }
    }

    fn publish_heater(&mut self, device_id: &DeviceId, context: &Context) {
        if let Some(heater) = self.registry.heater(device_id) {
            let output = self.engine.heater_output(device_id);
            self.platform
                .publish_heater(&heater, output.as_ref(), context);
        }
    }

    fn apply(&mut self, changes: Vec<StateChange>, context: &Context) {
        for change in changes {
            match change.transition {
                Transition::Suppressed { low_power_for } => {
                    self.bus.fire_typed(
                        HeaterPowerSuppressedData {
                            heater: change.heater.clone(),
                            room: change.room.clone(),
                            low_power_secs: low_power_for.as_secs(),
                        },
                        context.child(),
                    );
                }
                Transition::Restored => {
                    self.bus.fire_typed(
                        HeaterPowerRestoredData {
                            heater: change.heater.clone(),
                            room: change.room.clone(),
                        },
                        context.child(),
                    );
                }
                Transition::Pending | Transition::Cleared => continue,
            }
            self.publish_heater(&change.device_id, context);
        }
    }

    /// Energy totals of every sensor that has one, by unique id
    pub(crate) fn collect_energy(&self, snapshot: &mut EnergySnapshot) {
        self.platform.collect_energy(snapshot);
        for device_id in self.engine.heater_ids() {
            let Some(unique_id) = self.platform.heater_energy_unique_id(device_id) else {
                continue;
            };
            if let Some(output) = self.engine.heater_output(device_id) {
                snapshot.set(unique_id, output.energy_kwh);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;
    use xcomfort_config::PowerEnergyOptions;
    use xcomfort_core::{DevicesSnapshot, HeaterInfo, HeaterStateData, RoomInfo};
    use xcomfort_event_bus::EventBus;
    use xcomfort_registry::{DeviceRegistry, HeaterEntry, RoomEntry, Storage};
    use xcomfort_state_store::{SharedStateStore, StateStore};

    struct Fixture {
        _dir: TempDir,
        bus: SharedEventBus,
        states: SharedStateStore,
        task: UpdateTask,
    }

    impl Fixture {
        fn send(&mut self, telemetry: Telemetry, at: Instant) {
            self.task.handle_telemetry(&telemetry, &Context::new(), at);
        }
    }

    async fn fixture(stale_protection: bool, t0: Instant) -> Fixture {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path());
        let bus = Arc::new(EventBus::new());
        let states = Arc::new(StateStore::new(bus.clone()));
        let registry = Arc::new(DeviceRegistry::from_snapshot(&DevicesSnapshot {
            rooms: vec![RoomInfo::new("1", "Stue"), RoomInfo::new("2", "Bad")],
            heaters: vec![
                HeaterInfo::new("11", "Panelovn Stue"),
                HeaterInfo::new("12", "Varmekabel Bad"),
            ],
            lights: vec![],
        }));
        let options = PowerEnergyOptions {
            add_room_power_sensors: true,
            add_heater_power_sensors: true,
            add_light_power_sensors: false,
            heater_power_stale_protection: stale_protection,
        };

        let platform = SensorPlatform::setup(
            states.clone(),
            &storage,
            &registry,
            &options,
            &EnergySnapshot::default(),
            t0,
        )
        .await
        .unwrap();
        let heaters: Vec<_> = registry.heaters().iter().map(HeaterEntry::info).collect();
        let rooms: Vec<_> = registry.rooms().iter().map(RoomEntry::info).collect();
        let engine = FallbackEngine::new(&heaters, &rooms, stale_protection, t0);

        let mut task = UpdateTask::new(engine, platform, registry, bus.clone());
        task.publish_all(t0);

        Fixture {
            _dir: dir,
            bus,
            states,
            task,
        }
    }

    #[tokio::test]
    async fn test_room_power_suppresses_heater() {
        let t0 = Instant::now();
        let mut f = fixture(true, t0).await;
        let mut suppressed = f.bus.subscribe_typed::<HeaterPowerSuppressedData>();

        f.send(Telemetry::heater_power("11", 900.0), t0);
        f.send(Telemetry::room_power("1", 0.3), t0);
        assert_eq!(f.states.get_f64("sensor.panelovn_stue_power"), Some(900.0));
        assert!(suppressed.try_recv().is_none());

        f.send(Telemetry::room_power("1", 0.0), t0 + Duration::from_secs(20));
        assert_eq!(f.states.get_f64("sensor.panelovn_stue_power"), Some(0.0));
        assert_eq!(f.states.get_f64("sensor.stue_power"), Some(0.0));

        let event = suppressed.try_recv().unwrap();
        assert_eq!(
            event.data,
            HeaterPowerSuppressedData {
                heater: "Panelovn Stue".to_string(),
                room: "Stue".to_string(),
                low_power_secs: 20,
            }
        );

        let power = f.states.get("sensor.panelovn_stue_power").unwrap();
        assert_eq!(power.attribute::<bool>("stale_power_suppressed"), Some(true));
        assert_eq!(power.attribute::<f64>("raw_power"), Some(900.0));

        // Stale readings keep being reported as 0
        f.send(Telemetry::heater_power("11", 900.0), t0 + Duration::from_secs(30));
        assert_eq!(f.states.get_f64("sensor.panelovn_stue_power"), Some(0.0));
        assert!(suppressed.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_restore_fires_event() {
        let t0 = Instant::now();
        let mut f = fixture(true, t0).await;
        let mut restored = f.bus.subscribe_typed::<HeaterPowerRestoredData>();

        f.send(Telemetry::heater_power("12", 400.0), t0);
        f.send(Telemetry::room_power("2", 0.0), t0);
        f.task.tick(t0 + Duration::from_secs(20));
        assert_eq!(f.states.get_f64("sensor.varmekabel_bad_power"), Some(0.0));

        f.send(Telemetry::room_power("2", 410.0), t0 + Duration::from_secs(25));
        assert_eq!(f.states.get_f64("sensor.varmekabel_bad_power"), Some(400.0));
        assert_eq!(restored.try_recv().unwrap().data.room, "Bad");
    }

    #[tokio::test]
    async fn test_disabled_passes_through() {
        let t0 = Instant::now();
        let mut f = fixture(false, t0).await;

        f.send(Telemetry::heater_power("11", 1000.0), t0);
        f.send(Telemetry::room_power("1", 0.0), t0);
        for step in 1..=3 {
            f.task.tick(t0 + Duration::from_secs(20 * step));
        }

        assert_eq!(f.states.get_f64("sensor.panelovn_stue_power"), Some(1000.0));
        // 1000 W for 60 s
        assert_eq!(f.states.get_f64("sensor.panelovn_stue_energy"), Some(0.017));
    }

    #[tokio::test]
    async fn test_malformed_and_unknown_telemetry_ignored() {
        let t0 = Instant::now();
        let mut f = fixture(true, t0).await;

        f.send(Telemetry::heater_power("11", 500.0), t0);
        f.send(Telemetry::heater_power("11", -3.0), t0);
        f.send(Telemetry::room_power("1", f64::NAN), t0);
        f.send(Telemetry::room_power("99", 0.0), t0);
        let unknown = HeaterStateData {
            device_id: "77".into(),
            power: Some(100.0),
            temperature: None,
            heating_demand: None,
        };
        f.send(Telemetry::HeaterState(unknown), t0);

        assert_eq!(f.states.get_f64("sensor.panelovn_stue_power"), Some(500.0));
        assert_eq!(f.states.get_state("sensor.stue_power").as_deref(), Some("unknown"));
    }

    #[tokio::test]
    async fn test_collect_energy() {
        let t0 = Instant::now();
        let mut f = fixture(true, t0).await;

        f.send(Telemetry::heater_power("11", 1000.0), t0);
        f.send(Telemetry::room_power("1", 1000.0), t0);
        f.task.tick(t0 + Duration::from_secs(3600));

        let mut snapshot = EnergySnapshot::default();
        f.task.collect_energy(&mut snapshot);
        assert!((snapshot.get("energy_Panelovn Stue_11").unwrap() - 1.0).abs() < 1e-9);
        assert!((snapshot.get("energy_kwh_1").unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(snapshot.get("energy_kwh_2"), Some(0.0));
        assert_eq!(snapshot.len(), 4);
    }
}
