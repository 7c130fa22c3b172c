//! Sensor platform
//!
//! Registers the sensors the options ask for and writes their values into
//! the state store. The platform is owned by the hub's update task; it is
//! never shared, so publishing takes `&mut self`.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::json;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use xcomfort_config::PowerEnergyOptions;
use xcomfort_core::{Context, DeviceId, RoomId, STATE_UNKNOWN};
use xcomfort_fallback::{EnergyAccumulator, HeaterOutput};
use xcomfort_registry::{
    DeviceRegistry, EnergySnapshot, EntityRegistryData, HeaterEntry, Storage, StorageResult,
};
use xcomfort_state_store::SharedStateStore;

use crate::entity::{describe_sensors, disabled_unique_ids, SensorEntity, SensorKind, SensorSource};

const SENSOR_DOMAIN: &str = "sensor";

/// Round to 3 decimals, the precision energy totals are shown with
pub fn round_energy(kwh: f64) -> f64 {
    (kwh * 1000.0).round() / 1000.0
}

fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => v.to_string(),
        _ => STATE_UNKNOWN.to_string(),
    }
}

pub struct SensorPlatform {
    states: SharedStateStore,
    /// Sensors by unique id, in registration order
    sensors: IndexMap<String, SensorEntity>,
    index: HashMap<(SensorSource, SensorKind), String>,
    /// Energy meters of room and light energy sensors; heater energy comes
    /// from the fallback engine
    meters: HashMap<SensorSource, EnergyAccumulator>,
}

impl SensorPlatform {
    /// Register sensors for the current devices and options
    ///
    /// Power/energy sensors registered earlier whose option is now off are
    /// removed. Room and light energy totals start from `energy`.
    pub async fn setup(
        states: SharedStateStore,
        storage: &Storage,
        registry: &DeviceRegistry,
        options: &PowerEnergyOptions,
        energy: &EnergySnapshot,
        now: Instant,
    ) -> StorageResult<Self> {
        let mut entities: EntityRegistryData = storage.load_data().await?;
        let context = Context::new();

        for (label, unique_ids) in disabled_unique_ids(registry, options) {
            let mut removed = 0;
            for unique_id in unique_ids {
                if let Some(entity_id) = entities.remove(&unique_id) {
                    info!(
                        "Removing {} sensor entity due to options change: {}",
                        label, entity_id
                    );
                    states.remove(&entity_id, context.clone());
                    removed += 1;
                }
            }
            if removed > 0 {
                debug!("Removed {} {} entities", removed, label);
            }
        }

        let mut sensors = IndexMap::new();
        let mut index = HashMap::new();
        for description in describe_sensors(registry, options) {
            let entity_id = match entities.get_or_create(
                SENSOR_DOMAIN,
                &description.unique_id,
                &description.name,
            ) {
                Ok(entity_id) => entity_id,
                Err(e) => {
                    warn!("Skipping sensor {}: {}", description.unique_id, e);
                    continue;
                }
            };

            states.link_device(&description.source.device_key(), &entity_id);
            index.insert(
                (description.source.clone(), description.kind),
                description.unique_id.clone(),
            );
            sensors.insert(
                description.unique_id.clone(),
                SensorEntity {
                    entity_id,
                    description,
                },
            );
        }

        storage.save_data(&entities).await?;

        let meters = sensors
            .values()
            .filter(|s| s.kind() == SensorKind::Energy)
            .filter(|s| !matches!(s.source(), SensorSource::Heater(_)))
            .map(|s| {
                let total = energy.get(s.unique_id()).unwrap_or(0.0);
                (s.source().clone(), EnergyAccumulator::with_total(total, now))
            })
            .collect();

        info!("Set up {} sensors", sensors.len());

        Ok(Self {
            states,
            sensors,
            index,
            meters,
        })
    }

    pub fn sensors(&self) -> impl Iterator<Item = &SensorEntity> {
        self.sensors.values()
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    pub fn sensor(&self, source: &SensorSource, kind: SensorKind) -> Option<&SensorEntity> {
        let unique_id = self.index.get(&(source.clone(), kind))?;
        self.sensors.get(unique_id)
    }

    /// Unique id of a heater's energy sensor, if it has one
    pub fn heater_energy_unique_id(&self, device_id: &DeviceId) -> Option<&str> {
        self.sensor(&SensorSource::Heater(device_id.clone()), SensorKind::Energy)
            .map(SensorEntity::unique_id)
    }

    fn write(
        &self,
        source: &SensorSource,
        kind: SensorKind,
        value: Option<f64>,
        extra: &[(&str, serde_json::Value)],
        context: &Context,
    ) {
        let Some(sensor) = self.sensor(source, kind) else {
            return;
        };

        let mut attributes = sensor.attributes();
        for (key, v) in extra {
            attributes.insert(key.to_string(), v.clone());
        }
        self.states.set(
            sensor.entity_id.clone(),
            format_value(value),
            attributes,
            context.child(),
        );
    }

    fn publish_metered(
        &mut self,
        source: SensorSource,
        power: Option<f64>,
        now: Instant,
        context: &Context,
    ) {
        self.write(&source, SensorKind::Power, power, &[], context);

        let total = match self.meters.get_mut(&source) {
            Some(meter) => {
                meter.advance(now, power.unwrap_or(0.0));
                meter.total_kwh()
            }
            None => return,
        };
        let energy = Some(round_energy(total));
        self.write(&source, SensorKind::Energy, energy, &[], context);
    }

    /// Publish a room's power and energy
    pub fn publish_room(
        &mut self,
        room_id: &RoomId,
        power: Option<f64>,
        now: Instant,
        context: &Context,
    ) {
        let source = SensorSource::Room(room_id.clone());
        self.publish_metered(source, power, now, context);
    }

    /// Publish a light's power and energy
    pub fn publish_light(
        &mut self,
        device_id: &DeviceId,
        power: Option<f64>,
        now: Instant,
        context: &Context,
    ) {
        let source = SensorSource::Light(device_id.clone());
        self.publish_metered(source, power, now, context);
    }

    /// Publish a heater's sensors
    ///
    /// Power and energy come from the fallback engine's output, temperature
    /// and heating demand from the registry's cached readings.
    pub fn publish_heater(
        &mut self,
        heater: &HeaterEntry,
        output: Option<&HeaterOutput>,
        context: &Context,
    ) {
        let source = SensorSource::Heater(heater.device_id.clone());

        if let Some(output) = output {
            self.write(
                &source,
                SensorKind::Power,
                output.power_w,
                &[
                    ("stale_power_suppressed", json!(output.suppressed)),
                    ("raw_power", json!(heater.power)),
                ],
                context,
            );
            let energy = Some(round_energy(output.energy_kwh));
            self.write(&source, SensorKind::Energy, energy, &[], context);
        }

        let temperature = heater.temperature;
        self.write(&source, SensorKind::Temperature, temperature, &[], context);
        let demand = heater.heating_demand;
        self.write(&source, SensorKind::HeatingDemand, demand, &[], context);
    }

    /// Bring room and light energy totals up to `now` and republish them
    pub fn tick(&mut self, now: Instant, context: &Context) {
        let sources: Vec<SensorSource> = self.meters.keys().cloned().collect();
        for source in sources {
            let total = match self.meters.get_mut(&source) {
                Some(meter) => {
                    let level = meter.level_w();
                    meter.advance(now, level);
                    meter.total_kwh()
                }
                None => continue,
            };
            let energy = Some(round_energy(total));
            self.write(&source, SensorKind::Energy, energy, &[], context);
        }
    }

    /// Room and light energy totals by sensor unique id
    pub fn collect_energy(&self, snapshot: &mut EnergySnapshot) {
        for (source, meter) in &self.meters {
            if let Some(sensor) = self.sensor(source, SensorKind::Energy) {
                snapshot.set(sensor.unique_id(), meter.total_kwh());
            }
        }
    }
}
