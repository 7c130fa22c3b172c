//! Hub setup / unload / reload with the update task running

mod common;

use std::time::Duration;

use common::{settle, TestBridge};
use xcomfort_core::events::HeaterPowerSuppressedData;
use xcomfort_core::{DeviceId, HeaterInfo, RoomId, Telemetry};
use xcomfort_hub::{HubError, HubState};

#[tokio::test(start_paused = true)]
async fn test_setup_publishes_sensors() {
    let bridge = TestBridge::two_rooms();
    let mut hub = bridge.hub();

    hub.setup().await.unwrap();
    assert_eq!(hub.state(), HubState::Loaded);
    assert!(hub.is_running());

    assert_eq!(
        bridge.states.get_state("sensor.stue_power").as_deref(),
        Some("unknown")
    );
    assert_eq!(bridge.value("sensor.stue_energy"), Some(0.0));
    assert_eq!(bridge.value("sensor.panelovn_stue_energy"), Some(0.0));
    assert_eq!(hub.mapping().matched_count(), 2);

    hub.unload().await.unwrap();
    assert_eq!(hub.state(), HubState::NotLoaded);
}

#[tokio::test(start_paused = true)]
async fn test_stale_heater_power_forced_to_zero() {
    let bridge = TestBridge::two_rooms();
    let mut hub = bridge.hub();
    let mut suppressed = bridge.bus.subscribe_typed::<HeaterPowerSuppressedData>();
    hub.setup().await.unwrap();

    bridge.send(Telemetry::heater_power("11", 950.0));
    bridge.send(Telemetry::room_power("1", 0.0));
    settle(10).await;
    assert_eq!(bridge.value("sensor.panelovn_stue_power"), Some(950.0));

    // No new room sample; the periodic check suppresses
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(bridge.value("sensor.panelovn_stue_power"), Some(0.0));
    assert_eq!(bridge.value("sensor.varmekabel_bad_power"), None);

    let event = suppressed.try_recv().unwrap();
    assert_eq!(event.data.heater, "Panelovn Stue");
    assert!(event.data.low_power_secs >= 20);
    assert!(suppressed.try_recv().is_none());

    hub.unload().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_unload_stops_updates() {
    let bridge = TestBridge::two_rooms();
    let mut hub = bridge.hub();
    hub.setup().await.unwrap();

    bridge.send(Telemetry::heater_power("11", 950.0));
    settle(10).await;
    hub.unload().await.unwrap();
    assert!(!hub.is_running());

    let energy = bridge.value("sensor.panelovn_stue_energy");
    assert_eq!(bridge.send(Telemetry::heater_power("11", 10.0)), 0);
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(bridge.value("sensor.panelovn_stue_power"), Some(950.0));
    assert_eq!(bridge.value("sensor.panelovn_stue_energy"), energy);
}

#[tokio::test(start_paused = true)]
async fn test_unload_applies_telemetry_burst_after_lag() {
    let bridge = TestBridge::two_rooms();
    let mut hub = bridge.hub();
    hub.setup().await.unwrap();

    // More messages than the channel holds; the oldest are dropped
    for i in 0..1100 {
        bridge.send(Telemetry::heater_power("11", i as f64));
    }
    bridge.send(Telemetry::heater_power("11", 4242.0));
    hub.unload().await.unwrap();

    assert_eq!(bridge.value("sensor.panelovn_stue_power"), Some(4242.0));
}

#[tokio::test(start_paused = true)]
async fn test_energy_persists_across_reload() {
    let bridge = TestBridge::two_rooms();
    let mut hub = bridge.hub();
    hub.setup().await.unwrap();

    bridge.send(Telemetry::heater_power("11", 1000.0));
    bridge.send(Telemetry::room_power("1", 1000.0));
    settle(10).await;
    // Last tick before unload is at 3600 s
    tokio::time::sleep(Duration::from_secs(3605)).await;

    hub.reload().await.unwrap();
    assert_eq!(hub.state(), HubState::Loaded);

    let heater = bridge.value("sensor.panelovn_stue_energy").unwrap();
    let room = bridge.value("sensor.stue_energy").unwrap();
    assert!((heater - 1.0).abs() < 0.001, "heater energy {}", heater);
    assert!((room - 1.0).abs() < 0.001, "room energy {}", room);

    // Totals keep growing from the restored value
    tokio::time::sleep(Duration::from_secs(1805)).await;
    let heater = bridge.value("sensor.panelovn_stue_energy").unwrap();
    assert!((heater - 1.5).abs() < 0.001, "heater energy {}", heater);

    hub.unload().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_reload_recomputes_mapping() {
    let bridge = TestBridge::two_rooms();
    let mut hub = bridge.hub();
    hub.setup().await.unwrap();

    let stue = RoomId::from("1");
    let bad = RoomId::from("2");
    let heater = DeviceId::from("11");
    assert_eq!(hub.mapping().room_for(&heater).unwrap().room_id, stue);

    // Heater renamed on the bridge
    hub.registry().add_heater(HeaterInfo::new("11", "Varmekabel Bad"));
    hub.reload().await.unwrap();
    assert_eq!(hub.mapping().room_for(&heater).unwrap().room_id, bad);

    bridge.send(Telemetry::heater_power("11", 800.0));
    bridge.send(Telemetry::room_power("1", 0.0));
    bridge.send(Telemetry::room_power("2", 600.0));
    tokio::time::sleep(Duration::from_secs(45)).await;

    // The renamed heater got new sensors; Stue at 0 W no longer affects it
    assert_eq!(bridge.value("sensor.varmekabel_bad_power_2"), Some(800.0));

    hub.unload().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_invalid_lifecycle_calls() {
    let bridge = TestBridge::two_rooms();
    let mut hub = bridge.hub();

    assert!(matches!(
        hub.unload().await,
        Err(HubError::InvalidTransition(_))
    ));

    hub.setup().await.unwrap();
    assert!(matches!(
        hub.setup().await,
        Err(HubError::InvalidTransition(_))
    ));
    assert!(hub.is_running());

    hub.unload().await.unwrap();
}
