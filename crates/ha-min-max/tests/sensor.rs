//! Behavior of min_max sensors as sources change

mod common;

use common::TestHomeAssistant;
use ha_min_max::{MinMaxConfig, SensorType};
use serde_json::json;

const VALUES: [&str; 3] = ["17", "20", "15.3"];
const SOURCES: [&str; 3] = ["sensor.test_1", "sensor.test_2", "sensor.test_3"];

fn config(name: &str, sensor_type: SensorType, round_digits: u32) -> MinMaxConfig {
    MinMaxConfig {
        name: name.to_string(),
        entity_ids: SOURCES.iter().map(|id| id.parse().unwrap()).collect(),
        sensor_type,
        round_digits,
        unique_id: None,
    }
}

fn set_sources(hass: &TestHomeAssistant, values: &[&str]) {
    for (entity_id, value) in SOURCES.iter().zip(values) {
        hass.set_state(entity_id, value);
    }
}

#[tokio::test]
async fn test_all_sensor_types() {
    let hass = TestHomeAssistant::new();
    set_sources(&hass, &VALUES);

    let configs = vec![
        config("Test min", SensorType::Min, 2),
        config("Test max", SensorType::Max, 2),
        config("Test mean", SensorType::Mean, 2),
        config("Test median", SensorType::Median, 2),
        config("Test last", SensorType::Last, 2),
        config("Test range", SensorType::Range, 2),
        config("Test sum", SensorType::Sum, 2),
    ];
    let started = hass.min_max.setup_platform(configs).await;
    assert_eq!(started.len(), 7);

    hass.assert_state("sensor.test_min", "15.3");
    hass.assert_state("sensor.test_max", "20.0");
    hass.assert_state("sensor.test_mean", "17.43");
    hass.assert_state("sensor.test_median", "17.0");
    hass.assert_state("sensor.test_last", "15.3");
    hass.assert_state("sensor.test_range", "4.7");
    hass.assert_state("sensor.test_sum", "52.3");

    let min = hass.get_state("sensor.test_min").unwrap();
    assert_eq!(min.attributes["min_entity_id"], json!("sensor.test_3"));
    assert_eq!(min.attributes["count_sensors"], json!(3));
    assert_eq!(min.attributes["icon"], json!("mdi:calculator"));
    assert_eq!(min.attributes["friendly_name"], json!("Test min"));
    assert_eq!(min.attributes["state_class"], json!("measurement"));

    let max = hass.get_state("sensor.test_max").unwrap();
    assert_eq!(max.attributes["max_entity_id"], json!("sensor.test_2"));
    assert!(max.attributes.get("min_entity_id").is_none());

    let last = hass.get_state("sensor.test_last").unwrap();
    assert_eq!(last.attributes["last_entity_id"], json!("sensor.test_3"));
}

#[tokio::test]
async fn test_source_changes_recompute() {
    let hass = TestHomeAssistant::new();
    set_sources(&hass, &VALUES);
    hass.min_max
        .setup_platform(vec![config("Test max", SensorType::Max, 2)])
        .await;
    hass.assert_state("sensor.test_max", "20.0");

    hass.set_state("sensor.test_1", "42.123");
    hass.assert_state("sensor.test_max", "42.12");

    let state = hass.get_state("sensor.test_max").unwrap();
    assert_eq!(state.attributes["max_entity_id"], json!("sensor.test_1"));

    // Unrelated entities do not matter
    hass.set_state("sensor.unrelated", "1000");
    hass.assert_state("sensor.test_max", "42.12");
}

#[tokio::test]
async fn test_round_digits_zero() {
    let hass = TestHomeAssistant::new();
    set_sources(&hass, &VALUES);
    hass.min_max
        .setup_platform(vec![config("Test mean", SensorType::Mean, 0)])
        .await;

    hass.assert_state("sensor.test_mean", "17.0");
}

#[tokio::test]
async fn test_unavailable_and_unknown_sources() {
    let hass = TestHomeAssistant::new();
    hass.set_state("sensor.test_1", "unavailable");
    hass.set_state("sensor.test_2", "unknown");
    hass.min_max
        .setup_platform(vec![config("Test min", SensorType::Min, 2)])
        .await;

    let state = hass.get_state("sensor.test_min").unwrap();
    assert_eq!(state.state, "unavailable");
    assert_eq!(state.attributes["count_sensors"], json!(0));
    assert!(state.attributes.get("min_entity_id").is_none());

    hass.set_state("sensor.test_3", "9");
    let state = hass.get_state("sensor.test_min").unwrap();
    assert_eq!(state.state, "9.0");
    assert_eq!(state.attributes["count_sensors"], json!(1));

    hass.set_state("sensor.test_3", "not a number");
    hass.assert_state("sensor.test_min", "unavailable");
}

#[tokio::test]
async fn test_unit_of_measurement() {
    let hass = TestHomeAssistant::new();
    hass.set_state_with_unit("sensor.test_1", "17", "°C");
    hass.set_state_with_unit("sensor.test_2", "20", "°C");
    hass.min_max
        .setup_platform(vec![config("Test max", SensorType::Max, 2)])
        .await;

    let state = hass.get_state("sensor.test_max").unwrap();
    assert_eq!(state.state, "20.0");
    assert_eq!(state.attributes["unit_of_measurement"], json!("°C"));

    hass.set_state_with_unit("sensor.test_3", "15", "°F");
    let state = hass.get_state("sensor.test_max").unwrap();
    assert_eq!(state.state, "unavailable");
    assert_eq!(state.attributes["unit_of_measurement"], json!("ERR"));

    // Mismatch clears once the odd source stops reporting a number
    hass.set_state_with_unit("sensor.test_3", "unavailable", "°F");
    let state = hass.get_state("sensor.test_max").unwrap();
    assert_eq!(state.state, "20.0");
    assert_eq!(state.attributes["unit_of_measurement"], json!("°C"));
}

#[tokio::test]
async fn test_yaml_platform_config() {
    let hass = TestHomeAssistant::new();
    hass.set_state("sensor.a", "3");
    hass.set_state("number.b", "5");

    let yaml: serde_yaml::Value = serde_yaml::from_str(
        r#"
- platform: min_max
  name: Upstairs mean
  type: mean
  round_digits: 1
  unique_id: upstairs_mean
  entity_ids: [sensor.a, number.b]
- platform: min_max
  entity_ids: [sensor.a]
"#,
    )
    .unwrap();
    let configs = yaml
        .as_sequence()
        .unwrap()
        .iter()
        .map(|block| MinMaxConfig::from_yaml(block).unwrap())
        .collect();

    let started = hass.min_max.setup_platform(configs).await;
    let started: Vec<String> = started.iter().map(ToString::to_string).collect();
    assert_eq!(started, vec!["sensor.upstairs_mean", "sensor.max_sensor"]);

    hass.assert_state("sensor.upstairs_mean", "4.0");
    hass.assert_state("sensor.max_sensor", "3.0");

    // Only the sensor with a unique id is registered
    let registered = hass.entity_registry.get("sensor.upstairs_mean").unwrap();
    assert_eq!(registered.unique_id, "upstairs_mean");
    assert!(registered.config_entry_id.is_none());
    assert!(hass.entity_registry.get("sensor.max_sensor").is_none());
}

#[tokio::test]
async fn test_name_collision_gets_suffix() {
    let hass = TestHomeAssistant::new();
    hass.set_state("sensor.test_max", "1");
    set_sources(&hass, &VALUES);

    let started = hass
        .min_max
        .setup_platform(vec![config("Test max", SensorType::Max, 2)])
        .await;

    assert_eq!(started[0].to_string(), "sensor.test_max_2");
    hass.assert_state("sensor.test_max", "1");
    hass.assert_state("sensor.test_max_2", "20.0");
}

#[tokio::test]
async fn test_stop_all() {
    let hass = TestHomeAssistant::new();
    set_sources(&hass, &VALUES);
    hass.min_max
        .setup_platform(vec![
            config("Test min", SensorType::Min, 2),
            config("Test max", SensorType::Max, 2),
        ])
        .await;
    assert_eq!(hass.min_max.sensor_count(), 2);

    hass.min_max.stop_all();

    assert_eq!(hass.min_max.sensor_count(), 0);
    assert_eq!(hass.bus.listener_count(), 0);
    assert!(hass.get_state("sensor.test_min").is_none());
}

#[tokio::test]
async fn test_repeated_sources_each_count() {
    let hass = TestHomeAssistant::new();
    hass.set_state("sensor.a", "1");
    hass.set_state("sensor.b", "4");

    let config = MinMaxConfig {
        name: "Repeated".to_string(),
        entity_ids: ["sensor.a", "sensor.a", "sensor.b"]
            .iter()
            .map(|id| id.parse().unwrap())
            .collect(),
        sensor_type: SensorType::Mean,
        round_digits: 2,
        unique_id: None,
    };
    hass.min_max.setup_platform(vec![config]).await;

    let state = hass.get_state("sensor.repeated").unwrap();
    assert_eq!(state.state, "2.0");
    assert_eq!(state.attributes["count_sensors"], json!(3));
}

#[tokio::test]
async fn test_sensors_sourcing_each_other_settle() {
    let hass = TestHomeAssistant::new();

    let sourced = |name: &str, other: &str| MinMaxConfig {
        name: name.to_string(),
        entity_ids: vec!["sensor.a".parse().unwrap(), other.parse().unwrap()],
        sensor_type: SensorType::Max,
        round_digits: 2,
        unique_id: None,
    };
    hass.min_max
        .setup_platform(vec![
            sourced("Upstairs", "sensor.downstairs"),
            sourced("Downstairs", "sensor.upstairs"),
        ])
        .await;

    hass.set_state("sensor.a", "2");
    hass.assert_state("sensor.upstairs", "2.0");
    hass.assert_state("sensor.downstairs", "2.0");

    hass.set_state("sensor.a", "7.5");
    hass.assert_state("sensor.upstairs", "7.5");
    hass.assert_state("sensor.downstairs", "7.5");
}
