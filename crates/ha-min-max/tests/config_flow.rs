//! Config and options flow tests for the min_max helper
//!
//! Ported from the Python suite (tests/components/min_max/test_config_flow.py).

mod common;

use common::{input, TestHomeAssistant};
use ha_config_entries::{FlowContext, FlowResultType};
use ha_min_max::DOMAIN;
use serde_json::json;

#[tokio::test]
async fn test_config_flow() {
    let hass = TestHomeAssistant::new();
    hass.set_state("sensor.input_one", "10");
    hass.set_state("sensor.input_two", "20");

    let input_sensors = json!(["sensor.input_one", "sensor.input_two"]);

    let result = hass.flow.init(DOMAIN, FlowContext::default()).await.unwrap();
    assert_eq!(result.result_type, FlowResultType::Form);
    assert_eq!(result.step_id.as_deref(), Some("user"));
    assert!(result.errors.is_none());

    let result = hass
        .flow
        .configure(
            &result.flow_id,
            Some(input(json!({
                "name": "My min_max",
                "entity_ids": input_sensors,
                "type": "max",
            }))),
        )
        .await
        .unwrap();

    let expected_options = input(json!({
        "entity_ids": input_sensors,
        "name": "My min_max",
        "round_digits": 2.0,
        "type": "max",
    }));

    assert_eq!(result.result_type, FlowResultType::CreateEntry);
    assert_eq!(result.title.as_deref(), Some("My min_max"));
    assert_eq!(result.data, Some(Default::default()));
    assert_eq!(result.options.as_ref(), Some(&expected_options));
    assert_eq!(hass.setup_calls(), 1);

    let entries = hass.config_entries.get_by_domain(DOMAIN);
    assert_eq!(entries.len(), 1);
    let config_entry = &entries[0];
    assert_eq!(result.result.as_deref(), Some(config_entry.entry_id.as_str()));
    assert!(config_entry.data.is_empty());
    assert_eq!(config_entry.options, expected_options);
    assert_eq!(config_entry.title, "My min_max");
    assert!(config_entry.is_loaded());

    // Registered under the entry
    let registered = hass.entity_registry.get("sensor.my_min_max").unwrap();
    assert_eq!(registered.platform, DOMAIN);
    assert_eq!(
        registered.config_entry_id.as_deref(),
        Some(config_entry.entry_id.as_str())
    );

    let state = hass.get_state("sensor.my_min_max").unwrap();
    assert_eq!(state.state, "20.0");
    assert_eq!(state.attributes["count_sensors"], json!(2));
}

#[tokio::test]
async fn test_options() {
    let hass = TestHomeAssistant::new();
    hass.set_state("sensor.input_one", "10");
    hass.set_state("sensor.input_two", "20");
    hass.set_state("sensor.input_three", "33.33");

    let input_sensors1 = json!(["sensor.input_one", "sensor.input_two"]);
    let input_sensors2 = json!(["sensor.input_one", "sensor.input_two", "sensor.input_three"]);

    let result = hass.flow.init(DOMAIN, FlowContext::default()).await.unwrap();
    assert_eq!(result.result_type, FlowResultType::Form);
    assert!(result.errors.is_none());

    hass.flow
        .configure(
            &result.flow_id,
            Some(input(json!({
                "entity_ids": input_sensors1,
                "name": "My min_max",
                "round_digits": 0,
                "type": "min",
            }))),
        )
        .await
        .unwrap();

    let state = hass.get_state("sensor.my_min_max").unwrap();
    assert_eq!(state.state, "10.0");
    assert_eq!(state.attributes["count_sensors"], json!(2));

    let config_entry = hass.config_entries.get_by_domain(DOMAIN).remove(0);
    assert!(config_entry.data.is_empty());
    assert_eq!(
        config_entry.options,
        input(json!({
            "entity_ids": input_sensors1,
            "name": "My min_max",
            "round_digits": 0.0,
            "type": "min",
        }))
    );

    let result = hass.options.init(&config_entry.entry_id).await.unwrap();
    assert_eq!(result.result_type, FlowResultType::Form);
    assert_eq!(result.step_id.as_deref(), Some("options"));
    let schema = result.data_schema.unwrap();
    assert_eq!(schema.suggested_value("entity_ids"), Some(&input_sensors1));
    assert_eq!(schema.suggested_value("round_digits"), Some(&json!(0.0)));
    assert_eq!(schema.suggested_value("type"), Some(&json!("min")));
    assert!(schema.field("name").is_none());

    let result = hass
        .options
        .configure(
            &result.flow_id,
            Some(input(json!({
                "entity_ids": input_sensors2,
                "round_digits": 1,
                "type": "mean",
            }))),
        )
        .await
        .unwrap();

    let expected_options = input(json!({
        "entity_ids": input_sensors2,
        "name": "My min_max",
        "round_digits": 1.0,
        "type": "mean",
    }));
    assert_eq!(result.result_type, FlowResultType::CreateEntry);
    assert_eq!(result.data.as_ref(), Some(&expected_options));

    let config_entry = hass.config_entries.get(&config_entry.entry_id).unwrap();
    assert!(config_entry.data.is_empty());
    assert_eq!(config_entry.options, expected_options);
    assert_eq!(config_entry.title, "My min_max");

    // Reloaded in place: no second entity
    assert_eq!(hass.states.all().len(), 4);
    assert_eq!(hass.entity_registry.len(), 1);
    assert_eq!(hass.setup_calls(), 2);

    let state = hass.get_state("sensor.my_min_max").unwrap();
    assert_eq!(state.state, "21.1");
    assert_eq!(state.attributes["count_sensors"], json!(3));
}

#[tokio::test]
async fn test_invalid_input_reshows_form() {
    let hass = TestHomeAssistant::new();

    let result = hass.flow.init(DOMAIN, FlowContext::default()).await.unwrap();
    let result = hass
        .flow
        .configure(
            &result.flow_id,
            Some(input(json!({
                "name": "Broken",
                "entity_ids": ["sensor.a"],
                "type": "average",
                "round_digits": 9,
            }))),
        )
        .await
        .unwrap();

    assert_eq!(result.result_type, FlowResultType::Form);
    assert_eq!(result.step_id.as_deref(), Some("user"));
    let errors = result.errors.unwrap();
    assert!(errors.contains_key("type"));
    assert!(errors.contains_key("round_digits"));
    assert_eq!(
        result.data_schema.unwrap().suggested_value("name"),
        Some(&json!("Broken"))
    );
    assert!(hass.config_entries.is_empty());
    assert_eq!(hass.flow.in_progress().await.len(), 1);
}

#[tokio::test]
async fn test_remove_entry_removes_sensor() {
    let hass = TestHomeAssistant::new();
    hass.set_state("sensor.input_one", "10");

    let result = hass.flow.init(DOMAIN, FlowContext::default()).await.unwrap();
    let result = hass
        .flow
        .configure(
            &result.flow_id,
            Some(input(json!({
                "name": "Solo",
                "entity_ids": ["sensor.input_one"],
                "type": "sum",
            }))),
        )
        .await
        .unwrap();
    let entry_id = result.result.unwrap();
    hass.assert_state("sensor.solo", "10.0");
    assert!(hass.min_max.sensor(&entry_id).is_some());

    hass.config_entries.remove(&entry_id).await.unwrap();

    assert!(hass.get_state("sensor.solo").is_none());
    assert!(hass.entity_registry.get("sensor.solo").is_none());
    assert_eq!(hass.min_max.sensor_count(), 0);
    assert_eq!(hass.bus.listener_count(), 0);
}

#[tokio::test]
async fn test_registry_save_failure_keeps_entry_removable() {
    let hass = TestHomeAssistant::new();
    hass.set_state("sensor.input_one", "5");

    // A non-empty directory where the registry file goes makes saves fail
    let blocker = hass.config_dir().join(".storage/core.entity_registry");
    std::fs::create_dir_all(blocker.join("occupied")).unwrap();

    let result = hass.flow.init(DOMAIN, FlowContext::default()).await.unwrap();
    let result = hass
        .flow
        .configure(
            &result.flow_id,
            Some(input(json!({
                "name": "Solo",
                "entity_ids": ["sensor.input_one"],
                "type": "max",
            }))),
        )
        .await
        .unwrap();
    let entry_id = result.result.unwrap();

    assert!(hass.config_entries.get(&entry_id).unwrap().is_loaded());
    hass.assert_state("sensor.solo", "5.0");

    std::fs::remove_dir_all(&blocker).unwrap();
    hass.config_entries.remove(&entry_id).await.unwrap();

    assert!(hass.get_state("sensor.solo").is_none());
    assert_eq!(hass.min_max.sensor_count(), 0);
    assert_eq!(hass.bus.listener_count(), 0);
}
