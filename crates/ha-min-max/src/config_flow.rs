//! Config and options flow for min_max helpers

use ha_config_entries::{
    ConfigEntry, FlowHandler, NumberMode, Schema, SchemaConfigFlow, SchemaField,
    SchemaOptionsFlow, Selector,
};
use serde_json::json;

use crate::calc::SensorType;
use crate::constants::{
    CONF_ENTITY_IDS, CONF_NAME, CONF_ROUND_DIGITS, CONF_TYPE, DEFAULT_ROUND_DIGITS,
    MAX_ROUND_DIGITS, SOURCE_DOMAINS,
};

/// Fields shown when reconfiguring: everything except the name
pub fn options_schema() -> Schema {
    let types: Vec<&str> = SensorType::ALL.iter().map(SensorType::as_str).collect();

    Schema::new(vec![
        SchemaField::required(CONF_ENTITY_IDS, Selector::entity(&SOURCE_DOMAINS, true)),
        SchemaField::required(CONF_TYPE, Selector::select(&types)),
        SchemaField::optional(
            CONF_ROUND_DIGITS,
            Selector::Number {
                min: 0.0,
                max: MAX_ROUND_DIGITS as f64,
                step: 1.0,
                mode: NumberMode::Box,
            },
        )
        .with_default(json!(DEFAULT_ROUND_DIGITS)),
    ])
}

/// Fields shown when creating a helper
pub fn config_schema() -> Schema {
    let mut schema = options_schema();
    schema
        .fields
        .insert(0, SchemaField::required(CONF_NAME, Selector::Text));
    schema
}

pub fn config_flow() -> Box<dyn FlowHandler> {
    Box::new(SchemaConfigFlow::new(config_schema(), |options| {
        options
            .get(CONF_NAME)
            .and_then(|name| name.as_str())
            .unwrap_or_default()
            .to_string()
    }))
}

pub fn options_flow(entry: &ConfigEntry) -> Box<dyn FlowHandler> {
    Box::new(SchemaOptionsFlow::new(
        options_schema(),
        entry.options.clone(),
    ))
}
