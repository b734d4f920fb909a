//! Keys and defaults shared by the flows, the YAML platform and the sensor

pub const DOMAIN: &str = "min_max";

pub const CONF_ENTITY_IDS: &str = "entity_ids";
pub const CONF_NAME: &str = "name";
pub const CONF_ROUND_DIGITS: &str = "round_digits";
pub const CONF_TYPE: &str = "type";
pub const CONF_UNIQUE_ID: &str = "unique_id";

pub const ATTR_COUNT_SENSORS: &str = "count_sensors";
pub const ATTR_MIN_ENTITY_ID: &str = "min_entity_id";
pub const ATTR_MAX_ENTITY_ID: &str = "max_entity_id";
pub const ATTR_LAST_ENTITY_ID: &str = "last_entity_id";

pub const DEFAULT_ROUND_DIGITS: u32 = 2;
pub const MAX_ROUND_DIGITS: u32 = 6;

pub const ICON: &str = "mdi:calculator";

/// Unit published when the sources disagree on theirs
pub const UNIT_ERROR: &str = "ERR";

/// Domains whose entities can be aggregated
pub const SOURCE_DOMAINS: [&str; 3] = ["sensor", "number", "input_number"];
