//! Config Entries
//!
//! Config entries are the configured instances of integrations. This crate
//! holds them, persists them in `.storage/core.config_entries`, drives
//! their setup/unload lifecycle, and runs the config and options flows
//! that create and reconfigure them.
//!
//! # Key Types
//!
//! - [`ConfigEntry`] - A single integration configuration
//! - [`ConfigEntries`] - Manager for all config entries
//! - [`Integration`] - What an integration implements to be set up
//! - [`ConfigFlowManager`] / [`OptionsFlowManager`] - Flow engines
//! - [`Schema`] - Form schema with selector-based validation

pub mod entry;
pub mod flow;
pub mod manager;
pub mod schema;
pub mod schema_flow;
pub mod state_machine;

pub use entry::{
    ConfigEntry, ConfigEntryDisabledBy, ConfigEntrySource, ConfigEntryState, ConfigEntryUpdate,
};

pub use flow::{
    ConfigFlowManager, FlowContext, FlowError, FlowHandler, FlowOutcome, FlowResult,
    FlowResultType, FlowStep, OptionsFlowManager,
};

pub use manager::{
    ConfigEntries, ConfigEntriesData, ConfigEntriesError, ConfigEntriesResult, Integration,
    STORAGE_KEY, STORAGE_MINOR_VERSION, STORAGE_VERSION,
};

pub use schema::{FlowInput, NumberMode, Schema, SchemaField, Selector};

pub use schema_flow::{SchemaConfigFlow, SchemaOptionsFlow};

pub use state_machine::InvalidTransition;
