//! Data entry flows
//!
//! A flow is a small wizard driven by a [`FlowHandler`]. The
//! [`ConfigFlowManager`] runs config flows (ending in a new config entry)
//! and the [`OptionsFlowManager`] runs options flows (ending in replaced
//! options on an existing entry). Active flows are kept by flow id until
//! they create an entry or abort.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::entry::{ConfigEntry, ConfigEntrySource};
use crate::manager::{ConfigEntries, ConfigEntriesError};
use crate::schema::{FlowInput, Schema};

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Flow not found: {0}")]
    UnknownFlow(String),

    #[error("Config entry not found: {0}")]
    UnknownEntry(String),

    #[error("No flow handler for {0}")]
    UnknownHandler(String),

    #[error("Unknown step: {0}")]
    UnknownStep(String),

    #[error(transparent)]
    ConfigEntries(#[from] ConfigEntriesError),
}

pub type FlowOutcome<T> = Result<T, FlowError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowResultType {
    Form,
    CreateEntry,
    Abort,
}

/// What a handler step asks the manager to do next
#[derive(Debug, Clone, PartialEq)]
pub enum FlowStep {
    Form {
        step_id: String,
        data_schema: Schema,
        errors: Option<HashMap<String, String>>,
        last_step: Option<bool>,
    },
    CreateEntry {
        title: String,
        data: FlowInput,
        options: FlowInput,
    },
    Abort {
        reason: String,
    },
}

impl FlowStep {
    pub fn form(step_id: impl Into<String>, data_schema: Schema) -> Self {
        FlowStep::Form {
            step_id: step_id.into(),
            data_schema,
            errors: None,
            last_step: None,
        }
    }
}

/// Result of `init`/`configure` as returned to the frontend
#[derive(Debug, Clone, Serialize)]
pub struct FlowResult {
    pub flow_id: String,
    /// Integration domain for config flows, entry id for options flows
    pub handler: String,
    #[serde(rename = "type")]
    pub result_type: FlowResultType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_schema: Option<Schema>,
    /// Always present for forms, null when the submission had no errors
    pub errors: Option<HashMap<String, String>>,
    pub last_step: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<FlowInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<FlowInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Entry id of the created or updated config entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl FlowResult {
    fn from_step(flow_id: &str, handler: &str, step: FlowStep) -> Self {
        let mut result = FlowResult {
            flow_id: flow_id.to_string(),
            handler: handler.to_string(),
            result_type: FlowResultType::Form,
            step_id: None,
            data_schema: None,
            errors: None,
            last_step: None,
            title: None,
            data: None,
            options: None,
            reason: None,
            result: None,
        };
        match step {
            FlowStep::Form {
                step_id,
                data_schema,
                errors,
                last_step,
            } => {
                result.step_id = Some(step_id);
                result.data_schema = Some(data_schema);
                result.errors = errors;
                result.last_step = last_step;
            }
            FlowStep::CreateEntry {
                title,
                data,
                options,
            } => {
                result.result_type = FlowResultType::CreateEntry;
                result.title = Some(title);
                result.data = Some(data);
                result.options = Some(options);
            }
            FlowStep::Abort { reason } => {
                result.result_type = FlowResultType::Abort;
                result.reason = Some(reason);
            }
        }
        result
    }
}

/// One wizard. `step` is called with `None` when a step is first shown
/// and with the submitted values afterwards.
#[async_trait]
pub trait FlowHandler: Send + Sync {
    /// Step run by `init`
    fn init_step(&self) -> &str;

    async fn step(&mut self, step_id: &str, user_input: Option<FlowInput>)
        -> FlowOutcome<FlowStep>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowContext {
    pub source: ConfigEntrySource,
}

struct ActiveFlow {
    handler: String,
    context: FlowContext,
    flow: Box<dyn FlowHandler>,
    current_step: String,
}

/// Flows in progress, keyed by flow id
///
/// A flow is taken out of the table while one of its steps runs, so no
/// lock is held across the handler's await points.
#[derive(Default)]
struct FlowTable {
    flows: RwLock<HashMap<String, ActiveFlow>>,
}

impl FlowTable {
    async fn start(
        &self,
        handler: &str,
        context: FlowContext,
        mut flow: Box<dyn FlowHandler>,
    ) -> FlowOutcome<(String, FlowStep)> {
        let flow_id = Ulid::new().to_string().to_lowercase();
        info!("Starting flow for {} with flow_id {}", handler, flow_id);

        let init_step = flow.init_step().to_string();
        let step = flow.step(&init_step, None).await?;
        if let FlowStep::Form { step_id, .. } = &step {
            let current_step = step_id.clone();
            self.flows.write().await.insert(
                flow_id.clone(),
                ActiveFlow {
                    handler: handler.to_string(),
                    context,
                    flow,
                    current_step,
                },
            );
        }
        Ok((flow_id, step))
    }

    async fn progress(
        &self,
        flow_id: &str,
        user_input: Option<FlowInput>,
    ) -> FlowOutcome<(String, FlowContext, FlowStep)> {
        let mut active = self
            .flows
            .write()
            .await
            .remove(flow_id)
            .ok_or_else(|| FlowError::UnknownFlow(flow_id.to_string()))?;

        debug!(
            "Progressing flow {} for {} at step {}",
            flow_id, active.handler, active.current_step
        );

        let step = match active.flow.step(&active.current_step, user_input).await {
            Ok(step) => step,
            Err(err) => {
                self.flows.write().await.insert(flow_id.to_string(), active);
                return Err(err);
            }
        };

        let handler = active.handler.clone();
        let context = active.context;
        match &step {
            FlowStep::Form { step_id, .. } => {
                active.current_step = step_id.clone();
                self.flows.write().await.insert(flow_id.to_string(), active);
            }
            FlowStep::CreateEntry { .. } | FlowStep::Abort { .. } => {
                info!("Flow {} for {} finished", flow_id, handler);
            }
        }
        Ok((handler, context, step))
    }

    async fn list(&self) -> Vec<serde_json::Value> {
        self.flows
            .read()
            .await
            .iter()
            .map(|(flow_id, flow)| {
                serde_json::json!({
                    "flow_id": flow_id,
                    "handler": flow.handler,
                    "step_id": flow.current_step,
                })
            })
            .collect()
    }
}

/// Runs config flows and turns their result into config entries
pub struct ConfigFlowManager {
    config_entries: Arc<ConfigEntries>,
    flows: FlowTable,
}

impl ConfigFlowManager {
    pub fn new(config_entries: Arc<ConfigEntries>) -> Self {
        Self {
            config_entries,
            flows: FlowTable::default(),
        }
    }

    pub async fn init(&self, domain: &str, context: FlowContext) -> FlowOutcome<FlowResult> {
        let flow = self
            .config_entries
            .integration(domain)
            .and_then(|integration| integration.config_flow())
            .ok_or_else(|| FlowError::UnknownHandler(domain.to_string()))?;

        let (flow_id, step) = self.flows.start(domain, context, flow).await?;
        self.finish(&flow_id, domain, context, step).await
    }

    pub async fn configure(
        &self,
        flow_id: &str,
        user_input: Option<FlowInput>,
    ) -> FlowOutcome<FlowResult> {
        let (domain, context, step) = self.flows.progress(flow_id, user_input).await?;
        self.finish(flow_id, &domain, context, step).await
    }

    pub async fn in_progress(&self) -> Vec<serde_json::Value> {
        self.flows.list().await
    }

    /// Create and set up the entry when the flow is done
    async fn finish(
        &self,
        flow_id: &str,
        domain: &str,
        context: FlowContext,
        step: FlowStep,
    ) -> FlowOutcome<FlowResult> {
        let mut result = FlowResult::from_step(flow_id, domain, step);
        if result.result_type != FlowResultType::CreateEntry {
            return Ok(result);
        }

        let entry = ConfigEntry::new(domain, result.title.clone().unwrap_or_default())
            .with_data(result.data.clone().unwrap_or_default())
            .with_options(result.options.clone().unwrap_or_default())
            .with_source(context.source);
        let entry = self.config_entries.add(entry).await?;

        // A failed setup leaves the entry in SetupError; the flow itself
        // still succeeded
        if let Err(err) = self.config_entries.setup(&entry.entry_id).await {
            warn!("Setup of new entry {} failed: {}", entry.entry_id, err);
        }

        result.result = Some(entry.entry_id);
        Ok(result)
    }
}

/// Runs options flows and writes their result back to the entry
pub struct OptionsFlowManager {
    config_entries: Arc<ConfigEntries>,
    flows: FlowTable,
}

impl OptionsFlowManager {
    pub fn new(config_entries: Arc<ConfigEntries>) -> Self {
        Self {
            config_entries,
            flows: FlowTable::default(),
        }
    }

    pub async fn init(&self, entry_id: &str) -> FlowOutcome<FlowResult> {
        let entry = self
            .config_entries
            .get(entry_id)
            .ok_or_else(|| FlowError::UnknownEntry(entry_id.to_string()))?;
        let flow = self
            .config_entries
            .integration(&entry.domain)
            .and_then(|integration| integration.options_flow(&entry))
            .ok_or_else(|| FlowError::UnknownHandler(entry.domain.clone()))?;

        let (flow_id, step) = self
            .flows
            .start(entry_id, FlowContext::default(), flow)
            .await?;
        self.finish(&flow_id, entry_id, step).await
    }

    pub async fn configure(
        &self,
        flow_id: &str,
        user_input: Option<FlowInput>,
    ) -> FlowOutcome<FlowResult> {
        let (entry_id, _, step) = self.flows.progress(flow_id, user_input).await?;
        self.finish(flow_id, &entry_id, step).await
    }

    pub async fn in_progress(&self) -> Vec<serde_json::Value> {
        self.flows.list().await
    }

    /// Replace the entry's options with the flow's data when it is done
    async fn finish(&self, flow_id: &str, entry_id: &str, step: FlowStep) -> FlowOutcome<FlowResult> {
        let mut result = FlowResult::from_step(flow_id, entry_id, step);
        if result.result_type != FlowResultType::CreateEntry {
            return Ok(result);
        }

        let options = result.data.clone().unwrap_or_default();
        self.config_entries
            .update_options(entry_id, options)
            .await
            .map_err(|err| match err {
                ConfigEntriesError::NotFound(id) => FlowError::UnknownEntry(id),
                other => FlowError::ConfigEntries(other),
            })?;

        result.result = Some(entry_id.to_string());
        Ok(result)
    }
}
