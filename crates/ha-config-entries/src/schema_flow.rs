//! One-step flows driven entirely by a [`Schema`]
//!
//! Helpers that only need "fill in a form, store it as options" use these
//! instead of writing a handler by hand.

use async_trait::async_trait;

use crate::flow::{FlowError, FlowHandler, FlowOutcome, FlowStep};
use crate::schema::{FlowInput, Schema};

pub const STEP_USER: &str = "user";
pub const STEP_INIT: &str = "init";
pub const STEP_OPTIONS: &str = "options";

type TitleFn = Box<dyn Fn(&FlowInput) -> String + Send + Sync>;

/// Config flow with a single `user` step
///
/// Valid input becomes the entry's options; the entry's data stays empty.
pub struct SchemaConfigFlow {
    schema: Schema,
    title: TitleFn,
}

impl SchemaConfigFlow {
    pub fn new<F>(schema: Schema, title: F) -> Self
    where
        F: Fn(&FlowInput) -> String + Send + Sync + 'static,
    {
        Self {
            schema,
            title: Box::new(title),
        }
    }
}

#[async_trait]
impl FlowHandler for SchemaConfigFlow {
    fn init_step(&self) -> &str {
        STEP_USER
    }

    async fn step(
        &mut self,
        step_id: &str,
        user_input: Option<FlowInput>,
    ) -> FlowOutcome<FlowStep> {
        if step_id != STEP_USER {
            return Err(FlowError::UnknownStep(step_id.to_string()));
        }

        let Some(input) = user_input else {
            return Ok(FlowStep::form(STEP_USER, self.schema.clone()));
        };

        match self.schema.validate(&input) {
            Ok(options) => Ok(FlowStep::CreateEntry {
                title: (self.title)(&options),
                data: FlowInput::new(),
                options,
            }),
            Err(errors) => Ok(FlowStep::Form {
                step_id: STEP_USER.to_string(),
                data_schema: self.schema.with_suggested_values(&input),
                errors: Some(errors),
                last_step: None,
            }),
        }
    }
}

/// Options flow showing a single `options` form
///
/// The form is pre-filled from the entry's current options. The result is
/// the current options overlaid with the validated input, so keys outside
/// the options schema survive.
pub struct SchemaOptionsFlow {
    schema: Schema,
    current: FlowInput,
}

impl SchemaOptionsFlow {
    pub fn new(schema: Schema, current: FlowInput) -> Self {
        Self { schema, current }
    }
}

#[async_trait]
impl FlowHandler for SchemaOptionsFlow {
    fn init_step(&self) -> &str {
        STEP_INIT
    }

    async fn step(
        &mut self,
        step_id: &str,
        user_input: Option<FlowInput>,
    ) -> FlowOutcome<FlowStep> {
        if step_id != STEP_INIT && step_id != STEP_OPTIONS {
            return Err(FlowError::UnknownStep(step_id.to_string()));
        }

        let Some(input) = user_input else {
            return Ok(FlowStep::form(
                STEP_OPTIONS,
                self.schema.with_suggested_values(&self.current),
            ));
        };

        match self.schema.validate(&input) {
            Ok(validated) => {
                let mut options = self.current.clone();
                options.extend(validated);
                Ok(FlowStep::CreateEntry {
                    title: String::new(),
                    data: options,
                    options: FlowInput::new(),
                })
            }
            Err(errors) => Ok(FlowStep::Form {
                step_id: STEP_OPTIONS.to_string(),
                data_schema: self.schema.with_suggested_values(&input),
                errors: Some(errors),
                last_step: None,
            }),
        }
    }
}
