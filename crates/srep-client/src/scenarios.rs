//! Request and response bodies for the scenario catalog endpoints.

use serde::{Deserialize, Serialize};

use srep_core::error::{SrepError, SrepResult};
use srep_core::scenarios::{null_as_empty, Scenario};

use crate::plays::Validate;

/// Scenario names end up in a URL path segment.
pub fn validate_scenario_name(name: &str) -> SrepResult<()> {
    if name.trim().is_empty() {
        return Err(SrepError::Validation("scenario: cannot be blank".into()));
    }
    let path_safe = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !path_safe || name == "." || name == ".." {
        return Err(SrepError::Validation(format!(
            "scenario: may only contain letters, digits, '-', '_' and '.', got {name:?}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GetScenariosRequest {}

impl Validate for GetScenariosRequest {
    fn validate(&self) -> SrepResult<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetScenariosResponse {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub scenarios: Vec<Scenario>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FindScenarioRequest {
    pub scenario: String,
}

impl Validate for FindScenarioRequest {
    fn validate(&self) -> SrepResult<()> {
        validate_scenario_name(&self.scenario)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FindScenarioResponse {
    pub scenario: Option<Scenario>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GetMetadataRequest {}

impl Validate for GetMetadataRequest {
    fn validate(&self) -> SrepResult<()> {
        Ok(())
    }
}
