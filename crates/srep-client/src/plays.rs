//! Request and response bodies for the play lifecycle endpoints.
//!
//! Every request validates itself before it is sent.

use serde::{Deserialize, Serialize};

use srep_core::error::{SrepError, SrepResult};
use srep_core::plays::Play;

pub trait Validate {
    fn validate(&self) -> SrepResult<()>;
}

/// Play IDs are canonical hyphenated UUIDs.
pub fn validate_play_id(id: &str) -> SrepResult<()> {
    if id.is_empty() {
        return Err(SrepError::Validation("id: cannot be blank".into()));
    }
    let hyphenated = id.len() == 36 && id.matches('-').count() == 4;
    if !hyphenated || uuid::Uuid::parse_str(id).is_err() {
        return Err(SrepError::Validation(format!("id: must be a valid UUID, got {id:?}")));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct StartPlayRequest {
    pub scenario: String,
}

impl Validate for StartPlayRequest {
    fn validate(&self) -> SrepResult<()> {
        if self.scenario.trim().is_empty() {
            return Err(SrepError::Validation("scenario: cannot be blank".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartPlayResponse {
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FindPlayRequest {
    pub id: String,
}

impl Validate for FindPlayRequest {
    fn validate(&self) -> SrepResult<()> {
        validate_play_id(&self.id)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FindPlayResponse {
    pub play: Option<Play>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GetPlaysRequest {}

impl Validate for GetPlaysRequest {
    fn validate(&self) -> SrepResult<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetPlaysResponse {
    #[serde(default)]
    pub plays: Vec<Play>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GetActivePlayRequest {}

impl Validate for GetActivePlayRequest {
    fn validate(&self) -> SrepResult<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetActivePlayResponse {
    pub play: Option<Play>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelPlayRequest {
    pub id: String,
}

impl Validate for CancelPlayRequest {
    fn validate(&self) -> SrepResult<()> {
        validate_play_id(&self.id)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelPlayResponse {}

#[derive(Debug, Clone, Serialize)]
pub struct CheckPlayRequest {
    pub id: String,
}

impl Validate for CheckPlayRequest {
    fn validate(&self) -> SrepResult<()> {
        validate_play_id(&self.id)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckPlayResponse {
    pub passed: bool,
}

/// Open the shell of a running play.
#[derive(Debug, Clone, Serialize)]
pub struct GetShellRequest {
    pub id: String,
    pub rows: u16,
    pub cols: u16,
}

impl Validate for GetShellRequest {
    fn validate(&self) -> SrepResult<()> {
        validate_play_id(&self.id)
    }
}
