//! Scenario catalog records.

use serde::{Deserialize, Deserializer, Serialize};

/// A host/container port or path pair declared by a scenario.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub container: String,
}

/// One playable scenario as described by the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub ports: Vec<Mapping>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub volumes: Vec<Mapping>,
    #[serde(default)]
    pub privileged: bool,
}

/// The full catalog, as served by `/metadata`.
pub type Metadata = Vec<Scenario>;

/// The API sends `null` for empty lists.
pub fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
