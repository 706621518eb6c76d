// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::LocoError;
use crate::config::EngineConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Current schema version written by locoqc wire adapters.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;
/// Maximum additive forward-compatible schema version accepted by readers.
pub const MAX_FORWARD_COMPAT_SCHEMA_VERSION: u32 = 2;

pub type UnknownFields = Map<String, Value>;

/// Validates whether an artifact schema version is currently readable.
pub fn validate_schema_version(schema_version: u32, artifact: &str) -> Result<(), LocoError> {
    if (CURRENT_SCHEMA_VERSION..=MAX_FORWARD_COMPAT_SCHEMA_VERSION).contains(&schema_version) {
        return Ok(());
    }
    Err(LocoError::invalid_input(format!(
        "{artifact} schema_version={schema_version} is unsupported; supported versions are {CURRENT_SCHEMA_VERSION}..={MAX_FORWARD_COMPAT_SCHEMA_VERSION}"
    )))
}

/// Wire format for versioned engine configuration payloads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineConfigWire {
    pub schema_version: u32,
    #[serde(flatten)]
    pub config: EngineConfig,
    #[serde(default, flatten)]
    pub unknown_fields: UnknownFields,
}

impl EngineConfigWire {
    pub fn from_runtime(config: EngineConfig) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            config,
            unknown_fields: UnknownFields::new(),
        }
    }

    pub fn into_runtime_parts(self) -> Result<(EngineConfig, UnknownFields), LocoError> {
        validate_schema_version(self.schema_version, "EngineConfig")?;
        self.config.validate()?;
        Ok((self.config, self.unknown_fields))
    }

    pub fn to_runtime(self) -> Result<EngineConfig, LocoError> {
        let (config, _) = self.into_runtime_parts()?;
        Ok(config)
    }
}

/// Parses and validates an engine configuration JSON document.
pub fn engine_config_from_json(json: &str) -> Result<EngineConfig, LocoError> {
    let wire: EngineConfigWire = serde_json::from_str(json)
        .map_err(|err| LocoError::invalid_input(format!("EngineConfig JSON is invalid: {err}")))?;
    wire.to_runtime()
}
