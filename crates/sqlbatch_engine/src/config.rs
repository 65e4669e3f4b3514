//! Database open options.

use serde::Deserialize;

use crate::types::TxError;

/// Estimated size used when none is given (2 MiB)
pub const DEFAULT_SIZE: u64 = 2 * 1024 * 1024;

/// Options as supplied by the caller; name and version are required.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DbOptions {
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub size: Option<u64>,
}

/// Validated options with defaults filled in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedOptions {
    pub name: String,
    pub version: String,
    pub description: String,
    pub size: u64,
}

impl DbOptions {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self { name: Some(name.into()), version: Some(version.into()), ..Self::default() }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn from_json(json: &str) -> Result<Self, TxError> {
        serde_json::from_str(json).map_err(|e| TxError::InvalidArgument(format!("options json: {e}")))
    }

    pub fn resolve(&self) -> Result<ResolvedOptions, TxError> {
        let name = match self.name.as_deref() {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => return Err(TxError::InvalidArgument("missing database name (options.name)".into())),
        };
        let version = match self.version.as_deref() {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => return Err(TxError::InvalidArgument("missing database version (options.version)".into())),
        };
        let description = self
            .description
            .clone()
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| format!("{name} database"));
        let size = self.size.filter(|s| *s > 0).unwrap_or(DEFAULT_SIZE);
        Ok(ResolvedOptions { name, version, description, size })
    }
}
