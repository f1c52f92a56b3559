//! Session state: the last proposal and the last known site coordinates.
//!
//! A session is a directory. Its state file is rewritten atomically after a
//! run fully completes, so readers see either the previous result or the new
//! one, never a mix.
mod paths;

pub use paths::SessionPaths;

use crate::geocode::Coordinates;
use crate::proposal::{Normalized, ProposalRecord, SiteInputs};
use crate::util::{now_epoch_ms, write_atomic};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const SESSION_SCHEMA_VERSION: u32 = 1;
pub const ENV_SESSION_DIR: &str = "PROPTECH_SESSION_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub schema_version: u32,
    #[serde(default)]
    pub inputs: Option<SiteInputs>,
    #[serde(default)]
    pub result: Option<ProposalRecord>,
    #[serde(default)]
    pub degraded: bool,
    #[serde(default)]
    pub coordinates: Coordinates,
    #[serde(default)]
    pub updated_at_epoch_ms: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            schema_version: SESSION_SCHEMA_VERSION,
            inputs: None,
            result: None,
            degraded: false,
            coordinates: Coordinates::default(),
            updated_at_epoch_ms: 0,
        }
    }
}

impl SessionState {
    /// Replace the stored result wholesale.
    pub fn store_result(&mut self, inputs: SiteInputs, normalized: Normalized) {
        self.inputs = Some(inputs);
        self.result = Some(normalized.record);
        self.degraded = normalized.degraded;
        self.touch();
    }

    /// Drop the stored result; coordinates survive.
    pub fn clear_result(&mut self) {
        self.inputs = None;
        self.result = None;
        self.degraded = false;
        self.touch();
    }

    pub fn set_coordinates(&mut self, coordinates: Coordinates) {
        self.coordinates = coordinates;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at_epoch_ms = now_epoch_ms();
    }
}

/// Pick the session directory: explicit flag, then env, then the data dir.
pub fn resolve_session_root(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(dir) = std::env::var_os(ENV_SESSION_DIR).filter(|dir| !dir.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let data_dir = dirs::data_dir()
        .ok_or_else(|| anyhow!("no data directory; pass --session or set {ENV_SESSION_DIR}"))?;
    Ok(data_dir.join("proptech"))
}

/// Load session state, or a fresh one when nothing is stored yet.
pub fn load_session(paths: &SessionPaths) -> Result<SessionState> {
    let path = paths.state_path();
    if !path.exists() {
        return Ok(SessionState::default());
    }
    let bytes = fs::read(&path).with_context(|| format!("read session {}", path.display()))?;
    let state: SessionState = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse session state {}", path.display()))?;
    if state.schema_version != SESSION_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported session schema_version {} in {}",
            state.schema_version,
            path.display()
        ));
    }
    Ok(state)
}

pub fn save_session(paths: &SessionPaths, state: &SessionState) -> Result<()> {
    let text = serde_json::to_string_pretty(state).context("serialize session state")?;
    write_atomic(&paths.state_path(), text.as_bytes())
}
