//! Typed paths into a session directory.
use std::path::{Path, PathBuf};

/// Convenience wrapper for locating session artifacts.
#[derive(Debug, Clone)]
pub struct SessionPaths {
    root: PathBuf,
}

impl SessionPaths {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Return the `config.json` path.
    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.json")
    }

    /// Return the `state.json` path holding the last result.
    pub fn state_path(&self) -> PathBuf {
        self.root.join("state.json")
    }

    /// Return the `runs.jsonl` path.
    pub fn run_log_path(&self) -> PathBuf {
        self.root.join("runs.jsonl")
    }
}
