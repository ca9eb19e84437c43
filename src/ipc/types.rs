use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::attendance::BatchPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub default_policy: BatchPolicy,
}

impl AppState {
    pub fn new(default_policy: BatchPolicy) -> Self {
        Self {
            workspace: None,
            db: None,
            default_policy,
        }
    }
}
