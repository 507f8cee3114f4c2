// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};

/// The three recognized actions, matched case-insensitively on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Register,
    Unregister,
    Status,
}

impl Action {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "REGISTER" => Some(Action::Register),
            "UNREGISTER" => Some(Action::Unregister),
            "STATUS" => Some(Action::Status),
            _ => None,
        }
    }
}

/// `{ action, sid, configPath? }` sent by a client to open a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase", deserialize = "lowercase"))]
pub struct Request {
    pub action: String,
    pub sid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
}

impl Request {
    pub fn action(&self) -> Option<Action> {
        Action::parse(&self.action)
    }
}
