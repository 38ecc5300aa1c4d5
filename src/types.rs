use std::collections::HashMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Gw2Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationOutcome {
    Failed,
    FailedInvalidToken,
    FailedInvalidKey,
    FailedNoAccount,
    FailedBadData,
    Finished,
}

// `text` values reported by the account endpoint.
const ERROR_TEXT_OUTCOMES: &[(&str, AuthorizationOutcome)] = &[
    ("Invalid access token", AuthorizationOutcome::FailedInvalidToken),
    ("invalid key", AuthorizationOutcome::FailedInvalidKey),
    ("no game account", AuthorizationOutcome::FailedNoAccount),
    ("ErrBadData", AuthorizationOutcome::FailedBadData),
];

impl AuthorizationOutcome {
    pub fn from_error_text(text: Option<&str>) -> Self {
        text.and_then(|text| {
            ERROR_TEXT_OUTCOMES
                .iter()
                .find(|(known, _)| *known == text)
                .map(|(_, outcome)| *outcome)
        })
        .unwrap_or(Self::Failed)
    }

    pub fn is_finished(self) -> bool {
        self == Self::Finished
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub access: Vec<String>,
    /// Account age in seconds.
    #[serde(default)]
    pub age: u64,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl AccountInfo {
    pub fn age(&self) -> Duration {
        Duration::from_secs(self.age)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountAchievement {
    pub id: u64,
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AchievementInfo {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Option<Value>,
}

impl ApiResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn error_text(&self) -> Option<&str> {
        self.body.as_ref()?.get("text")?.as_str()
    }

    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, Gw2Error> {
        let body = self.body.clone().ok_or_else(|| Gw2Error::InvalidResponse {
            message: format!("empty body (status {})", self.status),
            body: String::new(),
        })?;
        serde_json::from_value(body).map_err(|err| Gw2Error::InvalidResponse {
            message: err.to_string(),
            body: self.body.as_ref().map(Value::to_string).unwrap_or_default(),
        })
    }
}
