use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle of a story as far as this tool knows it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleState {
    #[default]
    Unknown,
    Published,
    CirculationRemoved,
    Unpublished,
    Deleted,
    Error,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Unknown => "unknown",
            LifecycleState::Published => "published",
            LifecycleState::CirculationRemoved => "circulation-removed",
            LifecycleState::Unpublished => "unpublished",
            LifecycleState::Deleted => "deleted",
            LifecycleState::Error => "error",
        };
        f.write_str(name)
    }
}

impl FromStr for LifecycleState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "" | "unknown" => Ok(LifecycleState::Unknown),
            "published" => Ok(LifecycleState::Published),
            "circulation-removed" | "decirculated" => Ok(LifecycleState::CirculationRemoved),
            "unpublished" => Ok(LifecycleState::Unpublished),
            "deleted" => Ok(LifecycleState::Deleted),
            "error" => Ok(LifecycleState::Error),
            other => Err(format!("unknown lifecycle state: {other}")),
        }
    }
}

/// One story as produced by the audit or read back from a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub state: LifecycleState,
    pub site: Option<String>,
    pub publish_date: Option<String>,
    pub url: Option<String>,
}

impl ContentItem {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: LifecycleState::Unknown,
            site: None,
            publish_date: None,
            url: None,
        }
    }

    pub fn with_state(mut self, state: LifecycleState) -> Self {
        self.state = state;
        self
    }
}
