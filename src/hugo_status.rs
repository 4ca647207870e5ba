use serde::{Deserialize, Serialize};

/// Lifecycle state of the supervised Hugo server as seen by the manager.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIs,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum HugoStatus {
    #[default]
    Stopped,
    Starting,
    Running,
    Error,
}

impl HugoStatus {
    pub fn style(&self) -> String {
        let s = self.to_string();
        match self {
            HugoStatus::Stopped => console::style(s).dim().to_string(),
            HugoStatus::Starting => console::style(s).yellow().to_string(),
            HugoStatus::Running => console::style(s).green().to_string(),
            HugoStatus::Error => console::style(s).red().to_string(),
        }
    }

    /// A process may be launched from this state.
    pub fn can_start(&self) -> bool {
        matches!(self, HugoStatus::Stopped | HugoStatus::Error)
    }

    /// The process is expected to be alive in this state.
    pub fn is_active(&self) -> bool {
        matches!(self, HugoStatus::Starting | HugoStatus::Running)
    }
}
