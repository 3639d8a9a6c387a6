//! Compact subsystem tags attached to every record

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed-size categorical label for the subsystem that produced a record.
///
/// Tags are `Copy` so the producer hot path never allocates for them.
/// Applications with their own subsystems use `Custom` with a stable id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum LogTag {
    #[default]
    Default,
    System,
    Network,
    Physics,
    Rendering,
    Audio,
    Input,
    Ai,
    Ui,
    Gameplay,
    Performance,
    Security,
    Database,
    Custom(u16),
}

impl LogTag {
    pub fn name(&self) -> &'static str {
        match self {
            LogTag::Default => "Default",
            LogTag::System => "System",
            LogTag::Network => "Network",
            LogTag::Physics => "Physics",
            LogTag::Rendering => "Rendering",
            LogTag::Audio => "Audio",
            LogTag::Input => "Input",
            LogTag::Ai => "AI",
            LogTag::Ui => "UI",
            LogTag::Gameplay => "Gameplay",
            LogTag::Performance => "Performance",
            LogTag::Security => "Security",
            LogTag::Database => "Database",
            LogTag::Custom(_) => "Custom",
        }
    }
}

impl fmt::Display for LogTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogTag::Custom(id) => write!(f, "Custom({})", id),
            other => f.write_str(other.name()),
        }
    }
}

impl FromStr for LogTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(id) = trimmed
            .strip_prefix("Custom(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            return id
                .parse::<u16>()
                .map(LogTag::Custom)
                .map_err(|_| format!("Invalid custom tag id: '{}'", id));
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "default" => Ok(LogTag::Default),
            "system" => Ok(LogTag::System),
            "network" => Ok(LogTag::Network),
            "physics" => Ok(LogTag::Physics),
            "rendering" => Ok(LogTag::Rendering),
            "audio" => Ok(LogTag::Audio),
            "input" => Ok(LogTag::Input),
            "ai" => Ok(LogTag::Ai),
            "ui" => Ok(LogTag::Ui),
            "gameplay" => Ok(LogTag::Gameplay),
            "performance" => Ok(LogTag::Performance),
            "security" => Ok(LogTag::Security),
            "database" => Ok(LogTag::Database),
            _ => Err(format!("Invalid log tag: '{}'", s)),
        }
    }
}
