use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a task is allowed to treat the resource it describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// Create when missing, update when different.
    #[default]
    Normal,
    /// Never discovered, never rendered.
    Ignore,
    /// Bind to the resource when it exists, otherwise create it.
    ExistingOrCreate,
    /// Owned elsewhere: must exist, never mutated.
    Shared,
}

impl Lifecycle {
    /// Whether a run under this lifecycle may change the resource.
    pub fn may_render(&self) -> bool {
        matches!(self, Lifecycle::Normal | Lifecycle::ExistingOrCreate)
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Ignore => write!(f, "ignore"),
            Self::ExistingOrCreate => write!(f, "existing_or_create"),
            Self::Shared => write!(f, "shared"),
        }
    }
}

impl FromStr for Lifecycle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Self::Normal),
            "ignore" => Ok(Self::Ignore),
            "existing_or_create" => Ok(Self::ExistingOrCreate),
            "shared" => Ok(Self::Shared),
            _ => Err(format!("Unknown lifecycle: {s}")),
        }
    }
}
