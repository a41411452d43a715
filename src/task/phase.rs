use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coarse grouping used to converge a cluster in stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Assets,
    Iam,
    Network,
    SecurityGroups,
    Cluster,
    LoadBalancers,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::Assets,
        Phase::Iam,
        Phase::Network,
        Phase::SecurityGroups,
        Phase::Cluster,
        Phase::LoadBalancers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assets => "assets",
            Self::Iam => "iam",
            Self::Network => "network",
            Self::SecurityGroups => "security-groups",
            Self::Cluster => "cluster",
            Self::LoadBalancers => "load-balancers",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|phase| phase.as_str() == s)
            .ok_or_else(|| format!("Unknown phase: {s}"))
    }
}
