use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Which congestion-control algorithm governs a flow's sender-side window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CongestionAlgorithm {
    Reno,
    Fast,
}

#[derive(Debug, Error)]
#[error("unsupported congestion-control algorithm tag '{0}'")]
pub struct UnknownAlgorithm(pub String);

impl FromStr for CongestionAlgorithm {
    type Err = UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reno" => Ok(Self::Reno),
            "fast" => Ok(Self::Fast),
            other => Err(UnknownAlgorithm(other.to_string())),
        }
    }
}

impl fmt::Display for CongestionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reno => write!(f, "reno"),
            Self::Fast => write!(f, "fast"),
        }
    }
}
