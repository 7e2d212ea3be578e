use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskProfile {
    Conservative,
    Moderate,
    Aggressive,
}

impl RiskProfile {
    pub const ALL: [RiskProfile; 3] = [Self::Conservative, Self::Moderate, Self::Aggressive];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::Moderate => "moderate",
            Self::Aggressive => "aggressive",
        }
    }
}

impl fmt::Display for RiskProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskProfile {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "unknown risk profile '{s}' (expected conservative, moderate or aggressive)"
                )
            })
    }
}

/// A file as the user handed it over, before normalization.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub file_name: String,
    /// Content type declared by the uploader, if any.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn new(
        file_name: impl Into<String>,
        content_type: Option<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.filter(|s| !s.trim().is_empty()),
            bytes: bytes.into(),
        }
    }
}

/// Canonical form of an upload. Consumed by value when the prompt is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortfolioInput {
    Tabular { csv_text: String },
    Image { bytes: Vec<u8>, mime_type: String },
}

impl PortfolioInput {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Tabular { .. } => "tabular",
            Self::Image { .. } => "image",
        }
    }
}
