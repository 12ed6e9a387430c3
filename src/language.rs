use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Languages with a built-in snippet pool
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    ValueEnum,
    Serialize,
    Deserialize,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PracticeLanguage {
    #[default]
    Javascript,
    Python,
    Go,
}

impl PracticeLanguage {
    pub const ALL: [PracticeLanguage; 3] = [
        PracticeLanguage::Javascript,
        PracticeLanguage::Python,
        PracticeLanguage::Go,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PracticeLanguage::Javascript => "javascript",
            PracticeLanguage::Python => "python",
            PracticeLanguage::Go => "go",
        }
    }

    /// Next language in display order, wrapping around
    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|l| *l == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported language: {0}")]
pub struct UnsupportedLanguage(pub String);

impl FromStr for PracticeLanguage {
    type Err = UnsupportedLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| UnsupportedLanguage(s.to_string()))
    }
}
