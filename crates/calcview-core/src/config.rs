//! Configuration schema (calcview.toml)

use serde::{Deserialize, Serialize};

/// Graph layout direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RankDir {
    /// Left to right
    LR,

    /// Top to bottom
    TB,

    /// Right to left
    RL,

    /// Bottom to top
    BT,
}

impl Default for RankDir {
    fn default() -> Self {
        Self::LR
    }
}

impl RankDir {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LR => "LR",
            Self::TB => "TB",
            Self::RL => "RL",
            Self::BT => "BT",
        }
    }
}

/// Settings applied to the data-flow graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Layout direction
    #[serde(default)]
    pub rankdir: RankDir,

    /// Edge routing (ortho, spline, polyline, ...)
    #[serde(default = "default_splines")]
    pub splines: String,

    /// Padding around the drawing, in inches
    #[serde(default = "default_pad")]
    pub pad: String,

    /// Minimum space between adjacent nodes, in inches
    #[serde(default = "default_nodesep")]
    pub nodesep: String,

    /// Merge parallel edges
    #[serde(default = "default_true")]
    pub concentrate: bool,

    /// Font for node labels
    #[serde(default = "default_fontname")]
    pub fontname: String,

    /// Draw every duplicate data source as its deduplicated vertex
    #[serde(default)]
    pub collapse_duplicate_sources: bool,
}

fn default_splines() -> String {
    "ortho".to_string()
}

fn default_pad() -> String {
    "1".to_string()
}

fn default_nodesep() -> String {
    "0.5".to_string()
}

fn default_fontname() -> String {
    "Helvetica".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            rankdir: RankDir::default(),
            splines: default_splines(),
            pad: default_pad(),
            nodesep: default_nodesep(),
            concentrate: true,
            fontname: default_fontname(),
            collapse_duplicate_sources: false,
        }
    }
}

/// Settings for the analysis report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Show the internal source ID column in the data-source table
    #[serde(default)]
    pub include_source_ids: bool,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Graph settings
    #[serde(default)]
    pub graph: GraphConfig,

    /// Report settings
    #[serde(default)]
    pub report: ReportConfig,
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Self::from_toml(&contents)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
