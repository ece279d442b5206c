//! Analysis report schema (stable v1)
//!
//! This schema is STABLE and VERSIONED.
//! Breaking changes require a new version.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use crate::model::{CalculationViewModel, DataSource, FinalSchema, GeneralInfo, TransformationNode};

/// Report schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current report schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Summary statistics for a report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Deduplicated data sources
    pub data_sources: usize,

    /// Transformation nodes
    pub nodes: usize,

    /// Nodes with synthesized join details
    pub joins: usize,

    /// Nodes with a filter expression
    pub filters: usize,

    /// Calculated attributes across all nodes
    pub calculated_attributes: usize,

    /// Exposed dimensions
    pub dimensions: usize,

    /// Exposed measures
    pub measures: usize,
}

impl ReportSummary {
    pub fn from_model(model: &CalculationViewModel) -> Self {
        let nodes = model.nodes.values();

        Self {
            data_sources: model.data_sources.unique().len(),
            nodes: model.nodes.len(),
            joins: nodes.clone().filter(|n| n.join_detail().is_some()).count(),
            filters: nodes.clone().filter(|n| n.has_filter()).count(),
            calculated_attributes: nodes.map(|n| n.calculated_attributes.len()).sum(),
            dimensions: model.final_schema.dimensions.len(),
            measures: model.final_schema.measures.len(),
        }
    }
}

/// Analysis report (report.json v1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Schema version
    pub version: ReportVersion,

    /// Timestamp (ISO 8601)
    pub timestamp: String,

    /// Summary statistics
    pub summary: ReportSummary,

    pub general: GeneralInfo,

    /// Deduplicated data sources
    pub data_sources: Vec<DataSource>,

    /// Transformation nodes in document order
    pub calculation_views: IndexMap<String, TransformationNode>,

    pub final_output: FinalSchema,
}

impl AnalysisReport {
    /// Create a report from an extracted model
    pub fn from_model(model: &CalculationViewModel) -> Self {
        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            summary: ReportSummary::from_model(model),
            general: model.general.clone(),
            data_sources: model.data_sources.unique().into_iter().cloned().collect(),
            calculation_views: model.nodes.clone(),
            final_output: model.final_schema.clone(),
        }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
