//! Calcview Core
//!
//! Domain model for calculation views, configuration and the stable
//! analysis report format.

pub mod model;
pub mod report;
pub mod config;

pub use model::{
    CalculatedAttribute, CalculationViewModel, ColumnMapping, DataSource, DataSources, Dimension,
    FinalSchema, GeneralInfo, JoinDetail, Measure, NodeKind, SourceKind, TransformationNode,
    NOT_AVAILABLE,
};
pub use report::{AnalysisReport, ReportSummary, ReportVersion};
pub use config::{Config, ConfigError, GraphConfig, RankDir, ReportConfig};
