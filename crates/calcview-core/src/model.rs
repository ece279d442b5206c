//! Calculation view model
//!
//! Typed representation of a calculation-view document: general metadata,
//! data sources, transformation nodes and the exposed logical model.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Sentinel used where the document leaves a value out entirely
pub const NOT_AVAILABLE: &str = "N/A";

/// General information captured from the document root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralInfo {
    /// View identifier (root `id`)
    pub id: Option<String>,

    /// Data category (root `dataCategory`, e.g. CUBE or DIMENSION)
    #[serde(rename = "type")]
    pub data_category: Option<String>,

    /// Visibility (root `visibility`)
    pub visibility: Option<String>,

    /// Calculation scenario type (root `calculationScenarioType`)
    pub calculation_scenario_type: Option<String>,

    /// Output view type (root `outputViewType`)
    pub output_view_type: Option<String>,

    /// Last-changed timestamp from the metadata child, `N/A` when absent
    pub changed_at: String,
}

impl Default for GeneralInfo {
    fn default() -> Self {
        Self {
            id: None,
            data_category: None,
            visibility: None,
            calculation_scenario_type: None,
            output_view_type: None,
            changed_at: NOT_AVAILABLE.to_string(),
        }
    }
}

/// Kind of a data source
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SourceKind {
    /// Physical database table
    DatabaseTable,

    /// Another calculation view referenced by resource path
    CalculationView,

    /// Anything else, kept verbatim
    Other(String),
}

impl SourceKind {
    pub fn from_type_attr(value: &str) -> Self {
        match value {
            "DATA_BASE_TABLE" => Self::DatabaseTable,
            "CALCULATION_VIEW" => Self::CalculationView,
            other => Self::Other(other.to_string()),
        }
    }

    /// The type string as written in the document
    pub fn as_str(&self) -> &str {
        match self {
            Self::DatabaseTable => "DATA_BASE_TABLE",
            Self::CalculationView => "CALCULATION_VIEW",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for SourceKind {
    fn from(value: String) -> Self {
        Self::from_type_attr(&value)
    }
}

impl From<SourceKind> for String {
    fn from(kind: SourceKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A physical table or referenced view feeding the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    /// Identifier, unique within the document
    pub id: String,

    /// Object name (table name or last resource path segment)
    pub name: String,

    /// Source kind
    #[serde(rename = "type")]
    pub kind: SourceKind,

    /// Schema name or resource package path
    pub schema: String,
}

impl DataSource {
    fn dedup_key(&self) -> (&SourceKind, &str, &str) {
        (&self.kind, &self.name, &self.schema)
    }
}

/// All data sources in document order, with a deduplicated view
///
/// Two entries pointing at the same (kind, name, schema) collapse to the first
/// one in the deduplicated list, but every original identifier stays resolvable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataSources {
    entries: Vec<DataSource>,
}

impl DataSources {
    pub fn new(entries: Vec<DataSource>) -> Self {
        Self { entries }
    }

    /// Every source element, duplicates included
    pub fn all(&self) -> &[DataSource] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deduplicated sources; the first occurrence of each key wins
    pub fn unique(&self) -> Vec<&DataSource> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .filter(|source| seen.insert(source.dedup_key()))
            .collect()
    }

    /// Resolve an original identifier to its deduplicated row
    pub fn resolve(&self, id: &str) -> Option<&DataSource> {
        let source = self.entries.iter().find(|s| s.id == id)?;
        let key = source.dedup_key();
        self.entries.iter().find(|s| s.dedup_key() == key)
    }

    /// Whether an identifier names any source element
    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|s| s.id == id)
    }
}

/// Transformation node kind, taken from the `xsi:type` discriminator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
    Join,
    Union,
    Aggregation,
    Projection,
    Rank,

    /// Unrecognized discriminator, kept verbatim (empty when missing)
    Other(String),
}

impl NodeKind {
    /// Build from a discriminator with any namespace prefix already stripped
    pub fn from_type_name(name: &str) -> Self {
        match name {
            "JoinView" => Self::Join,
            "UnionView" => Self::Union,
            "AggregationView" => Self::Aggregation,
            "ProjectionView" => Self::Projection,
            "RankView" => Self::Rank,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Join => "JoinView",
            Self::Union => "UnionView",
            Self::Aggregation => "AggregationView",
            Self::Projection => "ProjectionView",
            Self::Rank => "RankView",
            Self::Other(raw) => raw,
        }
    }

    pub fn is_join(&self) -> bool {
        matches!(self, Self::Join)
    }
}

impl From<String> for NodeKind {
    fn from(value: String) -> Self {
        Self::from_type_name(&value)
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Join metadata synthesized for a two-input join node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinDetail {
    /// Join type verbatim (inner, leftOuter, text, ...)
    pub join_type: String,

    /// First input in document order
    pub left_table: String,

    /// Second input in document order
    pub right_table: String,

    /// First declared join attribute, empty when none
    pub join_attribute: String,

    /// Every declared join attribute, in order
    pub join_columns: Vec<String>,
}

/// Derived column declared inside a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculatedAttribute {
    pub id: String,

    pub datatype: Option<String>,

    /// Raw expression text, `N/A` when the formula element is missing
    pub formula: String,
}

/// One stage of the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformationNode {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: NodeKind,

    /// Referenced node or source identifiers, anchor markers stripped
    pub inputs: Vec<String>,

    /// Filter expression, `None` when missing or blank
    #[serde(rename = "filters")]
    pub filter: Option<String>,

    pub join_attributes: Vec<String>,

    /// At most one entry; empty unless this is a join with exactly two inputs
    pub join_details: Vec<JoinDetail>,

    pub calculated_attributes: Vec<CalculatedAttribute>,
}

impl TransformationNode {
    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    pub fn has_calculated_attributes(&self) -> bool {
        !self.calculated_attributes.is_empty()
    }

    pub fn join_detail(&self) -> Option<&JoinDetail> {
        self.join_details.first()
    }
}

/// Source column of a logical-model attribute or measure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub column_object_name: String,
    pub column_name: String,
}

/// Exposed dimension attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    /// Technical identifier
    pub id: String,

    pub description: String,

    #[serde(default)]
    pub hierarchy_active: bool,

    #[serde(default)]
    pub key_mapping: Option<ColumnMapping>,
}

/// Exposed measure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measure {
    /// Technical identifier
    pub id: String,

    pub aggregation_type: Option<String>,

    pub description: String,

    #[serde(default)]
    pub measure_type: String,

    #[serde(default)]
    pub mapping: Option<ColumnMapping>,
}

/// Final exposed schema (logical model)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalSchema {
    pub dimensions: Vec<Dimension>,
    pub measures: Vec<Measure>,
}

impl FinalSchema {
    /// Number of exposed columns (dimensions plus measures)
    pub fn column_count(&self) -> usize {
        self.dimensions.len() + self.measures.len()
    }
}

/// Structured model of one calculation view
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationViewModel {
    pub general: GeneralInfo,

    pub data_sources: DataSources,

    /// Transformation nodes keyed by id, in document order
    pub nodes: IndexMap<String, TransformationNode>,

    pub final_schema: FinalSchema,
}

impl CalculationViewModel {
    pub fn node(&self, id: &str) -> Option<&TransformationNode> {
        self.nodes.get(id)
    }

    /// Last node in document order
    pub fn last_node(&self) -> Option<&TransformationNode> {
        self.nodes.last().map(|(_, node)| node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table(id: &str, name: &str, schema: &str) -> DataSource {
        DataSource {
            id: id.to_string(),
            name: name.to_string(),
            kind: SourceKind::DatabaseTable,
            schema: schema.to_string(),
        }
    }

    #[test]
    fn unique_keeps_first_occurrence() {
        let sources = DataSources::new(vec![
            table("A", "ORDERS", "SALES"),
            table("B", "CUSTOMERS", "SALES"),
            table("C", "ORDERS", "SALES"),
        ]);

        let ids: Vec<&str> = sources.unique().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
        assert_eq!(sources.len(), 3);
    }

    #[test]
    fn duplicate_ids_resolve_to_representative() {
        let sources = DataSources::new(vec![
            table("A", "ORDERS", "SALES"),
            table("C", "ORDERS", "SALES"),
        ]);

        assert_eq!(sources.resolve("C").map(|s| s.id.as_str()), Some("A"));
        assert_eq!(sources.resolve("A").map(|s| s.id.as_str()), Some("A"));
        assert!(sources.resolve("missing").is_none());
    }

    #[test]
    fn same_name_different_kind_is_not_a_duplicate() {
        let mut view = table("B", "ORDERS", "SALES");
        view.kind = SourceKind::CalculationView;
        let sources = DataSources::new(vec![table("A", "ORDERS", "SALES"), view]);

        assert_eq!(sources.unique().len(), 2);
    }

    #[test]
    fn node_kind_roundtrips_raw_name() {
        assert_eq!(NodeKind::from_type_name("JoinView"), NodeKind::Join);
        assert_eq!(NodeKind::from_type_name("JoinView").as_str(), "JoinView");

        let custom = NodeKind::from_type_name("WindowFunctionView");
        assert_eq!(custom.as_str(), "WindowFunctionView");
        assert!(!custom.is_join());
    }

    #[test]
    fn kinds_serialize_as_strings() {
        let json = serde_json::to_string(&SourceKind::CalculationView).unwrap();
        assert_eq!(json, "\"CALCULATION_VIEW\"");

        let kind: NodeKind = serde_json::from_str("\"AggregationView\"").unwrap();
        assert_eq!(kind, NodeKind::Aggregation);
    }

    #[test]
    fn final_schema_column_count() {
        let schema = FinalSchema {
            dimensions: vec![Dimension {
                id: "REGION".to_string(),
                description: String::new(),
                hierarchy_active: false,
                key_mapping: None,
            }],
            measures: vec![Measure {
                id: "AMOUNT".to_string(),
                aggregation_type: Some("sum".to_string()),
                description: String::new(),
                measure_type: String::new(),
                mapping: None,
            }],
        };

        assert_eq!(schema.column_count(), 2);
        assert_eq!(FinalSchema::default().column_count(), 0);
    }
}
