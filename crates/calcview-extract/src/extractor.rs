//! Model extraction from calculation view documents
//!
//! Turns a parsed document into a [`CalculationViewModel`]. Only syntactically
//! invalid XML is an error; missing optional structure degrades to empty or
//! default values.

use calcview_core::{
    CalculatedAttribute, CalculationViewModel, ColumnMapping, DataSource, DataSources, Dimension,
    FinalSchema, GeneralInfo, JoinDetail, Measure, NodeKind, SourceKind, TransformationNode,
    NOT_AVAILABLE,
};
use indexmap::IndexMap;
use crate::xml::{self, DocumentParseError, Element, XSI_NS};

/// Extract a structured model from calculation view documents
pub struct ModelExtractor;

impl ModelExtractor {
    /// Parse XML text and extract every section of the model
    pub fn analyze(xml_text: &str) -> Result<CalculationViewModel, DocumentParseError> {
        let root = xml::parse_document(xml_text)?;
        let model = Self::extract(&root);

        tracing::debug!(
            view = model.general.id.as_deref().unwrap_or(NOT_AVAILABLE),
            data_sources = model.data_sources.len(),
            nodes = model.nodes.len(),
            columns = model.final_schema.column_count(),
            "Extracted calculation view model"
        );

        Ok(model)
    }

    /// Extract a model from an already parsed root element
    pub fn extract(root: &Element) -> CalculationViewModel {
        CalculationViewModel {
            general: Self::extract_general(root),
            data_sources: Self::extract_data_sources(root),
            nodes: Self::extract_transformation_nodes(root),
            final_schema: Self::extract_final_schema(root),
        }
    }

    /// General metadata from the root attributes and its `metadata` child
    pub fn extract_general(root: &Element) -> GeneralInfo {
        let changed_at = root
            .child("metadata")
            .and_then(|metadata| metadata.attr("changedAt"))
            .unwrap_or(NOT_AVAILABLE);

        GeneralInfo {
            id: owned(root.attr("id")),
            data_category: owned(root.attr("dataCategory")),
            visibility: owned(root.attr("visibility")),
            calculation_scenario_type: owned(root.attr("calculationScenarioType")),
            output_view_type: owned(root.attr("outputViewType")),
            changed_at: changed_at.to_string(),
        }
    }

    /// Data sources declared directly under `dataSources`
    pub fn extract_data_sources(root: &Element) -> DataSources {
        let Some(container) = root.child("dataSources") else {
            return DataSources::default();
        };

        let sources = container
            .children("DataSource")
            .map(Self::extract_data_source)
            .collect();

        DataSources::new(sources)
    }

    fn extract_data_source(source: &Element) -> DataSource {
        let kind = SourceKind::from_type_attr(source.attr("type").unwrap_or_default());

        let (name, schema) = match &kind {
            SourceKind::DatabaseTable => source
                .child("columnObject")
                .map(|object| {
                    (
                        object.attr("columnObjectName").unwrap_or_default().to_string(),
                        object.attr("schemaName").unwrap_or_default().to_string(),
                    )
                })
                .unwrap_or_default(),
            SourceKind::CalculationView => source
                .child("resourceUri")
                .map(|uri| split_resource_uri(uri.text().trim()))
                .unwrap_or_default(),
            SourceKind::Other(_) => (String::new(), String::new()),
        };

        DataSource {
            id: source.attr("id").unwrap_or_default().to_string(),
            name,
            kind,
            schema,
        }
    }

    /// Transformation nodes under `calculationViews`, in document order
    pub fn extract_transformation_nodes(root: &Element) -> IndexMap<String, TransformationNode> {
        let mut nodes = IndexMap::new();

        let Some(container) = root.child("calculationViews") else {
            return nodes;
        };

        for element in container.children("calculationView") {
            let node = Self::extract_node(element);
            tracing::debug!(node = %node.id, kind = %node.kind, inputs = node.inputs.len(), "Extracted node");
            nodes.insert(node.id.clone(), node);
        }

        nodes
    }

    fn extract_node(view: &Element) -> TransformationNode {
        let id = view.attr("id").unwrap_or_default().to_string();

        let type_name = view.attr_ns(XSI_NS, "type");
        if type_name.is_none() {
            tracing::warn!(node = %id, "Node has no type discriminator");
        }
        let kind = NodeKind::from_type_name(strip_prefix(type_name.unwrap_or_default()));

        let inputs: Vec<String> = view
            .children("input")
            .filter_map(|input| input.attr("node"))
            .map(|node| node.trim_matches('#').to_string())
            .collect();

        let filter = view
            .child("filter")
            .map(Element::text)
            .filter(|text| !text.trim().is_empty())
            .map(str::to_string);

        let join_attributes: Vec<String> = view
            .children("joinAttribute")
            .filter_map(|attr| attr.attr("name"))
            .map(str::to_string)
            .collect();

        let join_details = if kind.is_join() {
            match inputs.as_slice() {
                [left, right] => vec![JoinDetail {
                    join_type: view.attr("joinType").unwrap_or_default().to_string(),
                    left_table: left.clone(),
                    right_table: right.clone(),
                    join_attribute: join_attributes.first().cloned().unwrap_or_default(),
                    join_columns: join_attributes.clone(),
                }],
                _ => {
                    tracing::warn!(node = %id, inputs = inputs.len(), "Join node without exactly two inputs");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let calculated_attributes = view
            .child("calculatedViewAttributes")
            .map(|container| {
                container
                    .children("calculatedViewAttribute")
                    .map(Self::extract_calculated_attribute)
                    .collect()
            })
            .unwrap_or_default();

        TransformationNode {
            id,
            kind,
            inputs,
            filter,
            join_attributes,
            join_details,
            calculated_attributes,
        }
    }

    fn extract_calculated_attribute(attr: &Element) -> CalculatedAttribute {
        CalculatedAttribute {
            id: attr.attr("id").unwrap_or_default().to_string(),
            datatype: owned(attr.attr("datatype")),
            formula: attr
                .child("formula")
                .map(Element::text)
                .unwrap_or(NOT_AVAILABLE)
                .to_string(),
        }
    }

    /// Dimensions and measures exposed by `logicalModel`
    pub fn extract_final_schema(root: &Element) -> FinalSchema {
        let Some(logical_model) = root.child("logicalModel") else {
            return FinalSchema::default();
        };

        let dimensions = logical_model
            .child("attributes")
            .map(|attributes| {
                attributes
                    .children("attribute")
                    .map(Self::extract_dimension)
                    .collect()
            })
            .unwrap_or_default();

        let measures = logical_model
            .child("baseMeasures")
            .map(|measures| measures.children("measure").map(Self::extract_measure).collect())
            .unwrap_or_default();

        FinalSchema {
            dimensions,
            measures,
        }
    }

    fn extract_dimension(attribute: &Element) -> Dimension {
        let descriptions = attribute.child("descriptions");

        Dimension {
            id: attribute.attr("id").unwrap_or_default().to_string(),
            description: default_description(descriptions),
            hierarchy_active: descriptions
                .and_then(|d| d.attr("attributeHierarchyActive"))
                .or_else(|| attribute.attr("attributeHierarchyActive"))
                .map_or(false, |value| value == "true"),
            key_mapping: attribute.child("keyMapping").map(column_mapping),
        }
    }

    fn extract_measure(measure: &Element) -> Measure {
        Measure {
            id: measure.attr("id").unwrap_or_default().to_string(),
            aggregation_type: owned(measure.attr("aggregationType")),
            description: default_description(measure.child("descriptions")),
            measure_type: measure.attr("measureType").unwrap_or_default().to_string(),
            mapping: measure.child("measureMapping").map(column_mapping),
        }
    }
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

fn default_description(descriptions: Option<&Element>) -> String {
    descriptions
        .and_then(|d| d.attr("defaultDescription"))
        .unwrap_or_default()
        .to_string()
}

fn column_mapping(mapping: &Element) -> ColumnMapping {
    ColumnMapping {
        column_object_name: mapping.attr("columnObjectName").unwrap_or_default().to_string(),
        column_name: mapping.attr("columnName").unwrap_or_default().to_string(),
    }
}

/// Drop a namespace prefix (`Calculation:JoinView` -> `JoinView`)
fn strip_prefix(type_name: &str) -> &str {
    type_name.rsplit(':').next().unwrap_or(type_name)
}

/// Split a resource path into (name, schema)
///
/// The name is the last segment; the schema is every segment between the
/// first and the name (`/pkg/calculationviews/CV` -> `pkg/calculationviews`).
fn split_resource_uri(uri: &str) -> (String, String) {
    let segments: Vec<&str> = uri.split('/').collect();
    let name = segments.last().copied().unwrap_or_default().to_string();
    let schema = if segments.len() > 2 {
        segments[1..segments.len() - 1].join("/")
    } else {
        String::new()
    };
    (name, schema)
}
