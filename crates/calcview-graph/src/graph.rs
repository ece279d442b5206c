//! Data-flow graph construction
//!
//! Compiles a [`CalculationViewModel`] into vertices and labeled edges running
//! from data sources through each transformation node to the output.

use calcview_core::{CalculationViewModel, GraphConfig, NodeKind, SourceKind, TransformationNode};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use crate::labels;

/// Vertex identifier
pub type VertexId = String;

/// What a vertex stands for
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum VertexKind {
    /// Physical table or referenced view
    DataSource(SourceKind),

    /// Transformation node
    Transformation(NodeKind),

    /// Filter annotation in front of a node
    Filter,

    /// Calculated-attributes annotation in front of a node
    CalculatedAttributes,

    /// Referenced identifier that is neither a source nor a node
    Unresolved,

    /// Final output of the view
    Output,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Vertex {
    pub id: VertexId,
    pub label: String,
    pub kind: VertexKind,
}

/// Role of an edge in the flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// From a node input to the node's chain
    Input,

    /// Inside a node's annotation chain
    Annotation,

    /// Into the output vertex
    Output,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub from: VertexId,
    pub to: VertexId,
    pub label: Option<String>,
    pub kind: EdgeKind,
}

/// Directed data-flow graph of one calculation view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataFlowGraph {
    /// Graph name (the view id)
    pub name: String,

    /// Vertices in emission order
    vertices: Vec<Vertex>,

    /// Edges in emission order
    edges: Vec<Edge>,

    /// Position of the synthetic output vertex
    output: usize,

    /// Layout settings used when rendering
    #[serde(skip)]
    pub(crate) config: GraphConfig,
}

impl DataFlowGraph {
    /// Compile a model with the default graph settings
    pub fn from_model(model: &CalculationViewModel) -> Self {
        Self::compile(model, &GraphConfig::default())
    }

    /// Compile a model into a graph
    pub fn compile(model: &CalculationViewModel, config: &GraphConfig) -> Self {
        let mut builder = GraphBuilder::new(model, config);

        // Vertices for every deduplicated source and every node
        for source in model.data_sources.unique() {
            builder.add_vertex(
                &source.id,
                labels::source_label(source),
                VertexKind::DataSource(source.kind.clone()),
            );
        }

        for node in model.nodes.values() {
            builder.add_vertex(
                &node.id,
                labels::node_label(node),
                VertexKind::Transformation(node.kind.clone()),
            );
        }

        let output = builder.output_id(model.general.id.as_deref());
        let output_index = builder.vertices.len();
        builder.add_vertex(
            &output,
            labels::output_label(model.final_schema.column_count()),
            VertexKind::Output,
        );

        // Annotation chains and input edges
        let mut last_destination = None;
        for node in model.nodes.values() {
            let destination = builder.add_annotation_chain(node);
            builder.add_input_edges(node, &destination);

            tracing::debug!(node = %node.id, destination = %destination, "Compiled node");
            last_destination = Some(destination);
        }

        // The last node in document order feeds the output
        if let Some(from) = last_destination {
            builder.add_edge(from, output.clone(), None, EdgeKind::Output);
        }

        let graph = Self {
            name: model.general.id.clone().unwrap_or_else(|| output.clone()),
            vertices: builder.vertices,
            edges: builder.edges,
            output: output_index,
            config: config.clone(),
        };

        tracing::debug!(
            vertices = graph.vertices.len(),
            edges = graph.edges.len(),
            "Compiled data-flow graph"
        );

        graph
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Get a vertex by id
    pub fn vertex(&self, id: &str) -> Option<&Vertex> {
        self.vertices.iter().find(|v| v.id == id)
    }

    /// The synthetic output vertex
    pub fn output(&self) -> &Vertex {
        &self.vertices[self.output]
    }

    /// Edges arriving at a vertex
    pub fn edges_into(&self, id: &str) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.to == id).collect()
    }

    /// Edges leaving a vertex
    pub fn edges_from(&self, id: &str) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.from == id).collect()
    }

    /// Vertices of a given kind, in emission order
    pub fn vertices_of(&self, kind: &VertexKind) -> Vec<&Vertex> {
        self.vertices.iter().filter(|v| &v.kind == kind).collect()
    }
}

/// Accumulates vertices and edges while compiling
struct GraphBuilder<'a> {
    model: &'a CalculationViewModel,
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    seen: HashSet<VertexId>,

    /// Every id the document declares or references
    reserved: HashSet<String>,

    /// Duplicate source id -> deduplicated source id, when collapsing
    collapsed: HashMap<String, String>,
}

impl<'a> GraphBuilder<'a> {
    fn new(model: &'a CalculationViewModel, config: &GraphConfig) -> Self {
        let collapsed = if config.collapse_duplicate_sources {
            model
                .data_sources
                .all()
                .iter()
                .filter_map(|source| {
                    let representative = model.data_sources.resolve(&source.id)?;
                    (representative.id != source.id)
                        .then(|| (source.id.clone(), representative.id.clone()))
                })
                .collect()
        } else {
            HashMap::new()
        };

        let reserved = model
            .data_sources
            .all()
            .iter()
            .map(|source| source.id.clone())
            .chain(model.nodes.values().flat_map(|node| {
                std::iter::once(node.id.clone()).chain(node.inputs.iter().cloned())
            }))
            .collect();

        Self {
            model,
            vertices: Vec::new(),
            edges: Vec::new(),
            seen: HashSet::new(),
            reserved,
            collapsed,
        }
    }

    fn add_vertex(&mut self, id: &str, label: String, kind: VertexKind) {
        if self.seen.insert(id.to_string()) {
            self.vertices.push(Vertex {
                id: id.to_string(),
                label,
                kind,
            });
        }
    }

    fn add_edge(&mut self, from: VertexId, to: VertexId, label: Option<String>, kind: EdgeKind) {
        self.edges.push(Edge {
            from,
            to,
            label,
            kind,
        });
    }

    /// Output vertex id: the view id, made unique against existing vertices
    fn output_id(&self, view_id: Option<&str>) -> VertexId {
        self.fresh_id(view_id.unwrap_or("output").to_string(), "_output")
    }

    /// Append `suffix` until `id` names neither a vertex nor a document id
    fn fresh_id(&self, mut id: VertexId, suffix: &str) -> VertexId {
        while self.seen.contains(&id) || self.reserved.contains(&id) {
            id.push_str(suffix);
        }
        id
    }

    /// Insert the annotation vertices in front of a node
    ///
    /// Order is filter -> calculated attributes -> node. Returns the vertex
    /// that the node's inputs connect to.
    fn add_annotation_chain(&mut self, node: &TransformationNode) -> VertexId {
        let mut destination = node.id.clone();

        if node.has_calculated_attributes() {
            let calc_id = self.fresh_id(format!("{}_calc", node.id), "_calc");
            self.add_vertex(
                &calc_id,
                labels::calculated_attributes_label(&node.calculated_attributes),
                VertexKind::CalculatedAttributes,
            );
            self.add_edge(calc_id.clone(), destination, None, EdgeKind::Annotation);
            destination = calc_id;
        }

        if let Some(filter) = &node.filter {
            let filter_id = self.fresh_id(format!("{}_filter", node.id), "_filter");
            self.add_vertex(&filter_id, labels::filter_label(filter), VertexKind::Filter);
            self.add_edge(filter_id.clone(), destination, None, EdgeKind::Annotation);
            destination = filter_id;
        }

        destination
    }

    /// One edge per input; join nodes label all of them with the join condition
    fn add_input_edges(&mut self, node: &TransformationNode, destination: &str) {
        let label = node.join_detail().map(labels::join_label);

        for input in &node.inputs {
            let from = self.reference(input);
            self.add_edge(from, destination.to_string(), label.clone(), EdgeKind::Input);
        }
    }

    /// Vertex for an input reference, creating it when nothing declared it yet
    fn reference(&mut self, id: &str) -> VertexId {
        if let Some(representative) = self.collapsed.get(id) {
            return representative.clone();
        }

        let model = self.model;
        if !self.seen.contains(id) {
            match model.data_sources.resolve(id) {
                Some(source) => {
                    let label = labels::source_label(source);
                    let kind = VertexKind::DataSource(source.kind.clone());
                    self.add_vertex(id, label, kind);
                }
                None => {
                    tracing::debug!(reference = %id, "Input does not name a known source or node");
                    self.add_vertex(id, labels::humanize(id), VertexKind::Unresolved);
                }
            }
        }

        id.to_string()
    }
}
