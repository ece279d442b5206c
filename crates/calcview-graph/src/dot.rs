//! GraphViz DOT rendering

use crate::graph::{DataFlowGraph, Edge, EdgeKind, Vertex, VertexKind};

impl DataFlowGraph {
    /// Export the data-flow graph to GraphViz DOT format
    pub fn to_dot(&self) -> String {
        let config = &self.config;
        let mut output = String::new();

        output.push_str(&format!("digraph {} {{\n", quote(&self.name)));
        output.push_str(&format!(
            "  graph [rankdir={}, splines={}, pad={}, nodesep={}, concentrate={}];\n",
            config.rankdir.as_str(),
            quote(&config.splines),
            quote(&config.pad),
            quote(&config.nodesep),
            config.concentrate,
        ));
        output.push('\n');

        for vertex in self.vertices() {
            output.push_str(&format!(
                "  {} [{}];\n",
                quote(&vertex.id),
                vertex_attributes(vertex, &config.fontname).join(", ")
            ));
        }

        output.push('\n');

        for edge in self.edges() {
            output.push_str(&format!(
                "  {} -> {} [{}];\n",
                quote(&edge.from),
                quote(&edge.to),
                edge_attributes(edge).join(", ")
            ));
        }

        output.push_str("}\n");
        output
    }
}

fn vertex_attributes(vertex: &Vertex, fontname: &str) -> Vec<String> {
    let mut attrs = vec![format!("label={}", quote(&vertex.label))];

    let style: &[(&str, &str)] = match vertex.kind {
        VertexKind::DataSource(_) => &[("shape", "cylinder"), ("style", "filled"), ("fillcolor", "yellowgreen")],
        VertexKind::Transformation(_) => &[("shape", "box"), ("style", "rounded")],
        VertexKind::CalculatedAttributes => &[
            ("shape", "note"),
            ("style", "filled"),
            ("fillcolor", "powderblue"),
            ("fontsize", "9"),
        ],
        VertexKind::Filter => &[
            ("shape", "note"),
            ("style", "filled"),
            ("fillcolor", "lightgoldenrod"),
            ("fontsize", "9"),
        ],
        VertexKind::Unresolved => &[
            ("shape", "box"),
            ("style", "rounded"),
            ("fontsize", "10"),
            ("height", "0.5"),
            ("width", "2.5"),
        ],
        VertexKind::Output => &[("shape", "oval"), ("style", "rounded,filled"), ("fillcolor", "lightblue")],
    };

    attrs.extend(style.iter().map(|(key, value)| format!("{}={}", key, quote(value))));

    if vertex.kind != VertexKind::Unresolved {
        attrs.push(format!("fontname={}", quote(fontname)));
    }

    attrs
}

fn edge_attributes(edge: &Edge) -> Vec<String> {
    let mut attrs = Vec::new();

    if let Some(label) = &edge.label {
        attrs.push(format!("label={}", quote(label)));
    }
    if edge.kind == EdgeKind::Input {
        attrs.push("fontsize=\"9\"".to_string());
    }

    attrs.push("arrowsize=\"0.7\"".to_string());
    attrs.push("color=\"black\"".to_string());
    attrs
}

/// Quote a DOT identifier or label, escaping quotes, backslashes and newlines
fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        match ch {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => {}
            other => quoted.push(other),
        }
    }
    quoted.push('"');
    quoted
}
