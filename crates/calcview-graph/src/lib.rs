//! Calcview Graph
//!
//! This crate implements the data-flow graph compiler:
//! - Label formatting for sources, nodes, annotations and joins
//! - Graph construction from a [`calcview_core::CalculationViewModel`]
//! - GraphViz DOT rendering

pub mod labels;
pub mod graph;
pub mod dot;

pub use graph::{DataFlowGraph, Edge, EdgeKind, Vertex, VertexId, VertexKind};
