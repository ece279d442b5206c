//! Calculation view document parsing
//!
//! This crate handles:
//! - Reading the XML document into a namespace-aware element tree
//! - Extracting general metadata, data sources, transformation nodes and
//!   the logical model into a [`calcview_core::CalculationViewModel`]

pub mod xml;
pub mod extractor;

pub use xml::{DocumentParseError, CALCULATION_NS, XSI_NS};
pub use extractor::ModelExtractor;
