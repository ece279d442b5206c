//! Label formatting for graph vertices and edges
//!
//! Pure functions only; the compiler decides where labels go, these decide
//! what they say. Labels use real newlines, the DOT renderer escapes them.

use calcview_core::{CalculatedAttribute, DataSource, JoinDetail, NodeKind, SourceKind, TransformationNode};

/// Replace underscores with spaces and title-case every word
///
/// A letter is upper-cased when the previous character is not a letter and
/// lower-cased otherwise, so `join_1` becomes `Join 1` and `CV_SALES` becomes
/// `Cv Sales`.
pub fn humanize(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    let mut previous_is_letter = false;

    for ch in id.chars() {
        let ch = if ch == '_' { ' ' } else { ch };
        if ch.is_alphabetic() {
            if previous_is_letter {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            out.push(ch);
            previous_is_letter = false;
        }
    }

    out
}

/// Node kind without the generic `View` suffix (`JoinView` -> `Join`)
pub fn node_kind_label(kind: &NodeKind) -> String {
    kind.as_str().replace("View", "")
}

/// Short source kind (`Table` / `View`)
pub fn source_kind_label(kind: &SourceKind) -> &str {
    match kind {
        SourceKind::DatabaseTable => "Table",
        SourceKind::CalculationView => "View",
        SourceKind::Other(raw) => raw,
    }
}

pub fn source_label(source: &DataSource) -> String {
    format!("{}\n({})", source.name, source_kind_label(&source.kind))
}

pub fn node_label(node: &TransformationNode) -> String {
    format!("{}\n({})", humanize(&node.id), node_kind_label(&node.kind))
}

pub fn output_label(column_count: usize) -> String {
    format!("Output\n({} columns)", column_count)
}

pub fn calculated_attributes_label(attributes: &[CalculatedAttribute]) -> String {
    let mut label = String::from("Calculated Attributes");
    for attr in attributes {
        label.push('\n');
        label.push_str(&format!("{}: {}", attr.id, attr.formula));
    }
    label
}

/// Filter text with each ` and ` connective moved onto its own line
///
/// Display aid only; the expression is not parsed.
pub fn filter_label(expression: &str) -> String {
    format!("(Filters)\n{}", expression.replace(" and ", "\n"))
}

/// Capitalize the known join type words (`inner` -> `Inner`)
pub fn join_type_label(join_type: &str) -> String {
    join_type
        .replace("outer", "Outer")
        .replace("inner", "Inner")
        .replace("text", "Text")
}

/// Join condition per declared column, pairing same-named columns on both sides
pub fn join_conditions(detail: &JoinDetail) -> Vec<String> {
    detail
        .join_columns
        .iter()
        .map(|column| {
            format!(
                "{}.{} = {}.{}",
                detail.left_table, column, detail.right_table, column
            )
        })
        .collect()
}

/// Label carried by every input edge of a join node
pub fn join_label(detail: &JoinDetail) -> String {
    let mut label = format!("Type: {}", join_type_label(&detail.join_type));

    let conditions = join_conditions(detail);
    if !conditions.is_empty() {
        label.push('\n');
        label.push_str(&conditions.join(" AND "));
    }

    label
}
