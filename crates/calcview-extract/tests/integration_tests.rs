//! Integration tests for model extraction

use calcview_core::{DataSource, NodeKind, SourceKind};
use calcview_extract::ModelExtractor;
use pretty_assertions::assert_eq;

const SALES: &str = include_str!("../../../fixtures/sales_analysis.calculationview");
const SIMPLE: &str = include_str!("../../../fixtures/single_projection.calculationview");
const MALFORMED: &str = include_str!("../../../fixtures/malformed.calculationview");

fn source(id: &str, name: &str, kind: SourceKind, schema: &str) -> DataSource {
    DataSource {
        id: id.to_string(),
        name: name.to_string(),
        kind,
        schema: schema.to_string(),
    }
}

#[test]
fn single_projection_model() {
    let model = ModelExtractor::analyze(SIMPLE).unwrap();

    let unique: Vec<DataSource> = model.data_sources.unique().into_iter().cloned().collect();
    assert_eq!(unique, vec![source("DS_1", "T1", SourceKind::DatabaseTable, "S1")]);

    assert_eq!(model.nodes.len(), 1);
    let v1 = &model.nodes["V1"];
    assert_eq!(v1.kind, NodeKind::Projection);
    assert_eq!(v1.inputs, vec!["DS_1".to_string()]);
    assert_eq!(v1.filter, None);
    assert!(v1.calculated_attributes.is_empty());

    assert_eq!(model.final_schema.dimensions.len(), 1);
    assert_eq!(model.final_schema.dimensions[0].id, "COL_A");
    assert!(model.final_schema.measures.is_empty());
}

#[test]
fn sales_general_info() {
    let model = ModelExtractor::analyze(SALES).unwrap();

    assert_eq!(model.general.id.as_deref(), Some("CV_SALES_ANALYSIS"));
    assert_eq!(model.general.data_category.as_deref(), Some("CUBE"));
    assert_eq!(model.general.visibility.as_deref(), Some("reportingEnabled"));
    assert_eq!(model.general.calculation_scenario_type.as_deref(), Some("TREE_BASED"));
    assert_eq!(model.general.output_view_type.as_deref(), Some("Aggregation"));
    assert_eq!(model.general.changed_at, "2024-03-12 09:15:41.0");
}

#[test]
fn sales_data_sources_deduplicate() {
    let model = ModelExtractor::analyze(SALES).unwrap();

    assert_eq!(model.data_sources.len(), 4);

    let unique: Vec<DataSource> = model.data_sources.unique().into_iter().cloned().collect();
    assert_eq!(
        unique,
        vec![
            source("ORDERS", "ORDERS", SourceKind::DatabaseTable, "SALES"),
            source("CUSTOMERS", "CUSTOMERS", SourceKind::DatabaseTable, "SALES"),
            source(
                "CV_REGIONS",
                "CV_REGIONS",
                SourceKind::CalculationView,
                "sales.models/calculationviews"
            ),
        ]
    );

    // Both identifiers of the duplicated table resolve to the same row
    let archived = model.data_sources.resolve("ORDERS_ARCHIVE").unwrap();
    let original = model.data_sources.resolve("ORDERS").unwrap();
    assert_eq!(archived, original);
    assert_eq!(archived.id, "ORDERS");
}

#[test]
fn sales_nodes_in_document_order() {
    let model = ModelExtractor::analyze(SALES).unwrap();

    let ids: Vec<&str> = model.nodes.keys().map(String::as_str).collect();
    assert_eq!(
        ids,
        vec!["Projection_1", "Projection_2", "Projection_3", "Join_1", "Union_1", "Join_2", "Aggregation_1"]
    );
    assert_eq!(model.last_node().map(|n| n.id.as_str()), Some("Aggregation_1"));
}

#[test]
fn sales_filters() {
    let model = ModelExtractor::analyze(SALES).unwrap();

    assert_eq!(
        model.nodes["Projection_1"].filter.as_deref(),
        Some("(\"STATUS\" = 'OPEN') and (\"AMOUNT\" > 0)")
    );
    // Whitespace-only filter text is no filter
    assert_eq!(model.nodes["Projection_3"].filter, None);
    assert_eq!(model.nodes["Projection_2"].filter, None);
}

#[test]
fn sales_join_details() {
    let model = ModelExtractor::analyze(SALES).unwrap();

    let join_1 = model.nodes["Join_1"].join_detail().unwrap();
    assert_eq!(join_1.join_type, "leftOuter");
    assert_eq!(join_1.left_table, "Projection_1");
    assert_eq!(join_1.right_table, "Projection_2");
    assert_eq!(join_1.join_attribute, "CUSTOMER_ID");
    assert_eq!(join_1.join_columns, vec!["CUSTOMER_ID".to_string()]);

    let join_2 = model.nodes["Join_2"].join_detail().unwrap();
    assert_eq!(join_2.join_type, "inner");
    assert_eq!(join_2.join_attribute, "REGION_ID");
    assert_eq!(join_2.join_columns, vec!["REGION_ID".to_string(), "COUNTRY".to_string()]);

    // Unions never get join details
    assert!(model.nodes["Union_1"].join_details.is_empty());
}

#[test]
fn sales_calculated_attributes() {
    let model = ModelExtractor::analyze(SALES).unwrap();

    let attrs = &model.nodes["Join_1"].calculated_attributes;
    assert_eq!(attrs.len(), 1);
    assert_eq!(attrs[0].id, "NET_AMOUNT");
    assert_eq!(attrs[0].datatype.as_deref(), Some("DECIMAL"));
    assert_eq!(attrs[0].formula, "\"AMOUNT\" - \"DISCOUNT\"");

    // An empty container yields no attributes
    assert!(model.nodes["Projection_1"].calculated_attributes.is_empty());
}

#[test]
fn sales_final_schema() {
    let model = ModelExtractor::analyze(SALES).unwrap();
    let schema = &model.final_schema;

    let dims: Vec<(&str, &str)> = schema
        .dimensions
        .iter()
        .map(|d| (d.id.as_str(), d.description.as_str()))
        .collect();
    assert_eq!(
        dims,
        vec![("REGION", "Region"), ("CUSTOMER_NAME", "Customer name"), ("ORDER_YEAR", "")]
    );
    assert!(schema.dimensions[1].hierarchy_active);
    assert!(!schema.dimensions[0].hierarchy_active);

    let measures: Vec<(&str, Option<&str>, &str)> = schema
        .measures
        .iter()
        .map(|m| (m.id.as_str(), m.aggregation_type.as_deref(), m.description.as_str()))
        .collect();
    assert_eq!(
        measures,
        vec![("NET_AMOUNT", Some("sum"), "Net amount"), ("ORDER_COUNT", Some("count"), "")]
    );
    assert_eq!(schema.column_count(), 5);
}

#[test]
fn join_with_three_inputs_has_no_details() {
    let xml = r##"<Calculation:scenario xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
            xmlns:Calculation="http://www.sap.com/ndb/BiModelCalculation.ecore" id="CV">
        <calculationViews>
          <calculationView xsi:type="Calculation:JoinView" id="Join_1" joinType="inner">
            <input node="#A"/>
            <input node="#B"/>
            <input node="#C"/>
            <joinAttribute name="ID"/>
          </calculationView>
        </calculationViews>
      </Calculation:scenario>"##;

    let model = ModelExtractor::analyze(xml).unwrap();
    let join = &model.nodes["Join_1"];
    assert_eq!(join.kind, NodeKind::Join);
    assert_eq!(join.inputs.len(), 3);
    assert!(join.join_details.is_empty());
}

#[test]
fn qualified_join_attributes_are_collected() {
    let xml = r##"<Calculation:scenario xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
            xmlns:Calculation="http://www.sap.com/ndb/BiModelCalculation.ecore" id="CV">
        <calculationViews>
          <calculationView xsi:type="Calculation:JoinView" id="J" joinType="text">
            <input node="#L"/>
            <input node="#R"/>
            <Calculation:joinAttribute name="A"/>
            <joinAttribute name="B"/>
          </calculationView>
        </calculationViews>
      </Calculation:scenario>"##;

    let model = ModelExtractor::analyze(xml).unwrap();
    let detail = model.nodes["J"].join_detail().unwrap();
    assert_eq!(detail.join_columns, vec!["A".to_string(), "B".to_string()]);
    assert_eq!(model.nodes["J"].join_attributes, detail.join_columns);
}

#[test]
fn missing_logical_model_is_empty_schema() {
    let xml = r#"<Calculation:scenario xmlns:Calculation="http://www.sap.com/ndb/BiModelCalculation.ecore" id="CV"/>"#;

    let model = ModelExtractor::analyze(xml).unwrap();
    assert!(model.final_schema.dimensions.is_empty());
    assert!(model.final_schema.measures.is_empty());
    assert!(model.nodes.is_empty());
    assert!(model.data_sources.is_empty());
}

#[test]
fn malformed_document_is_parse_error() {
    let err = ModelExtractor::analyze(MALFORMED).unwrap_err();
    assert!(err.line > 1);
    assert!(err.to_string().starts_with("XML parsing failed at line"));
}

#[test]
fn plain_text_is_parse_error() {
    assert!(ModelExtractor::analyze("this is not xml").is_err());
}

#[test]
fn ill_formed_documents_are_rejected() {
    let cases = [
        ("empty document", ""),
        ("unbound element prefix", r#"<Calculation:scenario id="CV"/>"#),
        (
            "unbound attribute prefix",
            r#"<scenario><calculationViews><calculationView xsi:type="Calculation:JoinView" id="J"/></calculationViews></scenario>"#,
        ),
        ("name starting with a digit", "<1scenario/>"),
        ("attributes without separating whitespace", r#"<scenario id="A"dataCategory="CUBE"/>"#),
        ("unquoted attribute value", "<scenario id=CV/>"),
        ("duplicate attribute", r#"<scenario id="A" id="B"/>"#),
        ("'<' in attribute value", r#"<scenario id="a<b"/>"#),
        ("']]>' in text", "<scenario>a ]]> b</scenario>"),
        ("'--' in comment", "<scenario><!-- a -- b --></scenario>"),
        ("declaration after the root", r#"<scenario/><?xml version="1.0"?>"#),
        ("declaration after whitespace", "\n<?xml version=\"1.0\"?><scenario/>"),
        ("second root element", "<scenario/><scenario/>"),
        ("text after the root", "<scenario/>trailing"),
        ("control character", "<scenario>\u{1}</scenario>"),
        ("control character in attribute", "<scenario id=\"a\u{1}\"/>"),
        ("mismatched end tag", "<scenario><dataSources></scenario>"),
        ("unclosed root", "<scenario><dataSources/>"),
    ];

    for (name, xml) in cases {
        assert!(
            ModelExtractor::analyze(xml).is_err(),
            "{} should be rejected",
            name
        );
    }
}

#[test]
fn well_formed_prolog_and_epilog_are_accepted() {
    let xml = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
               <!-- exported view -->\n\
               <scenario id=\"CV\" xml:lang=\"en\"><descriptions defaultDescription=\"a &amp; b\"/></scenario>\n\
               <!-- trailer -->\n";

    let model = ModelExtractor::analyze(xml).unwrap();
    assert_eq!(model.general.id.as_deref(), Some("CV"));
}

#[test]
fn parse_error_reports_character_column() {
    let err = ModelExtractor::analyze("<scenario name=\"Übersicht\" id=\"a<b\"/>").unwrap_err();
    assert_eq!(err.line, 1);
    assert_eq!(err.column, 1);

    let err = ModelExtractor::analyze("<scenario>\n  <ü/><Bad:x/>\n</scenario>").unwrap_err();
    assert_eq!(err.line, 2);
    assert_eq!(err.column, 7);
}
