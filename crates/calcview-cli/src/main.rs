use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use calcview_core::{AnalysisReport, CalculationViewModel, Config, NOT_AVAILABLE};
use calcview_extract::ModelExtractor;
use calcview_graph::DataFlowGraph;

/// Calcview - Calculation view analyzer and data-flow grapher
#[derive(Parser)]
#[command(name = "calcview")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: calcview.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print an analysis report for a calculation view
    Analyze {
        /// Calculation view XML file
        file: PathBuf,

        /// Report format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write the data-flow graph in GraphViz DOT format
    Graph {
        /// Calculation view XML file
        file: PathBuf,

        /// Output file (default: <view id>_data_flow.dot)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Markdown,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    // Load config if specified
    let config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else if Path::new("calcview.toml").exists() {
        Config::from_file(Path::new("calcview.toml"))?
    } else {
        if cli.verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Config::default()
    };

    match cli.command {
        Commands::Analyze { file, format, output } => {
            analyze_command(&config, &file, format, output.as_deref(), cli.verbose)
        }
        Commands::Graph { file, output } => {
            graph_command(&config, &file, output.as_deref(), cli.verbose)
        }
    }
}

/// Read and extract a calculation view document
fn load_model(path: &Path, verbose: bool) -> Result<CalculationViewModel> {
    if verbose {
        eprintln!("{} {}", "Loading calculation view from:".cyan(), path.display());
    }

    let xml = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let model = ModelExtractor::analyze(&xml)
        .with_context(|| format!("Error parsing XML file {}", path.display()))?;

    tracing::debug!(path = %path.display(), nodes = model.nodes.len(), "Loaded calculation view");
    Ok(model)
}

/// Analyze command - report on the view's structure
fn analyze_command(
    config: &Config,
    file: &Path,
    format: OutputFormat,
    output: Option<&Path>,
    verbose: bool,
) -> Result<()> {
    let model = load_model(file, verbose)?;
    let report = AnalysisReport::from_model(&model);

    if let Some(path) = output {
        let content = match format {
            OutputFormat::Text => {
                colored::control::set_override(false);
                render_text_report(&report, config)
            }
            OutputFormat::Json => report.to_json()?,
            OutputFormat::Markdown => generate_markdown_report(&report, config),
        };

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        eprintln!("{} {}", "Report saved to:".green(), path.display());
        return Ok(());
    }

    match format {
        OutputFormat::Text => print!("{}", render_text_report(&report, config)),
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Markdown => print!("{}", generate_markdown_report(&report, config)),
    }

    Ok(())
}

/// Graph command - write the DOT description
fn graph_command(config: &Config, file: &Path, output: Option<&Path>, verbose: bool) -> Result<()> {
    let model = load_model(file, verbose)?;

    if verbose {
        eprintln!("{}", "Building data-flow graph...".cyan());
    }

    let graph = DataFlowGraph::compile(&model, &config.graph);
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_graph_path(&graph));

    std::fs::write(&output, graph.to_dot())
        .with_context(|| format!("Failed to write {}", output.display()))?;

    if verbose {
        eprintln!(
            "{} vertices, {} edges",
            graph.vertices().len(),
            graph.edges().len()
        );
    }
    eprintln!("{} {}", "Graph saved to:".green(), output.display());

    Ok(())
}

fn default_graph_path(graph: &DataFlowGraph) -> PathBuf {
    PathBuf::from(format!("{}_data_flow.dot", graph.name))
}

fn or_na(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or(NOT_AVAILABLE)
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

/// Colored terminal rendering of the report
fn render_text_report(report: &AnalysisReport, config: &Config) -> String {
    let mut out = String::new();
    let rule = "=".repeat(60).bright_blue().to_string();

    out.push_str(&format!("\n{}\n", rule));
    out.push_str(&format!("{}\n", "Calculation View Analysis Report".bold().bright_blue()));
    out.push_str(&format!("{}\n\n", rule));

    let general = &report.general;
    out.push_str(&format!("{}\n", "General Information:".bold()));
    out.push_str(&format!("  ID:                        {}\n", or_na(&general.id).green()));
    out.push_str(&format!("  Type:                      {}\n", or_na(&general.data_category)));
    out.push_str(&format!("  Visibility:                {}\n", or_na(&general.visibility)));
    out.push_str(&format!(
        "  Calculation Scenario Type: {}\n",
        or_na(&general.calculation_scenario_type)
    ));
    out.push_str(&format!("  Output View Type:          {}\n", or_na(&general.output_view_type)));
    out.push_str(&format!("  Last Changed:              {}\n\n", general.changed_at));

    out.push_str(&format!("{}\n", "Final Output:".bold()));
    if report.final_output.dimensions.is_empty() && report.final_output.measures.is_empty() {
        out.push_str("  No logical model\n");
    }
    if !report.final_output.dimensions.is_empty() {
        out.push_str("  Dimensions:\n");
        for dim in &report.final_output.dimensions {
            out.push_str(&format!("    - {} {}\n", dim.id.yellow(), or_dash(&dim.description)));
        }
    }
    if !report.final_output.measures.is_empty() {
        out.push_str("  Measures:\n");
        for measure in &report.final_output.measures {
            out.push_str(&format!(
                "    - {} [{}] {}\n",
                measure.id.yellow(),
                or_na(&measure.aggregation_type),
                or_dash(&measure.description)
            ));
        }
    }
    out.push('\n');

    out.push_str(&format!("{}\n", "Data Sources:".bold()));
    for source in &report.data_sources {
        if config.report.include_source_ids {
            out.push_str(&format!("  - {} ", source.id.cyan()));
        } else {
            out.push_str("  - ");
        }
        out.push_str(&format!("{} ({}, {})\n", source.name, source.kind.as_str(), source.schema));
    }
    out.push('\n');

    out.push_str(&format!("{}\n", "Calculated Attributes:".bold()));
    let mut any = false;
    for (view_id, node) in &report.calculation_views {
        for attr in &node.calculated_attributes {
            any = true;
            out.push_str(&format!(
                "  {} on {} ({})\n      {}\n",
                attr.id.yellow(),
                view_id,
                or_na(&attr.datatype),
                attr.formula
            ));
        }
    }
    if !any {
        out.push_str(&format!("  {}\n", "None".green()));
    }
    out.push('\n');

    out.push_str(&format!("{}\n", "Filters:".bold()));
    let mut any = false;
    for (view_id, node) in &report.calculation_views {
        if let Some(filter) = &node.filter {
            any = true;
            out.push_str(&format!("  {}\n      {}\n", view_id.yellow(), filter));
        }
    }
    if !any {
        out.push_str(&format!("  {}\n", "None".green()));
    }
    out.push('\n');

    out.push_str(&format!("{}\n", "Join Details:".bold()));
    let mut any = false;
    for (view_id, node) in &report.calculation_views {
        for detail in &node.join_details {
            any = true;
            out.push_str(&format!("  {}\n", view_id.yellow()));
            out.push_str(&format!("      Join Type:      {}\n", detail.join_type));
            out.push_str(&format!("      Left Table:     {}\n", detail.left_table));
            out.push_str(&format!("      Right Table:    {}\n", detail.right_table));
            out.push_str(&format!("      Join Attribute: {}\n", detail.join_attribute));
            out.push_str(&format!("      Join Columns:   {}\n", detail.join_columns.join(", ")));
        }
    }
    if !any {
        out.push_str(&format!("  {}\n", "None".green()));
    }

    out.push_str(&format!("\n{}\n", rule));
    out
}

/// Escape a value for a markdown table cell
fn md_cell(value: &str) -> String {
    if value.is_empty() {
        return "-".to_string();
    }
    value.replace('|', "\\|").replace('\n', " ")
}

fn generate_markdown_report(report: &AnalysisReport, config: &Config) -> String {
    let mut md = String::new();

    md.push_str("# Calculation View Analysis Report\n\n");
    md.push_str(&format!("**Version:** {}\n\n", report.version));
    md.push_str(&format!("**Timestamp:** {}\n\n", report.timestamp));

    md.push_str("## Summary\n\n");
    md.push_str(&format!("- Data sources: {}\n", report.summary.data_sources));
    md.push_str(&format!("- Calculation views: {}\n", report.summary.nodes));
    md.push_str(&format!("- Joins: {}\n", report.summary.joins));
    md.push_str(&format!("- Filters: {}\n", report.summary.filters));
    md.push_str(&format!("- Calculated attributes: {}\n", report.summary.calculated_attributes));
    md.push_str(&format!("- Dimensions: {}\n", report.summary.dimensions));
    md.push_str(&format!("- Measures: {}\n", report.summary.measures));
    md.push('\n');

    let general = &report.general;
    md.push_str("## General Information\n\n");
    md.push_str(&format!("- **ID:** `{}`\n", or_na(&general.id)));
    md.push_str(&format!("- **Type:** `{}`\n", or_na(&general.data_category)));
    md.push_str(&format!("- **Visibility:** `{}`\n", or_na(&general.visibility)));
    md.push_str(&format!(
        "- **Calculation Scenario Type:** `{}`\n",
        or_na(&general.calculation_scenario_type)
    ));
    md.push_str(&format!("- **Output View Type:** `{}`\n", or_na(&general.output_view_type)));
    md.push_str(&format!("- **Last Changed:** `{}`\n\n", general.changed_at));

    md.push_str("## Final Output\n\n");
    md.push_str("### Dimensions\n\n");
    if report.final_output.dimensions.is_empty() {
        md.push_str("No dimensions.\n\n");
    } else {
        md.push_str("| ID | Description |\n|---|---|\n");
        for dim in &report.final_output.dimensions {
            md.push_str(&format!("| {} | {} |\n", md_cell(&dim.id), md_cell(&dim.description)));
        }
        md.push('\n');
    }
    if !report.final_output.measures.is_empty() {
        md.push_str("### Measures\n\n");
        md.push_str("| ID | Aggregation | Description |\n|---|---|---|\n");
        for measure in &report.final_output.measures {
            md.push_str(&format!(
                "| {} | {} | {} |\n",
                md_cell(&measure.id),
                md_cell(or_na(&measure.aggregation_type)),
                md_cell(&measure.description)
            ));
        }
        md.push('\n');
    }

    md.push_str("## Data Sources\n\n");
    if config.report.include_source_ids {
        md.push_str("| ID | Name | Type | Schema |\n|---|---|---|---|\n");
    } else {
        md.push_str("| Name | Type | Schema |\n|---|---|---|\n");
    }
    for source in &report.data_sources {
        if config.report.include_source_ids {
            md.push_str(&format!("| {} ", md_cell(&source.id)));
        }
        md.push_str(&format!(
            "| {} | {} | {} |\n",
            md_cell(&source.name),
            md_cell(source.kind.as_str()),
            md_cell(&source.schema)
        ));
    }
    md.push('\n');

    md.push_str("## Calculated Attributes\n\n");
    for (view_id, node) in &report.calculation_views {
        for attr in &node.calculated_attributes {
            md.push_str(&format!("### `{}` on `{}`\n\n", attr.id, view_id));
            md.push_str(&format!("**Datatype:** `{}`\n\n", or_na(&attr.datatype)));
            md.push_str(&format!("```\n{}\n```\n\n", attr.formula));
        }
    }

    md.push_str("## Filters\n\n");
    for (view_id, node) in &report.calculation_views {
        if let Some(filter) = &node.filter {
            md.push_str(&format!("### `{}`\n\n", view_id));
            md.push_str(&format!("```\n{}\n```\n\n", filter));
        }
    }

    md.push_str("## Join Details\n\n");
    for (view_id, node) in &report.calculation_views {
        for detail in &node.join_details {
            md.push_str(&format!("### `{}`\n\n", view_id));
            md.push_str(&format!("- **Join Type:** `{}`\n", detail.join_type));
            md.push_str(&format!("- **Left Table:** `{}`\n", detail.left_table));
            md.push_str(&format!("- **Right Table:** `{}`\n", detail.right_table));
            md.push_str(&format!("- **Join Attribute:** `{}`\n", detail.join_attribute));
            md.push_str(&format!("- **Join Columns:** `{}`\n\n", detail.join_columns.join(", ")));
        }
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;

    const SALES: &str = include_str!("../../../fixtures/sales_analysis.calculationview");

    fn sales_report() -> AnalysisReport {
        let model = ModelExtractor::analyze(SALES).unwrap();
        AnalysisReport::from_model(&model)
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_analyze_arguments() {
        let cli = Cli::try_parse_from(["calcview", "analyze", "view.xml", "--format", "markdown", "-v"])
            .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Analyze { file, format, output } => {
                assert_eq!(file, PathBuf::from("view.xml"));
                assert_eq!(format, OutputFormat::Markdown);
                assert!(output.is_none());
            }
            Commands::Graph { .. } => panic!("expected analyze"),
        }
    }

    #[test]
    fn markdown_report_sections() {
        let md = generate_markdown_report(&sales_report(), &Config::default());

        for heading in [
            "## General Information",
            "## Final Output",
            "### Measures",
            "## Data Sources",
            "## Calculated Attributes",
            "## Filters",
            "## Join Details",
        ] {
            assert!(md.contains(heading), "missing {}", heading);
        }
        assert!(md.contains("- **ID:** `CV_SALES_ANALYSIS`"));
        assert!(md.contains("| ORDERS | DATA_BASE_TABLE | SALES |"));
        assert!(md.contains("| NET_AMOUNT | sum | Net amount |"));
        assert!(md.contains("- **Join Columns:** `REGION_ID, COUNTRY`"));
        assert!(md.contains("```\n\"REGION\" != 'TEST'\n```"));
        // The duplicate source appears once
        assert_eq!(md.matches("| ORDERS |").count(), 1);
    }

    #[test]
    fn markdown_report_source_ids() {
        let mut config = Config::default();
        config.report.include_source_ids = true;

        let md = generate_markdown_report(&sales_report(), &config);
        assert!(md.contains("| ID | Name | Type | Schema |"));
        assert!(md.contains("| CV_REGIONS | CV_REGIONS | CALCULATION_VIEW | sales.models/calculationviews |"));
    }

    #[test]
    fn text_report_sections() {
        colored::control::set_override(false);
        let text = render_text_report(&sales_report(), &Config::default());

        assert!(text.contains("ID:                        CV_SALES_ANALYSIS"));
        assert!(text.contains("Last Changed:              2024-03-12 09:15:41.0"));
        assert!(text.contains("  - ORDERS (DATA_BASE_TABLE, SALES)"));
        assert!(text.contains("    - ORDER_COUNT [count] -"));
        assert!(text.contains("NET_AMOUNT on Join_1 (DECIMAL)"));
        assert!(text.contains("Join Columns:   CUSTOMER_ID"));
    }

    #[test]
    fn default_graph_path_uses_view_id() {
        let model = ModelExtractor::analyze(SALES).unwrap();
        let graph = DataFlowGraph::from_model(&model);
        assert_eq!(
            default_graph_path(&graph),
            PathBuf::from("CV_SALES_ANALYSIS_data_flow.dot")
        );
    }
}
