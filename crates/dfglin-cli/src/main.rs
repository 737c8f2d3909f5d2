use clap::Parser as ClapParser;
use dfglin::{AnalysisReport, AnalyzerOptions, OperatorKind, analyze};
use log::{debug, info};
use miette::{IntoDiagnostic, Result, WrapErr};
use std::fs;
use std::path::PathBuf;

#[derive(ClapParser)]
#[command(name = "dfglin", about = "Classify DFG bindings as linear or nonlinear")]
struct Cli {
    /// DFG dump to analyze
    input: PathBuf,

    /// TOML file with analyzer options
    #[arg(long)]
    config: Option<PathBuf>,

    /// Treat an operator kind as linear (repeatable)
    #[arg(long, value_name = "KIND", value_parser = parse_kind)]
    linear: Vec<OperatorKind>,

    /// Treat an operator kind as nonlinear (repeatable)
    #[arg(long, value_name = "KIND", value_parser = parse_kind)]
    nonlinear: Vec<OperatorKind>,

    /// Print the full report as JSON
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_kind(token: &str) -> std::result::Result<OperatorKind, String> {
    OperatorKind::from_token(token).ok_or_else(|| format!("unknown operator kind `{token}`"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut options = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .into_diagnostic()
                .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
            AnalyzerOptions::from_toml_str(&text).into_diagnostic()?
        }
        None => AnalyzerOptions::default(),
    };
    for &kind in &cli.linear {
        options.policy = options.policy.with_linear(kind);
    }
    for &kind in &cli.nonlinear {
        options.policy = options.policy.with_nonlinear(kind);
    }

    debug!(
        "Linear operator kinds: {:?}",
        options.policy.linear_kinds().collect::<Vec<_>>()
    );

    info!("Analyzing {}", cli.input.display());
    let text = fs::read_to_string(&cli.input)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to read {}", cli.input.display()))?;
    let report = analyze(&text, &options).into_diagnostic()?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report).into_diagnostic()?);
    } else {
        print_summary(&report);
    }
    Ok(())
}

fn print_summary(report: &AnalysisReport) {
    let summary = &report.summary;
    println!(
        "bindings: {} (linear {}, nonlinear {}, parse errors {})",
        summary.total, summary.linear_count, summary.nonlinear_count, summary.parse_error_count
    );
    println!(
        "linearity: {:.1}%  nonlinearity: {:.1}%",
        summary.linearity_ratio * 100.0,
        summary.nonlinearity_ratio * 100.0
    );
    println!("register updates: {}", report.storage_bindings);
    for instance in &report.instances {
        println!("instance: {} ({})", instance.name, instance.module);
    }

    if !report.trigger_frequency.is_empty() {
        println!("\nnonlinear triggers:");
        for (trigger, count) in &report.trigger_frequency {
            println!("  {trigger:<12} {count}");
        }
    }

    let nonlinear: Vec<_> = report.bindings.iter().filter(|b| !b.is_linear).collect();
    if !nonlinear.is_empty() {
        println!("\nnonlinear bindings:");
        for binding in nonlinear {
            match (&binding.error, &binding.trigger) {
                (Some(err), _) => println!("  {}: {}", binding.dest, err),
                (None, Some(trigger)) => println!("  {}: {}", binding.dest, trigger),
                (None, None) => println!("  {}", binding.dest),
            }
        }
    }

    let graph = &report.graph;
    println!(
        "\ngraph: {} nodes, {} resolved by topological sort",
        graph.fan_in.len(),
        graph.kahn_resolved
    );
    for scc in &graph.sccs {
        println!("  cycle: {}", scc.join(" -> "));
    }
    let chain = &graph.longest_linear_chain;
    if chain.length > 0 {
        println!(
            "  longest linear chain ({}): {}",
            chain.length,
            chain.path.join(" -> ")
        );
    }
    for path in &graph.critical_paths {
        println!("  critical path: {}", path.nodes.join(" -> "));
    }
    for path in &graph.output_paths {
        println!(
            "  output {}: {:?} ({} signals in cone)",
            path.output,
            path.kind,
            path.cone.len()
        );
    }
    for entry in &graph.high_fanout {
        println!(
            "  high fan-in/out: {} (in {}, out {})",
            entry.name, entry.fan_in, entry.fan_out
        );
    }
    for rejected in &report.rejected_entries {
        println!("  skipped: {rejected}");
    }
}
