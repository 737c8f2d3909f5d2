use crate::analyzer::{GraphAnalysis, analyze_graph};
use crate::graph::build_graph;
use crate::ir::{Dfg, Instance, Node, OperatorKind, RoleFlag};
use crate::linearity::{Complexity, LinearitySummary, Trigger, Verdict, classify_all};
use crate::options::AnalyzerOptions;
use crate::parser::{ParserError, parse};
use log::info;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindingReport {
    pub dest: String,
    pub is_linear: bool,
    /// The destination is declared as a register.
    pub is_storage: bool,
    pub trigger: Option<Trigger>,
    /// Parse failure message; `None` for classified bindings.
    pub error: Option<String>,
    pub operators: BTreeMap<OperatorKind, usize>,
    pub operator_count: usize,
    pub complexity: Option<Complexity>,
    pub expression: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub instances: Vec<Instance>,
    pub declared_signals: usize,
    pub summary: LinearitySummary,
    pub bindings: Vec<BindingReport>,
    /// Bindings that update a register.
    pub storage_bindings: usize,
    /// Occurrences of each nonlinear trigger, `parse-error` included.
    pub trigger_frequency: BTreeMap<String, usize>,
    pub operator_histogram: BTreeMap<OperatorKind, usize>,
    pub complexity_levels: BTreeMap<Complexity, usize>,
    pub rejected_entries: Vec<String>,
    pub graph: GraphAnalysis,
}

impl AnalysisReport {
    /// Classifies, builds the graph and analyzes an already parsed dump.
    pub fn from_dfg(dfg: &Dfg, options: &AnalyzerOptions) -> Self {
        let verdicts = classify_all(&dfg.bindings, &options.policy);
        let graph = build_graph(&dfg.descriptors, &dfg.bindings);
        let analysis = analyze_graph(&graph, &verdicts, options);

        let mut trigger_frequency: BTreeMap<String, usize> = BTreeMap::new();
        let mut operator_histogram: BTreeMap<OperatorKind, usize> = BTreeMap::new();
        let mut complexity_levels: BTreeMap<Complexity, usize> = BTreeMap::new();
        let mut bindings = Vec::with_capacity(dfg.bindings.len());

        for binding in &dfg.bindings {
            let Some(verdict) = verdicts.get(&binding.dest) else {
                continue;
            };
            if let Some(trigger) = &verdict.trigger {
                *trigger_frequency.entry(trigger.to_string()).or_default() += 1;
            }
            for (&kind, &count) in &verdict.operators {
                *operator_histogram.entry(kind).or_default() += count;
            }
            let complexity = binding.tree.is_ok().then(|| verdict.complexity());
            if let Some(level) = complexity {
                *complexity_levels.entry(level).or_default() += 1;
            }
            let is_storage = dfg
                .descriptor(&binding.dest)
                .is_some_and(|d| d.has_role(RoleFlag::Register));
            bindings.push(binding_report(
                &binding.dest,
                verdict,
                is_storage,
                binding.tree.as_ref().ok(),
            ));
        }

        let report = AnalysisReport {
            instances: dfg.instances.clone(),
            declared_signals: dfg.descriptors.len(),
            summary: LinearitySummary::from_verdicts(verdicts.values()),
            storage_bindings: bindings.iter().filter(|b| b.is_storage).count(),
            bindings,
            trigger_frequency,
            operator_histogram,
            complexity_levels,
            rejected_entries: dfg.rejected.iter().map(ToString::to_string).collect(),
            graph: analysis,
        };
        info!(
            "{} bindings: {} linear, {} nonlinear, {} unparseable",
            report.summary.total,
            report.summary.linear_count,
            report.summary.nonlinear_count,
            report.summary.parse_error_count
        );
        report
    }

    pub fn binding(&self, dest: &str) -> Option<&BindingReport> {
        self.bindings.iter().find(|b| b.dest == dest)
    }
}

fn binding_report(
    dest: &str,
    verdict: &Verdict,
    is_storage: bool,
    tree: Option<&Node>,
) -> BindingReport {
    let error = match &verdict.trigger {
        Some(Trigger::ParseError(err)) => Some(err.to_string()),
        _ => None,
    };
    BindingReport {
        dest: dest.to_string(),
        is_linear: verdict.is_linear,
        is_storage,
        trigger: verdict.trigger.clone(),
        error,
        operators: verdict.operators.clone(),
        operator_count: verdict.operator_count(),
        complexity: tree.map(|_| verdict.complexity()),
        expression: tree.map(ToString::to_string),
    }
}

/// Parses `text` and runs the whole analysis pipeline.
pub fn analyze(text: &str, options: &AnalyzerOptions) -> Result<AnalysisReport, ParserError> {
    let dfg = parse(text)?;
    Ok(AnalysisReport::from_dfg(&dfg, options))
}
