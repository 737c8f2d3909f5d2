mod analyzer;
mod graph;
mod ir;
mod linearity;
mod options;
mod parser;
mod report;

pub(crate) use fxhash::FxHashMap as HashMap;
pub(crate) use fxhash::FxHashSet as HashSet;

pub use analyzer::{
    CriticalPath, FanoutEntry, GraphAnalysis, LinearChain, OutputPath, PathKind, analyze_graph,
};
pub use graph::{DependencyGraph, build_graph, collect_terminals};
pub use ir::{
    Binding, ConstantKind, Dfg, Instance, Node, OperatorCategory, OperatorKind, RoleFlag,
    SignalDescriptor,
};
pub use linearity::{
    Complexity, LinearityPolicy, LinearitySummary, Trigger, Verdict, classify, classify_all,
};
pub use options::{AnalyzerOptions, OptionsError};
pub use parser::{
    EntryError, ExpressionError, MAX_NESTING_DEPTH, ParserError, parse, parse_expression,
    parse_int_literal,
};
pub use report::{AnalysisReport, BindingReport, analyze};
