use crate::ir::{Binding, Node, OperatorKind};
use crate::parser::ExpressionError;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

const DEFAULT_LINEAR: [OperatorKind; 10] = [
    OperatorKind::Plus,
    OperatorKind::Minus,
    OperatorKind::UnaryMinus,
    OperatorKind::Uplus,
    OperatorKind::Sll,
    OperatorKind::Srl,
    OperatorKind::Sla,
    OperatorKind::Sra,
    OperatorKind::Concat,
    OperatorKind::Partselect,
];

/// The set of operator kinds treated as linear. Every other kind is
/// nonlinear. Alternate policies are built as new values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearityPolicy {
    linear: BTreeSet<OperatorKind>,
}

impl Default for LinearityPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_LINEAR)
    }
}

impl LinearityPolicy {
    pub fn new(linear: impl IntoIterator<Item = OperatorKind>) -> Self {
        Self {
            linear: linear.into_iter().collect(),
        }
    }

    pub fn is_linear(&self, kind: OperatorKind) -> bool {
        self.linear.contains(&kind)
    }

    pub fn with_linear(&self, kind: OperatorKind) -> Self {
        let mut linear = self.linear.clone();
        linear.insert(kind);
        Self { linear }
    }

    pub fn with_nonlinear(&self, kind: OperatorKind) -> Self {
        let mut linear = self.linear.clone();
        linear.remove(&kind);
        Self { linear }
    }

    pub fn linear_kinds(&self) -> impl Iterator<Item = OperatorKind> + '_ {
        self.linear.iter().copied()
    }

    pub fn nonlinear_kinds(&self) -> impl Iterator<Item = OperatorKind> + '_ {
        OperatorKind::ALL
            .into_iter()
            .filter(|kind| !self.linear.contains(kind))
    }
}

/// What made a verdict nonlinear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Operator(OperatorKind),
    Branch,
    /// Sentinel for a binding whose tree could not be parsed.
    ParseError(ExpressionError),
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Operator(kind) => write!(f, "{kind}"),
            Trigger::Branch => write!(f, "Branch"),
            Trigger::ParseError(_) => write!(f, "parse-error"),
        }
    }
}

impl Serialize for Trigger {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

impl Complexity {
    pub fn from_operator_count(count: usize) -> Self {
        match count {
            0..=1 => Complexity::Simple,
            2..=5 => Complexity::Moderate,
            _ => Complexity::Complex,
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Complexity::Simple => "simple",
            Complexity::Moderate => "moderate",
            Complexity::Complex => "complex",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub is_linear: bool,
    pub trigger: Option<Trigger>,
    /// Every operator kind in the subtree with its occurrence count.
    pub operators: BTreeMap<OperatorKind, usize>,
    pub branch_count: usize,
}

impl Verdict {
    fn linear() -> Self {
        Self {
            is_linear: true,
            trigger: None,
            operators: BTreeMap::new(),
            branch_count: 0,
        }
    }

    fn nonlinear(trigger: Trigger) -> Self {
        Self {
            is_linear: false,
            trigger: Some(trigger),
            ..Self::linear()
        }
    }

    pub fn parse_error(err: ExpressionError) -> Self {
        Self::nonlinear(Trigger::ParseError(err))
    }

    pub fn is_parse_error(&self) -> bool {
        matches!(self.trigger, Some(Trigger::ParseError(_)))
    }

    /// Operator nodes plus branch nodes in the subtree.
    pub fn operator_count(&self) -> usize {
        self.operators.values().sum::<usize>() + self.branch_count
    }

    pub fn complexity(&self) -> Complexity {
        Complexity::from_operator_count(self.operator_count())
    }

    fn absorb(&mut self, child: Verdict) {
        for (kind, count) in child.operators {
            *self.operators.entry(kind).or_default() += count;
        }
        self.branch_count += child.branch_count;
        if self.is_linear && !child.is_linear {
            self.is_linear = false;
            self.trigger = child.trigger;
        }
    }
}

/// Classifies one expression tree bottom-up.
///
/// A nonlinear construct anywhere in the subtree makes the whole subtree
/// nonlinear. The reported trigger is the first cause in a left-to-right,
/// self-before-children scan. A `Branch` is always nonlinear.
///
/// # Panics
///
/// Panics if an `Operator` has no operands; the parser never produces one.
pub fn classify(node: &Node, policy: &LinearityPolicy) -> Verdict {
    match node {
        Node::Terminal { .. } | Node::Constant { .. } => Verdict::linear(),
        Node::Operator { kind, operands } => {
            assert!(
                !operands.is_empty(),
                "`{kind}` operator without operands reached the classifier"
            );
            let mut verdict = if policy.is_linear(*kind) {
                Verdict::linear()
            } else {
                Verdict::nonlinear(Trigger::Operator(*kind))
            };
            verdict.operators.insert(*kind, 1);
            for operand in operands {
                verdict.absorb(classify(operand, policy));
            }
            verdict
        }
        Node::Branch {
            cond,
            true_branch,
            false_branch,
        } => {
            let mut verdict = Verdict::nonlinear(Trigger::Branch);
            verdict.branch_count = 1;
            verdict.absorb(classify(cond, policy));
            verdict.absorb(classify(true_branch, policy));
            if let Some(false_branch) = false_branch {
                verdict.absorb(classify(false_branch, policy));
            }
            verdict
        }
    }
}

/// Classifies every binding. Failed bindings get the parse-error sentinel.
pub fn classify_all(bindings: &[Binding], policy: &LinearityPolicy) -> BTreeMap<String, Verdict> {
    bindings
        .iter()
        .map(|binding| {
            let verdict = match &binding.tree {
                Ok(tree) => classify(tree, policy),
                Err(err) => Verdict::parse_error(err.clone()),
            };
            (binding.dest.clone(), verdict)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinearitySummary {
    pub total: usize,
    pub linear_count: usize,
    pub nonlinear_count: usize,
    pub parse_error_count: usize,
    pub linearity_ratio: f64,
    /// Parse failures count as nonlinear here.
    pub nonlinearity_ratio: f64,
}

impl LinearitySummary {
    pub fn from_verdicts<'a>(verdicts: impl IntoIterator<Item = &'a Verdict>) -> Self {
        let mut summary = LinearitySummary {
            total: 0,
            linear_count: 0,
            nonlinear_count: 0,
            parse_error_count: 0,
            linearity_ratio: 0.0,
            nonlinearity_ratio: 0.0,
        };
        for verdict in verdicts {
            summary.total += 1;
            if verdict.is_linear {
                summary.linear_count += 1;
            } else if verdict.is_parse_error() {
                summary.parse_error_count += 1;
            } else {
                summary.nonlinear_count += 1;
            }
        }
        if summary.total > 0 {
            let total = summary.total as f64;
            summary.linearity_ratio = summary.linear_count as f64 / total;
            summary.nonlinearity_ratio =
                (summary.nonlinear_count + summary.parse_error_count) as f64 / total;
        }
        summary
    }
}
