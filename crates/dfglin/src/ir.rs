use crate::parser::{EntryError, ExpressionError};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Closed operator vocabulary of the DFG dump.
///
/// Variant names are the canonical tokens written by the extraction tool, so
/// `Display` and serde both use them verbatim.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OperatorKind {
    // Arithmetic
    Plus,
    Minus,
    UnaryMinus,
    Uplus,
    // Bitwise and reduction
    And,
    Or,
    Xor,
    Xnor,
    Unot,
    Uand,
    Unand,
    Uor,
    Unor,
    Uxor,
    Uxnor,
    // Multiplicative
    Times,
    Divide,
    Mod,
    Power,
    // Relational
    Eq,
    NotEq,
    Eql,
    NotEql,
    Lt,
    Gt,
    Lte,
    Gte,
    // Boolean
    Land,
    Lor,
    Ulnot,
    // Shift
    Sll,
    Srl,
    Sla,
    Sra,
    // Structural
    Concat,
    Partselect,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum OperatorCategory {
    Arithmetic,
    Bitwise,
    Multiplicative,
    Relational,
    Boolean,
    Shift,
    Structural,
}

impl OperatorKind {
    pub const ALL: [OperatorKind; 36] = [
        OperatorKind::Plus,
        OperatorKind::Minus,
        OperatorKind::UnaryMinus,
        OperatorKind::Uplus,
        OperatorKind::And,
        OperatorKind::Or,
        OperatorKind::Xor,
        OperatorKind::Xnor,
        OperatorKind::Unot,
        OperatorKind::Uand,
        OperatorKind::Unand,
        OperatorKind::Uor,
        OperatorKind::Unor,
        OperatorKind::Uxor,
        OperatorKind::Uxnor,
        OperatorKind::Times,
        OperatorKind::Divide,
        OperatorKind::Mod,
        OperatorKind::Power,
        OperatorKind::Eq,
        OperatorKind::NotEq,
        OperatorKind::Eql,
        OperatorKind::NotEql,
        OperatorKind::Lt,
        OperatorKind::Gt,
        OperatorKind::Lte,
        OperatorKind::Gte,
        OperatorKind::Land,
        OperatorKind::Lor,
        OperatorKind::Ulnot,
        OperatorKind::Sll,
        OperatorKind::Srl,
        OperatorKind::Sla,
        OperatorKind::Sra,
        OperatorKind::Concat,
        OperatorKind::Partselect,
    ];

    /// Resolves an operator token, including the alternate spellings some
    /// versions of the extraction tool emit.
    pub fn from_token(token: &str) -> Option<Self> {
        let kind = match token {
            "Plus" => OperatorKind::Plus,
            "Minus" => OperatorKind::Minus,
            "UnaryMinus" | "Uminus" => OperatorKind::UnaryMinus,
            "Uplus" => OperatorKind::Uplus,
            "And" => OperatorKind::And,
            "Or" => OperatorKind::Or,
            "Xor" => OperatorKind::Xor,
            "Xnor" => OperatorKind::Xnor,
            "Unot" => OperatorKind::Unot,
            "Uand" => OperatorKind::Uand,
            "Unand" => OperatorKind::Unand,
            "Uor" => OperatorKind::Uor,
            "Unor" => OperatorKind::Unor,
            "Uxor" => OperatorKind::Uxor,
            "Uxnor" => OperatorKind::Uxnor,
            "Times" => OperatorKind::Times,
            "Divide" => OperatorKind::Divide,
            "Mod" => OperatorKind::Mod,
            "Power" => OperatorKind::Power,
            "Eq" => OperatorKind::Eq,
            "NotEq" => OperatorKind::NotEq,
            "Eql" => OperatorKind::Eql,
            "NotEql" => OperatorKind::NotEql,
            "Lt" | "LessThan" => OperatorKind::Lt,
            "Gt" | "GreaterThan" => OperatorKind::Gt,
            "Lte" | "LessEq" => OperatorKind::Lte,
            "Gte" | "GreaterEq" => OperatorKind::Gte,
            "Land" => OperatorKind::Land,
            "Lor" => OperatorKind::Lor,
            "Ulnot" => OperatorKind::Ulnot,
            "Sll" => OperatorKind::Sll,
            "Srl" => OperatorKind::Srl,
            "Sla" => OperatorKind::Sla,
            "Sra" => OperatorKind::Sra,
            "Concat" => OperatorKind::Concat,
            "Partselect" => OperatorKind::Partselect,
            _ => return None,
        };
        Some(kind)
    }

    pub fn token(self) -> &'static str {
        match self {
            OperatorKind::Plus => "Plus",
            OperatorKind::Minus => "Minus",
            OperatorKind::UnaryMinus => "UnaryMinus",
            OperatorKind::Uplus => "Uplus",
            OperatorKind::And => "And",
            OperatorKind::Or => "Or",
            OperatorKind::Xor => "Xor",
            OperatorKind::Xnor => "Xnor",
            OperatorKind::Unot => "Unot",
            OperatorKind::Uand => "Uand",
            OperatorKind::Unand => "Unand",
            OperatorKind::Uor => "Uor",
            OperatorKind::Unor => "Unor",
            OperatorKind::Uxor => "Uxor",
            OperatorKind::Uxnor => "Uxnor",
            OperatorKind::Times => "Times",
            OperatorKind::Divide => "Divide",
            OperatorKind::Mod => "Mod",
            OperatorKind::Power => "Power",
            OperatorKind::Eq => "Eq",
            OperatorKind::NotEq => "NotEq",
            OperatorKind::Eql => "Eql",
            OperatorKind::NotEql => "NotEql",
            OperatorKind::Lt => "Lt",
            OperatorKind::Gt => "Gt",
            OperatorKind::Lte => "Lte",
            OperatorKind::Gte => "Gte",
            OperatorKind::Land => "Land",
            OperatorKind::Lor => "Lor",
            OperatorKind::Ulnot => "Ulnot",
            OperatorKind::Sll => "Sll",
            OperatorKind::Srl => "Srl",
            OperatorKind::Sla => "Sla",
            OperatorKind::Sra => "Sra",
            OperatorKind::Concat => "Concat",
            OperatorKind::Partselect => "Partselect",
        }
    }

    pub fn category(self) -> OperatorCategory {
        use OperatorKind::*;
        match self {
            Plus | Minus | UnaryMinus | Uplus => OperatorCategory::Arithmetic,
            And | Or | Xor | Xnor | Unot | Uand | Unand | Uor | Unor | Uxor | Uxnor => {
                OperatorCategory::Bitwise
            }
            Times | Divide | Mod | Power => OperatorCategory::Multiplicative,
            Eq | NotEq | Eql | NotEql | Lt | Gt | Lte | Gte => OperatorCategory::Relational,
            Land | Lor | Ulnot => OperatorCategory::Boolean,
            Sll | Srl | Sla | Sra => OperatorCategory::Shift,
            Concat | Partselect => OperatorCategory::Structural,
        }
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// Literal flavour of a `Constant` leaf. Misspelled integer tags
/// (`IntCost`, `IntCon st`) are normalised to `Int`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ConstantKind {
    Int,
    Float,
    String,
}

impl ConstantKind {
    pub fn tag(self) -> &'static str {
        match self {
            ConstantKind::Int => "IntConst",
            ConstantKind::Float => "FloatConst",
            ConstantKind::String => "StringConst",
        }
    }
}

/// Expression tree of one binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Node {
    Terminal {
        name: String,
    },
    /// Literal kept in its original sized/radix-prefixed form.
    Constant {
        kind: ConstantKind,
        raw: String,
    },
    /// `operands` is never empty once produced by the parser.
    Operator {
        kind: OperatorKind,
        operands: Vec<Node>,
    },
    /// A missing `false_branch` means "default/undefined", not zero.
    Branch {
        cond: Box<Node>,
        true_branch: Box<Node>,
        false_branch: Option<Box<Node>>,
    },
}

impl Node {
    pub fn terminal(name: impl Into<String>) -> Self {
        Node::Terminal { name: name.into() }
    }

    /// Integer constant.
    pub fn constant(raw: impl Into<String>) -> Self {
        Self::typed_constant(ConstantKind::Int, raw)
    }

    pub fn typed_constant(kind: ConstantKind, raw: impl Into<String>) -> Self {
        Node::Constant {
            kind,
            raw: raw.into(),
        }
    }

    pub fn operator(kind: OperatorKind, operands: Vec<Node>) -> Self {
        Node::Operator { kind, operands }
    }

    pub fn branch(cond: Node, true_branch: Node, false_branch: Option<Node>) -> Self {
        Node::Branch {
            cond: Box::new(cond),
            true_branch: Box::new(true_branch),
            false_branch: false_branch.map(Box::new),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Terminal { .. } | Node::Constant { .. })
    }

    /// Renders the node back into the DFG dump notation.
    pub fn fmt_expression(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Terminal { name } => write!(f, "(Terminal {name})"),
            Node::Constant { kind, raw } => write!(f, "({} {raw})", kind.tag()),
            Node::Operator {
                kind: OperatorKind::Partselect,
                operands,
            } if operands.len() == 3 => {
                write!(f, "(Partselect Var:")?;
                operands[0].fmt_expression(f)?;
                write!(f, " MSB:")?;
                operands[1].fmt_expression(f)?;
                write!(f, " LSB:")?;
                operands[2].fmt_expression(f)?;
                write!(f, ")")
            }
            Node::Operator { kind, operands } => {
                if *kind == OperatorKind::Concat {
                    write!(f, "(Concat Next:")?;
                } else {
                    write!(f, "(Operator {kind} Next:")?;
                }
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    operand.fmt_expression(f)?;
                }
                write!(f, ")")
            }
            Node::Branch {
                cond,
                true_branch,
                false_branch,
            } => {
                write!(f, "(Branch Cond:")?;
                cond.fmt_expression(f)?;
                write!(f, " True:")?;
                true_branch.fmt_expression(f)?;
                if let Some(false_branch) = false_branch {
                    write!(f, " False:")?;
                    false_branch.fmt_expression(f)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_expression(f)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RoleFlag {
    Input,
    Output,
    Register,
    Renamed,
    Wire,
    Inout,
}

impl RoleFlag {
    /// Unknown flags yield `None` and are dropped by the declaration parser.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "Input" => Some(RoleFlag::Input),
            "Output" => Some(RoleFlag::Output),
            "Reg" | "Register" => Some(RoleFlag::Register),
            "Rename" | "Renamed" => Some(RoleFlag::Renamed),
            "Wire" => Some(RoleFlag::Wire),
            "Inout" => Some(RoleFlag::Inout),
            _ => None,
        }
    }
}

impl fmt::Display for RoleFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RoleFlag::Input => "Input",
            RoleFlag::Output => "Output",
            RoleFlag::Register => "Reg",
            RoleFlag::Renamed => "Rename",
            RoleFlag::Wire => "Wire",
            RoleFlag::Inout => "Inout",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignalDescriptor {
    pub name: String,
    pub roles: BTreeSet<RoleFlag>,
    pub msb: i64,
    pub lsb: i64,
}

impl SignalDescriptor {
    /// Descriptor for a signal referenced by an expression but never declared.
    pub fn external(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            roles: BTreeSet::new(),
            msb: 0,
            lsb: 0,
        }
    }

    /// Bit count, saturating at `u64::MAX` for the full `i64` range.
    pub fn width(&self) -> u64 {
        self.msb.abs_diff(self.lsb).saturating_add(1)
    }

    pub fn has_role(&self, role: RoleFlag) -> bool {
        self.roles.contains(&role)
    }
}

impl fmt::Display for SignalDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}:{}]", self.name, self.msb, self.lsb)?;
        if !self.roles.is_empty() {
            write!(f, " ({})", self.roles.iter().join(","))?;
        }
        Ok(())
    }
}

/// One `dest = tree` association. A tree that failed to parse keeps its error
/// so that the failure is still reported per destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub dest: String,
    pub tree: Result<Node, ExpressionError>,
}

impl Binding {
    pub fn new(dest: impl Into<String>, tree: Node) -> Self {
        Self {
            dest: dest.into(),
            tree: Ok(tree),
        }
    }

    pub fn is_parsed(&self) -> bool {
        self.tree.is_ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instance {
    pub module: String,
    pub name: String,
}

/// Everything recovered from one dump.
#[derive(Debug, Clone, Default)]
pub struct Dfg {
    pub instances: Vec<Instance>,
    pub descriptors: BTreeMap<String, SignalDescriptor>,
    pub bindings: Vec<Binding>,
    /// Entries that were neither a usable declaration nor a binding.
    pub rejected: Vec<EntryError>,
}

impl Dfg {
    pub fn descriptor(&self, name: &str) -> Option<&SignalDescriptor> {
        self.descriptors.get(name)
    }

    pub fn binding(&self, dest: &str) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.dest == dest)
    }

    pub fn parsed_bindings(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.bindings
            .iter()
            .filter_map(|b| b.tree.as_ref().ok().map(|tree| (b.dest.as_str(), tree)))
    }

    pub fn failed_bindings(&self) -> impl Iterator<Item = (&str, &ExpressionError)> {
        self.bindings
            .iter()
            .filter_map(|b| b.tree.as_ref().err().map(|err| (b.dest.as_str(), err)))
    }
}
