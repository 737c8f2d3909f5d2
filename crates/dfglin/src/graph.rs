use crate::ir::{Binding, Node, SignalDescriptor};
use crate::linearity::Verdict;
use crate::{HashMap, HashSet};
use std::collections::{BTreeMap, VecDeque};

/// Signal dependency graph. An edge `dep -> dest` means `dest`'s tree reads
/// `dep`. Nodes are dense indices; cycles are allowed.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    descriptors: Vec<SignalDescriptor>,
    declared: Vec<bool>,
    bound: Vec<bool>,
    index: HashMap<String, usize>,
    succ: Vec<Vec<usize>>,
    pred: Vec<Vec<usize>>,
}

impl DependencyGraph {
    fn add_node(&mut self, descriptor: SignalDescriptor, declared: bool) -> usize {
        if let Some(&id) = self.index.get(&descriptor.name) {
            return id;
        }
        let id = self.descriptors.len();
        self.index.insert(descriptor.name.clone(), id);
        self.descriptors.push(descriptor);
        self.declared.push(declared);
        self.bound.push(false);
        self.succ.push(Vec::new());
        self.pred.push(Vec::new());
        id
    }

    fn ensure_node(&mut self, name: &str) -> usize {
        match self.index.get(name) {
            Some(&id) => id,
            None => self.add_node(SignalDescriptor::external(name), false),
        }
    }

    fn add_edge(&mut self, from: usize, to: usize) {
        if from == to || self.succ[from].contains(&to) {
            return;
        }
        self.succ[from].push(to);
        self.pred[to].push(from);
    }

    /// Graph over bare edges; every node is an undeclared, unbound signal.
    pub fn from_edges<'a>(edges: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut graph = DependencyGraph::default();
        for (from, to) in edges {
            let from = graph.ensure_node(from);
            let to = graph.ensure_node(to);
            graph.add_edge(from, to);
        }
        graph
    }

    pub fn node_count(&self) -> usize {
        self.descriptors.len()
    }

    pub fn edge_count(&self) -> usize {
        self.succ.iter().map(Vec::len).sum()
    }

    pub fn name(&self, id: usize) -> &str {
        &self.descriptors[id].name
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.descriptors.iter().map(|d| d.name.as_str())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn descriptor(&self, id: usize) -> &SignalDescriptor {
        &self.descriptors[id]
    }

    /// Referenced or bound but never declared.
    pub fn is_external(&self, id: usize) -> bool {
        !self.declared[id]
    }

    /// Has a defining binding (parsed or not).
    pub fn is_bound(&self, id: usize) -> bool {
        self.bound[id]
    }

    pub fn successors(&self, id: usize) -> &[usize] {
        &self.succ[id]
    }

    pub fn predecessors(&self, id: usize) -> &[usize] {
        &self.pred[id]
    }

    pub fn contains_edge(&self, from: &str, to: &str) -> bool {
        match (self.index_of(from), self.index_of(to)) {
            (Some(from), Some(to)) => self.succ[from].contains(&to),
            _ => false,
        }
    }

    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.succ.iter().enumerate().flat_map(move |(from, targets)| {
            targets
                .iter()
                .map(move |&to| (self.name(from), self.name(to)))
        })
    }

    /// Subgraph of the nodes whose linearity equals `keep_linear`. Nodes
    /// without a verdict count as linear.
    pub fn filter_by_linearity(
        &self,
        verdicts: &BTreeMap<String, Verdict>,
        keep_linear: bool,
    ) -> DependencyGraph {
        let keep: Vec<bool> = self
            .names()
            .map(|name| verdicts.get(name).is_none_or(|v| v.is_linear) == keep_linear)
            .collect();
        self.induced(&keep)
    }

    /// Neighbourhood of `root`: nodes reachable within `depth` forward hops
    /// plus the immediate predecessors of `root`.
    pub fn focus(&self, root: &str, depth: usize) -> Option<DependencyGraph> {
        let root = self.index_of(root)?;
        let mut keep = vec![false; self.node_count()];
        keep[root] = true;
        for &p in &self.pred[root] {
            keep[p] = true;
        }

        let mut queue = VecDeque::from([(root, 0usize)]);
        let mut seen: HashSet<usize> = HashSet::default();
        seen.insert(root);
        while let Some((u, d)) = queue.pop_front() {
            if d == depth {
                continue;
            }
            for &v in &self.succ[u] {
                if seen.insert(v) {
                    keep[v] = true;
                    queue.push_back((v, d + 1));
                }
            }
        }
        Some(self.induced(&keep))
    }

    fn induced(&self, keep: &[bool]) -> DependencyGraph {
        let mut graph = DependencyGraph::default();
        for (id, _) in keep.iter().enumerate().filter(|(_, k)| **k) {
            let new_id = graph.add_node(self.descriptors[id].clone(), self.declared[id]);
            graph.bound[new_id] = self.bound[id];
        }
        for (from, targets) in self.succ.iter().enumerate() {
            if !keep[from] {
                continue;
            }
            for &to in targets.iter().filter(|&&to| keep[to]) {
                let (Some(a), Some(b)) = (
                    graph.index_of(self.name(from)),
                    graph.index_of(self.name(to)),
                ) else {
                    continue;
                };
                graph.add_edge(a, b);
            }
        }
        graph
    }
}

/// Distinct `Terminal` names of a tree in first-appearance order.
pub fn collect_terminals(tree: &Node) -> Vec<&str> {
    let mut seen: HashSet<&str> = HashSet::default();
    let mut names = Vec::new();
    let mut stack = vec![tree];
    while let Some(node) = stack.pop() {
        match node {
            Node::Terminal { name } => {
                if seen.insert(name.as_str()) {
                    names.push(name.as_str());
                }
            }
            Node::Constant { .. } => {}
            Node::Operator { operands, .. } => stack.extend(operands.iter().rev()),
            Node::Branch {
                cond,
                true_branch,
                false_branch,
            } => {
                if let Some(false_branch) = false_branch {
                    stack.push(false_branch);
                }
                stack.push(true_branch);
                stack.push(cond);
            }
        }
    }
    names
}

/// Builds the dependency graph. Declared signals come first in name order,
/// then destinations and undeclared references in order of first appearance.
/// Failed bindings contribute their destination node but no edges.
pub fn build_graph(
    descriptors: &BTreeMap<String, SignalDescriptor>,
    bindings: &[Binding],
) -> DependencyGraph {
    let mut graph = DependencyGraph::default();
    for descriptor in descriptors.values() {
        graph.add_node(descriptor.clone(), true);
    }

    for binding in bindings {
        let dest = graph.ensure_node(&binding.dest);
        graph.bound[dest] = true;
        let Ok(tree) = &binding.tree else {
            continue;
        };
        for name in collect_terminals(tree) {
            let dep = graph.ensure_node(name);
            graph.add_edge(dep, dest);
        }
    }
    graph
}
