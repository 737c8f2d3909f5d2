use crate::graph::DependencyGraph;
use crate::ir::RoleFlag;
use crate::linearity::Verdict;
use crate::options::AnalyzerOptions;
use log::{debug, info};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BTreeMap, VecDeque};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinearChain {
    pub length: usize,
    pub path: Vec<String>,
}

/// Shortest input-to-output route through the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CriticalPath {
    pub source: String,
    pub sink: String,
    pub nodes: Vec<String>,
}

/// Linearity of the bindings feeding an output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PathKind {
    Linear,
    Nonlinear,
    Mixed,
}

/// Fan-in cone of one `Output` signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputPath {
    pub output: String,
    /// The output first, then its transitive predecessors in BFS order.
    pub cone: Vec<String>,
    pub kind: PathKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FanoutEntry {
    pub name: String,
    pub fan_in: usize,
    pub fan_out: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphAnalysis {
    /// Kahn prefix, then the nodes blocked downstream of a cycle in
    /// condensation order. Excludes every node of `sccs`.
    pub topo_order: Vec<String>,
    /// Length of the prefix of `topo_order` released by Kahn's algorithm.
    pub kahn_resolved: usize,
    pub unresolved: Vec<String>,
    pub cyclic_nodes: Vec<String>,
    /// Components with more than one node, in condensation order.
    pub sccs: Vec<Vec<String>>,
    pub fan_in: BTreeMap<String, usize>,
    pub fan_out: BTreeMap<String, usize>,
    /// Longest distance from a source. Only nodes released by Kahn's
    /// algorithm have a level.
    pub levels: BTreeMap<String, usize>,
    pub longest_linear_chain: LinearChain,
    pub critical_paths: Vec<CriticalPath>,
    pub output_paths: Vec<OutputPath>,
    pub high_fanout: Vec<FanoutEntry>,
}

impl GraphAnalysis {
    pub fn is_acyclic(&self) -> bool {
        self.sccs.is_empty()
    }
}

/// Kahn's algorithm. Returns the released order and a per-node released flag.
fn kahn_order(graph: &DependencyGraph) -> (Vec<usize>, Vec<bool>) {
    let n = graph.node_count();
    let mut in_degree: Vec<usize> = (0..n).map(|u| graph.predecessors(u).len()).collect();
    let mut queue: VecDeque<usize> = (0..n).filter(|&u| in_degree[u] == 0).collect();
    let mut order = Vec::with_capacity(n);
    let mut released = vec![false; n];

    while let Some(u) = queue.pop_front() {
        order.push(u);
        released[u] = true;
        for &v in graph.successors(u) {
            in_degree[v] -= 1;
            if in_degree[v] == 0 {
                queue.push_back(v);
            }
        }
    }
    (order, released)
}

fn topological_levels(graph: &DependencyGraph, order: &[usize]) -> Vec<Option<usize>> {
    let mut levels: Vec<Option<usize>> = vec![None; graph.node_count()];
    for &u in order {
        let level = graph
            .predecessors(u)
            .iter()
            .filter_map(|&p| levels[p])
            .max()
            .map_or(0, |l| l + 1);
        levels[u] = Some(level);
    }
    levels
}

struct KosarajuContext<'g> {
    graph: &'g DependencyGraph,
    active: &'g [bool],
    visited: Vec<bool>,
    finish_order: Vec<usize>,
    assigned: Vec<bool>,
}

impl KosarajuContext<'_> {
    fn forward_pass(&mut self, start: usize) {
        let mut stack = vec![(start, 0usize)];
        self.visited[start] = true;
        while let Some((u, child)) = stack.pop() {
            let succ = self.graph.successors(u);
            if let Some(&v) = succ.get(child) {
                stack.push((u, child + 1));
                if self.active[v] && !self.visited[v] {
                    self.visited[v] = true;
                    stack.push((v, 0));
                }
            } else {
                self.finish_order.push(u);
            }
        }
    }

    fn reverse_pass(&mut self, start: usize) -> Vec<usize> {
        let mut component = vec![start];
        let mut stack = vec![start];
        self.assigned[start] = true;
        while let Some(u) = stack.pop() {
            for &v in self.graph.predecessors(u) {
                if self.active[v] && !self.assigned[v] {
                    self.assigned[v] = true;
                    component.push(v);
                    stack.push(v);
                }
            }
        }
        component.sort_unstable();
        component
    }
}

/// Kosaraju's two-pass SCC detection restricted to `active` nodes. Components
/// come out in topological order of the condensation.
fn kosaraju(graph: &DependencyGraph, active: &[bool]) -> Vec<Vec<usize>> {
    let n = graph.node_count();
    let mut ctx = KosarajuContext {
        graph,
        active,
        visited: vec![false; n],
        finish_order: Vec::new(),
        assigned: vec![false; n],
    };
    for (u, &is_active) in active.iter().enumerate() {
        if is_active && !ctx.visited[u] {
            ctx.forward_pass(u);
        }
    }

    let mut components = Vec::new();
    let finish_order = std::mem::take(&mut ctx.finish_order);
    for &u in finish_order.iter().rev() {
        if !ctx.assigned[u] {
            components.push(ctx.reverse_pass(u));
        }
    }
    components
}

struct ChainContext<'g> {
    graph: &'g DependencyGraph,
    linear: Vec<bool>,
    memo: Vec<Option<usize>>,
    next: Vec<Option<usize>>,
    visiting: Vec<bool>,
}

struct ChainFrame {
    node: usize,
    cursor: usize,
    best: usize,
    best_next: Option<usize>,
}

impl ChainFrame {
    fn new(node: usize) -> Self {
        Self {
            node,
            cursor: 0,
            best: 1,
            best_next: None,
        }
    }

    fn offer(&mut self, next: usize, length: usize) {
        if 1 + length > self.best {
            self.best = 1 + length;
            self.best_next = Some(next);
        }
    }
}

/// Longest path (in nodes) starting at `start` over linear nodes only. A node
/// revisited while still on the DFS stack counts as 1 and ends the path.
fn chain_from(start: usize, ctx: &mut ChainContext<'_>) -> usize {
    if let Some(length) = ctx.memo[start] {
        return length;
    }
    ctx.visiting[start] = true;
    let mut stack = vec![ChainFrame::new(start)];
    let mut result = 1;

    while let Some(frame) = stack.last_mut() {
        if let Some(&v) = ctx.graph.successors(frame.node).get(frame.cursor) {
            frame.cursor += 1;
            if !ctx.linear[v] {
                continue;
            }
            if let Some(length) = ctx.memo[v] {
                frame.offer(v, length);
            } else if ctx.visiting[v] {
                frame.offer(v, 1);
            } else {
                ctx.visiting[v] = true;
                stack.push(ChainFrame::new(v));
            }
            continue;
        }

        let Some(done) = stack.pop() else {
            break;
        };
        ctx.visiting[done.node] = false;
        ctx.memo[done.node] = Some(done.best);
        ctx.next[done.node] = done.best_next;
        match stack.last_mut() {
            Some(parent) => parent.offer(done.node, done.best),
            None => result = done.best,
        }
    }
    result
}

fn longest_linear_chain(
    graph: &DependencyGraph,
    verdicts: &BTreeMap<String, Verdict>,
) -> LinearChain {
    let n = graph.node_count();
    // Signals without a binding are linear leaves.
    let linear = (0..n)
        .map(|u| {
            verdicts
                .get(graph.name(u))
                .map_or(!graph.is_bound(u), |v| v.is_linear)
        })
        .collect();
    let mut ctx = ChainContext {
        graph,
        linear,
        memo: vec![None; n],
        next: vec![None; n],
        visiting: vec![false; n],
    };

    let mut best: Option<(usize, usize)> = None;
    for u in 0..n {
        if !ctx.linear[u] {
            continue;
        }
        let length = chain_from(u, &mut ctx);
        if best.is_none_or(|(_, b)| length > b) {
            best = Some((u, length));
        }
    }
    let Some((start, length)) = best else {
        return LinearChain::default();
    };

    let mut path = vec![start];
    let mut on_path = vec![false; n];
    on_path[start] = true;
    let mut cursor = start;
    while path.len() < length {
        let Some(v) = ctx.next[cursor] else {
            break;
        };
        path.push(v);
        if on_path[v] {
            break;
        }
        on_path[v] = true;
        cursor = v;
    }

    LinearChain {
        length,
        path: path.into_iter().map(|u| graph.name(u).to_string()).collect(),
    }
}

/// BFS shortest paths from each `Input` signal to each `Output` signal.
fn critical_paths(graph: &DependencyGraph, options: &AnalyzerOptions) -> Vec<CriticalPath> {
    let n = graph.node_count();
    let mut paths = Vec::new();

    for source in (0..n).filter(|&u| graph.descriptor(u).has_role(RoleFlag::Input)) {
        let mut parent: Vec<Option<usize>> = vec![None; n];
        let mut seen = vec![false; n];
        let mut queue = VecDeque::from([source]);
        seen[source] = true;
        while let Some(u) = queue.pop_front() {
            for &v in graph.successors(u) {
                if !seen[v] {
                    seen[v] = true;
                    parent[v] = Some(u);
                    queue.push_back(v);
                }
            }
        }

        for sink in (0..n).filter(|&v| v != source && seen[v]) {
            if !graph.descriptor(sink).has_role(RoleFlag::Output) {
                continue;
            }
            let mut nodes = vec![sink];
            let mut cursor = sink;
            while let Some(p) = parent[cursor] {
                nodes.push(p);
                cursor = p;
            }
            if nodes.len() < options.critical_path_min_nodes {
                continue;
            }
            nodes.reverse();
            paths.push(CriticalPath {
                source: graph.name(source).to_string(),
                sink: graph.name(sink).to_string(),
                nodes: nodes.into_iter().map(|u| graph.name(u).to_string()).collect(),
            });
        }
    }

    paths.sort_by_key(|p| Reverse(p.nodes.len()));
    paths.truncate(options.critical_path_limit);
    paths
}

/// Classifies each `Output` signal by the verdicts of every binding in its
/// fan-in cone. Parse failures count as nonlinear; a cone without bindings
/// is linear.
fn output_paths(
    graph: &DependencyGraph,
    verdicts: &BTreeMap<String, Verdict>,
) -> Vec<OutputPath> {
    let n = graph.node_count();
    let mut paths = Vec::new();

    for output in (0..n).filter(|&u| graph.descriptor(u).has_role(RoleFlag::Output)) {
        let mut seen = vec![false; n];
        let mut cone = Vec::new();
        let mut queue = VecDeque::from([output]);
        seen[output] = true;
        while let Some(u) = queue.pop_front() {
            cone.push(u);
            for &p in graph.predecessors(u) {
                if !seen[p] {
                    seen[p] = true;
                    queue.push_back(p);
                }
            }
        }

        let (mut has_linear, mut has_nonlinear) = (false, false);
        for verdict in cone.iter().filter_map(|&u| verdicts.get(graph.name(u))) {
            if verdict.is_linear {
                has_linear = true;
            } else {
                has_nonlinear = true;
            }
        }
        let kind = match (has_linear, has_nonlinear) {
            (true, true) => PathKind::Mixed,
            (false, true) => PathKind::Nonlinear,
            _ => PathKind::Linear,
        };
        paths.push(OutputPath {
            output: graph.name(output).to_string(),
            cone: cone.into_iter().map(|u| graph.name(u).to_string()).collect(),
            kind,
        });
    }
    paths
}

fn high_fanout(graph: &DependencyGraph, threshold: usize) -> Vec<FanoutEntry> {
    let mut entries: Vec<FanoutEntry> = (0..graph.node_count())
        .map(|u| FanoutEntry {
            name: graph.name(u).to_string(),
            fan_in: graph.predecessors(u).len(),
            fan_out: graph.successors(u).len(),
        })
        .filter(|e| e.fan_in > threshold || e.fan_out > threshold)
        .collect();
    entries.sort_by_key(|e| Reverse(e.fan_in + e.fan_out));
    entries
}

/// Runs every graph analysis. Cycles are reported as data, never as errors.
pub fn analyze_graph(
    graph: &DependencyGraph,
    verdicts: &BTreeMap<String, Verdict>,
    options: &AnalyzerOptions,
) -> GraphAnalysis {
    let names = |ids: &[usize]| -> Vec<String> {
        ids.iter().map(|&u| graph.name(u).to_string()).collect()
    };

    // 1. Kahn
    let (mut order, released) = kahn_order(graph);
    let kahn_resolved = order.len();
    let levels = topological_levels(graph, &order)
        .into_iter()
        .enumerate()
        .filter_map(|(u, level)| Some((graph.name(u).to_string(), level?)))
        .collect();
    let active: Vec<bool> = released.iter().map(|r| !r).collect();
    let unresolved: Vec<usize> = (0..graph.node_count()).filter(|&u| active[u]).collect();

    // 2. SCCs of the remainder; singletons there are blocked, not cyclic
    let mut sccs = Vec::new();
    if !unresolved.is_empty() {
        for component in kosaraju(graph, &active) {
            if component.len() > 1 {
                sccs.push(component);
            } else {
                order.extend(component);
            }
        }
        debug!(
            "{} nodes unresolved by Kahn, {} cycles",
            unresolved.len(),
            sccs.len()
        );
    }
    let mut cyclic: Vec<usize> = sccs.iter().flatten().copied().collect();
    cyclic.sort_unstable();

    // 3. Fan-in / fan-out
    let fan_in = (0..graph.node_count())
        .map(|u| (graph.name(u).to_string(), graph.predecessors(u).len()))
        .collect();
    let fan_out = (0..graph.node_count())
        .map(|u| (graph.name(u).to_string(), graph.successors(u).len()))
        .collect();

    let analysis = GraphAnalysis {
        topo_order: names(&order),
        kahn_resolved,
        unresolved: names(&unresolved),
        cyclic_nodes: names(&cyclic),
        sccs: sccs.iter().map(|c| names(c)).collect(),
        fan_in,
        fan_out,
        levels,
        longest_linear_chain: longest_linear_chain(graph, verdicts),
        critical_paths: critical_paths(graph, options),
        output_paths: output_paths(graph, verdicts),
        high_fanout: high_fanout(graph, options.fan_threshold),
    };
    info!(
        "Graph: {} nodes, {} edges, {} cycles, longest linear chain {}",
        graph.node_count(),
        graph.edge_count(),
        analysis.sccs.len(),
        analysis.longest_linear_chain.length
    );
    analysis
}
