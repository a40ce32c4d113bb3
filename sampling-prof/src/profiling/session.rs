//! Aggregation of captured stacks into a deduplicated call graph.
//!
//! A [`Session`] owns one sampling window: the node table, per-node
//! (self, total) counts and per-edge call counts. Only the sampler thread
//! mutates it, so none of this state is synchronized.
//!
//! # Counting rules
//!
//! For every captured stack (leaf first, walked root first):
//!
//! - the leaf frame gets `self += 1`
//! - each distinct node in the stack gets `total += 1`, once
//! - each distinct `(caller, callee)` pair gets `count += 1`, once,
//!   with [`NodeId::ROOT`] as the caller of the outermost frame
//!
//! ```text
//! stack (root → leaf):  main → fib → fib → fib
//!
//! main  self 0  total 1      -1 → main   1
//! fib   self 1  total 1      main → fib  1
//!                            fib → fib   1
//! ```
//!
//! Without the per-stack dedup, recursion would inflate totals and edges
//! with the recursion depth.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::registry::ThreadRegistry;
use crate::domain::{Frame, NodeId};
use crate::export::{Edge, NodeEntry, Profile, SampleCount};

/// One sampling window
#[derive(Debug)]
pub struct Session {
    registry: Arc<ThreadRegistry>,
    started_at: Instant,

    node_ids: HashMap<String, NodeId>,
    /// Frame keys indexed by node id
    names: Vec<String>,
    /// (self, total) indexed by node id
    counts: Vec<(u64, u64)>,
    edges: HashMap<(NodeId, NodeId), u64>,
    captures: u64,

    // Per-stack scratch, cleared before every stack
    seen_edges: HashSet<(NodeId, NodeId)>,
    seen_nodes: HashSet<NodeId>,
}

impl Session {
    /// Open a session whose runtime is accounted by `registry`
    #[must_use]
    pub fn new(registry: Arc<ThreadRegistry>) -> Self {
        Self {
            registry,
            started_at: Instant::now(),
            node_ids: HashMap::new(),
            names: Vec::new(),
            counts: Vec::new(),
            edges: HashMap::new(),
            captures: 0,
            seen_edges: HashSet::new(),
            seen_nodes: HashSet::new(),
        }
    }

    /// Resolve the node id of `frame`, assigning the next id on first sight
    #[allow(clippy::cast_possible_wrap)]
    pub fn node_id(&mut self, frame: &Frame) -> NodeId {
        let key = frame.key();
        if let Some(id) = self.node_ids.get(&key) {
            return *id;
        }
        let id = NodeId(self.names.len() as i64);
        self.names.push(key.clone());
        self.counts.push((0, 0));
        self.node_ids.insert(key, id);
        id
    }

    /// Feed one stack per sampled thread
    pub fn process(&mut self, stacks: &[Vec<Frame>]) {
        for stack in stacks {
            self.process_stack(stack);
        }
    }

    /// Feed a single stack, ordered leaf first
    #[allow(clippy::cast_sign_loss)]
    pub fn process_stack(&mut self, stack: &[Frame]) {
        if stack.is_empty() {
            return;
        }
        self.captures += 1;
        self.seen_edges.clear();
        self.seen_nodes.clear();

        let leaf_index = stack.len() - 1;
        let mut from = NodeId::ROOT;
        for (i, frame) in stack.iter().rev().enumerate() {
            let id = self.node_id(frame);
            let slot = &mut self.counts[id.0 as usize];
            if i == leaf_index {
                slot.0 += 1;
            }
            if self.seen_nodes.insert(id) {
                slot.1 += 1;
            }
            if self.seen_edges.insert((from, id)) {
                *self.edges.entry((from, id)).or_insert(0) += 1;
            }
            from = id;
        }
    }

    /// True once at least one frame has been recorded
    #[must_use]
    pub fn has_data(&self) -> bool {
        !self.names.is_empty()
    }

    /// Stacks processed so far
    #[must_use]
    pub fn captures(&self) -> u64 {
        self.captures
    }

    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Thread-active time accumulated in this window so far
    ///
    /// This is the registry's sum of member activity, not `now - started_at`:
    /// with several threads the window covers overlapping and gapped spans.
    #[must_use]
    pub fn runtime(&self) -> Duration {
        self.registry.elapsed()
    }

    /// Close the window and produce its export form
    ///
    /// Resets the registry's accounting so the next session starts at zero.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn result(self) -> Profile {
        let runtime = self.registry.elapsed_and_reset();

        let nodes = self
            .names
            .into_iter()
            .enumerate()
            .map(|(id, name)| NodeEntry { name, id: NodeId(id as i64) })
            .collect();

        let counts = self
            .counts
            .into_iter()
            .enumerate()
            .map(|(id, (self_count, total_count))| SampleCount {
                id: NodeId(id as i64),
                self_count,
                total_count,
            })
            .collect();

        let mut edges: Vec<Edge> = self
            .edges
            .into_iter()
            .map(|((from, to), count)| Edge { from, to, count })
            .collect();
        edges.sort_unstable_by_key(|edge| (edge.from, edge.to));

        Profile { runtime_ms: runtime.as_secs_f64() * 1000.0, nodes, counts, edges }
    }
}
