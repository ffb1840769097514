//! Structure Tracker
//!
//! A position-tracking state machine over a grammar's structural rule tree.
//! It answers two questions for the tokenizer and suggestion engine: which
//! token ids are legal at the current position, and does a given token id
//! advance the state.
//!
//! All state lives in flat maps keyed by node paths (the index trail from
//! the root), never in the grammar tree itself, so one immutable grammar can
//! back any number of concurrent tokenize passes. Matching is a linear
//! left-to-right scan with per-node saturation counters: optional and
//! repeatable runs are handled by counting rather than backtracking, and a
//! `OneOf` commits permanently to the first alternative that accepts a
//! token.
//!
//! A tracker lives for exactly one tokenize pass and is rebuilt from scratch
//! on the next one.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::grammar::model::{StructureKind, StructureNode};

type NodePath = Vec<usize>;

pub struct StructureTracker<'g> {
    nodes: &'g [StructureNode],
    /// Match count per node path.
    counts: FxHashMap<NodePath, u32>,
    /// Committed alternative index per OneOf node path.
    choices: FxHashMap<NodePath, usize>,
    /// Resume position per Sequence node path.
    seq_cursors: FxHashMap<NodePath, usize>,
    /// First root node that may still accept matches.
    cursor: usize,
}

impl<'g> StructureTracker<'g> {
    pub fn new(nodes: &'g [StructureNode]) -> Self {
        Self {
            nodes,
            counts: FxHashMap::default(),
            choices: FxHashMap::default(),
            seq_cursors: FxHashMap::default(),
            cursor: 0,
        }
    }

    fn count(&self, path: &[usize]) -> u32 {
        self.counts.get(path).copied().unwrap_or(0)
    }

    fn seq_cursor(&self, path: &[usize]) -> usize {
        self.seq_cursors.get(path).copied().unwrap_or(0)
    }

    /// Token ids legal at the current position, deduplicated, in structure
    /// order.
    ///
    /// Scanning stops at the first node whose minimum cardinality is unmet:
    /// a mandatory node hides everything after it.
    pub fn expected_token_ids(&self) -> Vec<&'g str> {
        let mut out = Vec::new();
        let mut seen = FxHashSet::default();
        for i in self.cursor..self.nodes.len() {
            let node = &self.nodes[i];
            let path = vec![i];
            let count = self.count(&path);
            if !node.cardinality.saturated(count) {
                self.collect_expected(node, &path, &mut seen, &mut out);
            }
            if self.min_unmet(node, &path) {
                break;
            }
        }
        out
    }

    /// Whether `node` still demands matches before anything after it may be
    /// considered. A sequence mid-repetition counts as satisfied once every
    /// remaining child's minimum is met, even though its own completion
    /// count has not incremented yet.
    fn min_unmet(&self, node: &'g StructureNode, path: &[usize]) -> bool {
        if self.count(path) >= node.cardinality.min {
            return false;
        }
        match &node.kind {
            StructureKind::Token { .. } => true,
            StructureKind::OneOf(alts) => match self.choices.get(path) {
                Some(&k) => match alts[k].kind {
                    StructureKind::Token { .. } => true,
                    _ => {
                        let mut p = path.to_vec();
                        p.push(k);
                        self.min_unmet(&alts[k], &p)
                    }
                },
                None => true,
            },
            StructureKind::Sequence(children) => children.iter().enumerate().any(|(j, child)| {
                let mut p = path.to_vec();
                p.push(j);
                self.min_unmet(child, &p)
            }),
        }
    }

    fn collect_expected(
        &self,
        node: &'g StructureNode,
        path: &[usize],
        seen: &mut FxHashSet<&'g str>,
        out: &mut Vec<&'g str>,
    ) {
        match &node.kind {
            StructureKind::Token { .. } => {
                if seen.insert(node.id.as_str()) {
                    out.push(node.id.as_str());
                }
            }
            StructureKind::OneOf(alts) => {
                if let Some(&k) = self.choices.get(path) {
                    let mut p = path.to_vec();
                    p.push(k);
                    self.collect_expected(&alts[k], &p, seen, out);
                } else {
                    for (k, alt) in alts.iter().enumerate() {
                        let mut p = path.to_vec();
                        p.push(k);
                        self.collect_expected(alt, &p, seen, out);
                    }
                }
            }
            StructureKind::Sequence(children) => {
                let mut blocked = false;
                for j in self.seq_cursor(path)..children.len() {
                    let child = &children[j];
                    let mut p = path.to_vec();
                    p.push(j);
                    let count = self.count(&p);
                    if !child.cardinality.saturated(count) {
                        self.collect_expected(child, &p, seen, out);
                    }
                    if self.min_unmet(child, &p) {
                        blocked = true;
                        break;
                    }
                }
                // The next repetition's opening tokens, when one may start
                if !blocked
                    && self.seq_cursor(path) > 0
                    && !node.cardinality.saturated(self.count(path) + 1)
                {
                    for child in children {
                        collect_fresh(child, seen, out);
                        if child.cardinality.min > 0 {
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Attempts to consume `token_id` at the current position.
    ///
    /// On success the match count along the accepting path is incremented,
    /// a OneOf records its choice, and a sequence's cursor advances once the
    /// matched child is saturated. Returns false when no node in scope
    /// accepts the token.
    pub fn try_match(&mut self, token_id: &str) -> bool {
        for i in self.cursor..self.nodes.len() {
            let node = &self.nodes[i];
            let path = vec![i];
            let count = self.count(&path);
            if !node.cardinality.saturated(count) && self.match_node(node, &path, token_id) {
                // Matching here passes every earlier node for good, skipped
                // optionals included.
                self.cursor = i;
                self.advance_cursor();
                return true;
            }
            if self.min_unmet(node, &path) {
                return false;
            }
        }
        false
    }

    fn advance_cursor(&mut self) {
        while self.cursor < self.nodes.len() {
            let node = &self.nodes[self.cursor];
            if node.cardinality.saturated(self.count(&[self.cursor])) {
                self.cursor += 1;
            } else {
                break;
            }
        }
    }

    fn match_node(&mut self, node: &'g StructureNode, path: &[usize], token_id: &str) -> bool {
        match &node.kind {
            StructureKind::Token { .. } => {
                if node.id == token_id {
                    *self.counts.entry(path.to_vec()).or_insert(0) += 1;
                    true
                } else {
                    false
                }
            }
            StructureKind::OneOf(alts) => {
                if let Some(&k) = self.choices.get(path) {
                    let alt = &alts[k];
                    let mut p = path.to_vec();
                    p.push(k);
                    if self.match_node(alt, &p, token_id) {
                        self.bump_alternative(path, k, alt);
                        true
                    } else {
                        false
                    }
                } else {
                    for (k, alt) in alts.iter().enumerate() {
                        let mut p = path.to_vec();
                        p.push(k);
                        if self.match_node(alt, &p, token_id) {
                            self.choices.insert(path.to_vec(), k);
                            self.bump_alternative(path, k, alt);
                            return true;
                        }
                    }
                    false
                }
            }
            StructureKind::Sequence(children) => {
                for j in self.seq_cursor(path)..children.len() {
                    let child = &children[j];
                    let mut p = path.to_vec();
                    p.push(j);
                    let count = self.count(&p);
                    if !child.cardinality.saturated(count) && self.match_node(child, &p, token_id)
                    {
                        if child.cardinality.saturated(self.count(&p)) {
                            self.seq_cursors.insert(path.to_vec(), j + 1);
                            if j + 1 == children.len() {
                                self.complete_sequence(node, path);
                            }
                        } else {
                            self.seq_cursors.insert(path.to_vec(), j);
                        }
                        return true;
                    }
                    if self.min_unmet(child, &p) {
                        return false;
                    }
                }
                // An underway repetition with only optional tail left counts
                // as complete once the incoming token opens the next one.
                if self.seq_cursor(path) > 0
                    && !node.cardinality.saturated(self.count(path) + 1)
                    && self.tail_minimums_met(children, path)
                    && opens_fresh(children, token_id)
                {
                    self.complete_sequence(node, path);
                    return self.match_node(node, path, token_id);
                }
                false
            }
        }
    }

    /// Keeps a OneOf's own count in step with its chosen alternative. A leaf
    /// alternative counts every match as one unit; a composite alternative
    /// contributes its completed repetitions, so the group stays open while
    /// a repetition is underway.
    fn bump_alternative(&mut self, path: &[usize], alt_index: usize, alt: &StructureNode) {
        match alt.kind {
            StructureKind::Token { .. } => {
                *self.counts.entry(path.to_vec()).or_insert(0) += 1;
            }
            _ => {
                let mut p = path.to_vec();
                p.push(alt_index);
                let completed = self.count(&p);
                self.counts.insert(path.to_vec(), completed);
            }
        }
    }

    /// Called when a sequence's last child saturates: one full repetition is
    /// done. If more repetitions are allowed, the subtree state is cleared
    /// so the next repetition starts fresh.
    fn complete_sequence(&mut self, node: &StructureNode, path: &[usize]) {
        let count = {
            let c = self.counts.entry(path.to_vec()).or_insert(0);
            *c += 1;
            *c
        };
        if !node.cardinality.saturated(count) {
            self.reset_subtree(path);
            self.seq_cursors.insert(path.to_vec(), 0);
        }
    }

    /// Whether every child from the sequence cursor onward has its minimum
    /// met, i.e. the current repetition could end here.
    fn tail_minimums_met(&self, children: &'g [StructureNode], path: &[usize]) -> bool {
        (self.seq_cursor(path)..children.len()).all(|j| {
            let mut p = path.to_vec();
            p.push(j);
            !self.min_unmet(&children[j], &p)
        })
    }

    fn reset_subtree(&mut self, path: &[usize]) {
        let is_below = |key: &NodePath| key.len() > path.len() && key.starts_with(path);
        self.counts.retain(|k, _| !is_below(k));
        self.choices.retain(|k, _| !is_below(k));
        self.seq_cursors.retain(|k, _| !is_below(k));
    }

    /// Required node ids whose minimum cardinality is still unmet, for the
    /// end-of-message incompleteness report. Leaf nodes report their token
    /// id; an unchosen OneOf reports its group id. Empty once a token marked
    /// `terminal` has matched: the message is complete from there on.
    pub fn missing_required(&self) -> Vec<&'g str> {
        if self.terminal_reached() {
            return Vec::new();
        }
        let mut out = Vec::new();
        for (i, node) in self.nodes.iter().enumerate() {
            self.collect_missing(node, &[i], &mut out);
        }
        out
    }

    fn collect_missing(&self, node: &'g StructureNode, path: &[usize], out: &mut Vec<&'g str>) {
        if self.count(path) >= node.cardinality.min {
            return;
        }
        match &node.kind {
            StructureKind::Token { .. } => out.push(node.id.as_str()),
            StructureKind::OneOf(alts) => {
                if let Some(&k) = self.choices.get(path) {
                    let mut p = path.to_vec();
                    p.push(k);
                    self.collect_missing(&alts[k], &p, out);
                } else {
                    out.push(node.id.as_str());
                }
            }
            StructureKind::Sequence(children) => {
                for (j, child) in children.iter().enumerate() {
                    let mut p = path.to_vec();
                    p.push(j);
                    self.collect_missing(child, &p, out);
                }
            }
        }
    }

    fn terminal_reached(&self) -> bool {
        self.nodes
            .iter()
            .enumerate()
            .any(|(i, node)| self.terminal_matched(node, &[i]))
    }

    fn terminal_matched(&self, node: &'g StructureNode, path: &[usize]) -> bool {
        match &node.kind {
            StructureKind::Token { terminal } => *terminal && self.count(path) > 0,
            StructureKind::OneOf(children) | StructureKind::Sequence(children) => {
                children.iter().enumerate().any(|(j, child)| {
                    let mut p = path.to_vec();
                    p.push(j);
                    self.terminal_matched(child, &p)
                })
            }
        }
    }
}

/// Token ids a node with no accumulated state could open with.
fn collect_fresh<'g>(
    node: &'g StructureNode,
    seen: &mut FxHashSet<&'g str>,
    out: &mut Vec<&'g str>,
) {
    match &node.kind {
        StructureKind::Token { .. } => {
            if seen.insert(node.id.as_str()) {
                out.push(node.id.as_str());
            }
        }
        StructureKind::OneOf(alts) => {
            for alt in alts {
                collect_fresh(alt, seen, out);
            }
        }
        StructureKind::Sequence(children) => {
            for child in children {
                collect_fresh(child, seen, out);
                if child.cardinality.min > 0 {
                    break;
                }
            }
        }
    }
}

/// Whether a fresh pass over `children` would accept `token_id` as its
/// first token.
fn opens_fresh(children: &[StructureNode], token_id: &str) -> bool {
    for child in children {
        if accepts_first(child, token_id) {
            return true;
        }
        if child.cardinality.min > 0 {
            return false;
        }
    }
    false
}

fn accepts_first(node: &StructureNode, token_id: &str) -> bool {
    match &node.kind {
        StructureKind::Token { .. } => node.id == token_id,
        StructureKind::OneOf(alts) => alts.iter().any(|alt| accepts_first(alt, token_id)),
        StructureKind::Sequence(children) => opens_fresh(children, token_id),
    }
}
