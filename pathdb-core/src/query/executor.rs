//! Backtracking matcher driven by a [`QueryPlan`].
//!
//! Each plan step owns one frame on an explicit stack. A frame enumerates
//! candidate ids for its path position; a candidate is bound when its record
//! exists, its predicates hold, and it agrees with every neighbour bound so
//! far. An exhausted frame is popped and the step below it moves on.

use std::collections::VecDeque;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::trace;

use crate::error::{Error, RecordKind, Result};
use crate::query::ast::{Direction, PatternRef};
use crate::query::evaluator::matches_all;
use crate::query::planner::{Constraint, DeductionStep, QueryPlan};
use crate::record::{Edge, EdgeSet, Node};
use crate::storage::GraphStore;

const SCAN_CHUNK: usize = 128;

/// Records bound to the returned variables of one match, in return order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Binding {
    pub nodes: IndexMap<String, Node>,
    pub edges: IndexMap<String, Edge>,
}

impl Binding {
    pub fn node(&self, variable: &str) -> Option<&Node> {
        self.nodes.get(variable)
    }

    pub fn edge(&self, variable: &str) -> Option<&Edge> {
        self.edges.get(variable)
    }
}

#[derive(Debug, Clone)]
enum Bound {
    Node(Node),
    Edge(Edge),
}

impl Bound {
    fn id(&self) -> &str {
        match self {
            Bound::Node(n) => &n.id,
            Bound::Edge(e) => &e.id,
        }
    }
}

#[derive(Debug)]
enum Candidates {
    Listed(VecDeque<String>),
    /// Key-ordered scan, fetched a chunk at a time.
    Scan {
        kind: RecordKind,
        after: Option<String>,
        buffer: VecDeque<String>,
        exhausted: bool,
    },
}

impl Candidates {
    fn scan(kind: RecordKind) -> Self {
        Candidates::Scan {
            kind,
            after: None,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    fn pull<S: GraphStore>(&mut self, store: &S) -> Result<Option<String>> {
        match self {
            Candidates::Listed(list) => Ok(list.pop_front()),
            Candidates::Scan {
                kind,
                after,
                buffer,
                exhausted,
            } => {
                if buffer.is_empty() && !*exhausted {
                    let chunk = match kind {
                        RecordKind::Node => store.node_ids_after(after.as_deref(), SCAN_CHUNK)?,
                        RecordKind::Edge => store.edge_ids_after(after.as_deref(), SCAN_CHUNK)?,
                    };
                    *exhausted = chunk.len() < SCAN_CHUNK;
                    if let Some(last) = chunk.last() {
                        *after = Some(last.clone());
                    }
                    buffer.extend(chunk);
                }
                Ok(buffer.pop_front())
            }
        }
    }
}

impl From<EdgeSet> for Candidates {
    fn from(set: EdgeSet) -> Self {
        Candidates::Listed(set.into_iter().collect())
    }
}

#[derive(Debug)]
struct Frame {
    step: usize,
    candidates: Candidates,
}

#[derive(Debug, Clone)]
struct Match {
    /// Id bound at every path position.
    ids: Vec<String>,
    binding: Binding,
}

/// Lazily enumerates the matches of one query.
///
/// Usable both as an [`Iterator`] and through the cursor-style
/// [`is_end`](Self::is_end) / [`get`](Self::get) / [`advance`](Self::advance)
/// methods. If advancing fails the iterator keeps its previous match, and
/// advancing again resumes the search after the candidate that failed.
pub struct MatchIterator<'g, S: GraphStore> {
    store: &'g S,
    plan: Option<Arc<QueryPlan>>,
    /// Path position of every returned variable.
    returns: Vec<(String, usize)>,
    slots: Vec<Option<Bound>>,
    frames: Vec<Frame>,
    current: Option<Match>,
    consumed: bool,
    matches: usize,
}

impl<'g, S: GraphStore> MatchIterator<'g, S> {
    /// Positions the iterator on the first match, or at the end.
    pub(crate) fn new(store: &'g S, plan: Arc<QueryPlan>) -> Result<Self> {
        let select = &plan.query.select;
        let returns = plan
            .query
            .returns
            .names
            .iter()
            .filter_map(|name| select.position_of(name).map(|p| (name.clone(), p)))
            .collect();

        let mut iter = Self {
            store,
            returns,
            slots: vec![None; select.len()],
            frames: Vec::with_capacity(plan.steps.len()),
            plan: None,
            current: None,
            consumed: false,
            matches: 0,
        };
        let first = iter.open_frame(&plan, 0)?;
        iter.frames.push(first);
        iter.plan = Some(plan);
        iter.seek()?;
        Ok(iter)
    }

    pub(crate) fn end(store: &'g S) -> Self {
        Self {
            store,
            plan: None,
            returns: Vec::new(),
            slots: Vec::new(),
            frames: Vec::new(),
            current: None,
            consumed: true,
            matches: 0,
        }
    }

    pub fn is_end(&self) -> bool {
        self.current.is_none()
    }

    /// The current match.
    pub fn get(&self) -> Result<&Binding> {
        self.current
            .as_ref()
            .map(|m| &m.binding)
            .ok_or(Error::InvalidIteratorUse("dereferencing an end iterator"))
    }

    /// Moves to the next match, or to the end.
    pub fn advance(&mut self) -> Result<()> {
        if self.is_end() {
            return Err(Error::InvalidIteratorUse("advancing an end iterator"));
        }
        self.seek()?;
        self.consumed = false;
        Ok(())
    }

    fn seek(&mut self) -> Result<()> {
        let Some(plan) = self.plan.clone() else {
            self.current = None;
            return Ok(());
        };
        if self.search(&plan)? {
            self.matches += 1;
            self.current = Some(self.snapshot());
        } else {
            trace!(matches = self.matches, "executor.exhausted");
            self.current = None;
            self.frames.clear();
            self.slots.iter_mut().for_each(|slot| *slot = None);
        }
        Ok(())
    }

    /// Runs the search until every step is bound. `false` once exhausted.
    fn search(&mut self, plan: &QueryPlan) -> Result<bool> {
        loop {
            let Some(frame) = self.frames.last_mut() else {
                return Ok(false);
            };
            let step = plan.steps[frame.step];
            // Whatever this frame bound last is being replaced.
            self.slots[step.position] = None;

            let Some(id) = frame.candidates.pull(self.store)? else {
                self.frames.pop();
                continue;
            };
            if !self.try_bind(plan, step, &id)? {
                continue;
            }

            let depth = self.frames.len();
            if depth == plan.steps.len() {
                return Ok(true);
            }
            let next = self.open_frame(plan, depth)?;
            self.frames.push(next);
        }
    }

    fn try_bind(&mut self, plan: &QueryPlan, step: DeductionStep, id: &str) -> Result<bool> {
        let pattern = plan.query.select.position(step.position);
        let fetched = match pattern {
            PatternRef::Node(_) => self.store.get_node(id).map(Bound::Node),
            PatternRef::Edge(_) => self.store.get_edge(id).map(Bound::Edge),
        };
        let record = match fetched {
            Ok(record) => record,
            // Index entries may outlive their record; such ids just don't match.
            Err(err) if err.is_not_found() => return Ok(false),
            Err(err) => return Err(err),
        };

        let accepted = match &record {
            Bound::Node(node) => matches_all(node, pattern.properties())?,
            Bound::Edge(edge) => matches_all(edge, pattern.properties())?,
        };
        if !accepted {
            return Ok(false);
        }

        self.slots[step.position] = Some(record);
        if self.consistent(plan, step.position) {
            Ok(true)
        } else {
            self.slots[step.position] = None;
            Ok(false)
        }
    }

    /// Checks every bound edge touching `position` against its bound ends.
    fn consistent(&self, plan: &QueryPlan, position: usize) -> bool {
        let touching = if position % 2 == 1 {
            [Some(position), None]
        } else {
            [position.checked_sub(1), Some(position + 1)]
        };
        touching
            .into_iter()
            .flatten()
            .filter(|&p| p < self.slots.len())
            .all(|p| match self.edge_at(p) {
                Some(edge) => edge_fits(
                    edge,
                    self.direction(plan, p),
                    self.node_at(p - 1),
                    self.node_at(p + 1),
                ),
                None => true,
            })
    }

    fn open_frame(&self, plan: &QueryPlan, step_index: usize) -> Result<Frame> {
        let step = plan.steps[step_index];
        let pattern = plan.query.select.position(step.position);
        let candidates = match (step.direct, pattern.direct_id()) {
            (true, Some(id)) => Candidates::Listed(VecDeque::from([id.to_owned()])),
            _ => match pattern {
                PatternRef::Node(_) => self.node_candidates(plan, step),
                PatternRef::Edge(_) => self.edge_candidates(plan, step)?,
            },
        };
        Ok(Frame {
            step: step_index,
            candidates,
        })
    }

    fn node_candidates(&self, plan: &QueryPlan, step: DeductionStep) -> Candidates {
        let p = step.position;
        let left = p.checked_sub(1).and_then(|e| self.edge_at(e));
        let right = self.edge_at(p + 1);

        let ends = match (step.constraint, left, right) {
            (Constraint::Left | Constraint::Both, Some(edge), _) => {
                match self.direction(plan, p - 1) {
                    Direction::Next => vec![&edge.to],
                    Direction::Prev => vec![&edge.from],
                    Direction::Bidirection => vec![&edge.from, &edge.to],
                }
            }
            (Constraint::Right | Constraint::Both, _, Some(edge)) => {
                match self.direction(plan, p + 1) {
                    Direction::Next => vec![&edge.from],
                    Direction::Prev => vec![&edge.to],
                    Direction::Bidirection => vec![&edge.from, &edge.to],
                }
            }
            _ => return Candidates::scan(RecordKind::Node),
        };

        let mut list: VecDeque<String> = VecDeque::with_capacity(ends.len());
        for end in ends {
            if !list.contains(end) {
                list.push_back(end.clone());
            }
        }
        Candidates::Listed(list)
    }

    fn edge_candidates(&self, plan: &QueryPlan, step: DeductionStep) -> Result<Candidates> {
        let p = step.position;
        let direction = self.direction(plan, p);
        let left = self.node_at(p - 1);
        let right = self.node_at(p + 1);

        let set = match (step.constraint, left, right) {
            (Constraint::Both, Some(l), Some(r)) => {
                let from_left = self.adjacent(l, direction, true)?;
                let from_right = self.adjacent(r, direction, false)?;
                from_left.intersection(&from_right).cloned().collect()
            }
            (Constraint::Left | Constraint::Both, Some(l), _) => {
                self.adjacent(l, direction, true)?
            }
            (Constraint::Right | Constraint::Both, _, Some(r)) => {
                self.adjacent(r, direction, false)?
            }
            _ => return Ok(Candidates::scan(RecordKind::Edge)),
        };
        Ok(set.into())
    }

    /// Edges of `node` that can sit next to it in the pattern.
    fn adjacent(&self, node: &str, direction: Direction, node_is_left: bool) -> Result<EdgeSet> {
        match (direction, node_is_left) {
            (Direction::Next, true) | (Direction::Prev, false) => self.store.out_edges(node),
            (Direction::Next, false) | (Direction::Prev, true) => self.store.in_edges(node),
            (Direction::Bidirection, _) => {
                let mut set = self.store.out_edges(node)?;
                set.extend(self.store.in_edges(node)?);
                Ok(set)
            }
        }
    }

    /// Undirected stores ignore arrow heads.
    fn direction(&self, plan: &QueryPlan, position: usize) -> Direction {
        if !self.store.is_directed() {
            return Direction::Bidirection;
        }
        match plan.query.select.position(position) {
            PatternRef::Edge(edge) => edge.direction,
            PatternRef::Node(_) => Direction::Bidirection,
        }
    }

    fn node_at(&self, position: usize) -> Option<&str> {
        match self.slots.get(position)? {
            Some(Bound::Node(node)) => Some(&node.id),
            _ => None,
        }
    }

    fn edge_at(&self, position: usize) -> Option<&Edge> {
        match self.slots.get(position)? {
            Some(Bound::Edge(edge)) => Some(edge),
            _ => None,
        }
    }

    fn snapshot(&self) -> Match {
        let mut binding = Binding::default();
        for (name, position) in &self.returns {
            match &self.slots[*position] {
                Some(Bound::Node(node)) => {
                    binding.nodes.insert(name.clone(), node.clone());
                }
                Some(Bound::Edge(edge)) => {
                    binding.edges.insert(name.clone(), edge.clone());
                }
                None => {}
            }
        }
        let ids = self
            .slots
            .iter()
            .map(|slot| slot.as_ref().map(|b| b.id().to_owned()).unwrap_or_default())
            .collect();
        Match { ids, binding }
    }
}

/// Whether `edge` can connect the bound ends of its pattern position.
fn edge_fits(edge: &Edge, direction: Direction, left: Option<&str>, right: Option<&str>) -> bool {
    let forward = left.is_none_or(|l| l == edge.from) && right.is_none_or(|r| r == edge.to);
    let backward = left.is_none_or(|l| l == edge.to) && right.is_none_or(|r| r == edge.from);
    match direction {
        Direction::Next => forward,
        Direction::Prev => backward,
        Direction::Bidirection => forward || backward,
    }
}

impl<S: GraphStore> Iterator for MatchIterator<'_, S> {
    type Item = Result<Binding>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.consumed {
            if self.is_end() {
                return None;
            }
            if let Err(err) = self.advance() {
                return Some(Err(err));
            }
        }
        self.consumed = true;
        self.current.as_ref().map(|m| Ok(m.binding.clone()))
    }
}

/// Two end iterators are equal; otherwise the bound ids are compared by
/// path position.
impl<S: GraphStore> PartialEq for MatchIterator<'_, S> {
    fn eq(&self, other: &Self) -> bool {
        match (&self.current, &other.current) {
            (None, None) => true,
            (Some(a), Some(b)) => a.ids == b.ids,
            _ => false,
        }
    }
}

impl<S: GraphStore> std::fmt::Debug for MatchIterator<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchIterator")
            .field("current", &self.current.as_ref().map(|m| &m.ids))
            .field("depth", &self.frames.len())
            .finish()
    }
}
