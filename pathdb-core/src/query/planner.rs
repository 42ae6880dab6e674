//! Compiles a parsed query into deduction steps.
//!
//! Positions pinned by an `id = literal` predicate are resolved first. The
//! remaining positions are filled gap by gap, alternating inward from the
//! two anchors so each step can be derived from an already bound neighbour.
//! The position where a gap closes is bound on both sides.

use tracing::trace;

use crate::query::ast::GraphQuery;

/// Which neighbours of a position are bound by the time it is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    None,
    Left,
    Right,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeductionStep {
    pub position: usize,
    pub constraint: Constraint,
    /// Resolved straight from an `id` literal.
    pub direct: bool,
}

/// A parsed query with its execution order. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub query: GraphQuery,
    pub steps: Vec<DeductionStep>,
}

pub fn plan(query: GraphQuery) -> QueryPlan {
    let len = query.select.len();
    let mut steps: Vec<DeductionStep> = Vec::with_capacity(len);

    for position in 0..len {
        if query.select.position(position).direct_id().is_some() {
            let constraint = match steps.last() {
                Some(prev) if prev.position + 1 == position => Constraint::Left,
                _ => Constraint::None,
            };
            steps.push(DeductionStep {
                position,
                constraint,
                direct: true,
            });
        }
    }

    // Virtual bounds sit one past either end of the path.
    let last = len as isize - 1;
    let anchors: Vec<isize> = steps.iter().map(|s| s.position as isize).collect();
    let mut left = -1;
    for &anchor in &anchors {
        fill_gap(&mut steps, left, anchor, last);
        left = anchor;
    }
    fill_gap(&mut steps, left, last + 1, last);

    trace!(
        positions = len,
        direct = anchors.len(),
        "planner.plan"
    );
    QueryPlan { query, steps }
}

/// Adds the positions strictly between `left` and `right`.
fn fill_gap(steps: &mut Vec<DeductionStep>, left: isize, right: isize, last: isize) {
    let count = (right - left - 1).max(0) as usize;
    for j in 0..count {
        let half = (j / 2) as isize;
        let position = if j % 2 == 0 {
            left + half + 1
        } else {
            right - half - 1
        };

        let mut constraint = if j == count - 1 {
            Constraint::Both
        } else if j % 2 == 0 {
            Constraint::Left
        } else {
            Constraint::Right
        };
        if left < 0 {
            constraint = match constraint {
                Constraint::Left => Constraint::None,
                Constraint::Both => Constraint::Right,
                other => other,
            };
        }
        if right > last {
            constraint = match constraint {
                Constraint::Right => Constraint::None,
                Constraint::Both => Constraint::Left,
                other => other,
            };
        }

        steps.push(DeductionStep {
            position: position as usize,
            constraint,
            direct: false,
        });
    }
}
