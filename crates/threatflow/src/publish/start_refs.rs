//! Entry points of a flow.
//!
//! Only actionable nodes (actions and conditions) take part. For each of them,
//! the nodes it reaches through any chain of non-actionable nodes are its
//! successors in a reduced graph; the start refs are the actionable nodes no
//! other actionable node reaches.

use std::{collections::HashSet, hash::Hash};

use indexmap::IndexMap;
use log::debug;

use crate::error::PublishError;

/// Computes the start refs among `nodes`, keeping their order.
///
/// `next` yields a node's direct successors. A walk stops at the first
/// actionable node on each path, and never visits a node twice, so cycles
/// through non-actionable nodes terminate.
///
/// # Errors
///
/// Returns [`PublishError::NoStartRefs`] if there are actionable nodes but
/// every one of them is reached by another, which only happens on a cycle.
pub fn compute_start_refs<N, I>(
    nodes: &[N],
    is_actionable: impl Fn(N) -> bool,
    next: impl Fn(N) -> I,
) -> Result<Vec<N>, PublishError>
where
    N: Copy + Eq + Hash,
    I: IntoIterator<Item = N>,
{
    let mut reduced: IndexMap<N, Vec<N>> = IndexMap::new();
    let mut stack = Vec::new();
    let mut visited = HashSet::new();

    for &node in nodes.iter().filter(|&&node| is_actionable(node)) {
        let mut successors = Vec::new();
        stack.clear();
        visited.clear();
        stack.extend(next(node));
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            if is_actionable(current) {
                successors.push(current);
            } else {
                stack.extend(next(current));
            }
        }
        reduced.insert(node, successors);
    }

    let reached: HashSet<N> = reduced.values().flatten().copied().collect();
    let starts: Vec<N> = reduced
        .keys()
        .copied()
        .filter(|node| !reached.contains(node))
        .collect();

    debug!(
        actionable = reduced.len(),
        start_refs = starts.len();
        "Start refs computed"
    );

    if starts.is_empty() && !reduced.is_empty() {
        return Err(PublishError::NoStartRefs);
    }
    Ok(starts)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Adjacency list over node indices.
    fn walker(edges: &[(usize, usize)]) -> impl Fn(usize) -> Vec<usize> + '_ {
        move |node| {
            edges
                .iter()
                .filter(|(from, _)| *from == node)
                .map(|(_, to)| *to)
                .collect()
        }
    }

    #[test]
    fn test_chain_through_non_actionable() {
        // 0 -> 1 -> 2, only 0 and 2 are actionable.
        let edges = [(0, 1), (1, 2)];
        let starts = compute_start_refs(&[0, 1, 2], |n| n != 1, walker(&edges)).unwrap();
        assert_eq!(starts, vec![0]);
    }

    #[test]
    fn test_walk_stops_at_actionable() {
        // 0 -> 1 -> 2: 1 is actionable, so 0 only reaches 1.
        let edges = [(0, 1), (1, 2)];
        let next = walker(&edges);
        let starts = compute_start_refs(&[2, 1, 0], |_| true, &next).unwrap();
        assert_eq!(starts, vec![0]);
    }

    #[test]
    fn test_independent_roots_keep_order() {
        let edges = [(3, 0), (1, 0)];
        let starts = compute_start_refs(&[0, 1, 2, 3], |_| true, walker(&edges)).unwrap();
        assert_eq!(starts, vec![1, 2, 3]);
    }

    #[test]
    fn test_no_actionable_nodes() {
        let edges = [(0, 1)];
        let starts = compute_start_refs(&[0, 1], |_| false, walker(&edges)).unwrap();
        assert!(starts.is_empty());
    }

    #[test]
    fn test_cycle_is_an_error() {
        // 0 -> 1 -> 2 -> 0 through a non-actionable 1.
        let edges = [(0, 1), (1, 2), (2, 0)];
        let result = compute_start_refs(&[0, 1, 2], |n| n != 1, walker(&edges));
        assert!(matches!(result, Err(PublishError::NoStartRefs)));
    }

    #[test]
    fn test_non_actionable_cycle_terminates() {
        // 0 -> 1 <-> 2, with 1 and 2 non-actionable.
        let edges = [(0, 1), (1, 2), (2, 1)];
        let starts = compute_start_refs(&[0, 1, 2], |n| n == 0, walker(&edges)).unwrap();
        assert_eq!(starts, vec![0]);
    }
}
