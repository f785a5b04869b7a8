//! In-memory arena over label parent edges.
//!
//! Built from one snapshot of `(label, parent)` pairs. Depth and hierarchy
//! statistics are computed here so no recursion over storage is needed.

use crate::model::label::LabelId;
use std::collections::{HashMap, HashSet};

/// Id-indexed label forest snapshot.
#[derive(Debug, Default, Clone)]
pub struct LabelTree {
    parents: HashMap<LabelId, Option<LabelId>>,
    children: HashMap<LabelId, Vec<LabelId>>,
    roots: Vec<LabelId>,
}

impl LabelTree {
    /// Builds the arena. A parent id absent from `edges` makes its child a
    /// root.
    pub fn from_edges<I>(edges: I) -> Self
    where
        I: IntoIterator<Item = (LabelId, Option<LabelId>)>,
    {
        let edges: Vec<_> = edges.into_iter().collect();
        let parents: HashMap<_, _> = edges.iter().copied().collect();
        let mut children: HashMap<LabelId, Vec<LabelId>> = HashMap::new();
        let mut roots = Vec::new();
        for (id, parent) in edges {
            match parent.filter(|parent| parents.contains_key(parent)) {
                Some(parent) => children.entry(parent).or_default().push(id),
                None => roots.push(id),
            }
        }
        Self {
            parents,
            children,
            roots,
        }
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn contains(&self, id: LabelId) -> bool {
        self.parents.contains_key(&id)
    }

    pub fn roots(&self) -> &[LabelId] {
        &self.roots
    }

    pub fn children(&self, id: LabelId) -> &[LabelId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Height of the subtree under `id`: 1 for a leaf.
    pub fn depth(&self, id: LabelId) -> Option<usize> {
        if !self.contains(id) {
            return None;
        }
        let mut memo = HashMap::new();
        Some(self.fill_depth(id, &mut memo))
    }

    /// Depth of every root, in root order.
    pub fn root_depths(&self) -> Vec<usize> {
        let mut memo = HashMap::new();
        self.roots
            .iter()
            .map(|root| self.fill_depth(*root, &mut memo))
            .collect()
    }

    /// Iterative post-order fill. Nodes already on the stack are skipped
    /// as children, so corrupted cyclic input still terminates.
    fn fill_depth(&self, start: LabelId, memo: &mut HashMap<LabelId, usize>) -> usize {
        if let Some(depth) = memo.get(&start) {
            return *depth;
        }
        let mut in_progress = HashSet::new();
        let mut stack = vec![(start, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                let below = self
                    .children(id)
                    .iter()
                    .filter_map(|child| memo.get(child))
                    .max()
                    .copied()
                    .unwrap_or(0);
                memo.insert(id, below + 1);
                in_progress.remove(&id);
                continue;
            }
            if memo.contains_key(&id) || !in_progress.insert(id) {
                continue;
            }
            stack.push((id, true));
            for child in self.children(id) {
                if !memo.contains_key(child) && !in_progress.contains(child) {
                    stack.push((*child, false));
                }
            }
        }
        memo.get(&start).copied().unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::LabelTree;
    use uuid::Uuid;

    fn chain(len: usize) -> Vec<Uuid> {
        (0..len).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn leaf_has_depth_one() {
        let id = Uuid::new_v4();
        let tree = LabelTree::from_edges([(id, None)]);
        assert_eq!(tree.depth(id), Some(1));
        assert_eq!(tree.roots(), &[id]);
    }

    #[test]
    fn chain_of_fifty_reports_full_depth() {
        let ids = chain(50);
        let edges = ids
            .iter()
            .enumerate()
            .map(|(index, id)| (*id, index.checked_sub(1).map(|parent| ids[parent])));
        let tree = LabelTree::from_edges(edges);

        assert_eq!(tree.depth(ids[0]), Some(50));
        assert_eq!(tree.depth(ids[49]), Some(1));
        assert_eq!(tree.root_depths(), vec![50]);
    }

    #[test]
    fn depth_takes_deepest_branch() {
        let ids = chain(5);
        // 0 -> {1, 2}, 2 -> 3 -> 4
        let tree = LabelTree::from_edges([
            (ids[0], None),
            (ids[1], Some(ids[0])),
            (ids[2], Some(ids[0])),
            (ids[3], Some(ids[2])),
            (ids[4], Some(ids[3])),
        ]);
        assert_eq!(tree.depth(ids[0]), Some(4));
        assert_eq!(tree.children(ids[0]), &[ids[1], ids[2]]);
    }

    #[test]
    fn unknown_label_has_no_depth() {
        let tree = LabelTree::from_edges([(Uuid::new_v4(), None)]);
        assert_eq!(tree.depth(Uuid::new_v4()), None);
    }

    #[test]
    fn cyclic_input_terminates() {
        let ids = chain(2);
        let tree = LabelTree::from_edges([(ids[0], Some(ids[1])), (ids[1], Some(ids[0]))]);
        assert!(tree.roots().is_empty());
        assert_eq!(tree.depth(ids[0]), Some(2));
    }
}
