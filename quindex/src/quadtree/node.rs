use crate::bounding_box::Rect;

use super::types::{Entry, Quadrant, TreeConfig, TreeStats};

/// In-memory quadtree node.
///
/// Children are present only after a split and are stored in
/// [`Quadrant::ALL`] order.
#[derive(Debug, Clone)]
pub(crate) struct QuadNode {
    pub(crate) extent: Rect,
    pub(crate) depth: u32,
    pub(crate) entries: Vec<Entry>,
    pub(crate) children: Option<Box<[QuadNode; 4]>>,
    subtree_len: usize,
}

impl QuadNode {
    pub(crate) fn new(extent: Rect, depth: u32) -> Self {
        QuadNode {
            extent,
            depth,
            entries: Vec::new(),
            children: None,
            subtree_len: 0,
        }
    }

    /// Rebuilds a node read back from an index file.
    pub(crate) fn restore(
        extent: Rect,
        depth: u32,
        entries: Vec<Entry>,
        children: Option<Box<[QuadNode; 4]>>,
    ) -> Self {
        let below = children
            .as_ref()
            .map_or(0, |c| c.iter().map(QuadNode::len).sum::<usize>());
        QuadNode {
            extent,
            depth,
            subtree_len: entries.len() + below,
            entries,
            children,
        }
    }

    /// Entries held by this node and every descendant.
    pub(crate) fn len(&self) -> usize {
        self.subtree_len
    }

    pub(crate) fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    pub(crate) fn insert(&mut self, entry: Entry, config: &TreeConfig) {
        self.subtree_len += 1;
        if let Some(children) = self.children.as_mut() {
            match Self::route(&self.extent, &entry.rect) {
                Some(quadrant) => children[quadrant as usize].insert(entry, config),
                None => self.entries.push(entry),
            }
            return;
        }

        self.entries.push(entry);
        if self.entries.len() > config.max_items && self.depth < config.max_depth {
            self.split(config);
        }
    }

    // Child receiving `rect`, if any. The rect must lie strictly on one side
    // of both center lines and inside the child's extent.
    fn route(extent: &Rect, rect: &Rect) -> Option<Quadrant> {
        let (cx, cy) = extent.center();
        Quadrant::of(rect, cx, cy).filter(|q| q.extent_in(extent).contains(rect))
    }

    fn split(&mut self, config: &TreeConfig) {
        let depth = self.depth + 1;
        let extent = self.extent;
        self.children = Some(Box::new(
            Quadrant::ALL.map(|q| QuadNode::new(q.extent_in(&extent), depth)),
        ));

        let held = std::mem::take(&mut self.entries);
        log::trace!(
            "Splitting node {} at depth {} with {} entries",
            self.extent,
            self.depth,
            held.len()
        );
        if let Some(children) = self.children.as_mut() {
            for entry in held {
                match Self::route(&extent, &entry.rect) {
                    Some(quadrant) => children[quadrant as usize].insert(entry, config),
                    None => self.entries.push(entry),
                }
            }
        }
    }

    /// Visits every entry, children first in quadrant order, then local entries.
    pub(crate) fn collect<'a>(&'a self, out: &mut Vec<&'a Entry>) {
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.collect(out);
            }
        }
        out.extend(self.entries.iter());
    }

    pub(crate) fn accumulate_stats(&self, stats: &mut TreeStats) {
        stats.nodes += 1;
        stats.items += self.entries.len();
        stats.depth = stats.depth.max(self.depth);
        match &self.children {
            None => stats.leaves += 1,
            Some(children) => {
                for child in children.iter() {
                    child.accumulate_stats(stats);
                }
            }
        }
    }
}
