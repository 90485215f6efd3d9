//! Intersection traversal shared by in-memory and on-disk trees.
//!
//! A [`NodeSource`] hands out one node at a time as a [`NodeView`]; the
//! traversal itself never knows whether the node came from memory or was
//! decoded from an index file, so both search modes prune identically.
//! Node extents are derived from the root extent while descending, never
//! taken from the source.

use std::borrow::Cow;

use crate::bounding_box::Rect;
use crate::errors::QuindexResult;

use super::node::QuadNode;
use super::types::{Entry, Quadrant};

/// One node as seen by the traversal.
pub(crate) struct NodeView<'a, H> {
    pub(crate) entries: Cow<'a, [Entry]>,
    /// `None` for leaves; an empty slot is a subtree holding no entries
    pub(crate) children: Option<[Option<H>; 4]>,
}

pub(crate) trait NodeSource<'a> {
    type Handle: Copy;

    /// Reads the node at `handle`, whose extent is `extent`.
    fn read(&mut self, handle: Self::Handle, extent: &Rect) -> QuindexResult<NodeView<'a, Self::Handle>>;
}

/// Serves nodes of a tree held in memory.
pub(crate) struct MemorySource;

impl<'a> NodeSource<'a> for MemorySource {
    type Handle = &'a QuadNode;

    fn read(&mut self, node: &'a QuadNode, _extent: &Rect) -> QuindexResult<NodeView<'a, &'a QuadNode>> {
        let children = node.children.as_ref().map(|children| {
            let mut slots = [None; 4];
            for (slot, child) in slots.iter_mut().zip(children.iter()) {
                if child.len() > 0 {
                    *slot = Some(child);
                }
            }
            slots
        });
        Ok(NodeView {
            entries: Cow::Borrowed(&node.entries),
            children,
        })
    }
}

/// Calls `emit` for every entry whose rect intersects `query` in the tree
/// rooted at `root`, which covers `root_extent`.
///
/// Once the query contains a node's extent, the whole subtree matches:
/// children are descended without tests and their entries are emitted
/// directly. Root entries are always tested since they may lie outside the
/// root extent.
pub(crate) fn search<'a, S, F>(
    source: &mut S,
    root: S::Handle,
    root_extent: &Rect,
    query: &Rect,
    emit: &mut F,
) -> QuindexResult<()>
where
    S: NodeSource<'a>,
    F: FnMut(&Entry),
{
    visit(source, root, *root_extent, query, false, true, emit)
}

fn visit<'a, S, F>(
    source: &mut S,
    handle: S::Handle,
    extent: Rect,
    query: &Rect,
    contained: bool,
    is_root: bool,
    emit: &mut F,
) -> QuindexResult<()>
where
    S: NodeSource<'a>,
    F: FnMut(&Entry),
{
    let view = source.read(handle, &extent)?;
    let contained = contained || query.contains(&extent);

    if let Some(children) = view.children {
        for (quadrant, child) in Quadrant::ALL.iter().zip(children) {
            let Some(child) = child else {
                continue;
            };
            let child_extent = quadrant.extent_in(&extent);
            if contained || query.intersects(&child_extent) {
                visit(source, child, child_extent, query, contained, false, emit)?;
            }
        }
    }

    let skip_tests = contained && !is_root;
    for entry in view.entries.iter() {
        if skip_tests || query.intersects(&entry.rect) {
            emit(entry);
        }
    }
    Ok(())
}
