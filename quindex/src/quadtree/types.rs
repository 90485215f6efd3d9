use crate::bounding_box::Rect;
use crate::errors::{ErrorKind, QuindexError, QuindexResult};
use crate::schema::Item;

use super::constants::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_ITEMS};

/// Quadrant order of node children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quadrant {
    NorthEast = 0,
    NorthWest = 1,
    SouthWest = 2,
    SouthEast = 3,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::NorthEast,
        Quadrant::NorthWest,
        Quadrant::SouthWest,
        Quadrant::SouthEast,
    ];

    /// Extent of this quadrant inside `parent`.
    pub fn extent_in(&self, parent: &Rect) -> Rect {
        let (cx, cy) = parent.center();
        match self {
            Quadrant::NorthEast => Rect::new(cx, cy, parent.max_x, parent.max_y),
            Quadrant::NorthWest => Rect::new(parent.min_x, cy, cx, parent.max_y),
            Quadrant::SouthWest => Rect::new(parent.min_x, parent.min_y, cx, cy),
            Quadrant::SouthEast => Rect::new(cx, parent.min_y, parent.max_x, cy),
        }
    }

    /// Quadrant holding `rect` entirely on one side of both center lines.
    pub fn of(rect: &Rect, center_x: f64, center_y: f64) -> Option<Quadrant> {
        let east = rect.min_x > center_x;
        let west = rect.max_x < center_x;
        let north = rect.min_y > center_y;
        let south = rect.max_y < center_y;
        match (east, west, north, south) {
            (true, _, true, _) => Some(Quadrant::NorthEast),
            (_, true, true, _) => Some(Quadrant::NorthWest),
            (_, true, _, true) => Some(Quadrant::SouthWest),
            (true, _, _, true) => Some(Quadrant::SouthEast),
            _ => None,
        }
    }
}

/// Split and depth limits of a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeConfig {
    /// A node holding more entries than this splits, unless it is at `max_depth`
    pub max_items: usize,
    /// Depth below which nodes never split
    pub max_depth: u32,
}

impl TreeConfig {
    pub fn new(max_items: usize, max_depth: u32) -> Self {
        TreeConfig {
            max_items,
            max_depth,
        }
    }

    pub fn validate(&self) -> QuindexResult<()> {
        if self.max_items == 0 {
            return Err(QuindexError::new(
                "max_items must be at least 1",
                ErrorKind::ConfigurationError,
            ));
        }
        if self.max_items > i32::MAX as usize || self.max_depth > i32::MAX as u32 {
            return Err(QuindexError::new(
                "Tree limits must fit in a 32-bit signed integer",
                ErrorKind::ConfigurationError,
            ));
        }
        Ok(())
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        TreeConfig::new(DEFAULT_MAX_ITEMS, DEFAULT_MAX_DEPTH)
    }
}

/// An item stored in the tree together with its rectangle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Entry {
    pub item: Item,
    pub rect: Rect,
}

impl Entry {
    pub fn new(item: Item, rect: Rect) -> Self {
        Entry { item, rect }
    }
}

/// Where an intersection query reads nodes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// Walk the nodes held in memory
    #[default]
    Memory,
    /// Read nodes from the backing index file
    Disk,
}

/// Shape summary of a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeStats {
    pub items: usize,
    pub nodes: usize,
    pub leaves: usize,
    /// Deepest node level, the root being level 0
    pub depth: u32,
    /// Whether the root has children
    pub split: bool,
}
