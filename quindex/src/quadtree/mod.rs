//! Loose quadtree with in-memory and on-disk intersection search.
//!
//! A tree is either *built* in memory through [`QuadTreeBuilder`] and
//! optionally written with [`QuadTree::to_disk`], or *opened* from an index
//! file. Opened trees are read-only; [`QuadTree::load`] materializes every
//! node while [`QuadTree::open`] keeps only the file path and reads nodes
//! per query.
//!
//! # Examples
//!
//! ```rust
//! use quindex::quadtree::{QuadTree, SearchMode};
//! use quindex::schema::{Field, ItemSchema};
//! use quindex::{Item, Rect};
//!
//! let mut tree = QuadTree::builder()
//!     .bbox(Rect::new(0.0, 0.0, 1024.0, 1024.0))
//!     .max_items(4)
//!     .schema(ItemSchema::new(vec![Field::int64("id")]).unwrap())
//!     .build()
//!     .unwrap();
//!
//! for i in 0..6i64 {
//!     let x = 100.0 * i as f64;
//!     tree.insert(Item::from([i]), Rect::new(x, x, x + 10.0, x + 10.0)).unwrap();
//! }
//!
//! assert_eq!(tree.len(), 6);
//! let found = tree
//!     .intersect(&Rect::new(0.0, 0.0, 150.0, 150.0), SearchMode::Memory)
//!     .unwrap();
//! assert_eq!(found.len(), 2);
//! ```

mod constants;
mod disk;
mod node;
mod search;
mod types;

pub use constants::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_ITEMS, FORMAT_VERSION, MAGIC};
pub use disk::{CodecError, CodecResult, IndexHeader};
pub use types::{Entry, Quadrant, SearchMode, TreeConfig, TreeStats};

use std::path::{Path, PathBuf};

use crate::bounding_box::Rect;
use crate::errors::{ErrorKind, QuindexError, QuindexResult};
use crate::schema::{IntervalRecord, Item, ItemSchema};

use disk::DiskSource;
use node::QuadNode;
use search::MemorySource;

/// Builder for an in-memory [`QuadTree`].
///
/// The extent is set either as a bounding box or as a center and size; the
/// item schema defaults to [`IntervalRecord::schema`].
#[derive(Debug, Clone, Default)]
pub struct QuadTreeBuilder {
    bbox: Option<Rect>,
    center: Option<(f64, f64, f64, f64)>,
    config: TreeConfig,
    schema: Option<ItemSchema>,
}

impl QuadTreeBuilder {
    pub fn new() -> Self {
        QuadTreeBuilder::default()
    }

    pub fn bbox(mut self, bbox: Rect) -> Self {
        self.bbox = Some(bbox);
        self
    }

    /// Sets the extent as a `width` x `height` area around `(x, y)`.
    pub fn center(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.center = Some((x, y, width, height));
        self
    }

    pub fn max_items(mut self, max_items: usize) -> Self {
        self.config.max_items = max_items;
        self
    }

    pub fn max_depth(mut self, max_depth: u32) -> Self {
        self.config.max_depth = max_depth;
        self
    }

    pub fn config(mut self, config: TreeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn schema(mut self, schema: ItemSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn build(self) -> QuindexResult<QuadTree> {
        let bbox = match (self.bbox, self.center) {
            (Some(bbox), _) => bbox,
            (None, Some((x, y, width, height))) => Rect::from_center(x, y, width, height),
            (None, None) => {
                return Err(QuindexError::new(
                    "A quadtree needs either a bounding box or a center and size",
                    ErrorKind::ConfigurationError,
                ))
            }
        };
        let schema = self.schema.unwrap_or_else(IntervalRecord::schema);
        QuadTree::new(bbox, self.config, schema)
    }
}

#[derive(Debug, Clone)]
struct Backing {
    path: PathBuf,
    root_offset: u64,
}

/// A loose quadtree over items of one [`ItemSchema`].
#[derive(Debug, Clone)]
pub struct QuadTree {
    bbox: Rect,
    config: TreeConfig,
    schema: ItemSchema,
    // absent for lazily opened trees
    root: Option<QuadNode>,
    backing: Option<Backing>,
    read_only: bool,
    lazy_stats: TreeStats,
}

impl QuadTree {
    pub fn builder() -> QuadTreeBuilder {
        QuadTreeBuilder::new()
    }

    /// Creates an empty tree covering `bbox`.
    pub fn new(bbox: Rect, config: TreeConfig, schema: ItemSchema) -> QuindexResult<Self> {
        config.validate()?;
        let finite = bbox.to_array().iter().all(|c| c.is_finite());
        if !finite || bbox.width() <= 0.0 || bbox.height() <= 0.0 {
            return Err(QuindexError::new(
                &format!("Invalid quadtree extent {}", bbox),
                ErrorKind::ConfigurationError,
            ));
        }

        Ok(QuadTree {
            bbox,
            config,
            schema,
            root: Some(QuadNode::new(bbox, 0)),
            backing: None,
            read_only: false,
            lazy_stats: TreeStats::default(),
        })
    }

    /// Opens an index file and reads every node into memory.
    pub fn load<P: AsRef<Path>>(path: P) -> QuindexResult<Self> {
        let path = path.as_ref();
        let header = disk::read_header(path)?;
        let mut source = DiskSource::open(path, &header.schema)?;
        let root = source.load(header.root_offset, &header.bbox)?;
        log::debug!("Loaded {} entries from {}", root.len(), path.display());

        Ok(QuadTree {
            bbox: header.bbox,
            config: header.config,
            root: Some(root),
            backing: Some(Backing {
                path: path.to_path_buf(),
                root_offset: header.root_offset,
            }),
            schema: header.schema,
            read_only: true,
            lazy_stats: TreeStats::default(),
        })
    }

    /// Opens an index file for on-disk search only.
    ///
    /// The header and the node structure are validated up front; items are
    /// decoded per query.
    pub fn open<P: AsRef<Path>>(path: P) -> QuindexResult<Self> {
        let path = path.as_ref();
        let header = disk::read_header(path)?;
        let mut stats = TreeStats::default();
        DiskSource::open(path, &header.schema)?.scan(header.root_offset, &header.bbox, &mut stats)?;
        stats.split = stats.nodes > 1;
        log::debug!("Opened {} ({} entries) for disk search", path.display(), stats.items);

        Ok(QuadTree {
            bbox: header.bbox,
            config: header.config,
            root: None,
            backing: Some(Backing {
                path: path.to_path_buf(),
                root_offset: header.root_offset,
            }),
            schema: header.schema,
            read_only: true,
            lazy_stats: stats,
        })
    }

    /// Inserts `item` with footprint `rect`.
    ///
    /// # Errors
    ///
    /// `SchemaMismatch` when the item does not fit the schema,
    /// `InvalidOperation` for trees opened from a file. A built tree that was
    /// written with [`QuadTree::to_disk`] is detached from that file.
    pub fn insert(&mut self, item: Item, rect: Rect) -> QuindexResult<()> {
        if self.read_only {
            return Err(QuindexError::new(
                "Cannot insert into a quadtree opened from an index file",
                ErrorKind::InvalidOperation,
            ));
        }
        self.schema.validate(&item)?;

        let root = self.root.as_mut().ok_or_else(|| {
            QuindexError::new("Quadtree has no in-memory root", ErrorKind::InternalError)
        })?;
        if let Some(backing) = self.backing.take() {
            log::warn!(
                "Insert detaches quadtree from stale index file {}",
                backing.path.display()
            );
        }

        let rect = Rect::new(rect.min_x, rect.min_y, rect.max_x, rect.max_y);
        root.insert(Entry::new(item, rect), &self.config);
        Ok(())
    }

    /// Items whose rect intersects `query`.
    pub fn intersect(&self, query: &Rect, mode: SearchMode) -> QuindexResult<Vec<Item>> {
        let mut found = Vec::new();
        self.search(query, mode, &mut |entry| found.push(entry.item.clone()))?;
        Ok(found)
    }

    /// Like [`QuadTree::intersect`] but also returns each item's own rect.
    pub fn intersect_debug(&self, query: &Rect, mode: SearchMode) -> QuindexResult<Vec<Entry>> {
        let mut found = Vec::new();
        self.search(query, mode, &mut |entry| found.push(entry.clone()))?;
        Ok(found)
    }

    fn search<F: FnMut(&Entry)>(&self, query: &Rect, mode: SearchMode, emit: &mut F) -> QuindexResult<()> {
        match mode {
            SearchMode::Memory => {
                let root = self.root.as_ref().ok_or_else(|| {
                    QuindexError::new(
                        "Memory search on a quadtree opened for disk search only",
                        ErrorKind::InvalidOperation,
                    )
                })?;
                search::search(&mut MemorySource, root, &self.bbox, query, emit)
            }
            SearchMode::Disk => {
                let backing = self.backing.as_ref().ok_or_else(|| {
                    QuindexError::new(
                        "Disk search on a quadtree without an index file",
                        ErrorKind::InvalidOperation,
                    )
                })?;
                let mut source = DiskSource::open(&backing.path, &self.schema)?;
                search::search(&mut source, backing.root_offset, &self.bbox, query, emit)
            }
        }
    }

    /// Writes the tree to `path` and makes it the backing file for disk search.
    ///
    /// # Errors
    ///
    /// `CapacityOverflow` when a node holds more entries than the format can
    /// record, `InvalidOperation` for lazily opened trees.
    pub fn to_disk<P: AsRef<Path>>(&mut self, path: P) -> QuindexResult<()> {
        let path = path.as_ref();
        let root = self.root.as_ref().ok_or_else(|| {
            QuindexError::new(
                "Cannot write a quadtree opened for disk search only",
                ErrorKind::InvalidOperation,
            )
        })?;

        let header = IndexHeader::new(self.config, self.bbox, self.schema.clone());
        disk::write_tree(path, &header, root)?;
        self.backing = Some(Backing {
            path: path.to_path_buf(),
            root_offset: header.root_offset,
        });
        Ok(())
    }

    /// Every stored entry, children before local entries.
    pub fn entries(&self) -> QuindexResult<Vec<&Entry>> {
        let root = self.root.as_ref().ok_or_else(|| {
            QuindexError::new(
                "Entries of a lazily opened quadtree are only available through disk search",
                ErrorKind::InvalidOperation,
            )
        })?;
        let mut entries = Vec::with_capacity(root.len());
        root.collect(&mut entries);
        Ok(entries)
    }

    pub fn len(&self) -> usize {
        match &self.root {
            Some(root) => root.len(),
            None => self.lazy_stats.items,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> TreeStats {
        match &self.root {
            Some(root) => {
                let mut stats = TreeStats::default();
                root.accumulate_stats(&mut stats);
                stats.split = !root.is_leaf();
                stats
            }
            None => self.lazy_stats,
        }
    }

    pub fn bbox(&self) -> Rect {
        self.bbox
    }

    pub fn config(&self) -> TreeConfig {
        self.config
    }

    pub fn schema(&self) -> &ItemSchema {
        &self.schema
    }

    /// Backing index file, if the tree was written or opened.
    pub fn path(&self) -> Option<&Path> {
        self.backing.as_ref().map(|b| b.path.as_path())
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Whether nodes are read from disk per query.
    pub fn is_lazy(&self) -> bool {
        self.root.is_none()
    }
}
