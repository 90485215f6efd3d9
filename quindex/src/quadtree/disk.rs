//! Positional binary format of a quadtree index file.
//!
//! A file is a header followed by node records laid out breadth first. Every
//! child offset is known before its parent is written, so the whole file is
//! produced in one sequential pass.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

use crate::bounding_box::Rect;
use crate::errors::{ErrorKind, QuindexError, QuindexResult};
use crate::schema::ItemSchema;

use super::constants::*;
use super::node::QuadNode;
use super::search::{NodeSource, NodeView};
use super::types::{Entry, Quadrant, TreeConfig, TreeStats};

/// Low-level failures of the index file codec.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid index file (bad magic)")]
    BadMagic,

    #[error("Unsupported index format version {0}")]
    UnsupportedVersion(i32),

    #[error("Corrupt index file: {0}")]
    Corrupt(String),

    #[error("Node holds {0} entries, more than an index file can record")]
    TooManyEntries(usize),
}

impl From<CodecError> for QuindexError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(io_err) => io_err.into(),
            CodecError::BadMagic | CodecError::UnsupportedVersion(_) | CodecError::Corrupt(_) => {
                QuindexError::new(&err.to_string(), ErrorKind::FormatError)
            }
            CodecError::TooManyEntries(_) => {
                QuindexError::new(&err.to_string(), ErrorKind::CapacityOverflow)
            }
        }
    }
}

pub type CodecResult<T> = Result<T, CodecError>;

fn corrupt(message: String) -> CodecError {
    CodecError::Corrupt(message)
}

/// Header stored at the beginning of an index file.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHeader {
    pub config: TreeConfig,
    pub bbox: Rect,
    pub root_offset: u64,
    pub schema: ItemSchema,
}

impl IndexHeader {
    pub fn new(config: TreeConfig, bbox: Rect, schema: ItemSchema) -> Self {
        let mut header = IndexHeader {
            config,
            bbox,
            root_offset: 0,
            schema,
        };
        header.root_offset = header.encoded_len();
        header
    }

    /// Bytes taken by the header, which is also where the root node starts.
    pub fn encoded_len(&self) -> u64 {
        HEADER_FIXED_SIZE + self.schema.to_schema_string().len() as u64
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> CodecResult<()> {
        let schema = self.schema.to_schema_string();
        w.write_all(&MAGIC)?;
        w.write_i32::<LittleEndian>(to_i32(self.config.max_items, "max_items")?)?;
        w.write_i32::<LittleEndian>(FORMAT_VERSION)?;
        w.write_i32::<LittleEndian>(to_i32(self.config.max_depth as usize, "max_depth")?)?;
        w.write_i32::<LittleEndian>(0)?;
        for corner in self.bbox.to_array() {
            w.write_f64::<LittleEndian>(corner)?;
        }
        w.write_i64::<LittleEndian>(self.root_offset as i64)?;
        w.write_i32::<LittleEndian>(to_i32(self.schema.item_width(), "item width")?)?;
        w.write_i32::<LittleEndian>(to_i32(schema.len(), "schema length")?)?;
        w.write_all(schema.as_bytes())?;
        Ok(())
    }

    /// Reads and validates a header from a file of `file_len` bytes.
    pub fn read_from<R: Read>(r: &mut R, file_len: u64) -> QuindexResult<Self> {
        let mut magic = [0u8; 8];
        r.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(CodecError::BadMagic.into());
        }

        let max_items = r.read_i32::<LittleEndian>()?;
        let version = r.read_i32::<LittleEndian>()?;
        if version != FORMAT_VERSION {
            return Err(CodecError::UnsupportedVersion(version).into());
        }
        let max_depth = r.read_i32::<LittleEndian>()?;
        let _reserved = r.read_i32::<LittleEndian>()?;
        if max_items < 1 || max_depth < 0 {
            return Err(corrupt(format!(
                "invalid tree limits max_items={} max_depth={}",
                max_items, max_depth
            ))
            .into());
        }

        let mut corners = [0f64; 4];
        r.read_f64_into::<LittleEndian>(&mut corners)?;
        let root_offset = r.read_i64::<LittleEndian>()?;
        let item_width = r.read_i32::<LittleEndian>()?;
        let schema_len = r.read_i32::<LittleEndian>()?;
        if schema_len <= 0 || HEADER_FIXED_SIZE + schema_len as u64 > file_len {
            return Err(corrupt(format!("invalid schema length {}", schema_len)).into());
        }

        let mut schema_bytes = vec![0u8; schema_len as usize];
        r.read_exact(&mut schema_bytes)?;
        let schema = String::from_utf8(schema_bytes)
            .map_err(|_| corrupt("schema string is not valid UTF-8".to_string()))?;
        let schema = ItemSchema::parse(&schema)?;
        if item_width < 0 || item_width as usize != schema.item_width() {
            return Err(corrupt(format!(
                "item width {} does not match schema width {}",
                item_width,
                schema.item_width()
            ))
            .into());
        }

        let header_len = HEADER_FIXED_SIZE + schema_len as u64;
        if root_offset < header_len as i64 || root_offset as u64 + NODE_HEADER_SIZE > file_len {
            return Err(corrupt(format!("root offset {} out of range", root_offset)).into());
        }

        Ok(IndexHeader {
            config: TreeConfig::new(max_items as usize, max_depth as u32),
            bbox: Rect::from_array(corners),
            root_offset: root_offset as u64,
            schema,
        })
    }
}

fn to_i32(value: usize, what: &str) -> CodecResult<i32> {
    i32::try_from(value).map_err(|_| corrupt(format!("{} {} does not fit the format", what, value)))
}

/// Item count field of a node record.
pub(crate) fn entry_count(len: usize) -> CodecResult<i32> {
    i32::try_from(len).map_err(|_| CodecError::TooManyEntries(len))
}

fn node_size(node: &QuadNode, record_width: u64) -> u64 {
    let offsets = if node.is_leaf() { 0 } else { CHILD_OFFSETS_SIZE };
    NODE_HEADER_SIZE + offsets + node.entries.len() as u64 * record_width
}

/// Writes `root` and its subtree to `path`, replacing any existing file.
///
/// Children whose subtree holds no entries are recorded as [`NO_CHILD`] and
/// not written.
pub(crate) fn write_tree(path: &Path, header: &IndexHeader, root: &QuadNode) -> QuindexResult<()> {
    let mut w = BufWriter::new(File::create(path)?);
    header.write_to(&mut w)?;

    let record_width = header.schema.record_width() as u64;
    let mut next_offset = header.root_offset + node_size(root, record_width);
    let mut queue = VecDeque::from([root]);
    let mut written = 0usize;

    while let Some(node) = queue.pop_front() {
        let (cx, cy) = node.extent.center();
        w.write_f64::<LittleEndian>(cx)?;
        w.write_f64::<LittleEndian>(cy)?;
        w.write_f64::<LittleEndian>(node.extent.width())?;
        w.write_f64::<LittleEndian>(node.extent.height())?;
        w.write_i32::<LittleEndian>(to_i32(node.depth as usize, "depth")?)?;
        w.write_i32::<LittleEndian>(entry_count(node.entries.len())?)?;
        w.write_u8(u8::from(node.is_leaf()))?;

        if let Some(children) = &node.children {
            for child in children.iter() {
                if child.len() == 0 {
                    w.write_i64::<LittleEndian>(NO_CHILD)?;
                } else {
                    w.write_i64::<LittleEndian>(next_offset as i64)?;
                    next_offset += node_size(child, record_width);
                    queue.push_back(child);
                }
            }
        }

        for entry in &node.entries {
            header.schema.encode(&entry.item, &entry.rect, &mut w)?;
        }
        written += 1;
    }

    w.flush()?;
    log::debug!(
        "Wrote {} nodes ({} bytes) to {}",
        written,
        next_offset,
        path.display()
    );
    Ok(())
}

/// Prefix of a node record.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NodeRecord {
    /// center x, center y, width and height as written
    pub(crate) geometry: [f64; 4],
    pub(crate) depth: u32,
    pub(crate) count: usize,
    pub(crate) children: Option<[Option<u64>; 4]>,
}

/// Reads nodes from an index file through one buffered handle.
///
/// The handle lives as long as the source, so a query opens the file once
/// and releases it on every return path.
pub(crate) struct DiskSource<'s> {
    reader: BufReader<File>,
    schema: &'s ItemSchema,
    file_len: u64,
}

impl<'s> DiskSource<'s> {
    pub(crate) fn open(path: &Path, schema: &'s ItemSchema) -> QuindexResult<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        Ok(DiskSource {
            reader: BufReader::new(file),
            schema,
            file_len,
        })
    }

    pub(crate) fn record(&mut self, offset: u64) -> QuindexResult<NodeRecord> {
        if offset + NODE_HEADER_SIZE > self.file_len {
            return Err(corrupt(format!("node offset {} beyond end of file", offset)).into());
        }
        self.reader.seek(SeekFrom::Start(offset))?;

        let mut geometry = [0f64; 4];
        self.reader.read_f64_into::<LittleEndian>(&mut geometry)?;
        let depth = self.reader.read_i32::<LittleEndian>()?;
        let count = self.reader.read_i32::<LittleEndian>()?;
        let is_leaf = self.reader.read_u8()?;
        if depth < 0 || count < 0 || is_leaf > 1 {
            return Err(corrupt(format!("malformed node record at offset {}", offset)).into());
        }

        let mut items_start = offset + NODE_HEADER_SIZE;
        let children = if is_leaf == 1 {
            None
        } else {
            items_start += CHILD_OFFSETS_SIZE;
            let mut slots = [None; 4];
            for slot in slots.iter_mut() {
                let child = self.reader.read_i64::<LittleEndian>()?;
                if child == NO_CHILD {
                    continue;
                }
                // breadth-first layout puts every child after its parent
                if child <= offset as i64 || child as u64 + NODE_HEADER_SIZE > self.file_len {
                    return Err(corrupt(format!(
                        "child offset {} of node at {} out of range",
                        child, offset
                    ))
                    .into());
                }
                *slot = Some(child as u64);
            }
            Some(slots)
        };

        let count = count as usize;
        if items_start + count as u64 * self.schema.record_width() as u64 > self.file_len {
            return Err(corrupt(format!("truncated item block at offset {}", items_start)).into());
        }

        Ok(NodeRecord {
            geometry,
            depth: depth as u32,
            count,
            children,
        })
    }

    /// Reads the record at `offset` and checks its stored geometry against
    /// `extent`, the extent derived from the header bbox.
    pub(crate) fn node(&mut self, offset: u64, extent: &Rect) -> QuindexResult<NodeRecord> {
        let record = self.record(offset)?;
        let (cx, cy) = extent.center();
        let expected = [cx, cy, extent.width(), extent.height()];
        let scale = extent.width().abs().max(extent.height().abs()).max(cx.abs()).max(cy.abs());
        let tolerance = scale * 1e-9;
        let matches = record
            .geometry
            .iter()
            .zip(expected)
            .all(|(stored, derived)| (stored - derived).abs() <= tolerance);
        if !matches {
            return Err(corrupt(format!(
                "node at offset {} does not cover its quadrant of {}",
                offset, extent
            ))
            .into());
        }
        Ok(record)
    }

    // Reads the item block following the record just read.
    fn entries(&mut self, count: usize) -> QuindexResult<Vec<Entry>> {
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let (item, rect) = self.schema.decode(&mut self.reader)?;
            entries.push(Entry::new(item, rect));
        }
        Ok(entries)
    }

    /// Materializes the subtree at `offset` covering `extent`.
    pub(crate) fn load(&mut self, offset: u64, extent: &Rect) -> QuindexResult<QuadNode> {
        let record = self.node(offset, extent)?;
        let entries = self.entries(record.count)?;

        let children = match record.children {
            None => None,
            Some(slots) => {
                let mut nodes = Vec::with_capacity(4);
                for (quadrant, slot) in Quadrant::ALL.iter().zip(slots) {
                    let child_extent = quadrant.extent_in(extent);
                    nodes.push(match slot {
                        Some(child) => self.load(child, &child_extent)?,
                        None => QuadNode::new(child_extent, record.depth + 1),
                    });
                }
                let nodes: [QuadNode; 4] = nodes.try_into().map_err(|_| {
                    QuindexError::new("Node must have four children", ErrorKind::InternalError)
                })?;
                Some(Box::new(nodes))
            }
        };

        Ok(QuadNode::restore(*extent, record.depth, entries, children))
    }

    /// Walks node records under `offset` without decoding items.
    ///
    /// Empty child slots count as empty leaves, matching a tree built in
    /// memory.
    pub(crate) fn scan(&mut self, offset: u64, extent: &Rect, stats: &mut TreeStats) -> QuindexResult<()> {
        let record = self.node(offset, extent)?;
        stats.nodes += 1;
        stats.items += record.count;
        stats.depth = stats.depth.max(record.depth);

        match record.children {
            None => stats.leaves += 1,
            Some(slots) => {
                for (quadrant, slot) in Quadrant::ALL.iter().zip(slots) {
                    match slot {
                        Some(child) => self.scan(child, &quadrant.extent_in(extent), stats)?,
                        None => {
                            stats.nodes += 1;
                            stats.leaves += 1;
                            stats.depth = stats.depth.max(record.depth + 1);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

impl<'a> NodeSource<'a> for DiskSource<'_> {
    type Handle = u64;

    fn read(&mut self, offset: u64, extent: &Rect) -> QuindexResult<NodeView<'a, u64>> {
        let record = self.node(offset, extent)?;
        let entries = self.entries(record.count)?;
        Ok(NodeView {
            entries: Cow::Owned(entries),
            children: record.children,
        })
    }
}

/// Opens `path` and reads its header.
pub(crate) fn read_header(path: &Path) -> QuindexResult<IndexHeader> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);
    IndexHeader::read_from(&mut reader, file_len)
}
