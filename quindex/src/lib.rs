//! # Quindex - Hilbert Quadtree Index for Genomic Ranges
//!
//! This crate answers range queries over genomic coordinates
//! (`chromosome, start, end`) across many indexed files. Each chromosome is
//! laid out on a Hilbert curve; interval records become rectangles in the
//! curve's 2-D lattice and are stored in a loose quadtree that can be
//! searched in memory or straight from its index file.
//!
//! ## Features
//!
//! - **Hilbert Mapping**: 1-D intervals turned into conservative 2-D bounding boxes
//! - **Loose Quadtree**: Spanning items stay at the parent, never duplicated
//! - **Dual-Mode Search**: Identical results from memory and from disk
//! - **Self-Describing Files**: Positional binary format carrying its item schema
//! - **Lazy Opening**: Trees can be searched on disk without loading them
//!
//! ## Quick Start
//!
//! ```rust
//! use quindex::{Genome, MemoryRangeFile, MemoryRangeReader, QueryOptions, Quindex, SignalRow};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut file = MemoryRangeFile::new(16);
//! file.add_row(SignalRow::new("chr1", 10, 20, 0.5));
//! let reader = MemoryRangeReader::new().with_file("signal.bw", file);
//!
//! let mut index = Quindex::builder()
//!     .genome(Genome::new("toy").with_chromosome("chr1", 1000))
//!     .build(reader)?;
//! index.add_to_index("signal.bw")?;
//!
//! let rows = index.query("chr1", 0, 50, &QueryOptions::default())?;
//! assert_eq!(rows.len(), 1);
//! assert!(index.query("chr1", 5000, 6000, &QueryOptions::default())?.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod bounding_box;
pub mod config;
pub mod errors;
pub mod genome;
pub mod hilbert;
pub mod quadtree;
pub mod reader;
pub mod registry;
pub mod schema;

pub use bounding_box::Rect;
pub use config::{QuindexBuilder, QuindexConfig};
pub use errors::{ErrorKind, QuindexError, QuindexResult};
pub use genome::{ChromSizesDir, Genome, GenomeSource};
pub use hilbert::HilbertMapper;
pub use quadtree::{Entry, QuadTree, QuadTreeBuilder, SearchMode, TreeConfig, TreeStats};
pub use reader::{GenomicRow, MemoryRangeFile, MemoryRangeReader, RangeFileReader, RangeRecord, SignalRow};
pub use registry::{QueryOptions, QueryRow, Quindex};
pub use schema::{IntervalRecord, Item, ItemSchema, Value};
