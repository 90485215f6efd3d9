//! Constants for the on-disk quadtree format.

/// Magic bytes at the start of every index file
pub const MAGIC: [u8; 8] = *b"QUADIDX\0";

/// File format version
pub const FORMAT_VERSION: i32 = 1;

/// Header bytes before the schema string: magic, four i32 fields, the root
/// bbox, the root offset, the item width and the schema length
pub const HEADER_FIXED_SIZE: u64 = 8 + 4 * 4 + 4 * 8 + 8 + 4 + 4;

/// Node record prefix: center, size, depth, item count, leaf flag
pub const NODE_HEADER_SIZE: u64 = 4 * 8 + 4 + 4 + 1;

/// Four child offsets following the prefix of an internal node
pub const CHILD_OFFSETS_SIZE: u64 = 4 * 8;

/// Child offset marking an empty subtree
pub const NO_CHILD: i64 = -1;

/// Default split threshold of a node
pub const DEFAULT_MAX_ITEMS: usize = 256;

/// Default depth limit of a tree
pub const DEFAULT_MAX_DEPTH: u32 = 20;
