//! Interfaces to the files being indexed.
//!
//! The index never parses range files itself. A [`RangeFileReader`] opens a
//! file, lists its chromosomes and interval records, and later resolves the
//! rows behind a record hit by a query.

mod memory;

pub use memory::{MemoryRangeFile, MemoryRangeReader, SignalRow};

use indexmap::IndexMap;

use crate::errors::QuindexResult;

/// A row returned by a payload fetch.
pub trait GenomicRow {
    /// Start coordinate, used to order query results.
    fn start(&self) -> u64;
}

/// One interval record of a range file: a coordinate span and the location
/// of the data block covering it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeRecord {
    pub start: u64,
    pub end: u64,
    pub data_offset: u64,
    pub data_size: u64,
}

impl RangeRecord {
    pub fn new(start: u64, end: u64, data_offset: u64, data_size: u64) -> Self {
        RangeRecord {
            start,
            end,
            data_offset,
            data_size,
        }
    }
}

/// Reader for one family of range files.
pub trait RangeFileReader {
    /// An open file
    type Handle;
    /// Rows produced by payload fetches
    type Row: GenomicRow;

    fn open(&self, path: &str) -> QuindexResult<Self::Handle>;

    /// Chromosome names of the file mapped to the ids the file uses.
    fn chromosome_ids(&self, handle: &Self::Handle) -> QuindexResult<IndexMap<String, u32>>;

    fn interval_records(&self, handle: &Self::Handle, chrom_id: u32) -> QuindexResult<Vec<RangeRecord>>;

    /// Rows of `record` overlapping `[start, end]`.
    fn fetch_payload(
        &self,
        handle: &Self::Handle,
        chrom_id: u32,
        start: u64,
        end: u64,
        record: &RangeRecord,
    ) -> QuindexResult<Vec<Self::Row>>;
}
