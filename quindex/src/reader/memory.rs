use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::errors::{ErrorKind, QuindexError, QuindexResult};

use super::{GenomicRow, RangeFileReader, RangeRecord};

/// A signal value over `[start, end]` of one chromosome.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalRow {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    pub value: f64,
}

impl SignalRow {
    pub fn new(chrom: &str, start: u64, end: u64, value: f64) -> Self {
        SignalRow {
            chrom: chrom.to_string(),
            start,
            end,
            value,
        }
    }
}

impl GenomicRow for SignalRow {
    fn start(&self) -> u64 {
        self.start
    }
}

#[derive(Debug, Clone)]
struct Block {
    record: RangeRecord,
    rows: Vec<SignalRow>,
}

/// An already parsed range file: rows grouped per chromosome into blocks of
/// at most `block_size` rows, each block exposed as one interval record.
///
/// Record offsets count rows from the start of the file, the way a byte
/// offset would locate a block on disk.
#[derive(Debug, Clone)]
pub struct MemoryRangeFile {
    block_size: usize,
    chromosomes: IndexMap<String, u32>,
    blocks: HashMap<u32, Vec<Block>>,
    rows: u64,
}

impl MemoryRangeFile {
    pub fn new(block_size: usize) -> Self {
        MemoryRangeFile {
            block_size: block_size.max(1),
            chromosomes: IndexMap::new(),
            blocks: HashMap::new(),
            rows: 0,
        }
    }

    /// Appends a row. Rows of a chromosome should arrive sorted by start.
    pub fn add_row(&mut self, row: SignalRow) -> &mut Self {
        let next_id = self.chromosomes.len() as u32;
        let chrom_id = *self.chromosomes.entry(row.chrom.clone()).or_insert(next_id);
        let blocks = self.blocks.entry(chrom_id).or_default();

        let start_new = blocks
            .last()
            .map_or(true, |block| block.rows.len() >= self.block_size);
        if start_new {
            blocks.push(Block {
                record: RangeRecord::new(row.start, row.end, self.rows, 0),
                rows: Vec::new(),
            });
        }

        if let Some(block) = blocks.last_mut() {
            block.record.start = block.record.start.min(row.start);
            block.record.end = block.record.end.max(row.end);
            block.record.data_size += 1;
            block.rows.push(row);
        }
        self.rows += 1;
        self
    }

    pub fn with_rows<I: IntoIterator<Item = SignalRow>>(block_size: usize, rows: I) -> Self {
        let mut file = MemoryRangeFile::new(block_size);
        for row in rows {
            file.add_row(row);
        }
        file
    }

    pub fn row_count(&self) -> u64 {
        self.rows
    }

    fn block(&self, chrom_id: u32, record: &RangeRecord) -> QuindexResult<&Block> {
        self.blocks
            .get(&chrom_id)
            .and_then(|blocks| blocks.iter().find(|b| b.record.data_offset == record.data_offset))
            .ok_or_else(|| {
                QuindexError::new(
                    &format!(
                        "No block at offset {} for chromosome id {}",
                        record.data_offset, chrom_id
                    ),
                    ErrorKind::LookupError,
                )
            })
    }
}

/// A [`RangeFileReader`] over [`MemoryRangeFile`]s registered by path.
#[derive(Debug, Clone, Default)]
pub struct MemoryRangeReader {
    files: HashMap<String, Arc<MemoryRangeFile>>,
}

impl MemoryRangeReader {
    pub fn new() -> Self {
        MemoryRangeReader::default()
    }

    pub fn insert(&mut self, path: &str, file: MemoryRangeFile) {
        self.files.insert(path.to_string(), Arc::new(file));
    }

    pub fn with_file(mut self, path: &str, file: MemoryRangeFile) -> Self {
        self.insert(path, file);
        self
    }
}

impl RangeFileReader for MemoryRangeReader {
    type Handle = Arc<MemoryRangeFile>;
    type Row = SignalRow;

    fn open(&self, path: &str) -> QuindexResult<Self::Handle> {
        self.files.get(path).cloned().ok_or_else(|| {
            QuindexError::new(
                &format!("Range file {} not found", path),
                ErrorKind::FileNotFound,
            )
        })
    }

    fn chromosome_ids(&self, handle: &Self::Handle) -> QuindexResult<IndexMap<String, u32>> {
        Ok(handle.chromosomes.clone())
    }

    fn interval_records(&self, handle: &Self::Handle, chrom_id: u32) -> QuindexResult<Vec<RangeRecord>> {
        Ok(handle
            .blocks
            .get(&chrom_id)
            .map(|blocks| blocks.iter().map(|b| b.record).collect())
            .unwrap_or_default())
    }

    fn fetch_payload(
        &self,
        handle: &Self::Handle,
        chrom_id: u32,
        start: u64,
        end: u64,
        record: &RangeRecord,
    ) -> QuindexResult<Vec<SignalRow>> {
        let block = handle.block(chrom_id, record)?;
        Ok(block
            .rows
            .iter()
            .filter(|row| row.start <= end && row.end >= start)
            .cloned()
            .collect())
    }
}
