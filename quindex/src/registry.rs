//! Multi-file genomic range index.
//!
//! A [`Quindex`] keeps one [`QuadTree`] per chromosome and an ordered
//! registry of indexed files. Each interval record of a file is mapped onto
//! the chromosome's Hilbert curve and stored as
//! `(start, end, data_offset, data_size, file_id)`. Queries map the range to
//! a Hilbert bounding box, search the tree, drop the records that do not
//! really overlap, and optionally resolve the rows through the reader.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::bounding_box::Rect;
use crate::config::{QuindexBuilder, QuindexConfig};
use crate::errors::{ErrorKind, QuindexError, QuindexResult};
use crate::genome::Genome;
use crate::hilbert::HilbertMapper;
use crate::quadtree::{QuadTree, SearchMode};
use crate::reader::{GenomicRow, RangeFileReader, RangeRecord};
use crate::schema::{IntervalRecord, Item};

/// Sidecar listing the chromosomes that have a tree file.
pub const CHROMOSOMES_FILE: &str = "chromosomes.index";

/// Sidecar listing indexed files; the position of a file is its id.
pub const FILES_FILE: &str = "files.index";

/// Name of the tree file of `chrom`.
pub fn tree_file_name(chrom: &str) -> String {
    format!("quadtree.{}.index", chrom)
}

/// Options of a registry query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    /// Search trees held in memory. Trees opened lazily are always searched
    /// on disk.
    pub in_memory: bool,
    /// Only return records of this file
    pub file: Option<String>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        QueryOptions {
            in_memory: true,
            file: None,
        }
    }
}

impl QueryOptions {
    pub fn new() -> Self {
        QueryOptions::default()
    }

    pub fn on_disk() -> Self {
        QueryOptions {
            in_memory: false,
            file: None,
        }
    }

    pub fn in_memory(mut self, in_memory: bool) -> Self {
        self.in_memory = in_memory;
        self
    }

    pub fn file(mut self, file: &str) -> Self {
        self.file = Some(file.to_string());
        self
    }
}

/// A payload row together with the file and record it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRow<R> {
    pub file_id: u32,
    pub file: String,
    pub record: IntervalRecord,
    pub row: R,
}

/// Registry of chromosome trees and indexed files.
pub struct Quindex<R: RangeFileReader> {
    config: QuindexConfig,
    reader: R,
    trees: IndexMap<String, QuadTree>,
    files: Vec<String>,
    handles: Mutex<HashMap<u32, Arc<R::Handle>>>,
}

// records of one chromosome ready to insert
struct PreparedChromosome {
    chrom: String,
    tree: Option<QuadTree>,
    entries: Vec<(Item, Rect)>,
}

impl<R: RangeFileReader> Quindex<R> {
    pub fn builder() -> QuindexBuilder<R> {
        QuindexBuilder::new()
    }

    /// Creates an empty registry. `config` is expected to be validated.
    pub fn new(config: QuindexConfig, reader: R) -> Self {
        Quindex {
            config,
            reader,
            trees: IndexMap::new(),
            files: Vec::new(),
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Opens a registry written by [`Quindex::to_disk`] under the configured
    /// base path.
    pub fn open(config: QuindexConfig, reader: R, eager: bool) -> QuindexResult<Self> {
        let mut index = Quindex::new(config, reader);
        index.from_disk(eager)?;
        Ok(index)
    }

    /// Indexes every interval record of `file` and returns its file id.
    ///
    /// # Errors
    ///
    /// * `InvalidOperation` - the file is already registered, or the
    ///   registry was opened from disk
    /// * `LookupError` - the file has a chromosome missing from the genome
    ///
    /// Nothing is modified when an error is returned.
    pub fn add_to_index(&mut self, file: &str) -> QuindexResult<u32> {
        if self.files.iter().any(|f| f == file) {
            return Err(QuindexError::new(
                &format!("File {} is already indexed", file),
                ErrorKind::InvalidOperation,
            ));
        }
        if self.trees.values().any(QuadTree::is_read_only) {
            return Err(QuindexError::new(
                "Cannot add files to an index opened from disk",
                ErrorKind::InvalidOperation,
            ));
        }
        let file_id = u32::try_from(self.files.len()).map_err(|_| {
            QuindexError::new("Too many indexed files", ErrorKind::CapacityOverflow)
        })?;

        let handle = self.reader.open(file)?;
        let chrom_ids = self.reader.chromosome_ids(&handle)?;
        if let Some(missing) = chrom_ids.keys().find(|c| !self.config.genome().contains(c)) {
            return Err(QuindexError::new(
                &format!(
                    "Chromosome {} of {} is not in genome {}",
                    missing,
                    file,
                    self.config.genome().name()
                ),
                ErrorKind::LookupError,
            ));
        }

        let mut prepared = Vec::with_capacity(chrom_ids.len());
        for (chrom, chrom_id) in &chrom_ids {
            let records = self.reader.interval_records(&handle, *chrom_id)?;
            prepared.push(self.prepare(chrom, file_id, &records)?);
        }

        let mut total = 0;
        for chromosome in prepared {
            total += chromosome.entries.len();
            if let Some(tree) = chromosome.tree {
                log::debug!("Creating tree for {}", chromosome.chrom);
                self.trees.insert(chromosome.chrom.clone(), tree);
            }
            let tree = self.trees.get_mut(&chromosome.chrom).ok_or_else(|| {
                QuindexError::new(
                    &format!("No tree for {}", chromosome.chrom),
                    ErrorKind::InternalError,
                )
            })?;
            for (item, rect) in chromosome.entries {
                tree.insert(item, rect)?;
            }
        }

        self.files.push(file.to_string());
        self.handles.lock().insert(file_id, Arc::new(handle));
        log::info!("Indexed {} records of {} as file {}", total, file, file_id);
        Ok(file_id)
    }

    fn prepare(&self, chrom: &str, file_id: u32, records: &[RangeRecord]) -> QuindexResult<PreparedChromosome> {
        let mapper = self.mapper(chrom)?;
        let tree = if self.trees.contains_key(chrom) {
            None
        } else {
            Some(
                QuadTree::builder()
                    .bbox(mapper.bounds())
                    .config(self.config.tree_config())
                    .schema(IntervalRecord::schema())
                    .build()?,
            )
        };

        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            if record.end >= mapper.length() {
                return Err(QuindexError::new(
                    &format!(
                        "Record {}-{} runs past the end of {} ({} bp)",
                        record.start,
                        record.end,
                        chrom,
                        mapper.length()
                    ),
                    ErrorKind::LookupError,
                ));
            }
            let interval = IntervalRecord::new(
                record.start,
                record.end,
                record.data_offset,
                record.data_size,
                file_id,
            );
            let rect = mapper.range_to_bbox(record.start, record.end, 0.0)?;
            entries.push((interval.to_item()?, rect));
        }

        Ok(PreparedChromosome {
            chrom: chrom.to_string(),
            tree,
            entries,
        })
    }

    fn mapper(&self, chrom: &str) -> QuindexResult<HilbertMapper> {
        let length = self.config.genome().length(chrom).ok_or_else(|| {
            QuindexError::new(
                &format!(
                    "Chromosome {} is not in genome {}",
                    chrom,
                    self.config.genome().name()
                ),
                ErrorKind::LookupError,
            )
        })?;
        HilbertMapper::new(length)
    }

    /// Interval records of `chrom` overlapping `[start, end]`.
    ///
    /// A range starting at or beyond the end of the chromosome matches
    /// nothing, since indexed records never extend past it.
    pub fn query_records(
        &self,
        chrom: &str,
        start: u64,
        end: u64,
        options: &QueryOptions,
    ) -> QuindexResult<Vec<IntervalRecord>> {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        let mapper = self.mapper(chrom)?;
        let tree = self.trees.get(chrom).ok_or_else(|| {
            QuindexError::new(
                &format!("No index for chromosome {}", chrom),
                ErrorKind::LookupError,
            )
        })?;
        let file_filter = match &options.file {
            Some(file) => Some(self.file_id(file).ok_or_else(|| {
                QuindexError::new(
                    &format!("File {} is not indexed", file),
                    ErrorKind::LookupError,
                )
            })?),
            None => None,
        };

        if start >= mapper.length() {
            return Ok(Vec::new());
        }

        let query = mapper.range_to_bbox(start, end, 0.0)?;
        let mode = if options.in_memory && !tree.is_lazy() {
            SearchMode::Memory
        } else {
            SearchMode::Disk
        };

        let mut records = Vec::new();
        for item in tree.intersect(&query, mode)? {
            let record = IntervalRecord::from_item(&item)?;
            if !record.overlaps(start, end) {
                continue;
            }
            if file_filter.is_some_and(|id| id != record.file_id) {
                continue;
            }
            records.push(record);
        }
        log::debug!(
            "{}:{}-{} matched {} records in {:?} mode",
            chrom,
            start,
            end,
            records.len(),
            mode
        );
        Ok(records)
    }

    /// Rows of `chrom` overlapping `[start, end]`, ordered by file id then row
    /// start.
    pub fn query(
        &self,
        chrom: &str,
        start: u64,
        end: u64,
        options: &QueryOptions,
    ) -> QuindexResult<Vec<QueryRow<R::Row>>> {
        let records = self.query_records(chrom, start, end, options)?;
        let (start, end) = if start <= end { (start, end) } else { (end, start) };

        let mut chrom_ids: HashMap<u32, u32> = HashMap::new();
        let mut rows = Vec::new();
        for record in records {
            let handle = self.handle(record.file_id)?;
            let chrom_id = match chrom_ids.get(&record.file_id) {
                Some(id) => *id,
                None => {
                    let id = self
                        .reader
                        .chromosome_ids(&handle)?
                        .get(chrom)
                        .copied()
                        .ok_or_else(|| {
                            QuindexError::new(
                                &format!("{} has no chromosome {}", self.files[record.file_id as usize], chrom),
                                ErrorKind::LookupError,
                            )
                        })?;
                    chrom_ids.insert(record.file_id, id);
                    id
                }
            };

            let range = RangeRecord::new(record.start, record.end, record.data_offset, record.data_size);
            for row in self.reader.fetch_payload(&handle, chrom_id, start, end, &range)? {
                rows.push(QueryRow {
                    file_id: record.file_id,
                    file: self.files[record.file_id as usize].clone(),
                    record,
                    row,
                });
            }
        }

        rows.sort_by_key(|r| (r.file_id, r.row.start()));
        Ok(rows)
    }

    fn handle(&self, file_id: u32) -> QuindexResult<Arc<R::Handle>> {
        let mut handles = self.handles.lock();
        if let Some(handle) = handles.get(&file_id) {
            return Ok(Arc::clone(handle));
        }

        let path = self.files.get(file_id as usize).ok_or_else(|| {
            QuindexError::new(
                &format!("Unknown file id {}", file_id),
                ErrorKind::InternalError,
            )
        })?;
        let handle = Arc::new(self.reader.open(path)?);
        handles.insert(file_id, Arc::clone(&handle));
        Ok(handle)
    }

    /// Writes every tree and both sidecars under the base path.
    pub fn to_disk(&mut self) -> QuindexResult<()> {
        let base_path = self.config.base_path().to_path_buf();
        fs::create_dir_all(&base_path)?;

        for (chrom, tree) in self.trees.iter_mut() {
            let path = base_path.join(tree_file_name(chrom));
            if tree.is_read_only() && tree.path() == Some(path.as_path()) {
                continue;
            }
            tree.to_disk(&path)?;
            log::debug!("Wrote {} entries of {} to {}", tree.len(), chrom, path.display());
        }

        let chromosomes: Vec<String> = self.trees.keys().cloned().collect();
        write_sidecar(&base_path.join(CHROMOSOMES_FILE), &chromosomes)?;
        write_sidecar(&base_path.join(FILES_FILE), &self.files)?;
        log::info!(
            "Persisted {} trees and {} files to {}",
            chromosomes.len(),
            self.files.len(),
            base_path.display()
        );
        Ok(())
    }

    /// Replaces trees and file registry with those stored under the base path.
    ///
    /// With `eager` every tree is read into memory, otherwise trees are
    /// searched on disk.
    pub fn from_disk(&mut self, eager: bool) -> QuindexResult<()> {
        let base_path = self.config.base_path().to_path_buf();
        let chromosomes: Vec<String> = read_sidecar(&base_path.join(CHROMOSOMES_FILE))?;
        let files: Vec<String> = read_sidecar(&base_path.join(FILES_FILE))?;

        let mut trees = IndexMap::with_capacity(chromosomes.len());
        for chrom in chromosomes {
            let mapper = self.mapper(&chrom)?;
            let path = base_path.join(tree_file_name(&chrom));
            let tree = if eager {
                QuadTree::load(&path)?
            } else {
                QuadTree::open(&path)?
            };
            if tree.bbox() != mapper.bounds() {
                log::warn!(
                    "Tree of {} covers {} but the genome implies {}",
                    chrom,
                    tree.bbox(),
                    mapper.bounds()
                );
            }
            trees.insert(chrom, tree);
        }

        log::info!(
            "Opened {} trees and {} files from {}",
            trees.len(),
            files.len(),
            base_path.display()
        );
        self.trees = trees;
        self.files = files;
        self.handles.lock().clear();
        Ok(())
    }

    /// Indexed files in file id order.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn file_id(&self, file: &str) -> Option<u32> {
        self.files.iter().position(|f| f == file).map(|id| id as u32)
    }

    /// Chromosomes that have a tree, in creation order.
    pub fn chromosomes(&self) -> impl Iterator<Item = &str> {
        self.trees.keys().map(String::as_str)
    }

    pub fn tree(&self, chrom: &str) -> Option<&QuadTree> {
        self.trees.get(chrom)
    }

    pub fn genome(&self) -> &Genome {
        self.config.genome()
    }

    pub fn config(&self) -> &QuindexConfig {
        &self.config
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }
}

fn write_sidecar<T: Serialize + ?Sized>(path: &Path, value: &T) -> QuindexResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    bincode::serde::encode_into_std_write(value, &mut writer, bincode::config::legacy())?;
    writer.flush()?;
    Ok(())
}

fn read_sidecar<T: DeserializeOwned>(path: &Path) -> QuindexResult<T> {
    let mut reader = BufReader::new(File::open(path)?);
    let value = bincode::serde::decode_from_std_read(&mut reader, bincode::config::legacy())?;
    Ok(value)
}
