//! Configuration of a [`Quindex`] registry.

use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::errors::{ErrorKind, QuindexError, QuindexResult};
use crate::genome::{Genome, GenomeSource};
use crate::quadtree::TreeConfig;
use crate::reader::RangeFileReader;
use crate::registry::Quindex;

/// Directory index files are written to unless configured otherwise.
pub const DEFAULT_BASE_PATH: &str = "./quindex";

/// Validated settings of a registry.
#[derive(Debug, Clone, PartialEq)]
pub struct QuindexConfig {
    genome: Genome,
    tree: TreeConfig,
    base_path: PathBuf,
}

impl QuindexConfig {
    pub fn new(genome: Genome) -> Self {
        QuindexConfig {
            genome,
            tree: TreeConfig::default(),
            base_path: PathBuf::from(DEFAULT_BASE_PATH),
        }
    }

    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    pub fn tree_config(&self) -> TreeConfig {
        self.tree
    }

    pub fn max_items(&self) -> usize {
        self.tree.max_items
    }

    pub fn max_depth(&self) -> u32 {
        self.tree.max_depth
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn set_genome(&mut self, genome: Genome) {
        self.genome = genome;
    }

    /// Sets the split threshold of every chromosome tree.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` for zero or values beyond `i32::MAX`.
    pub fn set_max_items(&mut self, max_items: usize) -> QuindexResult<()> {
        TreeConfig::new(max_items, self.tree.max_depth).validate()?;
        self.tree.max_items = max_items;
        Ok(())
    }

    pub fn set_max_depth(&mut self, max_depth: u32) -> QuindexResult<()> {
        TreeConfig::new(self.tree.max_items, max_depth).validate()?;
        self.tree.max_depth = max_depth;
        Ok(())
    }

    pub fn set_base_path<P: AsRef<Path>>(&mut self, base_path: P) -> QuindexResult<()> {
        let base_path = base_path.as_ref();
        if base_path.as_os_str().is_empty() {
            return Err(QuindexError::new(
                "Base path cannot be empty",
                ErrorKind::ConfigurationError,
            ));
        }
        self.base_path = base_path.to_path_buf();
        Ok(())
    }

    pub fn validate(&self) -> QuindexResult<()> {
        if self.genome.is_empty() {
            return Err(QuindexError::new(
                "A genome with at least one chromosome is required",
                ErrorKind::ConfigurationError,
            ));
        }
        if let Some((chrom, _)) = self.genome.chromosomes().find(|(_, length)| *length == 0) {
            return Err(QuindexError::new(
                &format!("Chromosome {} has zero length", chrom),
                ErrorKind::ConfigurationError,
            ));
        }
        self.tree.validate()
    }
}

/// Builder for [`Quindex`].
///
/// The first configuration error is kept and returned by [`QuindexBuilder::build`].
/// The reader type is taken from the reader passed to `build` or `open`.
///
/// # Examples
///
/// ```rust
/// use quindex::{Genome, MemoryRangeReader, Quindex};
///
/// let index = Quindex::builder()
///     .genome(Genome::new("toy").with_chromosome("chr1", 1000))
///     .max_items(64)
///     .base_path("/tmp/quindex-doc")
///     .build(MemoryRangeReader::new())
///     .unwrap();
/// assert_eq!(index.config().max_items(), 64);
/// ```
pub struct QuindexBuilder<R> {
    config: QuindexConfig,
    error: Option<QuindexError>,
    reader: PhantomData<fn() -> R>,
}

impl<R> fmt::Debug for QuindexBuilder<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuindexBuilder")
            .field("config", &self.config)
            .field("error", &self.error)
            .finish()
    }
}

impl<R> Clone for QuindexBuilder<R> {
    fn clone(&self) -> Self {
        QuindexBuilder {
            config: self.config.clone(),
            error: self.error.clone(),
            reader: PhantomData,
        }
    }
}

impl<R> Default for QuindexBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> QuindexBuilder<R> {
    pub fn new() -> Self {
        QuindexBuilder {
            config: QuindexConfig::new(Genome::default()),
            error: None,
            reader: PhantomData,
        }
    }

    pub fn genome(mut self, genome: Genome) -> Self {
        self.config.set_genome(genome);
        self
    }

    /// Loads the chromosome lengths of `genome` from `source`.
    pub fn genome_from<S: GenomeSource + ?Sized>(mut self, source: &S, genome: &str) -> Self {
        if self.error.is_none() {
            match source.chromosome_lengths(genome) {
                Ok(genome) => self.config.set_genome(genome),
                Err(e) => self.error = Some(e),
            }
        }
        self
    }

    pub fn max_items(mut self, max_items: usize) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_max_items(max_items) {
                self.error = Some(e);
            }
        }
        self
    }

    pub fn max_depth(mut self, max_depth: u32) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_max_depth(max_depth) {
                self.error = Some(e);
            }
        }
        self
    }

    pub fn base_path<P: AsRef<Path>>(mut self, base_path: P) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_base_path(base_path) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Validated configuration without creating a registry.
    pub fn config(self) -> QuindexResult<QuindexConfig> {
        if let Some(error) = self.error {
            return Err(error);
        }
        self.config.validate()?;
        Ok(self.config)
    }

}

impl<R: RangeFileReader> QuindexBuilder<R> {
    /// Creates an empty registry.
    pub fn build(self, reader: R) -> QuindexResult<Quindex<R>> {
        Ok(Quindex::new(self.config()?, reader))
    }

    /// Opens a registry previously written to the configured base path.
    pub fn open(self, reader: R, eager: bool) -> QuindexResult<Quindex<R>> {
        Quindex::open(self.config()?, reader, eager)
    }
}
