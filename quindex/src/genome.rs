//! Chromosome length tables.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::errors::{ErrorKind, QuindexError, QuindexResult};

/// Chromosome name to length, in the order chromosomes were declared.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Genome {
    name: String,
    lengths: IndexMap<String, u64>,
}

impl Genome {
    pub fn new(name: &str) -> Self {
        Genome {
            name: name.to_string(),
            lengths: IndexMap::new(),
        }
    }

    pub fn with_chromosome(mut self, chrom: &str, length: u64) -> Self {
        self.insert(chrom, length);
        self
    }

    pub fn insert(&mut self, chrom: &str, length: u64) {
        self.lengths.insert(chrom.to_string(), length);
    }

    /// Parses a UCSC `chrom.sizes` table: one `name<TAB>length` line per
    /// chromosome. Blank lines, lines shorter than three characters and
    /// `random` contigs are skipped.
    pub fn from_chrom_sizes<R: BufRead>(name: &str, reader: R) -> QuindexResult<Self> {
        let mut genome = Genome::new(name);
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim_end();
            if line.len() < 3 || line.contains("random") {
                continue;
            }

            let parsed = line
                .split_once('\t')
                .and_then(|(chrom, length)| Some((chrom, length.trim().parse::<u64>().ok()?)));
            match parsed {
                Some((chrom, length)) => genome.insert(chrom, length),
                None => {
                    return Err(QuindexError::new(
                        &format!("Malformed chrom.sizes line {}: '{}'", number + 1, line),
                        ErrorKind::FormatError,
                    ))
                }
            }
        }
        Ok(genome)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn length(&self, chrom: &str) -> Option<u64> {
        self.lengths.get(chrom).copied()
    }

    pub fn contains(&self, chrom: &str) -> bool {
        self.lengths.contains_key(chrom)
    }

    pub fn chromosomes(&self) -> impl Iterator<Item = (&str, u64)> {
        self.lengths.iter().map(|(name, length)| (name.as_str(), *length))
    }

    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }
}

/// Supplies chromosome length tables by genome name.
pub trait GenomeSource {
    fn chromosome_lengths(&self, genome: &str) -> QuindexResult<Genome>;
}

/// Reads `<dir>/<genome>.chrom.sizes` files.
#[derive(Debug, Clone)]
pub struct ChromSizesDir {
    dir: PathBuf,
}

impl ChromSizesDir {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        ChromSizesDir {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, genome: &str) -> PathBuf {
        self.dir.join(format!("{}.chrom.sizes", genome))
    }
}

impl GenomeSource for ChromSizesDir {
    fn chromosome_lengths(&self, genome: &str) -> QuindexResult<Genome> {
        let path = self.path_for(genome);
        let file = File::open(&path).map_err(|err| {
            QuindexError::new_with_cause(
                &format!("Cannot read chromosome sizes of {} from {}", genome, path.display()),
                ErrorKind::LookupError,
                err.into(),
            )
        })?;
        let parsed = Genome::from_chrom_sizes(genome, BufReader::new(file))?;
        log::debug!("Read {} chromosomes of {}", parsed.len(), genome);
        Ok(parsed)
    }
}
