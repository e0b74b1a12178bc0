//! A session over one variant dataset.
//!
//! A [`Reader`] ties together the [variant index](crate::index::Index), the
//! [sample selection](crate::samples::Samples), and two independently owned
//! [decoders](crate::decode::Decode): one for genotype calls (and phasing
//! flags) and one for dosages.
//!
//! Sessions are not reentrant. Every method that produces data borrows the
//! reader mutably, and the lazy chunk iterators hold that borrow until they
//! are dropped, so the sample selection and variant filter cannot change
//! while a chunk sequence is being consumed.

use std::ops::Range;

use nonempty::NonEmpty;
use tracing::debug;
use tracing::warn;

use crate::budget::Budget;
use crate::chunk;
use crate::contig::Normalizer;
use crate::data::Data;
use crate::data::PLOIDY;
use crate::decode;
use crate::decode::Decode;
use crate::index::Filter;
use crate::index::Index;
use crate::mode::Mode;
use crate::range;
use crate::range::Resolved;
use crate::samples;
use crate::samples::Samples;
use crate::window;
use crate::window::Window;

pub mod builder;

pub use builder::Builder;

////////////////////////////////////////////////////////////////////////////////////////
// Errors
////////////////////////////////////////////////////////////////////////////////////////

/// An invalid configuration of a [`Reader`] or of a request made to one.
#[derive(Debug)]
pub enum ConfigError {
    /// An invalid sample selection.
    Samples(samples::Error),

    /// The dosage source does not hold the same samples as the genotype
    /// source.
    MismatchedSamples,

    /// A decoder does not hold the number of samples listed for it.
    SampleCount {
        /// The number of listed samples.
        expected: usize,

        /// The number of samples the decoder holds.
        found: usize,
    },

    /// The number of starts and ends differ.
    MismatchedLengths {
        /// The number of starts.
        starts: usize,

        /// The number of ends.
        ends: usize,
    },

    /// An output does not have the `(samples, variants)` shape of the read.
    OutputShape {
        /// The shape of the read.
        expected: (usize, usize),

        /// The shape of the output.
        found: (usize, usize),
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Samples(err) => write!(f, "{err}"),
            ConfigError::MismatchedSamples => write!(
                f,
                "dosage samples do not match genotype samples"
            ),
            ConfigError::SampleCount { expected, found } => write!(
                f,
                "decoder holds {found} samples, but {expected} were listed"
            ),
            ConfigError::MismatchedLengths { starts, ends } => {
                write!(f, "{starts} starts were provided with {ends} ends")
            }
            ConfigError::OutputShape { expected, found } => write!(
                f,
                "output holds {} samples and {} variants, but the read needs {} samples and {} \
                 variants",
                found.0, found.1, expected.0, expected.1
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// An operation the dataset or request cannot support.
#[derive(Debug)]
pub enum Unsupported {
    /// Length metadata is unusable because of multi-allelic variants.
    MultiallelicVariants,

    /// The mode has no genotype calls to compute haplotype lengths from.
    NoGenotypes(Mode),
}

impl std::fmt::Display for Unsupported {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unsupported::MultiallelicVariants => write!(
                f,
                "haplotype lengths cannot be computed while multi-allelic variants are active"
            ),
            Unsupported::NoGenotypes(mode) => write!(
                f,
                "haplotype lengths cannot be computed in mode `{mode}`"
            ),
        }
    }
}

impl std::error::Error for Unsupported {}

/// An error related to a [`Reader`].
#[derive(Debug)]
pub enum Error {
    /// A builder error.
    Builder(builder::Error),

    /// An invalid configuration.
    Config(ConfigError),

    /// An unsupported operation.
    UnsupportedOperation(Unsupported),

    /// The budget cannot hold a single variant.
    InsufficientBudget {
        /// The budget.
        budget: Budget,

        /// The number of bytes one variant occupies.
        per_variant: usize,
    },

    /// An internal invariant was violated.
    Integrity(String),

    /// A decode error.
    Decode(decode::Error),

    /// The reader has been closed.
    Closed,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Builder(err) => write!(f, "builder error: {err}"),
            Error::Config(err) => write!(f, "configuration error: {err}"),
            Error::UnsupportedOperation(err) => write!(f, "unsupported operation: {err}"),
            Error::InsufficientBudget {
                budget,
                per_variant,
            } => write!(
                f,
                "memory budget of {budget} is insufficient to read a single variant \
                 ({} per variant)",
                Budget::new(*per_variant as u64)
            ),
            Error::Integrity(msg) => write!(f, "integrity error: {msg}"),
            Error::Decode(err) => write!(f, "decode error: {err}"),
            Error::Closed => write!(f, "reader is closed"),
        }
    }
}

impl std::error::Error for Error {}

impl From<decode::Error> for Error {
    fn from(err: decode::Error) -> Self {
        Error::Decode(err)
    }
}

impl From<range::Error> for Error {
    fn from(err: range::Error) -> Self {
        match err {
            range::Error::MismatchedLengths { starts, ends } => {
                Error::Config(ConfigError::MismatchedLengths { starts, ends })
            }
            range::Error::Integrity { .. } => Error::Integrity(err.to_string()),
        }
    }
}

impl From<chunk::Error> for Error {
    fn from(err: chunk::Error) -> Self {
        match err {
            chunk::Error::InsufficientBudget {
                budget,
                per_variant,
            } => Error::InsufficientBudget {
                budget,
                per_variant,
            },
            chunk::Error::Decode(err) => Error::Decode(err),
            chunk::Error::Data(err) => Error::Integrity(err.to_string()),
            chunk::Error::OutputShape { expected, found } => {
                Error::Config(ConfigError::OutputShape { expected, found })
            }
        }
    }
}

impl From<window::Error> for Error {
    fn from(err: window::Error) -> Self {
        match err {
            window::Error::MissingGenotypes(mode) => {
                Error::UnsupportedOperation(Unsupported::NoGenotypes(mode))
            }
            window::Error::Chunk(err) => Error::from(err),
            window::Error::UnknownVariant(_)
            | window::Error::VariantCount { .. }
            | window::Error::Data(_) => Error::Integrity(err.to_string()),
        }
    }
}

/// A [`Result`](std::result::Result) with an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////////////////////
// Reader
////////////////////////////////////////////////////////////////////////////////////////

/// A session over one variant dataset.
///
/// Use a [`Builder`] to construct one of these.
pub struct Reader<D>
where
    D: Decode,
{
    /// The variant index.
    index: Index,

    /// The contig name normalizer.
    normalizer: Normalizer,

    /// The sample selection.
    samples: Samples,

    /// The decoder of genotype calls and phasing flags.
    genotypes: D,

    /// The decoder of dosages.
    dosages: D,

    /// Whether the reader has been closed.
    closed: bool,
}

impl<D> std::fmt::Debug for Reader<D>
where
    D: Decode,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("index", &self.index)
            .field("samples", &self.samples.len())
            .field("closed", &self.closed)
            .finish()
    }
}

impl<D> Reader<D>
where
    D: Decode,
{
    /// Creates a new [`Reader`] from validated parts.
    pub(crate) fn new(index: Index, samples: Samples, genotypes: D, dosages: D) -> Self {
        let normalizer = Normalizer::new(index.contigs());

        Self {
            index,
            normalizer,
            samples,
            genotypes,
            dosages,
            closed: false,
        }
    }

    /// Fails if the reader has been closed.
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }

        Ok(())
    }

    /// Gets the variant index.
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Gets the contig names of the dataset.
    pub fn contigs(&self) -> &[String] {
        self.index.contigs()
    }

    /// Gets every sample in the dataset, in storage order.
    pub fn available_samples(&self) -> &[String] {
        self.samples.available()
    }

    /// Gets the selected samples, in the order reads return them.
    pub fn current_samples(&self) -> &[String] {
        self.samples.current()
    }

    /// Gets the number of selected samples.
    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    /// Gets the ploidy of every sample.
    pub fn ploidy(&self) -> usize {
        PLOIDY
    }

    /// Whether the reader has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether haplotype lengths can be computed for the active variants.
    pub fn supports_length_metadata(&self) -> bool {
        self.index.supports_length_metadata()
    }

    /// Gets the number of bytes one variant occupies in `mode` for the
    /// selected samples.
    pub fn bytes_per_variant(&self, mode: Mode) -> usize {
        mode.bytes_per_variant(self.n_samples(), PLOIDY)
    }

    /// Selects the samples returned by subsequent reads, in the given order,
    /// or every sample in storage order with [`None`].
    pub fn set_samples<S>(&mut self, samples: Option<&[S]>) -> Result<()>
    where
        S: AsRef<str>,
    {
        self.ensure_open()?;

        self.samples
            .set(samples)
            .map_err(|err| Error::Config(ConfigError::Samples(err)))?;

        self.genotypes.set_sample_subset(self.samples.subset())?;
        self.dosages.set_sample_subset(self.samples.subset())?;

        Ok(())
    }

    /// Replaces the dosage source.
    ///
    /// `samples` lists the samples the new source holds, in storage order, and
    /// must match [`Reader::available_samples()`]. The current sample
    /// selection carries over to the new source, and the previous source is
    /// closed.
    pub fn set_dosages(&mut self, mut dosages: D, samples: Vec<String>) -> Result<()> {
        self.ensure_open()?;

        if samples != self.samples.available() {
            return Err(Error::Config(ConfigError::MismatchedSamples));
        }

        builder::check_count(&dosages, samples.len())?;
        dosages.set_sample_subset(self.samples.subset())?;

        let mut previous = std::mem::replace(&mut self.dosages, dosages);
        if let Err(err) = previous.close() {
            warn!("reader: error while closing the previous dosage source: {err}");
        }

        debug!("reader: replaced the dosage source");
        Ok(())
    }

    /// Applies (or, with [`None`], clears) the variant filter.
    pub fn set_filter(&mut self, filter: Option<Filter>) -> Result<()> {
        self.ensure_open()?;
        self.index.set_filter(filter);
        Ok(())
    }

    /// Normalizes a contig name to the dataset's convention.
    fn contig(&self, contig: &str) -> Option<String> {
        let normalized = self.normalizer.norm(contig).map(String::from);

        if normalized.is_none() {
            debug!("reader: contig `{contig}` is not in the dataset");
        }

        normalized
    }

    /// Counts the active variants overlapping each range.
    ///
    /// An unknown contig counts zero variants for every range.
    pub fn count(&self, contig: &str, starts: &[u64], ends: &[u64]) -> Result<Vec<usize>> {
        match self.contig(contig) {
            Some(contig) => Ok(range::count(&self.index, &contig, starts, ends)?),
            None => {
                check_lengths(starts, ends)?;
                Ok(vec![0; starts.len()])
            }
        }
    }

    /// Resolves each range to the stable indices of the active variants
    /// overlapping it.
    ///
    /// An unknown contig resolves every range to no variants.
    pub fn resolve(&self, contig: &str, starts: &[u64], ends: &[u64]) -> Result<Resolved> {
        match self.contig(contig) {
            Some(contig) => Ok(range::resolve(&self.index, &contig, starts, ends)?),
            None => {
                check_lengths(starts, ends)?;
                Ok(Resolved::empty(starts.len()))
            }
        }
    }

    /// Decodes the variants at `indices` in `mode`.
    fn decode(&mut self, indices: &[u32], mode: Mode) -> Result<Data> {
        Ok(chunk::read(
            &mut self.genotypes,
            &mut self.dosages,
            &self.samples,
            indices,
            mode,
        )?)
    }

    /// Reads every variant overlapping `[start, end)`.
    ///
    /// Returns [`None`] when no active variant overlaps the range.
    ///
    /// # Examples
    ///
    /// ```
    /// use varwindow::decode::Memory;
    /// use varwindow::index::Index;
    /// use varwindow::index::Variant;
    /// use varwindow::mode::Mode;
    /// use varwindow::reader::Builder;
    ///
    /// let index = Index::try_new(
    ///     vec![String::from("chr1")],
    ///     vec![Variant::new(0, 0, 100, 101, 0, 1)],
    /// )?;
    /// let decoder = Memory::new(1, 1).with_genotypes(vec![0, 1])?;
    ///
    /// let mut reader = Builder::default()
    ///     .index(index)?
    ///     .samples(vec![String::from("s0")])?
    ///     .genotypes(decoder)?
    ///     .try_build()?;
    ///
    /// let data = reader.read("1", 0, 1000, Mode::Genotypes)?.unwrap();
    /// assert_eq!(data.genotypes().unwrap().haplotype(0, 1), &[1]);
    /// assert!(reader.read("1", 0, 100, Mode::Genotypes)?.is_none());
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn read(&mut self, contig: &str, start: u64, end: u64, mode: Mode) -> Result<Option<Data>> {
        self.ensure_open()?;

        let resolved = self.resolve(contig, &[start], &[end])?;
        if resolved.indices().is_empty() {
            return Ok(None);
        }

        self.decode(resolved.indices(), mode).map(Some)
    }

    /// Reads every variant overlapping `[start, end)` into `out`, reusing its
    /// arrays.
    ///
    /// The mode is the mode of `out`, which must hold
    /// [`Reader::n_samples()`] samples and as many variants as
    /// [`Reader::count()`] reports for the range; otherwise this fails with
    /// [`ConfigError::OutputShape`]. Returns `false`, leaving `out`
    /// untouched, when no active variant overlaps the range.
    ///
    /// # Examples
    ///
    /// ```
    /// use varwindow::data::Data;
    /// use varwindow::decode::Memory;
    /// use varwindow::index::Index;
    /// use varwindow::index::Variant;
    /// use varwindow::mode::Mode;
    /// use varwindow::reader::Builder;
    ///
    /// let index = Index::try_new(
    ///     vec![String::from("1")],
    ///     vec![
    ///         Variant::new(0, 0, 10, 11, 0, 1),
    ///         Variant::new(1, 0, 20, 21, 0, 1),
    ///     ],
    /// )?;
    /// let decoder = Memory::new(1, 2).with_genotypes(vec![0, 1, 1, 1])?;
    ///
    /// let mut reader = Builder::default()
    ///     .index(index)?
    ///     .samples(vec![String::from("s0")])?
    ///     .genotypes(decoder)?
    ///     .try_build()?;
    ///
    /// let mut out = Data::zeroed(Mode::Genotypes, 1, 1);
    /// assert!(reader.read_into("1", 0, 15, &mut out)?);
    /// assert_eq!(out.genotypes().unwrap().haplotype(0, 1), &[1]);
    /// assert!(reader.read_into("1", 15, 25, &mut out)?);
    /// assert_eq!(out.genotypes().unwrap().haplotype(0, 0), &[1]);
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn read_into(
        &mut self,
        contig: &str,
        start: u64,
        end: u64,
        out: &mut Data,
    ) -> Result<bool> {
        self.ensure_open()?;

        let resolved = self.resolve(contig, &[start], &[end])?;
        if resolved.indices().is_empty() {
            return Ok(false);
        }

        chunk::read_into(
            &mut self.genotypes,
            &mut self.dosages,
            &self.samples,
            resolved.indices(),
            out,
        )?;

        Ok(true)
    }

    /// Reads every variant overlapping any of the ranges at once.
    ///
    /// The variants of range `i` occupy `offsets[i]..offsets[i + 1]` along
    /// the variant axis of the returned arrays. Returns [`None`] when no
    /// active variant overlaps any range.
    pub fn read_ranges(
        &mut self,
        contig: &str,
        starts: &[u64],
        ends: &[u64],
        mode: Mode,
    ) -> Result<Option<(Data, Vec<usize>)>> {
        self.ensure_open()?;

        let resolved = self.resolve(contig, starts, ends)?;
        if resolved.indices().is_empty() {
            return Ok(None);
        }

        let data = self.decode(resolved.indices(), mode)?;
        let (_, offsets) = resolved.into_parts();

        Ok(Some((data, offsets)))
    }

    /// Lazily reads the variants overlapping `[start, end)` in chunks that
    /// each fit within `budget`.
    pub fn chunk(
        &mut self,
        contig: &str,
        start: u64,
        end: u64,
        budget: Budget,
        mode: Mode,
    ) -> Result<Chunks<'_, D>> {
        self.ensure_open()?;

        let (indices, _) = self.resolve(contig, &[start], &[end])?.into_parts();
        let vars_per_chunk = chunk::plan(budget, self.bytes_per_variant(mode), indices.len())?;

        Ok(Chunks::new(self, indices, vars_per_chunk, mode))
    }

    /// Lazily reads the variants overlapping each range in chunks that each
    /// fit within `budget`.
    ///
    /// # Examples
    ///
    /// ```
    /// use varwindow::budget::Budget;
    /// use varwindow::decode::Memory;
    /// use varwindow::index::Index;
    /// use varwindow::index::Variant;
    /// use varwindow::mode::Mode;
    /// use varwindow::reader::Builder;
    ///
    /// let index = Index::try_new(
    ///     vec![String::from("1")],
    ///     vec![
    ///         Variant::new(0, 0, 10, 11, 0, 1),
    ///         Variant::new(1, 0, 20, 21, 0, 1),
    ///         Variant::new(2, 0, 30, 31, 0, 1),
    ///     ],
    /// )?;
    /// let decoder = Memory::new(1, 3).with_genotypes(vec![0, 1, 1, 1, 0, 0])?;
    ///
    /// let mut reader = Builder::default()
    ///     .index(index)?
    ///     .samples(vec![String::from("s0")])?
    ///     .genotypes(decoder)?
    ///     .try_build()?;
    ///
    /// // Eight bytes hold one variant of one diploid sample.
    /// let mut ranges =
    ///     reader.chunk_ranges("1", &[0, 100], &[25, 200], Budget::new(8), Mode::Genotypes)?;
    ///
    /// let chunks = ranges.next_range().unwrap().unwrap();
    /// assert_eq!(chunks.count(), 2);
    /// assert!(ranges.next_range().unwrap().is_none());
    /// assert!(ranges.next_range().is_none());
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn chunk_ranges(
        &mut self,
        contig: &str,
        starts: &[u64],
        ends: &[u64],
        budget: Budget,
        mode: Mode,
    ) -> Result<RangeChunks<'_, D>> {
        self.ensure_open()?;

        let resolved = self.resolve(contig, starts, ends)?;
        let vars_per_chunk = chunk::plan(
            budget,
            self.bytes_per_variant(mode),
            resolved.indices().len(),
        )?;

        Ok(RangeChunks {
            cursor: RangeCursor::new(resolved, starts, ends),
            reader: self,
            vars_per_chunk,
            mode,
        })
    }

    /// Like [`Reader::chunk_ranges()`], but the last chunk of each range is
    /// extended until every haplotype realizes at least the length of the
    /// range.
    ///
    /// Fails with [`Error::UnsupportedOperation`] when multi-allelic variants
    /// are active or when `mode` has no genotype calls.
    pub fn chunk_ranges_with_length(
        &mut self,
        contig: &str,
        starts: &[u64],
        ends: &[u64],
        budget: Budget,
        mode: Mode,
    ) -> Result<RangeWindows<'_, D>> {
        self.ensure_open()?;

        if !self.supports_length_metadata() {
            return Err(Error::UnsupportedOperation(
                Unsupported::MultiallelicVariants,
            ));
        }

        if !mode.has_genotypes() {
            return Err(Error::UnsupportedOperation(Unsupported::NoGenotypes(mode)));
        }

        let resolved = self.resolve(contig, starts, ends)?;
        let vars_per_chunk = chunk::plan(
            budget,
            self.bytes_per_variant(mode),
            resolved.indices().len(),
        )?;

        Ok(RangeWindows {
            cursor: RangeCursor::new(resolved, starts, ends),
            reader: self,
            vars_per_chunk,
            mode,
        })
    }

    /// Closes both decoders.
    ///
    /// Closing is idempotent, and every read after the first close fails with
    /// [`Error::Closed`]. Both decoders are closed even if closing the first
    /// fails, in which case the first error is returned.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        self.closed = true;

        let genotypes = self.genotypes.close();
        let dosages = self.dosages.close();
        genotypes?;
        dosages?;

        debug!("reader: closed");
        Ok(())
    }
}

impl<D> Drop for Reader<D>
where
    D: Decode,
{
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("reader: error while closing: {err}");
        }
    }
}

/// Ensures that there are the same number of starts and ends.
fn check_lengths(starts: &[u64], ends: &[u64]) -> Result<()> {
    if starts.len() != ends.len() {
        return Err(Error::Config(ConfigError::MismatchedLengths {
            starts: starts.len(),
            ends: ends.len(),
        }));
    }

    Ok(())
}

////////////////////////////////////////////////////////////////////////////////////////
// Chunks
////////////////////////////////////////////////////////////////////////////////////////

/// An iterator over the chunks of one range.
pub struct Chunks<'a, D>
where
    D: Decode,
{
    /// The reader.
    reader: &'a mut Reader<D>,

    /// The stable indices of the range.
    indices: Vec<u32>,

    /// The number of variants per chunk.
    vars_per_chunk: usize,

    /// The mode to read in.
    mode: Mode,

    /// The position of the next chunk within `indices`.
    position: usize,
}

impl<D> std::fmt::Debug for Chunks<'_, D>
where
    D: Decode,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunks")
            .field("variants", &self.indices.len())
            .field("vars_per_chunk", &self.vars_per_chunk)
            .field("mode", &self.mode)
            .field("position", &self.position)
            .finish()
    }
}

impl<'a, D> Chunks<'a, D>
where
    D: Decode,
{
    /// Creates a new [`Chunks`].
    fn new(reader: &'a mut Reader<D>, indices: Vec<u32>, vars_per_chunk: usize, mode: Mode) -> Self {
        Self {
            reader,
            indices,
            vars_per_chunk: vars_per_chunk.max(1),
            mode,
            position: 0,
        }
    }

    /// Advances to the next chunk and returns its bounds within `indices`.
    fn advance(&mut self) -> Option<Range<usize>> {
        if self.position >= self.indices.len() {
            return None;
        }

        let start = self.position;
        self.position = (start + self.vars_per_chunk).min(self.indices.len());
        Some(start..self.position)
    }

    /// Gets the number of chunks that remain.
    pub fn remaining(&self) -> usize {
        (self.indices.len() - self.position).div_ceil(self.vars_per_chunk)
    }
}

impl<D> Iterator for Chunks<'_, D>
where
    D: Decode,
{
    type Item = Result<Data>;

    fn next(&mut self) -> Option<Self::Item> {
        let bounds = self.advance()?;
        Some(self.reader.decode(&self.indices[bounds], self.mode))
    }
}

/// The per-range state shared by [`RangeChunks`] and [`RangeWindows`].
#[derive(Debug)]
struct RangeCursor {
    /// The resolved ranges.
    resolved: Resolved,

    /// The length of each range.
    lengths: Vec<u64>,

    /// The next range.
    next: usize,
}

impl RangeCursor {
    /// Creates a new [`RangeCursor`].
    fn new(resolved: Resolved, starts: &[u64], ends: &[u64]) -> Self {
        let lengths = starts
            .iter()
            .zip(ends)
            .map(|(start, end)| end.saturating_sub(*start))
            .collect();

        Self {
            resolved,
            lengths,
            next: 0,
        }
    }

    /// Advances to the next range and returns its indices and length.
    fn advance(&mut self) -> Option<(Vec<u32>, u64)> {
        let indices = self.resolved.get(self.next)?.to_vec();
        let length = self.lengths.get(self.next).copied().unwrap_or_default();
        self.next += 1;
        Some((indices, length))
    }
}

/// A lending cursor over the ranges of [`Reader::chunk_ranges()`].
///
/// Each call to [`RangeChunks::next_range()`] yields [`None`] once every
/// range was visited, and otherwise `Some(None)` for a range without any
/// variants or `Some(Some(chunks))` with the chunks of the range.
pub struct RangeChunks<'a, D>
where
    D: Decode,
{
    /// The reader.
    reader: &'a mut Reader<D>,

    /// The ranges.
    cursor: RangeCursor,

    /// The number of variants per chunk.
    vars_per_chunk: usize,

    /// The mode to read in.
    mode: Mode,
}

impl<D> std::fmt::Debug for RangeChunks<'_, D>
where
    D: Decode,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeChunks")
            .field("cursor", &self.cursor)
            .field("vars_per_chunk", &self.vars_per_chunk)
            .field("mode", &self.mode)
            .finish()
    }
}

impl<D> RangeChunks<'_, D>
where
    D: Decode,
{
    /// Advances to the next range.
    pub fn next_range(&mut self) -> Option<Option<Chunks<'_, D>>> {
        let (indices, _) = self.cursor.advance()?;

        if indices.is_empty() {
            return Some(None);
        }

        Some(Some(Chunks::new(
            self.reader,
            indices,
            self.vars_per_chunk,
            self.mode,
        )))
    }
}

/// An iterator over the windows of one range.
///
/// Every chunk but the last is yielded as is. The last chunk is extended by
/// following variants until every haplotype realizes the length of the
/// range.
pub struct Windows<'a, D>
where
    D: Decode,
{
    /// The chunks of the range.
    chunks: Chunks<'a, D>,

    /// The length of the range.
    length: u64,
}

impl<D> std::fmt::Debug for Windows<'_, D>
where
    D: Decode,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Windows")
            .field("chunks", &self.chunks)
            .field("length", &self.length)
            .finish()
    }
}

impl<D> Windows<'_, D>
where
    D: Decode,
{
    /// Reads the chunk at `bounds` and wraps (or extends) it into a window.
    fn window(&mut self, bounds: Range<usize>) -> Result<Window> {
        let mode = self.chunks.mode;
        let is_last = bounds.end == self.chunks.indices.len();

        let indices = NonEmpty::from_slice(&self.chunks.indices[bounds])
            .ok_or_else(|| Error::Integrity(String::from("empty chunk")))?;
        let initial = indices.iter().copied().collect::<Vec<_>>();

        let Reader {
            index,
            samples,
            genotypes,
            dosages,
            ..
        } = &mut *self.chunks.reader;

        let data = chunk::read(genotypes, dosages, samples, &initial, mode)?;

        if !is_last {
            return Ok(Window::interior(index, data, indices)?);
        }

        Ok(window::extend(index, data, indices, self.length, |batch| {
            chunk::read(genotypes, dosages, samples, batch, mode)
        })?)
    }
}

impl<D> Iterator for Windows<'_, D>
where
    D: Decode,
{
    type Item = Result<Window>;

    fn next(&mut self) -> Option<Self::Item> {
        let bounds = self.chunks.advance()?;
        Some(self.window(bounds))
    }
}

/// A lending cursor over the ranges of
/// [`Reader::chunk_ranges_with_length()`].
///
/// This behaves like [`RangeChunks`], but yields [`Windows`].
pub struct RangeWindows<'a, D>
where
    D: Decode,
{
    /// The reader.
    reader: &'a mut Reader<D>,

    /// The ranges.
    cursor: RangeCursor,

    /// The number of variants per chunk.
    vars_per_chunk: usize,

    /// The mode to read in.
    mode: Mode,
}

impl<D> std::fmt::Debug for RangeWindows<'_, D>
where
    D: Decode,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeWindows")
            .field("cursor", &self.cursor)
            .field("vars_per_chunk", &self.vars_per_chunk)
            .field("mode", &self.mode)
            .finish()
    }
}

impl<D> RangeWindows<'_, D>
where
    D: Decode,
{
    /// Advances to the next range.
    pub fn next_range(&mut self) -> Option<Option<Windows<'_, D>>> {
        let (indices, length) = self.cursor.advance()?;

        if indices.is_empty() {
            return Some(None);
        }

        Some(Some(Windows {
            chunks: Chunks::new(self.reader, indices, self.vars_per_chunk, self.mode),
            length,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Memory;
    use crate::index::Variant;

    /// Two samples over five variants on contig `chr1` and one on `chr2`.
    fn reader() -> std::result::Result<Reader<Memory>, Box<dyn std::error::Error>> {
        let index = Index::try_new(
            vec![String::from("chr1"), String::from("chr2")],
            vec![
                Variant::new(0, 0, 100, 101, 0, 1),
                Variant::new(1, 0, 150, 160, -9, 1),
                Variant::new(2, 0, 200, 201, 0, 1),
                Variant::new(3, 0, 210, 211, 0, 1),
                Variant::new(4, 0, 300, 302, 0, 2),
                Variant::new(5, 1, 10, 11, 0, 1),
            ],
        )?;

        #[rustfmt::skip]
        let genotypes = Memory::new(2, 6)
            .with_genotypes(vec![
                0, 0, 1, 1,
                1, 0, 0, -9,
                0, 1, 1, 0,
                0, 0, 0, 0,
                1, 1, 0, 1,
                1, 0, 0, 0,
            ])?
            .with_phasing(vec![true; 12])?;
        let dosages = Memory::new(2, 6).with_dosages(vec![
            0.0, 2.0, 1.0, -9.0, 1.0, 1.0, 0.0, 0.0, 2.0, 1.0, 1.0, 0.0,
        ])?;

        Ok(Builder::default()
            .index(index)?
            .samples(vec![String::from("a"), String::from("b")])?
            .genotypes(genotypes)?
            .dosages(dosages, vec![String::from("a"), String::from("b")])?
            .try_build()?)
    }

    #[test]
    fn test_count_and_resolve() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let reader = reader()?;

        assert_eq!(reader.count("1", &[90, 205], &[155, 400])?, vec![2, 2]);
        assert_eq!(reader.count("chr3", &[0, 0], &[10, 10])?, vec![0, 0]);

        let resolved = reader.resolve("chr1", &[0, 5], &[1000, 5])?;
        assert_eq!(resolved.indices(), &[0, 1, 2, 3, 4]);
        assert_eq!(resolved.offsets(), &[0, 5, 5]);

        let resolved = reader.resolve("9", &[0], &[10])?;
        assert_eq!(resolved.offsets(), &[0, 0]);

        let err = reader.count("chr3", &[0], &[]).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::MismatchedLengths { starts: 1, ends: 0 })
        ));

        Ok(())
    }

    #[test]
    fn test_read_with_reordered_samples() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut reader = reader()?;
        reader.set_samples(Some(&["b", "a"][..]))?;
        assert_eq!(reader.current_samples(), &["b", "a"]);

        let data = reader
            .read("chr1", 90, 155, Mode::GenotypesDosages)?
            .ok_or("no variants")?;

        let genotypes = data.genotypes().unwrap();
        assert_eq!(genotypes.haplotype(0, 0), &[1, 0]);
        assert_eq!(genotypes.haplotype(0, 1), &[1, -1]);
        assert_eq!(genotypes.haplotype(1, 0), &[0, 1]);

        let dosages = data.dosages().unwrap();
        assert_eq!(dosages.get(0, 0), Some(2.0));
        assert!(dosages.get(0, 1).is_some_and(f32::is_nan));

        assert!(reader.read("chr1", 0, 50, Mode::Genotypes)?.is_none());
        assert!(reader.read("chrUn", 0, 50, Mode::Genotypes)?.is_none());

        let err = reader.set_samples(Some(&["c"][..])).unwrap_err();
        assert_eq!(err.to_string(), "configuration error: unknown samples: c");

        Ok(())
    }

    #[test]
    fn test_read_ranges_offsets() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut reader = reader()?;

        let (data, offsets) = reader
            .read_ranges("1", &[90, 0, 205], &[155, 10, 250], Mode::Dosages)?
            .ok_or("no variants")?;

        assert_eq!(offsets, vec![0, 2, 2, 3]);
        assert_eq!(data.n_variants(), 3);
        assert!(reader
            .read_ranges("1", &[0], &[10], Mode::Dosages)?
            .is_none());

        Ok(())
    }

    #[test]
    fn test_chunk_budget() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut reader = reader()?;

        // Two diploid samples take 16 bytes of genotype calls per variant.
        let chunks = reader
            .chunk("1", 0, 1000, Budget::new(40), Mode::Genotypes)?
            .collect::<Result<Vec<_>>>()?;
        assert_eq!(
            chunks.iter().map(Data::n_variants).collect::<Vec<_>>(),
            vec![2, 2, 1]
        );

        let err = reader
            .chunk("1", 0, 1000, Budget::new(15), Mode::Genotypes)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientBudget {
                per_variant: 16,
                ..
            }
        ));

        Ok(())
    }

    #[test]
    fn test_chunk_ranges_with_length_requires_biallelic_variants(
    ) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut reader = reader()?;

        let err = reader
            .chunk_ranges_with_length("1", &[90], &[155], Budget::new(1 << 20), Mode::Genotypes)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedOperation(Unsupported::MultiallelicVariants)
        ));

        reader.set_filter(Some(Box::new(|v: &Variant| !v.is_multiallelic())))?;

        let err = reader
            .chunk_ranges_with_length("1", &[90], &[155], Budget::new(1 << 20), Mode::Dosages)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedOperation(Unsupported::NoGenotypes(Mode::Dosages))
        ));

        Ok(())
    }

    #[test]
    fn test_chunk_ranges_with_length_extends_last_chunk(
    ) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut reader = reader()?;
        reader.set_filter(Some(Box::new(|v: &Variant| !v.is_multiallelic())))?;

        let mut ranges = reader.chunk_ranges_with_length(
            "1",
            &[90, 0, 95],
            &[155, 10, 205],
            Budget::new(Mode::GenotypesPhasing.bytes_per_variant(2, PLOIDY) as u64),
            Mode::GenotypesPhasing,
        )?;

        // [90, 155) holds variants 0 and 1, one per chunk. Sample `a` carries
        // the deletion on its first haplotype, so the last chunk is extended
        // with the following variants on the contig, skipping the filtered
        // one. The 40 bases between the deletion and variant 2 then suffice.
        let windows = ranges
            .next_range()
            .ok_or("missing range")?
            .ok_or("empty range")?
            .collect::<Result<Vec<_>>>()?;

        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].end(), 101);
        assert!(windows[0].lengths().is_none());

        let last = &windows[1];
        assert_eq!(
            last.indices().iter().copied().collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(last.end(), 211);
        assert_eq!(last.data().n_variants(), 3);
        assert_eq!(last.lengths(), Some(&[96, 105, 105, 105][..]));

        assert!(ranges.next_range().ok_or("missing range")?.is_none());
        assert!(ranges.next_range().ok_or("missing range")?.is_some());
        assert!(ranges.next_range().is_none());

        Ok(())
    }

    #[test]
    fn test_close_is_idempotent() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut reader = reader()?;

        reader.close()?;
        reader.close()?;
        assert!(reader.is_closed());

        let err = reader.read("1", 0, 1000, Mode::Genotypes).unwrap_err();
        assert!(matches!(err, Error::Closed));
        assert!(matches!(
            reader.set_samples::<&str>(None),
            Err(Error::Closed)
        ));
        assert!(matches!(reader.set_filter(None), Err(Error::Closed)));

        let mut out = Data::zeroed(Mode::Genotypes, 2, 2);
        assert!(matches!(
            reader.read_into("1", 90, 155, &mut out),
            Err(Error::Closed)
        ));

        Ok(())
    }

    #[test]
    fn test_unknown_contig_never_matches_an_empty_name(
    ) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let index = Index::try_new(
            vec![String::new(), String::from("1")],
            vec![
                Variant::new(0, 0, 100, 101, 0, 1),
                Variant::new(1, 1, 4, 5, 0, 1),
            ],
        )?;
        let decoder = Memory::new(1, 2).with_genotypes(vec![0, 1, 1, 1])?;

        let mut reader = Builder::default()
            .index(index)?
            .samples(vec![String::from("s0")])?
            .genotypes(decoder)?
            .try_build()?;

        assert_eq!(reader.count("chrZ", &[0], &[1000])?, vec![0]);

        let resolved = reader.resolve("chrZ", &[0, 50], &[1000, 200])?;
        assert!(resolved.indices().is_empty());
        assert_eq!(resolved.offsets(), &[0, 0, 0]);

        assert!(reader.read("chrZ", 0, 1000, Mode::Genotypes)?.is_none());
        assert!(reader
            .read_ranges("chrZ", &[0], &[1000], Mode::Genotypes)?
            .is_none());

        let err = reader.resolve("chrZ", &[0, 1], &[10]).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::MismatchedLengths { starts: 2, ends: 1 })
        ));

        assert_eq!(reader.resolve("1", &[0], &[10])?.indices(), &[1]);

        Ok(())
    }

    #[test]
    fn test_read_into_reuses_output() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut reader = reader()?;
        reader.set_samples(Some(&["b", "a"][..]))?;

        let expected = reader
            .read("chr1", 90, 155, Mode::GenotypesPhasing)?
            .ok_or("no variants")?;

        let mut out = Data::zeroed(Mode::GenotypesPhasing, 2, 2);
        assert!(reader.read_into("chr1", 190, 215, &mut out)?);
        assert!(reader.read_into("chr1", 90, 155, &mut out)?);
        assert_eq!(out, expected);

        // Nothing overlaps, so the previous values stay in place.
        assert!(!reader.read_into("chr1", 0, 50, &mut out)?);
        assert_eq!(out, expected);

        let err = reader.read_into("chr1", 0, 1000, &mut out).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::OutputShape {
                expected: (2, 5),
                found: (2, 2)
            })
        ));

        Ok(())
    }

    #[test]
    fn test_set_dosages() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut reader = reader()?;
        reader.set_samples(Some(&["b", "a"][..]))?;

        let samples = vec![String::from("a"), String::from("b")];

        let err = reader
            .set_dosages(
                Memory::new(2, 6).with_dosages(vec![0.0; 12])?,
                vec![String::from("b"), String::from("a")],
            )
            .unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::MismatchedSamples)));

        let err = reader
            .set_dosages(
                Memory::new(3, 6).with_dosages(vec![0.0; 18])?,
                samples.clone(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::SampleCount {
                expected: 2,
                found: 3
            })
        ));

        #[rustfmt::skip]
        let dosages = Memory::new(2, 6).with_dosages(vec![
            0.5, 1.5,
            0.25, 1.75,
            0.0, 0.0,
            0.0, 0.0,
            0.0, 0.0,
            0.0, 0.0,
        ])?;
        reader.set_dosages(dosages, samples.clone())?;

        // The selection of `b` then `a` applies to the new source.
        let data = reader
            .read("chr1", 90, 155, Mode::Dosages)?
            .ok_or("no variants")?;
        let dosages = data.dosages().ok_or("no dosages")?;
        assert_eq!(dosages.sample(0), &[1.5, 1.75]);
        assert_eq!(dosages.sample(1), &[0.5, 0.25]);

        reader.close()?;
        let err = reader
            .set_dosages(Memory::new(2, 6).with_dosages(vec![0.0; 12])?, samples)
            .unwrap_err();
        assert!(matches!(err, Error::Closed));

        Ok(())
    }
}
