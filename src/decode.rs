//! The boundary to the decoder of stored genotypes, phasing, and dosages.
//!
//! A decoder fills caller-supplied buffers in _storage_ layout: variant-major,
//! with one row per requested variant and, within a row, the selected samples
//! in ascending storage order. Missing values are written as
//! [`MISSING_GENOTYPE_SENTINEL`] and [`MISSING_DOSAGE_SENTINEL`]. Reordering
//! samples, transposing to the public layout, and remapping the sentinels
//! all happen above this boundary.

pub mod memory;

pub use memory::Memory;

/// The value a decoder writes for a missing genotype call.
pub const MISSING_GENOTYPE_SENTINEL: i32 = -9;

/// The value a decoder writes for a missing dosage.
pub const MISSING_DOSAGE_SENTINEL: f32 = -9.0;

/// An error related to decoding.
#[derive(Debug)]
pub enum Error {
    /// An I/O error.
    Io(std::io::Error),

    /// The decoder has been closed.
    Closed,

    /// A variant index is out of range.
    VariantOutOfRange(u32),

    /// A sample index is out of range.
    SampleOutOfRange(u32),

    /// The sample subset is not strictly ascending.
    UnsortedSubset,

    /// A buffer does not have the size required by the request.
    BufferSize {
        /// The required number of values.
        expected: usize,

        /// The provided number of values.
        found: usize,
    },

    /// The decoder does not hold the requested component.
    MissingComponent(&'static str),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "i/o error: {err}"),
            Error::Closed => write!(f, "decoder is closed"),
            Error::VariantOutOfRange(index) => write!(f, "variant index {index} is out of range"),
            Error::SampleOutOfRange(index) => write!(f, "sample index {index} is out of range"),
            Error::UnsortedSubset => write!(f, "sample subset is not strictly ascending"),
            Error::BufferSize { expected, found } => write!(
                f,
                "buffer size mismatch: expected {expected} values, found {found}"
            ),
            Error::MissingComponent(component) => {
                write!(f, "decoder does not hold {component}")
            }
        }
    }
}

impl std::error::Error for Error {}

/// A [`Result`](std::result::Result) with an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// A decoder of stored values.
pub trait Decode: Sized {
    /// Gets the number of samples in storage.
    fn n_samples(&self) -> usize;

    /// Restricts subsequent reads to the given ascending storage sample
    /// indices, or to every sample with [`None`].
    fn set_sample_subset(&mut self, samples: Option<&[u32]>) -> Result<()>;

    /// Reads genotype calls into `genotypes`, which holds
    /// `variants x selected samples x 2` values.
    fn read_genotypes(&mut self, variants: &[u32], genotypes: &mut [i32]) -> Result<()>;

    /// Reads genotype calls and phasing flags. `phasing` holds
    /// `variants x selected samples` values.
    fn read_genotypes_phasing(
        &mut self,
        variants: &[u32],
        genotypes: &mut [i32],
        phasing: &mut [bool],
    ) -> Result<()>;

    /// Reads dosages into `dosages`, which holds `variants x selected samples`
    /// values.
    fn read_dosages(&mut self, variants: &[u32], dosages: &mut [f32]) -> Result<()>;

    /// Opens an independent handle to the same underlying data.
    ///
    /// The sample subset of the new handle is reset to every sample.
    fn duplicate(&self) -> Result<Self>;

    /// Releases the underlying resources. Closing twice is not an error.
    fn close(&mut self) -> Result<()>;
}
