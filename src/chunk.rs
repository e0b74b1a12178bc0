//! Planning, splitting, and decoding chunks of variants.

use tracing::debug;

use crate::budget::Budget;
use crate::data;
use crate::data::Data;
use crate::data::Dosages;
use crate::data::Genotypes;
use crate::data::Phasing;
use crate::data::MISSING_DOSAGE;
use crate::data::MISSING_GENOTYPE;
use crate::data::PLOIDY;
use crate::decode;
use crate::decode::Decode;
use crate::decode::MISSING_DOSAGE_SENTINEL;
use crate::decode::MISSING_GENOTYPE_SENTINEL;
use crate::mode::Mode;
use crate::samples::Samples;

/// An error related to chunked reads.
#[derive(Debug)]
pub enum Error {
    /// The budget cannot hold a single variant.
    InsufficientBudget {
        /// The budget.
        budget: Budget,

        /// The number of bytes one variant occupies.
        per_variant: usize,
    },

    /// An error decoding a chunk.
    Decode(decode::Error),

    /// The decoded values could not be shaped.
    Data(data::Error),

    /// An output array does not have the shape of the request.
    OutputShape {
        /// The `(samples, variants)` shape of the request.
        expected: (usize, usize),

        /// The `(samples, variants)` shape of the output.
        found: (usize, usize),
    },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InsufficientBudget {
                budget,
                per_variant,
            } => write!(
                f,
                "memory budget of {budget} is insufficient to read a single variant \
                 ({} per variant)",
                Budget::new(*per_variant as u64)
            ),
            Error::Decode(err) => write!(f, "decode error: {err}"),
            Error::Data(err) => write!(f, "data error: {err}"),
            Error::OutputShape { expected, found } => write!(
                f,
                "output holds {} samples and {} variants, but the read needs {} samples and {} \
                 variants",
                found.0, found.1, expected.0, expected.1
            ),
        }
    }
}

impl std::error::Error for Error {}

impl From<decode::Error> for Error {
    fn from(err: decode::Error) -> Self {
        Error::Decode(err)
    }
}

impl From<data::Error> for Error {
    fn from(err: data::Error) -> Self {
        Error::Data(err)
    }
}

/// A [`Result`](std::result::Result) with an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Computes the number of variants that fit in one chunk.
///
/// The result never exceeds `n_variants`.
///
/// # Examples
///
/// ```
/// use varwindow::budget::Budget;
/// use varwindow::chunk;
///
/// assert_eq!(chunk::plan(Budget::new(40), 36, 10)?, 1);
/// assert_eq!(chunk::plan(Budget::new(1000), 36, 10)?, 10);
/// assert!(chunk::plan(Budget::new(35), 36, 10).is_err());
///
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn plan(budget: Budget, bytes_per_variant: usize, n_variants: usize) -> Result<usize> {
    if bytes_per_variant == 0 {
        return Ok(n_variants);
    }

    let fits = budget.bytes() / bytes_per_variant as u64;
    if fits == 0 {
        return Err(Error::InsufficientBudget {
            budget,
            per_variant: bytes_per_variant,
        });
    }

    let vars_per_chunk = fits.min(n_variants as u64) as usize;
    debug!(
        "chunk: {vars_per_chunk} variants per chunk ({bytes_per_variant} bytes per variant, \
         budget {budget})"
    );

    Ok(vars_per_chunk)
}

/// Splits indices into contiguous chunks of `vars_per_chunk` variants.
///
/// Only the last chunk may be smaller.
///
/// # Examples
///
/// ```
/// use varwindow::chunk;
///
/// let chunks = chunk::split(&[3, 4, 5, 6, 7], 2).collect::<Vec<_>>();
/// assert_eq!(chunks, vec![&[3, 4][..], &[5, 6], &[7]]);
/// ```
pub fn split(indices: &[u32], vars_per_chunk: usize) -> std::slice::Chunks<'_, u32> {
    indices.chunks(vars_per_chunk.max(1))
}

/// Transposes a variant-major decoder buffer with `width` values per sample
/// into a row-major `(selected samples x width, variants)` array in the
/// requested sample order.
fn transpose<T, F>(
    buffer: &[T],
    n_variants: usize,
    n_decoded: usize,
    width: usize,
    order: &[usize],
    remap: F,
) -> Vec<T>
where
    T: Copy + Default,
    F: Fn(T) -> T,
{
    let mut out = vec![T::default(); order.len() * width * n_variants];
    transpose_into(buffer, n_variants, n_decoded, width, order, remap, &mut out);
    out
}

/// Like [`transpose()`], but writes into `out`, which holds
/// `selected samples x width x variants` values.
fn transpose_into<T, F>(
    buffer: &[T],
    n_variants: usize,
    n_decoded: usize,
    width: usize,
    order: &[usize],
    remap: F,
    out: &mut [T],
) where
    T: Copy,
    F: Fn(T) -> T,
{
    if out.is_empty() {
        return;
    }

    for (v, row) in buffer.chunks_exact(n_decoded * width).enumerate() {
        for (s, &decoded) in order.iter().enumerate() {
            for k in 0..width {
                out[(s * width + k) * n_variants + v] = remap(row[decoded * width + k]);
            }
        }
    }
}

/// Maps the decoder's missing genotype value to [`MISSING_GENOTYPE`].
fn remap_genotype(value: i32) -> i32 {
    if value == MISSING_GENOTYPE_SENTINEL {
        MISSING_GENOTYPE
    } else {
        value
    }
}

/// Maps the decoder's missing dosage value to [`MISSING_DOSAGE`].
fn remap_dosage(value: f32) -> f32 {
    if value == MISSING_DOSAGE_SENTINEL {
        MISSING_DOSAGE
    } else {
        value
    }
}

/// Decodes the genotype calls of a chunk.
fn read_genotypes<D>(decoder: &mut D, samples: &Samples, indices: &[u32]) -> Result<Genotypes>
where
    D: Decode,
{
    let n_variants = indices.len();
    let n_decoded = decoded_samples(decoder, samples);
    let order = samples.order();

    let mut genotypes = vec![0; n_variants * n_decoded * PLOIDY];
    decoder.read_genotypes(indices, &mut genotypes)?;

    let genotypes = transpose(&genotypes, n_variants, n_decoded, PLOIDY, order, remap_genotype);
    Ok(Genotypes::try_new(genotypes, order.len(), PLOIDY, n_variants)?)
}

/// Decodes the genotype calls and phasing flags of a chunk.
fn read_genotypes_phasing<D>(
    decoder: &mut D,
    samples: &Samples,
    indices: &[u32],
) -> Result<(Genotypes, Phasing)>
where
    D: Decode,
{
    let n_variants = indices.len();
    let n_decoded = decoded_samples(decoder, samples);
    let order = samples.order();

    let mut genotypes = vec![0; n_variants * n_decoded * PLOIDY];
    let mut phasing = vec![false; n_variants * n_decoded];
    decoder.read_genotypes_phasing(indices, &mut genotypes, &mut phasing)?;

    let genotypes = transpose(&genotypes, n_variants, n_decoded, PLOIDY, order, remap_genotype);
    let phasing = transpose(&phasing, n_variants, n_decoded, 1, order, |flag| flag);

    Ok((
        Genotypes::try_new(genotypes, order.len(), PLOIDY, n_variants)?,
        Phasing::try_new(phasing, order.len(), n_variants)?,
    ))
}

/// Decodes the dosages of a chunk.
fn read_dosages<D>(decoder: &mut D, samples: &Samples, indices: &[u32]) -> Result<Dosages>
where
    D: Decode,
{
    let n_variants = indices.len();
    let n_decoded = decoded_samples(decoder, samples);
    let order = samples.order();

    let mut dosages = vec![0.0; n_variants * n_decoded];
    decoder.read_dosages(indices, &mut dosages)?;

    let dosages = transpose(&dosages, n_variants, n_decoded, 1, order, remap_dosage);
    Ok(Dosages::try_new(dosages, order.len(), n_variants)?)
}

/// Gets the number of samples a decoder writes per variant.
fn decoded_samples<D>(decoder: &D, samples: &Samples) -> usize
where
    D: Decode,
{
    samples
        .subset()
        .map(<[u32]>::len)
        .unwrap_or_else(|| decoder.n_samples())
}

/// Decodes a chunk of variants in the given [`Mode`].
///
/// Genotype calls and phasing flags come from `genotypes` and dosages from
/// `dosages`; both decoders must already be restricted to
/// [`Samples::subset()`]. Samples are returned in [`Samples::current()`]
/// order with missing values remapped to [`MISSING_GENOTYPE`] and
/// [`MISSING_DOSAGE`].
pub fn read<D>(
    genotypes: &mut D,
    dosages: &mut D,
    samples: &Samples,
    indices: &[u32],
    mode: Mode,
) -> Result<Data>
where
    D: Decode,
{
    Ok(match mode {
        Mode::Genotypes => Data::Genotypes(read_genotypes(genotypes, samples, indices)?),
        Mode::Dosages => Data::Dosages(read_dosages(dosages, samples, indices)?),
        Mode::GenotypesPhasing => {
            let (genotypes, phasing) = read_genotypes_phasing(genotypes, samples, indices)?;
            Data::GenotypesPhasing(genotypes, phasing)
        }
        Mode::GenotypesDosages => Data::GenotypesDosages(
            read_genotypes(genotypes, samples, indices)?,
            read_dosages(dosages, samples, indices)?,
        ),
        Mode::GenotypesPhasingDosages => {
            let (genotypes, phasing) = read_genotypes_phasing(genotypes, samples, indices)?;
            Data::GenotypesPhasingDosages(
                genotypes,
                phasing,
                read_dosages(dosages, samples, indices)?,
            )
        }
    })
}

/// Decodes a chunk of variants into `out`, reusing its arrays.
///
/// The mode is the mode of `out`, which must hold [`Samples::len()`] samples
/// and `indices.len()` variants. Values land exactly where [`read()`] would
/// put them. Only the decoder's storage-layout scratch space is allocated.
pub fn read_into<D>(
    genotypes: &mut D,
    dosages: &mut D,
    samples: &Samples,
    indices: &[u32],
    out: &mut Data,
) -> Result<()>
where
    D: Decode,
{
    let n_variants = indices.len();
    let expected = (samples.len(), n_variants);
    let found = (out.n_samples(), out.n_variants());

    if expected != found {
        return Err(Error::OutputShape { expected, found });
    }

    let order = samples.order();

    match out.components_mut() {
        (Some(calls), phasing, dosage_values) => {
            let n_decoded = decoded_samples(genotypes, samples);
            let mut buffer = vec![0; n_variants * n_decoded * PLOIDY];

            match phasing {
                Some(flags) => {
                    let mut flag_buffer = vec![false; n_variants * n_decoded];
                    genotypes.read_genotypes_phasing(indices, &mut buffer, &mut flag_buffer)?;
                    transpose_into(&flag_buffer, n_variants, n_decoded, 1, order, |f| f, flags);
                }
                None => genotypes.read_genotypes(indices, &mut buffer)?,
            }

            transpose_into(&buffer, n_variants, n_decoded, PLOIDY, order, remap_genotype, calls);

            if let Some(values) = dosage_values {
                read_dosages_into(dosages, samples, indices, values)?;
            }
        }
        (None, _, Some(values)) => read_dosages_into(dosages, samples, indices, values)?,
        (None, _, None) => {}
    }

    Ok(())
}

/// Decodes the dosages of a chunk into `out`.
fn read_dosages_into<D>(
    decoder: &mut D,
    samples: &Samples,
    indices: &[u32],
    out: &mut [f32],
) -> Result<()>
where
    D: Decode,
{
    let n_variants = indices.len();
    let n_decoded = decoded_samples(decoder, samples);

    let mut buffer = vec![0.0; n_variants * n_decoded];
    decoder.read_dosages(indices, &mut buffer)?;

    transpose_into(&buffer, n_variants, n_decoded, 1, samples.order(), remap_dosage, out);
    Ok(())
}
