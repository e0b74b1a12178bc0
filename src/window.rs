//! Extending windows to a realized haplotype length.
//!
//! Insertions and deletions make the sequence of a haplotype longer or
//! shorter than the reference coordinates it spans. When a caller asks for a
//! window of a given length, the last chunk of that window is therefore grown
//! by batches of following variants until every haplotype realizes at least
//! the requested length, or until the contig runs out of variants.
//!
//! Only alternate allele `1` calls contribute to a haplotype's length.
//! Missing calls never contribute and, when phasing flags are available,
//! neither do unphased heterozygous calls. Overlapping deletions are counted
//! independently, which may undercount a haplotype's length and cause the
//! window to extend further than strictly needed (never less).

use nonempty::NonEmpty;
use tracing::debug;

use crate::chunk;
use crate::data;
use crate::data::Data;
use crate::index::Index;
use crate::mode::Mode;

/// The number of variants fetched per extension step.
pub const EXTENSION_BATCH: usize = 20;

/// The genotype call of the alternate allele whose length is tracked.
const ALTERNATE: i32 = 1;

////////////////////////////////////////////////////////////////////////////////////////
// Errors
////////////////////////////////////////////////////////////////////////////////////////

/// An error related to extending a window.
#[derive(Debug)]
pub enum Error {
    /// The arrays have no genotype calls to compute lengths from.
    MissingGenotypes(Mode),

    /// A variant index does not exist in the index.
    UnknownVariant(u32),

    /// The arrays do not hold one variant per index.
    VariantCount {
        /// The number of indices.
        expected: usize,

        /// The number of variants in the arrays.
        found: usize,
    },

    /// An error reading the variants of an extension.
    Chunk(chunk::Error),

    /// An error concatenating the arrays of an extension.
    Data(data::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::MissingGenotypes(mode) => {
                write!(f, "mode `{mode}` has no genotypes to compute lengths from")
            }
            Error::UnknownVariant(index) => write!(f, "unknown variant index: {index}"),
            Error::VariantCount { expected, found } => write!(
                f,
                "arrays hold {found} variants, but {expected} indices were given"
            ),
            Error::Chunk(err) => write!(f, "chunk error: {err}"),
            Error::Data(err) => write!(f, "data error: {err}"),
        }
    }
}

impl std::error::Error for Error {}

/// A [`Result`](std::result::Result) with an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////////////////////
// Windows
////////////////////////////////////////////////////////////////////////////////////////

/// The arrays of one chunk plus where the chunk ends.
#[derive(Clone, Debug, PartialEq)]
pub struct Window {
    /// The arrays.
    data: Data,

    /// The 0-based, exclusive end of the last variant.
    end: u64,

    /// The stable indices of every variant in the arrays.
    indices: NonEmpty<u32>,

    /// The realized length of each haplotype, for an extended chunk.
    lengths: Option<Vec<i64>>,
}

impl Window {
    /// Creates a window for an interior chunk, which is never extended.
    pub fn interior(index: &Index, data: Data, indices: NonEmpty<u32>) -> Result<Self> {
        let end = end_of(index, *indices.last())?;

        Ok(Self {
            data,
            end,
            indices,
            lengths: None,
        })
    }

    /// Gets the arrays.
    pub fn data(&self) -> &Data {
        &self.data
    }

    /// Gets the 0-based, exclusive end of the last variant in the window.
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Gets the stable indices of every variant in the window.
    pub fn indices(&self) -> &NonEmpty<u32> {
        &self.indices
    }

    /// Gets the realized length of each haplotype, ordered by sample and
    /// then haplotype. Only the last chunk of a range has lengths.
    pub fn lengths(&self) -> Option<&[i64]> {
        self.lengths.as_deref()
    }

    /// Consumes `self` and returns the arrays.
    pub fn into_data(self) -> Data {
        self.data
    }
}

/// Gets the end of a variant.
fn end_of(index: &Index, i: u32) -> Result<u64> {
    index
        .variant(i)
        .map(|variant| variant.end())
        .ok_or(Error::UnknownVariant(i))
}

/// Computes how much each haplotype's length changes across the variants of
/// `data`.
///
/// The result is ordered by sample and then haplotype.
pub fn deltas(index: &Index, data: &Data, indices: &[u32]) -> Result<Vec<i64>> {
    let genotypes = data
        .genotypes()
        .ok_or_else(|| Error::MissingGenotypes(data.mode()))?;
    let phasing = data.phasing();

    if genotypes.n_variants() != indices.len() {
        return Err(Error::VariantCount {
            expected: indices.len(),
            found: genotypes.n_variants(),
        });
    }

    let ilens = indices
        .iter()
        .map(|&i| {
            index
                .variant(i)
                .map(|variant| i64::from(variant.ilen()))
                .ok_or(Error::UnknownVariant(i))
        })
        .collect::<Result<Vec<_>>>()?;

    let ploidy = genotypes.ploidy();
    let mut deltas = Vec::with_capacity(genotypes.n_samples() * ploidy);

    for sample in 0..genotypes.n_samples() {
        // Without phasing flags, calls are assumed to be phased.
        let counts = |variant: usize| match phasing {
            Some(phasing) => {
                let phased = phasing.get(sample, variant).unwrap_or(false);
                let first = genotypes.get(sample, 0, variant);
                phased || (1..ploidy).all(|h| genotypes.get(sample, h, variant) == first)
            }
            None => true,
        };

        for haplotype in 0..ploidy {
            let delta = genotypes
                .haplotype(sample, haplotype)
                .iter()
                .zip(&ilens)
                .enumerate()
                .filter(|&(v, (&call, _))| call == ALTERNATE && counts(v))
                .map(|(_, (_, &ilen))| ilen)
                .sum::<i64>();

            deltas.push(delta);
        }
    }

    Ok(deltas)
}

/// Extends the last chunk of a range until every haplotype realizes at least
/// `length` bases or no more variants follow on the contig.
///
/// `data` holds the arrays of the chunk's `indices`, and `read` decodes the
/// arrays for a batch of following indices in the same mode.
///
/// # Examples
///
/// ```
/// use nonempty::NonEmpty;
/// use varwindow::data::Data;
/// use varwindow::data::Genotypes;
/// use varwindow::index::Index;
/// use varwindow::index::Variant;
/// use varwindow::window;
///
/// let index = Index::try_new(
///     vec![String::from("1")],
///     vec![
///         Variant::new(0, 0, 100, 101, 0, 1),
///         Variant::new(1, 0, 150, 160, -9, 1),
///         Variant::new(2, 0, 200, 201, 0, 1),
///     ],
/// )?;
///
/// // One sample whose first haplotype carries the deletion.
/// let data = Data::Genotypes(Genotypes::try_new(vec![0, 1, 0, 0], 1, 2, 2)?);
///
/// let window = window::extend(&index, data, NonEmpty::from((0, vec![1])), 65, |batch| {
///     Ok(Data::Genotypes(Genotypes::try_new(vec![0; 2 * batch.len()], 1, 2, batch.len())?))
/// })?;
///
/// assert_eq!(window.end(), 201);
/// assert_eq!(window.lengths(), Some(&[96, 105][..]));
///
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn extend<F>(
    index: &Index,
    data: Data,
    indices: NonEmpty<u32>,
    length: u64,
    mut read: F,
) -> Result<Window>
where
    F: FnMut(&[u32]) -> chunk::Result<Data>,
{
    let target = i64::try_from(length).unwrap_or(i64::MAX);

    let initial = indices.iter().copied().collect::<Vec<_>>();
    let mut lengths = deltas(index, &data, &initial)?
        .into_iter()
        .map(|delta| target.saturating_add(delta))
        .collect::<Vec<_>>();

    let mut end = end_of(index, *indices.last())?;
    let mut indices = indices;
    let mut parts = vec![data];

    while lengths.iter().any(|&l| l < target) {
        let batch = index.following(*indices.last(), EXTENSION_BATCH);
        let first = match batch.first() {
            Some(&first) => first,
            None => break,
        };

        let start = index
            .variant(first)
            .map(|variant| variant.start())
            .ok_or(Error::UnknownVariant(first))?;
        let gap = start as i64 - end as i64;

        let data = read(&batch).map_err(Error::Chunk)?;
        let deltas = deltas(index, &data, &batch)?;

        for (length, delta) in lengths.iter_mut().zip(deltas) {
            *length += (gap + delta).max(0);
        }

        for i in batch {
            end = end_of(index, i)?;
            indices.push(i);
        }

        parts.push(data);
    }

    debug!(
        "window: extended by {} batches to {} variants, ending at {end}",
        parts.len() - 1,
        indices.len()
    );

    let data = match parts.len() {
        1 => parts.swap_remove(0),
        _ => Data::concat(&parts).map_err(Error::Data)?,
    };

    Ok(Window {
        data,
        end,
        indices,
        lengths: Some(lengths),
    })
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::Rng;
    use rand::SeedableRng;

    use super::*;
    use crate::data::Genotypes;
    use crate::data::Phasing;
    use crate::index::Variant;

    /// Builds genotype-only arrays in which every haplotype carries the
    /// alternate allele of every variant listed in `carried`.
    fn carrying(
        batch: &[u32],
        n_samples: usize,
        carried: &[u32],
    ) -> std::result::Result<Data, data::Error> {
        let mut calls = Vec::new();
        for _ in 0..n_samples * 2 {
            calls.extend(batch.iter().map(|i| i32::from(carried.contains(i))));
        }

        Ok(Data::Genotypes(Genotypes::try_new(
            calls,
            n_samples,
            2,
            batch.len(),
        )?))
    }

    #[test]
    fn test_deletion_triggers_extension() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let index = Index::try_new(
            vec![String::from("1")],
            vec![
                Variant::new(0, 0, 100, 101, 0, 1),
                Variant::new(1, 0, 150, 160, -9, 1),
                Variant::new(2, 0, 162, 163, 0, 1),
                Variant::new(3, 0, 164, 165, 0, 1),
            ],
        )?;

        let data = carrying(&[0, 1], 1, &[1])?;
        let mut batches = Vec::new();

        let window = extend(&index, data, NonEmpty::from((0, vec![1])), 65, |batch| {
            batches.push(batch.to_vec());
            Ok(carrying(batch, 1, &[])?)
        })?;

        // One batch holds every remaining variant, after which the contig is
        // exhausted even though the haplotypes remain short.
        assert_eq!(batches, vec![vec![2, 3]]);
        assert_eq!(window.end(), 165);
        assert_eq!(window.indices().iter().copied().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        assert_eq!(window.data().n_variants(), 4);
        assert_eq!(window.lengths(), Some(&[58, 58][..]));

        Ok(())
    }

    #[test]
    fn test_overlapping_batch_never_shortens_lengths(
    ) -> std::result::Result<(), Box<dyn std::error::Error>> {
        // A long deletion followed by one batch of SNPs inside it and, when
        // `far` is set, a second batch 210 bases past the end of the first.
        let build = |far: bool| {
            let mut variants = vec![Variant::new(0, 0, 10, 200, -189, 1)];
            variants.extend(
                (1..=20).map(|i| Variant::new(i, 0, 19 + i as u64, 20 + i as u64, 0, 1)),
            );

            if far {
                variants.extend(
                    (21..=40).map(|i| Variant::new(i, 0, 229 + i as u64, 230 + i as u64, 0, 1)),
                );
            }

            Index::try_new(vec![String::from("1")], variants)
        };

        // Each haplotype starts at 300 - 189 = 111 bases. The first batch
        // starts 180 bases before the deletion ends, which must add nothing
        // rather than subtract.
        let index = build(false)?;
        let data = carrying(&[0], 1, &[0])?;
        let window = extend(&index, data, NonEmpty::new(0), 300, |batch| {
            Ok(carrying(batch, 1, &[])?)
        })?;

        assert_eq!(window.end(), 40);
        assert_eq!(window.indices().len(), 21);
        assert_eq!(window.lengths(), Some(&[111, 111][..]));

        let index = build(true)?;
        let data = carrying(&[0], 1, &[0])?;
        let mut batches = Vec::new();
        let window = extend(&index, data, NonEmpty::new(0), 300, |batch| {
            batches.push(batch.to_vec());
            Ok(carrying(batch, 1, &[])?)
        })?;

        assert_eq!(
            batches,
            vec![(1..=20).collect::<Vec<u32>>(), (21..=40).collect::<Vec<u32>>()]
        );
        assert_eq!(window.end(), 270);
        assert_eq!(window.lengths(), Some(&[321, 321][..]));

        Ok(())
    }

    #[test]
    fn test_deltas_require_one_variant_per_index(
    ) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let index = Index::try_new(
            vec![String::from("1")],
            vec![
                Variant::new(0, 0, 10, 15, -4, 1),
                Variant::new(1, 0, 20, 25, -4, 1),
            ],
        )?;

        let data = carrying(&[0, 1], 1, &[0, 1])?;
        let err = deltas(&index, &data, &[0]).unwrap_err();
        assert!(matches!(
            err,
            Error::VariantCount {
                expected: 1,
                found: 2
            }
        ));

        // A short read during extension surfaces instead of being truncated.
        let data = carrying(&[0], 1, &[0])?;
        let err = extend(&index, data, NonEmpty::new(0), 10, |_| {
            Ok(carrying(&[], 1, &[])?)
        })
        .unwrap_err();
        assert!(matches!(err, Error::VariantCount { expected: 1, found: 0 }));

        Ok(())
    }

    #[test]
    fn test_no_extension_when_long_enough() -> std::result::Result<(), Box<dyn std::error::Error>>
    {
        let index = Index::try_new(
            vec![String::from("1")],
            vec![
                Variant::new(0, 0, 10, 11, 3, 1),
                Variant::new(1, 0, 20, 21, 0, 1),
            ],
        )?;

        let data = carrying(&[0], 2, &[0])?;
        let window = extend(&index, data, NonEmpty::new(0), 5, |_| {
            panic!("no extension should be read")
        })?;

        assert_eq!(window.end(), 11);
        assert_eq!(window.lengths(), Some(&[8, 8, 8, 8][..]));

        Ok(())
    }

    #[test]
    fn test_unphased_heterozygous_calls_do_not_count(
    ) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let index = Index::try_new(
            vec![String::from("1")],
            vec![
                Variant::new(0, 0, 10, 15, -4, 1),
                Variant::new(1, 0, 20, 25, -4, 1),
            ],
        )?;

        // Sample 0 is an unphased heterozygote at both variants, sample 1 is
        // homozygous for the deletion at the first variant.
        let genotypes = Genotypes::try_new(vec![1, 1, 0, 0, 1, 0, 1, 0], 2, 2, 2)?;
        let phasing = Phasing::try_new(vec![false, false, false, false], 2, 2)?;
        let data = Data::GenotypesPhasing(genotypes.clone(), phasing);

        assert_eq!(deltas(&index, &data, &[0, 1])?, vec![0, 0, -4, -4]);

        // Without phasing flags every alternate call counts.
        let data = Data::Genotypes(genotypes);
        assert_eq!(deltas(&index, &data, &[0, 1])?, vec![-8, 0, -4, -4]);

        Ok(())
    }

    #[test]
    fn test_extension_never_crosses_contigs() -> std::result::Result<(), Box<dyn std::error::Error>>
    {
        let index = Index::try_new(
            vec![String::from("1"), String::from("2")],
            vec![
                Variant::new(0, 0, 10, 30, -19, 1),
                Variant::new(1, 1, 0, 1, 0, 1),
            ],
        )?;

        let data = carrying(&[0], 1, &[0])?;
        let window = extend(&index, data, NonEmpty::new(0), 20, |_| {
            panic!("the next contig must not be read")
        })?;

        assert_eq!(window.end(), 30);
        assert_eq!(window.lengths(), Some(&[1, 1][..]));

        Ok(())
    }

    #[test]
    fn test_dosages_cannot_be_extended() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let index = Index::try_new(
            vec![String::from("1")],
            vec![Variant::new(0, 0, 10, 11, 0, 1)],
        )?;

        let data = Data::Dosages(data::Dosages::try_new(vec![1.0], 1, 1)?);
        let err = extend(&index, data, NonEmpty::new(0), 5, |_| unreachable!()).unwrap_err();
        assert!(matches!(err, Error::MissingGenotypes(Mode::Dosages)));

        Ok(())
    }

    #[test]
    fn test_random_extensions_reach_target_or_contig_end(
    ) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..50 {
            let mut start = 0u64;
            let variants = (0..120)
                .map(|i| {
                    start += rng.gen_range(1..6);
                    let deletion = rng.gen_bool(0.3);
                    let len = if deletion { rng.gen_range(2..10) } else { 1 };
                    Variant::new(i, 0, start, start + len, 1 - len as i32, 1)
                })
                .collect::<Vec<_>>();
            let index = Index::try_new(vec![String::from("1")], variants)?;

            let n_samples = 3;
            let calls = (0..n_samples * 2 * 120)
                .map(|_| i32::from(rng.gen_bool(0.5)))
                .collect::<Vec<_>>();
            let read = |batch: &[u32]| -> chunk::Result<Data> {
                let mut out = Vec::new();
                for row in 0..n_samples * 2 {
                    out.extend(batch.iter().map(|&v| calls[row * 120 + v as usize]));
                }
                Ok(Data::Genotypes(Genotypes::try_new(
                    out,
                    n_samples,
                    2,
                    batch.len(),
                )?))
            };

            let first = rng.gen_range(0..100u32);
            let chunk = (first..first + rng.gen_range(1..5)).collect::<Vec<_>>();
            let length = rng.gen_range(1..200);

            let data = read(&chunk)?;
            let indices = NonEmpty::from_vec(chunk).ok_or("empty chunk")?;
            let window = extend(&index, data, indices, length, read)?;

            let lengths = window.lengths().ok_or("missing lengths")?;
            let exhausted = *window.indices().last() == 119;
            assert!(exhausted || lengths.iter().all(|&l| l >= length as i64));
            assert_eq!(window.data().n_variants(), window.indices().len());

            let consumed = window.indices().iter().copied().collect::<Vec<_>>();
            assert!(consumed.windows(2).all(|w| w[1] == w[0] + 1));
        }

        Ok(())
    }
}
