//! Resolving batches of coordinate ranges to variant indices.
//!
//! Overlap is half-open: a variant spanning `[s, e)` overlaps the query
//! `[qs, qe)` if and only if `s < qe && e > qs`. A query with `qs >= qe`
//! matches nothing.

use crate::index::Index;

////////////////////////////////////////////////////////////////////////////////////////
// Errors
////////////////////////////////////////////////////////////////////////////////////////

/// An error related to resolving ranges.
#[derive(Debug, Eq, PartialEq)]
pub enum Error {
    /// The number of starts and ends differ.
    MismatchedLengths {
        /// The number of starts.
        starts: usize,

        /// The number of ends.
        ends: usize,
    },

    /// The joined indices disagree with the independently counted matches.
    ///
    /// This indicates a bug in the interval lookup and should never occur.
    Integrity {
        /// The number of matches counted.
        counted: usize,

        /// The number of indices resolved.
        resolved: usize,
    },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::MismatchedLengths { starts, ends } => write!(
                f,
                "mismatched query lengths: {starts} starts but {ends} ends"
            ),
            Error::Integrity { counted, resolved } => write!(
                f,
                "integrity violation: counted {counted} matches but resolved {resolved} indices"
            ),
        }
    }
}

impl std::error::Error for Error {}

/// A [`Result`](std::result::Result) with an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////////////////////
// Resolved ranges
////////////////////////////////////////////////////////////////////////////////////////

/// The variant indices for a batch of queries.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Resolved {
    /// The flattened indices.
    indices: Vec<u32>,

    /// The offsets into `indices` (one more than the number of queries).
    offsets: Vec<usize>,
}

impl Resolved {
    /// Creates an empty [`Resolved`] for `n` queries.
    pub(crate) fn empty(n: usize) -> Self {
        Self {
            indices: Vec::new(),
            offsets: vec![0; n + 1],
        }
    }

    /// Gets the flattened indices.
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Gets the offsets.
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Gets the number of queries.
    pub fn len(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// Whether the batch contained no queries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gets the indices for query `i`.
    pub fn get(&self, i: usize) -> Option<&[u32]> {
        let start = *self.offsets.get(i)?;
        let end = *self.offsets.get(i + 1)?;
        Some(&self.indices[start..end])
    }

    /// Iterates over the indices of each query, in query order.
    pub fn iter(&self) -> impl Iterator<Item = &[u32]> {
        self.offsets
            .windows(2)
            .map(|w| &self.indices[w[0]..w[1]])
    }

    /// Consumes `self` and returns the indices and offsets.
    pub fn into_parts(self) -> (Vec<u32>, Vec<usize>) {
        (self.indices, self.offsets)
    }
}

////////////////////////////////////////////////////////////////////////////////////////
// Resolution
////////////////////////////////////////////////////////////////////////////////////////

/// Ensures that there are the same number of starts and ends.
fn check_lengths(starts: &[u64], ends: &[u64]) -> Result<()> {
    if starts.len() != ends.len() {
        return Err(Error::MismatchedLengths {
            starts: starts.len(),
            ends: ends.len(),
        });
    }

    Ok(())
}

/// Counts the active variants overlapping each query.
///
/// A contig with no active variants (including one absent from the dataset)
/// yields zero for every query.
///
/// # Examples
///
/// ```
/// use varwindow::index::Index;
/// use varwindow::index::Variant;
/// use varwindow::range;
///
/// let index = Index::try_new(
///     vec![String::from("1")],
///     vec![
///         Variant::new(0, 0, 100, 101, 0, 1),
///         Variant::new(1, 0, 150, 160, -9, 1),
///     ],
/// )?;
///
/// assert_eq!(range::count(&index, "1", &[90, 155, 160], &[155, 156, 170])?, vec![2, 1, 0]);
/// assert_eq!(range::count(&index, "chrZ", &[0], &[1000])?, vec![0]);
///
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn count(index: &Index, contig: &str, starts: &[u64], ends: &[u64]) -> Result<Vec<usize>> {
    check_lengths(starts, ends)?;

    let tree = match index.contig_id(contig).and_then(|id| index.tree(id)) {
        Some(tree) => tree,
        None => return Ok(vec![0; starts.len()]),
    };

    Ok(starts
        .iter()
        .zip(ends)
        .map(|(&start, &end)| if start < end { tree.count(start, end) } else { 0 })
        .collect())
}

/// Resolves each query to the active variants overlapping it.
///
/// Within a query, indices are ordered by variant start and then by stable
/// index.
///
/// # Examples
///
/// ```
/// use varwindow::index::Index;
/// use varwindow::index::Variant;
/// use varwindow::range;
///
/// let index = Index::try_new(
///     vec![String::from("1")],
///     vec![
///         Variant::new(0, 0, 100, 101, 0, 1),
///         Variant::new(1, 0, 150, 160, -9, 1),
///     ],
/// )?;
///
/// let resolved = range::resolve(&index, "1", &[90, 155], &[155, 156])?;
/// assert_eq!(resolved.indices(), &[0, 1, 1]);
/// assert_eq!(resolved.offsets(), &[0, 2, 3]);
///
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn resolve(index: &Index, contig: &str, starts: &[u64], ends: &[u64]) -> Result<Resolved> {
    let counts = count(index, contig, starts, ends)?;

    let tree = match index.contig_id(contig).and_then(|id| index.tree(id)) {
        Some(tree) => tree,
        None => return Ok(Resolved::empty(starts.len())),
    };

    let mut indices = Vec::with_capacity(counts.iter().sum());
    let mut offsets = Vec::with_capacity(starts.len() + 1);
    offsets.push(0);

    let mut hits = Vec::new();
    for ((&start, &end), &expected) in starts.iter().zip(ends).zip(&counts) {
        hits.clear();

        if start < end {
            hits.extend(tree.find(start, end).map(|iv| (iv.start, iv.val)));
        }

        if hits.len() != expected {
            return Err(Error::Integrity {
                counted: expected,
                resolved: hits.len(),
            });
        }

        hits.sort_unstable();
        indices.extend(hits.iter().map(|&(_, i)| i));
        offsets.push(indices.len());
    }

    Ok(Resolved { indices, offsets })
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::Rng;
    use rand::SeedableRng;

    use super::*;
    use crate::index::Variant;

    fn index() -> std::result::Result<Index, Box<dyn std::error::Error>> {
        Ok(Index::try_new(
            vec![String::from("1"), String::from("2")],
            vec![
                Variant::new(0, 0, 10, 20, -9, 1),
                Variant::new(1, 0, 10, 11, 0, 1),
                Variant::new(2, 0, 15, 16, 0, 1),
                Variant::new(3, 0, 30, 31, 2, 1),
                Variant::new(4, 1, 5, 6, 0, 1),
            ],
        )?)
    }

    #[test]
    fn test_ties_are_broken_by_stable_index() -> std::result::Result<(), Box<dyn std::error::Error>>
    {
        let index = index()?;
        let resolved = resolve(&index, "1", &[0], &[100])?;
        assert_eq!(resolved.indices(), &[0, 1, 2, 3]);
        Ok(())
    }

    #[test]
    fn test_empty_and_reversed_queries() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let index = index()?;

        // [10, 20) would match variant 0 if the query were not treated as empty.
        let resolved = resolve(&index, "1", &[15, 12, 31], &[15, 11, 40])?;
        assert_eq!(resolved.indices(), &[] as &[u32]);
        assert_eq!(resolved.offsets(), &[0, 0, 0, 0]);
        assert_eq!(resolved.get(1), Some(&[] as &[u32]));

        Ok(())
    }

    #[test]
    fn test_unknown_contig() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let index = index()?;

        let resolved = resolve(&index, "3", &[0, 5], &[10, 50])?;
        assert!(resolved.indices().is_empty());
        assert_eq!(resolved.offsets(), &[0, 0, 0]);
        assert_eq!(count(&index, "3", &[0, 5], &[10, 50])?, vec![0, 0]);

        Ok(())
    }

    #[test]
    fn test_mismatched_lengths() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let index = index()?;
        let err = resolve(&index, "1", &[0, 1], &[10]).unwrap_err();
        assert_eq!(err, Error::MismatchedLengths { starts: 2, ends: 1 });
        Ok(())
    }

    #[test]
    fn test_filtered_variants_are_not_resolved(
    ) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut index = index()?;
        index.set_filter(Some(Box::new(|v: &Variant| v.ilen() == 0)));

        let resolved = resolve(&index, "1", &[0], &[100])?;
        assert_eq!(resolved.indices(), &[1, 2]);

        Ok(())
    }

    #[test]
    fn test_random_batches_are_consistent() -> std::result::Result<(), Box<dyn std::error::Error>>
    {
        let mut rng = StdRng::seed_from_u64(42);

        let mut start = 0u64;
        let variants = (0..500)
            .map(|i| {
                start += rng.gen_range(0..5);
                let len = rng.gen_range(1..8);
                Variant::new(i, 0, start, start + len, 1 - len as i32, 1)
            })
            .collect::<Vec<_>>();
        let index = Index::try_new(vec![String::from("1")], variants)?;

        let starts = (0..100).map(|_| rng.gen_range(0..1200)).collect::<Vec<u64>>();
        let ends = starts
            .iter()
            .map(|s| s + rng.gen_range(0..60))
            .collect::<Vec<_>>();

        let counts = count(&index, "1", &starts, &ends)?;
        let resolved = resolve(&index, "1", &starts, &ends)?;

        assert_eq!(resolved.len(), starts.len());
        assert_eq!(resolved.offsets()[0], 0);
        assert!(resolved.offsets().windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(counts.iter().sum::<usize>(), resolved.indices().len());
        assert_eq!(resolved.offsets().last(), Some(&resolved.indices().len()));

        for (i, part) in resolved.iter().enumerate() {
            assert_eq!(part.len(), counts[i]);

            let keys = part
                .iter()
                .map(|&v| (index.variants()[v as usize].start(), v))
                .collect::<Vec<_>>();
            assert!(keys.windows(2).all(|w| w[0] < w[1]));

            for &v in part {
                let variant = &index.variants()[v as usize];
                assert!(variant.start() < ends[i] && variant.end() > starts[i]);
            }
        }

        Ok(())
    }
}
