//! The variant index: an immutable catalogue of every variant in a dataset and
//! a filterable, queryable view over it.
//!
//! Every variant is assigned a stable, 0-based index at build time (its
//! position in the variant manifest). Applying or clearing a [`Filter`]
//! rebuilds the set of _active_ variants that range queries can return, but
//! never renumbers the stable indices, so indices obtained under one filter
//! continue to address the same variants in the underlying store.

use std::collections::HashMap;
use std::ops::Range;

use rust_lapper as lapper;
use tracing::debug;

pub mod builder;
pub mod cache;

pub use builder::Builder;
pub use builder::CachePolicy;

/// A predicate over variants. Variants for which the predicate returns `true`
/// are kept.
pub type Filter = Box<dyn Fn(&Variant) -> bool>;

/// The inner value of the interval lookup data structure.
type Iv = lapper::Interval<u64, u32>;

////////////////////////////////////////////////////////////////////////////////////////
// Errors
////////////////////////////////////////////////////////////////////////////////////////

/// An error related to building an [`Index`].
#[derive(Debug)]
pub enum Error {
    /// An error reading the variant manifest.
    Manifest(crate::manifest::variant::Error),

    /// An error reading or writing the index cache.
    Cache(cache::Error),

    /// A variant starts before the variant preceding it on the same contig.
    Unsorted(usize),

    /// A contig's variants do not form one contiguous block.
    ContigNotContiguous(String),

    /// A variant ends at or before its start.
    EmptyInterval(usize),

    /// A variant refers to a contig that does not exist.
    UnknownContigId(usize),

    /// The number of variants exceeds the maximum addressable index.
    TooManyVariants(usize),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Manifest(err) => write!(f, "variant manifest error: {err}"),
            Error::Cache(err) => write!(f, "index cache error: {err}"),
            Error::Unsorted(index) => write!(
                f,
                "variant {index} starts before the preceding variant on its contig"
            ),
            Error::ContigNotContiguous(contig) => write!(
                f,
                "variants on contig `{contig}` are not contiguous in the manifest"
            ),
            Error::EmptyInterval(index) => {
                write!(f, "variant {index} ends at or before its start")
            }
            Error::UnknownContigId(index) => {
                write!(f, "variant {index} refers to an unknown contig")
            }
            Error::TooManyVariants(n) => write!(
                f,
                "too many variants: found {n}, but at most {} are supported",
                u32::MAX
            ),
        }
    }
}

impl std::error::Error for Error {}

/// A [`Result`](std::result::Result) with an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////////////////////
// Variants
////////////////////////////////////////////////////////////////////////////////////////

/// The kind of a variant, derived from its first alternate allele.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Kind {
    /// A single nucleotide polymorphism.
    Snp,

    /// A multi-nucleotide polymorphism (same length, more than one base).
    Mnp,

    /// An insertion or deletion.
    Indel,

    /// Anything else.
    Other,
}

/// A single variant within the catalogue.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Variant {
    /// The stable index.
    index: u32,

    /// The index of the contig within [`Index::contigs()`].
    contig: u32,

    /// The 0-based, inclusive start.
    start: u64,

    /// The 0-based, exclusive end.
    end: u64,

    /// The length difference of the first alternate allele.
    ilen: i32,

    /// The number of alternate alleles.
    alternates: u32,
}

impl Variant {
    /// Creates a new [`Variant`].
    pub fn new(index: u32, contig: u32, start: u64, end: u64, ilen: i32, alternates: u32) -> Self {
        Self {
            index,
            contig,
            start,
            end,
            ilen,
            alternates,
        }
    }

    /// Gets the stable index.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Gets the contig id.
    pub fn contig(&self) -> u32 {
        self.contig
    }

    /// Gets the 0-based, inclusive start.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Gets the 0-based, exclusive end.
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Gets the length difference the (first) alternate allele introduces
    /// relative to the reference allele.
    pub fn ilen(&self) -> i32 {
        self.ilen
    }

    /// Gets the number of alternate alleles.
    pub fn alternates(&self) -> u32 {
        self.alternates
    }

    /// Whether the variant has more than one alternate allele.
    pub fn is_multiallelic(&self) -> bool {
        self.alternates > 1
    }

    /// Gets the kind of the variant.
    ///
    /// # Examples
    ///
    /// ```
    /// use varwindow::index::Kind;
    /// use varwindow::index::Variant;
    ///
    /// assert_eq!(Variant::new(0, 0, 100, 101, 0, 1).kind(), Kind::Snp);
    /// assert_eq!(Variant::new(1, 0, 150, 160, -9, 1).kind(), Kind::Indel);
    /// assert_eq!(Variant::new(2, 0, 200, 202, 0, 1).kind(), Kind::Mnp);
    /// ```
    pub fn kind(&self) -> Kind {
        let rlen = self.end.saturating_sub(self.start);

        if self.ilen != 0 {
            Kind::Indel
        } else if rlen == 1 {
            Kind::Snp
        } else if rlen > 1 {
            Kind::Mnp
        } else {
            Kind::Other
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////
// Active view
////////////////////////////////////////////////////////////////////////////////////////

/// The set of variants that are currently queryable.
#[derive(Debug)]
struct Active {
    /// The interval lookup for each contig id.
    trees: HashMap<u32, lapper::Lapper<u64, u32>>,

    /// The ascending stable indices of the active variants on each contig.
    indices: Vec<Vec<u32>>,

    /// Whether any active variant is multi-allelic.
    multiallelic: bool,
}

impl Active {
    /// Computes the active view for the variants that pass `filter`.
    fn new(n_contigs: usize, variants: &[Variant], filter: Option<&Filter>) -> Self {
        let mut ivs = HashMap::<u32, Vec<Iv>>::default();
        let mut indices = vec![Vec::new(); n_contigs];
        let mut multiallelic = false;

        for variant in variants {
            if let Some(filter) = filter {
                if !filter(variant) {
                    continue;
                }
            }

            multiallelic |= variant.is_multiallelic();
            indices[variant.contig as usize].push(variant.index);
            ivs.entry(variant.contig).or_default().push(lapper::Interval {
                start: variant.start,
                stop: variant.end,
                val: variant.index,
            });
        }

        let trees = ivs
            .into_iter()
            .map(|(contig, ivs)| (contig, lapper::Lapper::new(ivs)))
            .collect();

        Self {
            trees,
            indices,
            multiallelic,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////
// Index
////////////////////////////////////////////////////////////////////////////////////////

/// A catalogue of variants plus the currently active, queryable subset.
///
/// Generally, you will want to use a [`Builder`] to construct one of these.
pub struct Index {
    /// The contig names, in order of first appearance.
    contigs: Vec<String>,

    /// Every variant, ordered by stable index.
    variants: Vec<Variant>,

    /// The block of stable indices belonging to each contig.
    spans: Vec<Range<u32>>,

    /// The active filter.
    filter: Option<Filter>,

    /// The active view.
    active: Active,
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index")
            .field("contigs", &self.contigs)
            .field("variants", &self.variants.len())
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

impl Index {
    /// Creates a new [`Index`] from contig names and variants.
    ///
    /// The variants must be ordered by stable index, each contig's variants
    /// must form one contiguous block, and starts must not decrease within a
    /// contig.
    ///
    /// # Examples
    ///
    /// ```
    /// use varwindow::index::Index;
    /// use varwindow::index::Variant;
    ///
    /// let index = Index::try_new(
    ///     vec![String::from("1")],
    ///     vec![
    ///         Variant::new(0, 0, 100, 101, 0, 1),
    ///         Variant::new(1, 0, 150, 160, -9, 1),
    ///     ],
    /// )?;
    ///
    /// assert_eq!(index.len(), 2);
    /// assert!(index.supports_length_metadata());
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn try_new(contigs: Vec<String>, variants: Vec<Variant>) -> Result<Self> {
        if variants.len() > u32::MAX as usize {
            return Err(Error::TooManyVariants(variants.len()));
        }

        let mut spans: Vec<Option<Range<u32>>> = vec![None; contigs.len()];
        let mut previous: Option<&Variant> = None;

        for (i, variant) in variants.iter().enumerate() {
            let contig = variant.contig as usize;
            if contig >= contigs.len() {
                return Err(Error::UnknownContigId(i));
            }

            if variant.end <= variant.start {
                return Err(Error::EmptyInterval(i));
            }

            let same_contig = previous.is_some_and(|p| p.contig == variant.contig);

            let span = &mut spans[contig];
            match span {
                Some(span) if same_contig => {
                    if previous.is_some_and(|p| p.start > variant.start) {
                        return Err(Error::Unsorted(i));
                    }

                    span.end = i as u32 + 1;
                }
                Some(_) => return Err(Error::ContigNotContiguous(contigs[contig].clone())),
                None => *span = Some(i as u32..i as u32 + 1),
            }

            previous = Some(variant);
        }

        // Contigs without any variants get an empty span.
        let spans = spans
            .into_iter()
            .map(|span| span.unwrap_or(0..0))
            .collect::<Vec<_>>();

        let variants = variants
            .into_iter()
            .enumerate()
            .map(|(i, variant)| Variant {
                index: i as u32,
                ..variant
            })
            .collect::<Vec<_>>();

        let active = Active::new(contigs.len(), &variants, None);

        Ok(Self {
            contigs,
            variants,
            spans,
            filter: None,
            active,
        })
    }

    /// Gets the contig names.
    pub fn contigs(&self) -> &[String] {
        &self.contigs
    }

    /// Gets the id of a contig by its exact name.
    pub fn contig_id(&self, contig: &str) -> Option<u32> {
        self.contigs
            .iter()
            .position(|name| name == contig)
            .map(|id| id as u32)
    }

    /// Gets the total number of variants, regardless of any filter.
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    /// Whether the catalogue contains no variants.
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Gets every variant, ordered by stable index.
    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    /// Gets a variant by its stable index.
    pub fn variant(&self, index: u32) -> Option<&Variant> {
        self.variants.get(index as usize)
    }

    /// Gets the block of stable indices belonging to a contig.
    pub fn span(&self, contig: u32) -> Option<Range<u32>> {
        self.spans.get(contig as usize).cloned()
    }

    /// Whether a filter is currently applied.
    pub fn is_filtered(&self) -> bool {
        self.filter.is_some()
    }

    /// Gets the number of active variants.
    pub fn n_active(&self) -> usize {
        self.active.indices.iter().map(Vec::len).sum()
    }

    /// Gets the ascending stable indices of the active variants on a contig.
    pub fn active_indices(&self, contig: u32) -> &[u32] {
        self.active
            .indices
            .get(contig as usize)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether per-variant length metadata can be used for the whole dataset.
    ///
    /// This is `false` when any active variant has more than one alternate
    /// allele, as the length change a multi-allelic call introduces depends on
    /// which alternate allele was called.
    pub fn supports_length_metadata(&self) -> bool {
        !self.active.multiallelic
    }

    /// Applies (or, with [`None`], clears) the filter and recomputes the active
    /// view. Stable indices are never affected.
    ///
    /// # Examples
    ///
    /// ```
    /// use varwindow::index::Index;
    /// use varwindow::index::Kind;
    /// use varwindow::index::Variant;
    ///
    /// let mut index = Index::try_new(
    ///     vec![String::from("1")],
    ///     vec![
    ///         Variant::new(0, 0, 100, 101, 0, 1),
    ///         Variant::new(1, 0, 150, 160, -9, 1),
    ///     ],
    /// )?;
    ///
    /// index.set_filter(Some(Box::new(|v: &Variant| v.kind() == Kind::Indel)));
    /// assert_eq!(index.active_indices(0), &[1]);
    ///
    /// index.set_filter(None);
    /// assert_eq!(index.active_indices(0), &[0, 1]);
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn set_filter(&mut self, filter: Option<Filter>) {
        self.active = Active::new(self.contigs.len(), &self.variants, filter.as_ref());
        self.filter = filter;

        debug!(
            "index: {} of {} variants active (filtered: {})",
            self.n_active(),
            self.len(),
            self.is_filtered()
        );
    }

    /// Gets the interval lookup for a contig, if it has any active variants.
    pub(crate) fn tree(&self, contig: u32) -> Option<&lapper::Lapper<u64, u32>> {
        self.active.trees.get(&contig)
    }

    /// Gets up to `n` active stable indices that follow `index` on the same
    /// contig.
    pub fn following(&self, index: u32, n: usize) -> Vec<u32> {
        let contig = match self.variant(index) {
            Some(variant) => variant.contig,
            None => return Vec::new(),
        };

        let active = self.active_indices(contig);
        let from = active.partition_point(|&i| i <= index);

        active[from..].iter().take(n).copied().collect()
    }
}
