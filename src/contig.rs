//! Normalization of contig names to a dataset's naming convention.

use std::collections::HashMap;

/// The conventional prefix for contig names (e.g., `chr1`).
pub const CONTIG_PREFIX: &str = "chr";

/// A lookup from caller-provided contig names to the names used within a
/// dataset.
///
/// For every dataset contig named `chrN`, the alias `N` is recognized, and for
/// every dataset contig named `N`, the alias `chrN` is recognized. Exact names
/// always take precedence over aliases.
#[derive(Clone, Debug, Default)]
pub struct Normalizer {
    /// The mapping from recognized names to dataset names.
    inner: HashMap<String, String>,
}

impl Normalizer {
    /// Creates a new [`Normalizer`] from the contig names in a dataset.
    ///
    /// # Examples
    ///
    /// ```
    /// use varwindow::contig::Normalizer;
    ///
    /// let normalizer = Normalizer::new(["chr1", "2"]);
    ///
    /// assert_eq!(normalizer.norm("1"), Some("chr1"));
    /// assert_eq!(normalizer.norm("chr1"), Some("chr1"));
    /// assert_eq!(normalizer.norm("chr2"), Some("2"));
    /// assert_eq!(normalizer.norm("3"), None);
    /// ```
    pub fn new<I, S>(contigs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let contigs = contigs
            .into_iter()
            .map(|contig| contig.as_ref().to_string())
            .collect::<Vec<_>>();

        let mut inner = HashMap::new();

        for contig in &contigs {
            let alias = match contig.strip_prefix(CONTIG_PREFIX) {
                Some(stripped) => stripped.to_string(),
                None => format!("{CONTIG_PREFIX}{contig}"),
            };

            inner.insert(alias, contig.clone());
        }

        // Exact names are inserted last so that they overwrite any alias that
        // happens to collide with them.
        for contig in contigs {
            inner.insert(contig.clone(), contig);
        }

        Self { inner }
    }

    /// Normalizes a contig name, returning [`None`] if the name is not
    /// recognized.
    pub fn norm(&self, contig: &str) -> Option<&str> {
        self.inner.get(contig).map(|name| name.as_str())
    }

    /// Normalizes many contig names at once.
    pub fn norm_all<'a>(&'a self, contigs: &[&str]) -> Vec<Option<&'a str>> {
        contigs.iter().map(|contig| self.norm(contig)).collect()
    }
}
