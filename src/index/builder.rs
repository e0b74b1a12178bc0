//! A builder for an [`Index`].

use std::fs;
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::path::Path;

use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::index::cache;
use crate::index::Error;
use crate::index::Filter;
use crate::index::Index;
use crate::index::Result;
use crate::index::Variant;
use crate::manifest::variant;

/// What to do when an index cache already exists for a manifest.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CachePolicy {
    /// Load an existing cache without checking whether it is stale.
    #[default]
    Trust,

    /// Always rebuild the cache from the manifest, overwriting any existing
    /// cache.
    Rebuild,

    /// Rebuild the cache when the manifest was modified more recently than
    /// the cache.
    CheckModified,
}

/// A builder for an [`Index`].
#[allow(missing_debug_implementations)]
#[derive(Default)]
pub struct Builder {
    /// The cache policy.
    policy: CachePolicy,

    /// The filter to apply once the index is built.
    filter: Option<Filter>,
}

impl Builder {
    /// Sets the [`CachePolicy`].
    pub fn cache_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the initial [`Filter`].
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Builds an [`Index`] by parsing every record of a variant manifest.
    ///
    /// No cache is consulted or written.
    ///
    /// # Examples
    ///
    /// ```
    /// use varwindow::index;
    /// use varwindow::manifest::variant;
    ///
    /// let data = b"#CHROM\tPOS\tID\tREF\tALT\n1\t101\t.\tA\tG\n1\t151\t.\tAAAAAAAAAA\tA";
    /// let reader = variant::Reader::new(&data[..]);
    ///
    /// let index = index::Builder::default().try_build_from(reader)?;
    /// assert_eq!(index.len(), 2);
    /// assert_eq!(index.variant(1).unwrap().ilen(), -9);
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn try_build_from<T>(self, reader: variant::Reader<T>) -> Result<Index>
    where
        T: BufRead,
    {
        let mut index = build(reader)?;
        index.set_filter(self.filter);
        Ok(index)
    }

    /// Builds an [`Index`] for the variant manifest at `path`, loading or
    /// writing the cache according to the [`CachePolicy`].
    pub fn try_build_from_path(self, path: impl AsRef<Path>) -> Result<Index> {
        let path = path.as_ref();
        let cache_path = cache::path_for(path);

        let rebuild = match self.policy {
            CachePolicy::Trust => !cache_path.exists(),
            CachePolicy::Rebuild => true,
            CachePolicy::CheckModified => is_stale(path, &cache_path),
        };

        let mut index = if rebuild {
            info!("index: building from {}", path.display());

            let file = File::open(path)
                .map_err(variant::Error::Io)
                .map_err(Error::Manifest)?;
            let index = build(variant::Reader::new(BufReader::new(file)))?;

            cache::write_to_path(&cache_path, &index).map_err(Error::Cache)?;
            debug!("index: wrote cache to {}", cache_path.display());

            index
        } else {
            debug!("index: loading cache from {}", cache_path.display());

            let (contigs, variants) = cache::read_from_path(&cache_path).map_err(Error::Cache)?;
            Index::try_new(contigs, variants)?
        };

        index.set_filter(self.filter);
        Ok(index)
    }
}

/// Whether the cache at `cache` is missing or older than the manifest.
fn is_stale(manifest: &Path, cache: &Path) -> bool {
    let modified = |path: &Path| fs::metadata(path).and_then(|metadata| metadata.modified());

    match (modified(manifest), modified(cache)) {
        (Ok(manifest), Ok(cache)) => manifest > cache,
        (_, Err(_)) => true,
        (Err(err), Ok(_)) => {
            warn!("index: cannot read manifest modification time ({err}); trusting cache");
            false
        }
    }
}

/// Parses every record from a manifest and assembles the catalogue.
fn build<T>(mut reader: variant::Reader<T>) -> Result<Index>
where
    T: BufRead,
{
    let mut contigs = Vec::<String>::new();
    let mut variants = Vec::new();

    for result in reader.records() {
        let record = result.map_err(Error::Manifest)?;

        // Contigs appear in contiguous blocks, so only the most recent one
        // needs to be checked before falling back to a full search.
        let contig = match contigs.last() {
            Some(last) if last == record.contig() => contigs.len() - 1,
            _ => match contigs.iter().position(|c| c == record.contig()) {
                Some(_) => return Err(Error::ContigNotContiguous(record.contig().to_string())),
                None => {
                    contigs.push(record.contig().to_string());
                    contigs.len() - 1
                }
            },
        };

        let index = variants.len();
        if index >= u32::MAX as usize {
            return Err(Error::TooManyVariants(index + 1));
        }

        let ilen = record.ilens().first().copied().unwrap_or_default();

        variants.push(Variant::new(
            index as u32,
            contig as u32,
            record.start(),
            record.end(),
            ilen,
            record.alternates().len() as u32,
        ));
    }

    Index::try_new(contigs, variants)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempdir::TempDir;

    use super::*;

    const PVAR: &str = "##source=test\n#CHROM\tPOS\tID\tREF\tALT\n\
                        chr1\t101\t.\tA\tG\n\
                        chr1\t151\t.\tAAAAAAAAAA\tA\n\
                        chr2\t11\t.\tC\tCTT,G\n";

    fn write_manifest(dir: &TempDir, contents: &str) -> std::io::Result<std::path::PathBuf> {
        let path = dir.path().join("cohort.pvar");
        let mut file = File::create(&path)?;
        file.write_all(contents.as_bytes())?;
        Ok(path)
    }

    #[test]
    fn test_build_then_load_cache() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new("varwindow")?;
        let path = write_manifest(&dir, PVAR)?;

        let built = Builder::default().try_build_from_path(&path)?;
        assert!(cache::path_for(&path).exists());
        assert_eq!(built.contigs(), &["chr1", "chr2"]);
        assert!(!built.supports_length_metadata());

        // Removing the manifest proves the second open is served by the cache.
        fs::remove_file(&path)?;
        let loaded = Builder::default().try_build_from_path(&path)?;
        assert_eq!(loaded.variants(), built.variants());
        assert_eq!(loaded.contigs(), built.contigs());

        Ok(())
    }

    #[test]
    fn test_trust_ignores_stale_cache_but_rebuild_does_not(
    ) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new("varwindow")?;
        let path = write_manifest(&dir, PVAR)?;
        Builder::default().try_build_from_path(&path)?;

        write_manifest(&dir, "#CHROM\tPOS\tID\tREF\tALT\nchr1\t5\t.\tA\tG\n")?;

        let trusted = Builder::default().try_build_from_path(&path)?;
        assert_eq!(trusted.len(), 3);

        let rebuilt = Builder::default()
            .cache_policy(CachePolicy::Rebuild)
            .try_build_from_path(&path)?;
        assert_eq!(rebuilt.len(), 1);

        Ok(())
    }

    #[test]
    fn test_check_modified_rebuilds_missing_cache(
    ) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new("varwindow")?;
        let path = write_manifest(&dir, PVAR)?;

        let index = Builder::default()
            .cache_policy(CachePolicy::CheckModified)
            .filter(Box::new(|v: &Variant| !v.is_multiallelic()))
            .try_build_from_path(&path)?;

        assert!(cache::path_for(&path).exists());
        assert!(index.supports_length_metadata());
        assert_eq!(index.n_active(), 2);

        Ok(())
    }

    #[test]
    fn test_unsorted_contigs_are_rejected() {
        let data = b"#CHROM\tPOS\tREF\tALT\n1\t1\tA\tG\n2\t1\tA\tG\n1\t5\tA\tG";
        let err = Builder::default()
            .try_build_from(variant::Reader::new(&data[..]))
            .unwrap_err();

        assert!(matches!(err, Error::ContigNotContiguous(_)));
    }
}
