//! An in-memory decoder.

use std::sync::Arc;

use crate::data::PLOIDY;
use crate::decode::Decode;
use crate::decode::Error;
use crate::decode::Result;

/// The values shared by every handle.
#[derive(Clone, Debug, Default)]
struct Store {
    /// The number of samples.
    n_samples: usize,

    /// The number of variants.
    n_variants: usize,

    /// Genotype calls, `variants x samples x 2`.
    genotypes: Option<Vec<i32>>,

    /// Phasing flags, `variants x samples`.
    phasing: Option<Vec<bool>>,

    /// Dosages, `variants x samples`.
    dosages: Option<Vec<f32>>,
}

/// A [`Decode`] implementation over fully decoded matrices held in memory.
///
/// Handles created with [`Decode::duplicate()`] share the matrices.
#[derive(Debug)]
pub struct Memory {
    /// The shared values.
    store: Arc<Store>,

    /// The selected storage sample indices, or [`None`] for all samples.
    subset: Option<Vec<u32>>,

    /// Whether the handle has been closed.
    closed: bool,
}

impl Memory {
    /// Creates a new, empty [`Memory`] decoder with the given dimensions.
    ///
    /// Components are added with [`Memory::with_genotypes()`],
    /// [`Memory::with_phasing()`], and [`Memory::with_dosages()`].
    ///
    /// # Examples
    ///
    /// ```
    /// use varwindow::decode::Decode;
    /// use varwindow::decode::Memory;
    ///
    /// // One variant, two samples.
    /// let mut decoder = Memory::new(2, 1).with_genotypes(vec![0, 1, 1, -9])?;
    ///
    /// let mut genotypes = vec![0; 2];
    /// decoder.set_sample_subset(Some(&[1]))?;
    /// decoder.read_genotypes(&[0], &mut genotypes)?;
    /// assert_eq!(genotypes, vec![1, -9]);
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(n_samples: usize, n_variants: usize) -> Self {
        Self {
            store: Arc::new(Store {
                n_samples,
                n_variants,
                ..Default::default()
            }),
            subset: None,
            closed: false,
        }
    }

    /// Gets a mutable reference to the store, cloning it if it is shared.
    fn store_mut(&mut self) -> &mut Store {
        Arc::make_mut(&mut self.store)
    }

    /// Adds genotype calls laid out as `variants x samples x 2`.
    pub fn with_genotypes(mut self, genotypes: Vec<i32>) -> Result<Self> {
        check_len(self.store.n_variants * self.store.n_samples * PLOIDY, genotypes.len())?;
        self.store_mut().genotypes = Some(genotypes);
        Ok(self)
    }

    /// Adds phasing flags laid out as `variants x samples`.
    pub fn with_phasing(mut self, phasing: Vec<bool>) -> Result<Self> {
        check_len(self.store.n_variants * self.store.n_samples, phasing.len())?;
        self.store_mut().phasing = Some(phasing);
        Ok(self)
    }

    /// Adds dosages laid out as `variants x samples`.
    pub fn with_dosages(mut self, dosages: Vec<f32>) -> Result<Self> {
        check_len(self.store.n_variants * self.store.n_samples, dosages.len())?;
        self.store_mut().dosages = Some(dosages);
        Ok(self)
    }

    /// Gets the number of variants.
    pub fn n_variants(&self) -> usize {
        self.store.n_variants
    }

    /// Whether the handle has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Gets the number of selected samples.
    fn n_selected(&self) -> usize {
        self.subset
            .as_ref()
            .map(Vec::len)
            .unwrap_or(self.store.n_samples)
    }

    /// Ensures the handle is open and every variant index is in range.
    fn check_request(&self, variants: &[u32]) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }

        match variants
            .iter()
            .find(|&&v| v as usize >= self.store.n_variants)
        {
            Some(&v) => Err(Error::VariantOutOfRange(v)),
            None => Ok(()),
        }
    }

    /// Copies the selected samples of each requested variant row from
    /// `source` into `out`, where each sample occupies `width` values.
    fn gather<T: Copy>(
        &self,
        source: &[T],
        variants: &[u32],
        width: usize,
        out: &mut [T],
    ) -> Result<()> {
        let n = self.store.n_samples;
        check_len(variants.len() * self.n_selected() * width, out.len())?;

        let mut dst = out.chunks_exact_mut(width);
        for &variant in variants {
            let row = &source[variant as usize * n * width..(variant as usize + 1) * n * width];

            match &self.subset {
                Some(subset) => {
                    for &sample in subset {
                        let sample = sample as usize;
                        // The length was checked above, so there is always a
                        // destination for every selected sample.
                        if let Some(dst) = dst.next() {
                            dst.copy_from_slice(&row[sample * width..(sample + 1) * width]);
                        }
                    }
                }
                None => {
                    for values in row.chunks_exact(width) {
                        if let Some(dst) = dst.next() {
                            dst.copy_from_slice(values);
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// Ensures a buffer holds exactly the expected number of values.
fn check_len(expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(Error::BufferSize { expected, found });
    }

    Ok(())
}

impl Decode for Memory {
    fn n_samples(&self) -> usize {
        self.store.n_samples
    }

    fn set_sample_subset(&mut self, samples: Option<&[u32]>) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }

        let samples = match samples {
            Some(samples) => samples,
            None => {
                self.subset = None;
                return Ok(());
            }
        };

        if let Some(&sample) = samples
            .iter()
            .find(|&&s| s as usize >= self.store.n_samples)
        {
            return Err(Error::SampleOutOfRange(sample));
        }

        if samples.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::UnsortedSubset);
        }

        self.subset = Some(samples.to_vec());
        Ok(())
    }

    fn read_genotypes(&mut self, variants: &[u32], genotypes: &mut [i32]) -> Result<()> {
        self.check_request(variants)?;

        let source = self
            .store
            .genotypes
            .as_deref()
            .ok_or(Error::MissingComponent("genotypes"))?;

        self.gather(source, variants, PLOIDY, genotypes)
    }

    fn read_genotypes_phasing(
        &mut self,
        variants: &[u32],
        genotypes: &mut [i32],
        phasing: &mut [bool],
    ) -> Result<()> {
        self.read_genotypes(variants, genotypes)?;

        let source = self
            .store
            .phasing
            .as_deref()
            .ok_or(Error::MissingComponent("phasing"))?;

        self.gather(source, variants, 1, phasing)
    }

    fn read_dosages(&mut self, variants: &[u32], dosages: &mut [f32]) -> Result<()> {
        self.check_request(variants)?;

        let source = self
            .store
            .dosages
            .as_deref()
            .ok_or(Error::MissingComponent("dosages"))?;

        self.gather(source, variants, 1, dosages)
    }

    fn duplicate(&self) -> Result<Self> {
        if self.closed {
            return Err(Error::Closed);
        }

        Ok(Self {
            store: Arc::clone(&self.store),
            subset: None,
            closed: false,
        })
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.subset = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder() -> Result<Memory> {
        // Two variants, three samples.
        Memory::new(3, 2)
            .with_genotypes(vec![0, 0, 0, 1, 1, 1, 1, -9, 0, 1, 1, 1])?
            .with_phasing(vec![false, true, false, true, false, true])?
            .with_dosages(vec![0.0, 1.0, 2.0, -9.0, 0.5, 1.5])
    }

    #[test]
    fn test_subset_selects_rows() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut decoder = decoder()?;
        decoder.set_sample_subset(Some(&[0, 2]))?;

        let mut genotypes = vec![0; 8];
        let mut phasing = vec![false; 4];
        decoder.read_genotypes_phasing(&[1, 0], &mut genotypes, &mut phasing)?;
        assert_eq!(genotypes, vec![1, -9, 1, 1, 0, 0, 1, 1]);
        assert_eq!(phasing, vec![true, true, false, false]);

        let mut dosages = vec![0.0; 2];
        decoder.read_dosages(&[1], &mut dosages)?;
        assert_eq!(dosages, vec![-9.0, 1.5]);

        Ok(())
    }

    #[test]
    fn test_invalid_requests() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut decoder = decoder()?;

        assert!(matches!(
            decoder.set_sample_subset(Some(&[2, 1])),
            Err(Error::UnsortedSubset)
        ));
        assert!(matches!(
            decoder.set_sample_subset(Some(&[3])),
            Err(Error::SampleOutOfRange(3))
        ));

        let mut genotypes = vec![0; 6];
        assert!(matches!(
            decoder.read_genotypes(&[2], &mut genotypes),
            Err(Error::VariantOutOfRange(2))
        ));

        let mut short = vec![0; 5];
        assert!(matches!(
            decoder.read_genotypes(&[0], &mut short),
            Err(Error::BufferSize { expected: 6, found: 5 })
        ));

        let mut bare = Memory::new(3, 2).with_genotypes(vec![0; 12])?;
        let mut dosages = vec![0.0; 3];
        assert!(matches!(
            bare.read_dosages(&[0], &mut dosages),
            Err(Error::MissingComponent("dosages"))
        ));

        Ok(())
    }

    #[test]
    fn test_duplicate_and_close() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut decoder = decoder()?;
        decoder.set_sample_subset(Some(&[1]))?;

        let mut other = decoder.duplicate()?;
        decoder.close()?;
        decoder.close()?;
        assert!(decoder.is_closed());

        let mut genotypes = vec![0; 6];
        assert!(matches!(
            decoder.read_genotypes(&[0], &mut genotypes),
            Err(Error::Closed)
        ));

        // The duplicate is independent and selects every sample.
        other.read_genotypes(&[0], &mut genotypes)?;
        assert_eq!(genotypes, vec![0, 0, 0, 1, 1, 1]);

        Ok(())
    }
}
