//! Builders for a [`Reader`].

use std::collections::HashSet;

use tracing::debug;

use crate::decode::Decode;
use crate::index::Index;
use crate::reader::ConfigError;
use crate::reader::Error as ReaderError;
use crate::reader::Reader;
use crate::samples;
use crate::samples::Samples;

/// An error related to a missing field.
#[derive(Debug)]
pub enum MissingError {
    /// The variant index was never set.
    Index,

    /// The sample identifiers were never set.
    Samples,

    /// The genotype decoder was never set.
    Genotypes,
}

impl std::fmt::Display for MissingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissingError::Index => write!(f, "index"),
            MissingError::Samples => write!(f, "samples"),
            MissingError::Genotypes => write!(f, "genotypes"),
        }
    }
}

impl std::error::Error for MissingError {}

/// An error related to a field being set multiple times.
#[derive(Debug)]
pub enum MultipleError {
    /// The variant index was set multiple times.
    Index,

    /// The sample identifiers were set multiple times.
    Samples,

    /// The genotype decoder was set multiple times.
    Genotypes,

    /// The dosage decoder was set multiple times.
    Dosages,
}

impl std::fmt::Display for MultipleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MultipleError::Index => write!(f, "index"),
            MultipleError::Samples => write!(f, "samples"),
            MultipleError::Genotypes => write!(f, "genotypes"),
            MultipleError::Dosages => write!(f, "dosages"),
        }
    }
}

impl std::error::Error for MultipleError {}

/// An error related to a [`Builder`].
#[derive(Debug)]
pub enum Error {
    /// A required field was missing from the builder.
    Missing(MissingError),

    /// A singular field was set multiple times.
    Multiple(MultipleError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Missing(err) => write!(f, "missing required field: {err}"),
            Error::Multiple(err) => write!(f, "singular field set multiple times: {err}"),
        }
    }
}

impl std::error::Error for Error {}

/// A [`Result`](std::result::Result) with an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// A builder for a [`Reader`].
///
/// The genotype decoder and the dosage decoder are owned independently. When
/// no dosage decoder is given, the genotype decoder is
/// [duplicated](Decode::duplicate) to serve dosages.
#[derive(Debug)]
pub struct Builder<D>
where
    D: Decode,
{
    /// The variant index.
    index: Option<Index>,

    /// The sample identifiers, in storage order.
    samples: Option<Vec<String>>,

    /// The genotype decoder.
    genotypes: Option<D>,

    /// The dosage decoder and the sample identifiers it holds.
    dosages: Option<(D, Vec<String>)>,
}

impl<D> Default for Builder<D>
where
    D: Decode,
{
    fn default() -> Self {
        Self {
            index: None,
            samples: None,
            genotypes: None,
            dosages: None,
        }
    }
}

impl<D> Builder<D>
where
    D: Decode,
{
    /// Sets the variant index.
    pub fn index(mut self, index: Index) -> Result<Self> {
        if self.index.is_some() {
            return Err(Error::Multiple(MultipleError::Index));
        }

        self.index = Some(index);
        Ok(self)
    }

    /// Sets the sample identifiers, in storage order.
    pub fn samples(mut self, samples: Vec<String>) -> Result<Self> {
        if self.samples.is_some() {
            return Err(Error::Multiple(MultipleError::Samples));
        }

        self.samples = Some(samples);
        Ok(self)
    }

    /// Sets the decoder of genotype calls and phasing flags.
    pub fn genotypes(mut self, decoder: D) -> Result<Self> {
        if self.genotypes.is_some() {
            return Err(Error::Multiple(MultipleError::Genotypes));
        }

        self.genotypes = Some(decoder);
        Ok(self)
    }

    /// Sets the decoder of dosages along with the sample identifiers it
    /// holds, in storage order.
    pub fn dosages(mut self, decoder: D, samples: Vec<String>) -> Result<Self> {
        if self.dosages.is_some() {
            return Err(Error::Multiple(MultipleError::Dosages));
        }

        self.dosages = Some((decoder, samples));
        Ok(self)
    }

    /// Consumes `self` and attempts to build a [`Reader`].
    ///
    /// # Examples
    ///
    /// ```
    /// use varwindow::decode::Memory;
    /// use varwindow::index::Index;
    /// use varwindow::index::Variant;
    /// use varwindow::reader::Builder;
    ///
    /// let index = Index::try_new(
    ///     vec![String::from("1")],
    ///     vec![Variant::new(0, 0, 100, 101, 0, 1)],
    /// )?;
    /// let decoder = Memory::new(2, 1).with_genotypes(vec![0, 1, 1, 1])?;
    ///
    /// let reader = Builder::default()
    ///     .index(index)?
    ///     .samples(vec![String::from("a"), String::from("b")])?
    ///     .genotypes(decoder)?
    ///     .try_build()?;
    ///
    /// assert_eq!(reader.available_samples(), &["a", "b"]);
    /// assert_eq!(reader.contigs(), &["1"]);
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn try_build(self) -> crate::reader::Result<Reader<D>> {
        let index = self
            .index
            .ok_or(ReaderError::Builder(Error::Missing(MissingError::Index)))?;
        let samples = self
            .samples
            .ok_or(ReaderError::Builder(Error::Missing(MissingError::Samples)))?;
        let genotypes = self
            .genotypes
            .ok_or(ReaderError::Builder(Error::Missing(MissingError::Genotypes)))?;

        let mut seen = HashSet::with_capacity(samples.len());
        if let Some(duplicate) = samples.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(ReaderError::Config(ConfigError::Samples(
                samples::Error::DuplicateSample(duplicate.clone()),
            )));
        }

        check_count(&genotypes, samples.len())?;

        let dosages = match self.dosages {
            Some((decoder, ids)) => {
                if ids != samples {
                    return Err(ReaderError::Config(ConfigError::MismatchedSamples));
                }

                check_count(&decoder, samples.len())?;
                decoder
            }
            None => genotypes.duplicate()?,
        };

        debug!(
            "reader: {} variants across {} contigs for {} samples",
            index.len(),
            index.contigs().len(),
            samples.len()
        );

        Ok(Reader::new(index, Samples::new(samples), genotypes, dosages))
    }
}

/// Ensures a decoder holds the number of listed samples.
pub(crate) fn check_count<D>(decoder: &D, expected: usize) -> crate::reader::Result<()>
where
    D: Decode,
{
    let found = decoder.n_samples();

    if found != expected {
        return Err(ReaderError::Config(ConfigError::SampleCount { expected, found }));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Memory;
    use crate::index::Variant;

    fn index() -> std::result::Result<Index, Box<dyn std::error::Error>> {
        Ok(Index::try_new(
            vec![String::from("1")],
            vec![Variant::new(0, 0, 10, 11, 0, 1)],
        )?)
    }

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn test_missing_and_multiple_fields() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let err = Builder::<Memory>::default()
            .index(index()?)?
            .samples(ids(&["a"]))?
            .try_build()
            .unwrap_err();
        assert_eq!(err.to_string(), "builder error: missing required field: genotypes");

        let err = Builder::<Memory>::default()
            .index(index()?)?
            .index(index()?)
            .unwrap_err();
        assert_eq!(err.to_string(), "singular field set multiple times: index");

        Ok(())
    }

    #[test]
    fn test_mismatched_dosage_samples() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let err = Builder::default()
            .index(index()?)?
            .samples(ids(&["a", "b"]))?
            .genotypes(Memory::new(2, 1))?
            .dosages(Memory::new(2, 1), ids(&["b", "a"]))?
            .try_build()
            .unwrap_err();
        assert!(matches!(
            err,
            ReaderError::Config(ConfigError::MismatchedSamples)
        ));

        let err = Builder::default()
            .index(index()?)?
            .samples(ids(&["a", "b"]))?
            .genotypes(Memory::new(3, 1))?
            .try_build()
            .unwrap_err();
        assert!(matches!(
            err,
            ReaderError::Config(ConfigError::SampleCount {
                expected: 2,
                found: 3
            })
        ));

        Ok(())
    }

    #[test]
    fn test_duplicate_sample_ids() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let err = Builder::default()
            .index(index()?)?
            .samples(ids(&["a", "b", "a"]))?
            .genotypes(Memory::new(3, 1))?
            .try_build()
            .unwrap_err();

        assert!(matches!(
            &err,
            ReaderError::Config(ConfigError::Samples(samples::Error::DuplicateSample(id)))
                if id == "a"
        ));
        assert_eq!(err.to_string(), "configuration error: duplicate sample: a");

        Ok(())
    }

    #[test]
    fn test_dosages_default_to_a_duplicate() -> std::result::Result<(), Box<dyn std::error::Error>>
    {
        let decoder = Memory::new(1, 1)
            .with_genotypes(vec![1, 0])?
            .with_dosages(vec![1.0])?;

        let mut reader = Builder::default()
            .index(index()?)?
            .samples(ids(&["a"]))?
            .genotypes(decoder)?
            .try_build()?;

        let data = reader
            .read("1", 0, 100, crate::mode::Mode::GenotypesDosages)?
            .ok_or("no variants")?;
        assert_eq!(data.dosages().and_then(|d| d.get(0, 0)), Some(1.0));

        Ok(())
    }
}
