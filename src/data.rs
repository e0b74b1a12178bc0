//! Shaped arrays produced by reads.
//!
//! Every array is stored row-major with variants along the last (fastest
//! varying) axis, so the values of one haplotype (or one sample) across a
//! chunk are contiguous. Shapes are validated once, when an array is created.

use crate::mode::Mode;

/// The number of haplotypes per sample.
pub const PLOIDY: usize = 2;

/// The value of a missing genotype call.
pub const MISSING_GENOTYPE: i32 = -1;

/// The value of a missing dosage.
pub const MISSING_DOSAGE: f32 = f32::NAN;

////////////////////////////////////////////////////////////////////////////////////////
// Errors
////////////////////////////////////////////////////////////////////////////////////////

/// An error related to shaped arrays.
#[derive(Debug, Eq, PartialEq)]
pub enum Error {
    /// The number of values does not match the declared shape.
    Shape {
        /// The number of values the shape requires.
        expected: usize,

        /// The number of values provided.
        found: usize,
    },

    /// Arrays with different leading dimensions cannot be concatenated.
    Incompatible,

    /// There was nothing to concatenate.
    Empty,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Shape { expected, found } => write!(
                f,
                "shape mismatch: expected {expected} values, found {found}"
            ),
            Error::Incompatible => write!(f, "arrays have incompatible shapes"),
            Error::Empty => write!(f, "no arrays to concatenate"),
        }
    }
}

impl std::error::Error for Error {}

/// A [`Result`](std::result::Result) with an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Ensures `found` values fill `shape`.
fn check_shape(shape: &[usize], found: usize) -> Result<()> {
    let expected = shape.iter().product();

    if expected != found {
        return Err(Error::Shape { expected, found });
    }

    Ok(())
}

/// Concatenates row-major arrays with `rows` rows along their last axis.
fn concat_rows<T: Copy>(rows: usize, parts: &[(&[T], usize)]) -> Vec<T> {
    let total = parts.iter().map(|(_, n)| n).sum::<usize>();
    let mut data = Vec::with_capacity(rows * total);

    for row in 0..rows {
        for (values, n) in parts {
            data.extend_from_slice(&values[row * n..(row + 1) * n]);
        }
    }

    data
}

////////////////////////////////////////////////////////////////////////////////////////
// Arrays
////////////////////////////////////////////////////////////////////////////////////////

/// Genotype calls with shape `(samples, ploidy, variants)`.
///
/// Missing calls are [`MISSING_GENOTYPE`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Genotypes {
    /// The values.
    data: Vec<i32>,

    /// The number of samples.
    n_samples: usize,

    /// The ploidy.
    ploidy: usize,

    /// The number of variants.
    n_variants: usize,
}

impl Genotypes {
    /// Attempts to create new [`Genotypes`].
    ///
    /// # Examples
    ///
    /// ```
    /// use varwindow::data::Genotypes;
    ///
    /// let genotypes = Genotypes::try_new(vec![0, 1, 1, -1], 1, 2, 2)?;
    /// assert_eq!(genotypes.haplotype(0, 1), &[1, -1]);
    ///
    /// assert!(Genotypes::try_new(vec![0, 1, 1], 1, 2, 2).is_err());
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn try_new(
        data: Vec<i32>,
        n_samples: usize,
        ploidy: usize,
        n_variants: usize,
    ) -> Result<Self> {
        check_shape(&[n_samples, ploidy, n_variants], data.len())?;

        Ok(Self {
            data,
            n_samples,
            ploidy,
            n_variants,
        })
    }

    /// Gets the number of samples.
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Gets the ploidy.
    pub fn ploidy(&self) -> usize {
        self.ploidy
    }

    /// Gets the number of variants.
    pub fn n_variants(&self) -> usize {
        self.n_variants
    }

    /// Gets the values.
    pub fn as_slice(&self) -> &[i32] {
        &self.data
    }

    /// Gets the values mutably.
    pub(crate) fn as_mut_slice(&mut self) -> &mut [i32] {
        &mut self.data
    }

    /// Gets the calls of one haplotype across every variant.
    ///
    /// # Panics
    ///
    /// Panics if `sample` or `haplotype` is out of bounds.
    pub fn haplotype(&self, sample: usize, haplotype: usize) -> &[i32] {
        assert!(haplotype < self.ploidy);
        let row = sample * self.ploidy + haplotype;
        &self.data[row * self.n_variants..(row + 1) * self.n_variants]
    }

    /// Gets a single call.
    pub fn get(&self, sample: usize, haplotype: usize, variant: usize) -> Option<i32> {
        if sample >= self.n_samples || haplotype >= self.ploidy || variant >= self.n_variants {
            return None;
        }

        Some(self.data[(sample * self.ploidy + haplotype) * self.n_variants + variant])
    }

    /// Concatenates genotypes along the variant axis.
    pub fn concat(parts: &[&Genotypes]) -> Result<Self> {
        let first = parts.first().ok_or(Error::Empty)?;

        if parts
            .iter()
            .any(|p| p.n_samples != first.n_samples || p.ploidy != first.ploidy)
        {
            return Err(Error::Incompatible);
        }

        let rows = first.n_samples * first.ploidy;
        let slices = parts
            .iter()
            .map(|p| (p.data.as_slice(), p.n_variants))
            .collect::<Vec<_>>();

        Genotypes::try_new(
            concat_rows(rows, &slices),
            first.n_samples,
            first.ploidy,
            slices.iter().map(|(_, n)| n).sum(),
        )
    }
}

/// Implements a `(samples, variants)` array.
macro_rules! sample_major {
    ($name:ident, $ty:ty, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Debug, PartialEq)]
        pub struct $name {
            /// The values.
            data: Vec<$ty>,

            /// The number of samples.
            n_samples: usize,

            /// The number of variants.
            n_variants: usize,
        }

        impl $name {
            /// Attempts to create a new array with shape `(samples, variants)`.
            pub fn try_new(data: Vec<$ty>, n_samples: usize, n_variants: usize) -> Result<Self> {
                check_shape(&[n_samples, n_variants], data.len())?;

                Ok(Self {
                    data,
                    n_samples,
                    n_variants,
                })
            }

            /// Gets the number of samples.
            pub fn n_samples(&self) -> usize {
                self.n_samples
            }

            /// Gets the number of variants.
            pub fn n_variants(&self) -> usize {
                self.n_variants
            }

            /// Gets the values.
            pub fn as_slice(&self) -> &[$ty] {
                &self.data
            }

            /// Gets the values mutably.
            pub(crate) fn as_mut_slice(&mut self) -> &mut [$ty] {
                &mut self.data
            }

            /// Gets the values of one sample across every variant.
            ///
            /// # Panics
            ///
            /// Panics if `sample` is out of bounds.
            pub fn sample(&self, sample: usize) -> &[$ty] {
                &self.data[sample * self.n_variants..(sample + 1) * self.n_variants]
            }

            /// Gets a single value.
            pub fn get(&self, sample: usize, variant: usize) -> Option<$ty> {
                if sample >= self.n_samples || variant >= self.n_variants {
                    return None;
                }

                Some(self.data[sample * self.n_variants + variant])
            }

            /// Concatenates arrays along the variant axis.
            pub fn concat(parts: &[&$name]) -> Result<Self> {
                let first = parts.first().ok_or(Error::Empty)?;

                if parts.iter().any(|p| p.n_samples != first.n_samples) {
                    return Err(Error::Incompatible);
                }

                let slices = parts
                    .iter()
                    .map(|p| (p.data.as_slice(), p.n_variants))
                    .collect::<Vec<_>>();

                $name::try_new(
                    concat_rows(first.n_samples, &slices),
                    first.n_samples,
                    slices.iter().map(|(_, n)| n).sum(),
                )
            }
        }
    };
}

sample_major!(
    Dosages,
    f32,
    "Dosages with shape `(samples, variants)`.\n\nMissing dosages are NaN."
);

sample_major!(
    Phasing,
    bool,
    "Phasing flags with shape `(samples, variants)`.\n\nA flag is `true` when the call of that sample at that variant is phased."
);

impl Eq for Phasing {}

////////////////////////////////////////////////////////////////////////////////////////
// Data
////////////////////////////////////////////////////////////////////////////////////////

/// The arrays produced by a read in a given [`Mode`].
#[derive(Clone, Debug, PartialEq)]
pub enum Data {
    /// Genotype calls.
    Genotypes(Genotypes),

    /// Dosages.
    Dosages(Dosages),

    /// Genotype calls and phasing flags.
    GenotypesPhasing(Genotypes, Phasing),

    /// Genotype calls and dosages.
    GenotypesDosages(Genotypes, Dosages),

    /// Genotype calls, phasing flags, and dosages.
    GenotypesPhasingDosages(Genotypes, Phasing, Dosages),
}

impl Data {
    /// Creates zero-filled arrays of `mode` for `n_samples` diploid samples
    /// and `n_variants` variants.
    ///
    /// The result is meant to be reused as the output of
    /// [`Reader::read_into()`](crate::reader::Reader::read_into).
    ///
    /// # Examples
    ///
    /// ```
    /// use varwindow::data::Data;
    /// use varwindow::mode::Mode;
    ///
    /// let data = Data::zeroed(Mode::GenotypesDosages, 3, 10);
    /// assert_eq!(data.mode(), Mode::GenotypesDosages);
    /// assert_eq!(data.n_samples(), 3);
    /// assert_eq!(data.n_variants(), 10);
    /// assert_eq!(data.genotypes().unwrap().as_slice().len(), 60);
    /// ```
    pub fn zeroed(mode: Mode, n_samples: usize, n_variants: usize) -> Self {
        let genotypes = || Genotypes {
            data: vec![0; n_samples * PLOIDY * n_variants],
            n_samples,
            ploidy: PLOIDY,
            n_variants,
        };
        let phasing = || Phasing {
            data: vec![false; n_samples * n_variants],
            n_samples,
            n_variants,
        };
        let dosages = || Dosages {
            data: vec![0.0; n_samples * n_variants],
            n_samples,
            n_variants,
        };

        match mode {
            Mode::Genotypes => Data::Genotypes(genotypes()),
            Mode::Dosages => Data::Dosages(dosages()),
            Mode::GenotypesPhasing => Data::GenotypesPhasing(genotypes(), phasing()),
            Mode::GenotypesDosages => Data::GenotypesDosages(genotypes(), dosages()),
            Mode::GenotypesPhasingDosages => {
                Data::GenotypesPhasingDosages(genotypes(), phasing(), dosages())
            }
        }
    }

    /// Gets the [`Mode`] of the arrays.
    pub fn mode(&self) -> Mode {
        match self {
            Data::Genotypes(_) => Mode::Genotypes,
            Data::Dosages(_) => Mode::Dosages,
            Data::GenotypesPhasing(..) => Mode::GenotypesPhasing,
            Data::GenotypesDosages(..) => Mode::GenotypesDosages,
            Data::GenotypesPhasingDosages(..) => Mode::GenotypesPhasingDosages,
        }
    }

    /// Gets the number of samples.
    pub fn n_samples(&self) -> usize {
        match self {
            Data::Genotypes(genotypes)
            | Data::GenotypesPhasing(genotypes, _)
            | Data::GenotypesDosages(genotypes, _)
            | Data::GenotypesPhasingDosages(genotypes, ..) => genotypes.n_samples(),
            Data::Dosages(dosages) => dosages.n_samples(),
        }
    }

    /// Gets the number of variants.
    pub fn n_variants(&self) -> usize {
        match self {
            Data::Genotypes(genotypes)
            | Data::GenotypesPhasing(genotypes, _)
            | Data::GenotypesDosages(genotypes, _)
            | Data::GenotypesPhasingDosages(genotypes, ..) => genotypes.n_variants(),
            Data::Dosages(dosages) => dosages.n_variants(),
        }
    }

    /// Gets the genotype calls, if the mode has them.
    pub fn genotypes(&self) -> Option<&Genotypes> {
        match self {
            Data::Genotypes(genotypes)
            | Data::GenotypesPhasing(genotypes, _)
            | Data::GenotypesDosages(genotypes, _)
            | Data::GenotypesPhasingDosages(genotypes, ..) => Some(genotypes),
            Data::Dosages(_) => None,
        }
    }

    /// Gets the phasing flags, if the mode has them.
    pub fn phasing(&self) -> Option<&Phasing> {
        match self {
            Data::GenotypesPhasing(_, phasing) | Data::GenotypesPhasingDosages(_, phasing, _) => {
                Some(phasing)
            }
            Data::Genotypes(_) | Data::Dosages(_) | Data::GenotypesDosages(..) => None,
        }
    }

    /// Gets the dosages, if the mode has them.
    pub fn dosages(&self) -> Option<&Dosages> {
        match self {
            Data::Dosages(dosages)
            | Data::GenotypesDosages(_, dosages)
            | Data::GenotypesPhasingDosages(_, _, dosages) => Some(dosages),
            Data::Genotypes(_) | Data::GenotypesPhasing(..) => None,
        }
    }

    /// Splits the arrays into mutable component slices.
    pub(crate) fn components_mut(
        &mut self,
    ) -> (Option<&mut [i32]>, Option<&mut [bool]>, Option<&mut [f32]>) {
        match self {
            Data::Genotypes(genotypes) => (Some(genotypes.as_mut_slice()), None, None),
            Data::Dosages(dosages) => (None, None, Some(dosages.as_mut_slice())),
            Data::GenotypesPhasing(genotypes, phasing) => (
                Some(genotypes.as_mut_slice()),
                Some(phasing.as_mut_slice()),
                None,
            ),
            Data::GenotypesDosages(genotypes, dosages) => (
                Some(genotypes.as_mut_slice()),
                None,
                Some(dosages.as_mut_slice()),
            ),
            Data::GenotypesPhasingDosages(genotypes, phasing, dosages) => (
                Some(genotypes.as_mut_slice()),
                Some(phasing.as_mut_slice()),
                Some(dosages.as_mut_slice()),
            ),
        }
    }

    /// Concatenates arrays of the same mode along the variant axis.
    ///
    /// # Examples
    ///
    /// ```
    /// use varwindow::data::Data;
    /// use varwindow::data::Genotypes;
    ///
    /// let a = Data::Genotypes(Genotypes::try_new(vec![0, 1], 1, 2, 1)?);
    /// let b = Data::Genotypes(Genotypes::try_new(vec![1, 1, 0, -1], 1, 2, 2)?);
    ///
    /// let data = Data::concat(&[a, b])?;
    /// assert_eq!(data.n_variants(), 3);
    /// assert_eq!(data.genotypes().unwrap().haplotype(0, 1), &[1, 0, -1]);
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn concat(parts: &[Data]) -> Result<Self> {
        let mode = parts.first().ok_or(Error::Empty)?.mode();
        if parts.iter().any(|part| part.mode() != mode) {
            return Err(Error::Incompatible);
        }

        // Every part has the mode of the first, so each component exists.
        let genotypes =
            || Genotypes::concat(&parts.iter().filter_map(Data::genotypes).collect::<Vec<_>>());
        let phasing =
            || Phasing::concat(&parts.iter().filter_map(Data::phasing).collect::<Vec<_>>());
        let dosages =
            || Dosages::concat(&parts.iter().filter_map(Data::dosages).collect::<Vec<_>>());

        Ok(match mode {
            Mode::Genotypes => Data::Genotypes(genotypes()?),
            Mode::Dosages => Data::Dosages(dosages()?),
            Mode::GenotypesPhasing => Data::GenotypesPhasing(genotypes()?, phasing()?),
            Mode::GenotypesDosages => Data::GenotypesDosages(genotypes()?, dosages()?),
            Mode::GenotypesPhasingDosages => {
                Data::GenotypesPhasingDosages(genotypes()?, phasing()?, dosages()?)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genotype_layout() -> std::result::Result<(), Box<dyn std::error::Error>> {
        // Two samples, two haplotypes, three variants.
        let genotypes = Genotypes::try_new(
            vec![0, 1, 0, 1, 1, -1, 0, 0, 0, 1, 0, 1],
            2,
            2,
            3,
        )?;

        assert_eq!(genotypes.haplotype(1, 1), &[1, 0, 1]);
        assert_eq!(genotypes.get(0, 1, 2), Some(-1));
        assert_eq!(genotypes.get(2, 0, 0), None);

        Ok(())
    }

    #[test]
    fn test_concat_interleaves_rows() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let a = Dosages::try_new(vec![0.0, 1.0, 2.0, 0.5], 2, 2)?;
        let b = Dosages::try_new(vec![1.5, 0.25], 2, 1)?;

        let dosages = Dosages::concat(&[&a, &b])?;
        assert_eq!(dosages.sample(0), &[0.0, 1.0, 1.5]);
        assert_eq!(dosages.sample(1), &[2.0, 0.5, 0.25]);

        let c = Dosages::try_new(vec![1.0], 1, 1)?;
        assert_eq!(Dosages::concat(&[&a, &c]).unwrap_err(), Error::Incompatible);

        Ok(())
    }

    #[test]
    fn test_concat_data_modes() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let genotypes = Genotypes::try_new(vec![0, 1], 1, 2, 1)?;
        let phasing = Phasing::try_new(vec![true], 1, 1)?;

        let a = Data::GenotypesPhasing(genotypes.clone(), phasing.clone());
        let b = Data::GenotypesPhasing(genotypes.clone(), Phasing::try_new(vec![false], 1, 1)?);

        let data = Data::concat(&[a.clone(), b])?;
        assert_eq!(data.mode(), Mode::GenotypesPhasing);
        assert_eq!(data.phasing().map(Phasing::as_slice), Some(&[true, false][..]));
        assert!(data.dosages().is_none());

        let err = Data::concat(&[a, Data::Genotypes(genotypes)]).unwrap_err();
        assert_eq!(err, Error::Incompatible);
        assert_eq!(Data::concat(&[]).unwrap_err(), Error::Empty);

        Ok(())
    }
}
