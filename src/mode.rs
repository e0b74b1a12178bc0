//! Output modes.

/// The number of bytes one genotype call occupies.
pub const GENOTYPE_BYTES: usize = std::mem::size_of::<i32>();

/// The number of bytes one dosage occupies.
pub const DOSAGE_BYTES: usize = std::mem::size_of::<f32>();

/// The number of bytes one phasing flag occupies.
pub const PHASE_BYTES: usize = std::mem::size_of::<bool>();

/// An error related to parsing a [`Mode`].
#[derive(Debug, Eq, PartialEq)]
pub struct ParseError(String);

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid mode: {}", self.0)
    }
}

impl std::error::Error for ParseError {}

/// The arrays a read produces.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Mode {
    /// Genotype calls.
    Genotypes,

    /// Dosages.
    Dosages,

    /// Genotype calls and phasing flags.
    GenotypesPhasing,

    /// Genotype calls and dosages.
    GenotypesDosages,

    /// Genotype calls, phasing flags, and dosages.
    GenotypesPhasingDosages,
}

impl Mode {
    /// Every mode.
    pub const ALL: [Mode; 5] = [
        Mode::Genotypes,
        Mode::Dosages,
        Mode::GenotypesPhasing,
        Mode::GenotypesDosages,
        Mode::GenotypesPhasingDosages,
    ];

    /// Whether the mode produces genotype calls.
    pub fn has_genotypes(&self) -> bool {
        match self {
            Mode::Genotypes
            | Mode::GenotypesPhasing
            | Mode::GenotypesDosages
            | Mode::GenotypesPhasingDosages => true,
            Mode::Dosages => false,
        }
    }

    /// Whether the mode produces phasing flags.
    pub fn has_phasing(&self) -> bool {
        match self {
            Mode::GenotypesPhasing | Mode::GenotypesPhasingDosages => true,
            Mode::Genotypes | Mode::Dosages | Mode::GenotypesDosages => false,
        }
    }

    /// Whether the mode produces dosages.
    pub fn has_dosages(&self) -> bool {
        match self {
            Mode::Dosages | Mode::GenotypesDosages | Mode::GenotypesPhasingDosages => true,
            Mode::Genotypes | Mode::GenotypesPhasing => false,
        }
    }

    /// Gets the number of bytes one variant occupies across every array the
    /// mode produces.
    ///
    /// # Examples
    ///
    /// ```
    /// use varwindow::mode::Mode;
    ///
    /// assert_eq!(Mode::Genotypes.bytes_per_variant(3, 2), 24);
    /// assert_eq!(Mode::GenotypesDosages.bytes_per_variant(3, 2), 36);
    /// assert_eq!(Mode::GenotypesPhasingDosages.bytes_per_variant(3, 2), 39);
    /// ```
    pub fn bytes_per_variant(&self, n_samples: usize, ploidy: usize) -> usize {
        let genotypes = n_samples * ploidy * GENOTYPE_BYTES;
        let dosages = n_samples * DOSAGE_BYTES;
        let phasing = n_samples * PHASE_BYTES;

        match self {
            Mode::Genotypes => genotypes,
            Mode::Dosages => dosages,
            Mode::GenotypesPhasing => genotypes + phasing,
            Mode::GenotypesDosages => genotypes + dosages,
            Mode::GenotypesPhasingDosages => genotypes + phasing + dosages,
        }
    }

    /// Gets the name of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Genotypes => "genotypes",
            Mode::Dosages => "dosages",
            Mode::GenotypesPhasing => "genotypes+phasing",
            Mode::GenotypesDosages => "genotypes+dosages",
            Mode::GenotypesPhasingDosages => "genotypes+phasing+dosages",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Mode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_per_variant_sums_components() {
        for mode in Mode::ALL {
            let mut expected = 0;
            if mode.has_genotypes() {
                expected += 5 * 2 * 4;
            }
            if mode.has_phasing() {
                expected += 5;
            }
            if mode.has_dosages() {
                expected += 5 * 4;
            }

            assert_eq!(mode.bytes_per_variant(5, 2), expected, "{mode}");
        }
    }

    #[test]
    fn test_names() -> Result<(), Box<dyn std::error::Error>> {
        for mode in Mode::ALL {
            assert_eq!(mode.to_string().parse::<Mode>()?, mode);
        }

        assert_eq!("Genotypes+Dosages".parse::<Mode>()?, Mode::GenotypesDosages);

        let err = "phasing".parse::<Mode>().unwrap_err();
        assert_eq!(err.to_string(), "invalid mode: phasing");

        Ok(())
    }
}
