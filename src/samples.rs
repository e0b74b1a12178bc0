//! Selecting and reordering samples.
//!
//! Decoders read samples in ascending storage order, whereas callers may
//! request any subset in any order. A [`Samples`] keeps the ascending storage
//! subset handed to decoders alongside, for each requested sample, the row
//! it occupies within that subset.

use std::collections::HashMap;
use std::collections::HashSet;

use tracing::debug;

/// An error related to selecting samples.
#[derive(Debug, Eq, PartialEq)]
pub enum Error {
    /// One or more requested samples do not exist.
    UnknownSample(Vec<String>),

    /// A sample was requested more than once.
    DuplicateSample(String),

    /// No samples were requested.
    Empty,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UnknownSample(samples) => {
                write!(f, "unknown samples: {}", samples.join(", "))
            }
            Error::DuplicateSample(sample) => write!(f, "duplicate sample: {sample}"),
            Error::Empty => write!(f, "at least one sample must be selected"),
        }
    }
}

impl std::error::Error for Error {}

/// A [`Result`](std::result::Result) with an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// The available samples and the current selection.
#[derive(Clone, Debug)]
pub struct Samples {
    /// Every sample, in storage order.
    available: Vec<String>,

    /// The position of each sample in storage order.
    positions: HashMap<String, u32>,

    /// The selected samples, in requested order.
    current: Vec<String>,

    /// The selected storage indices, ascending, or [`None`] when every sample
    /// is selected in storage order.
    subset: Option<Vec<u32>>,

    /// For each selected sample (in requested order), its row within the
    /// decoded subset.
    order: Vec<usize>,
}

impl Samples {
    /// Creates a new [`Samples`] with every sample selected in storage order.
    pub fn new(available: Vec<String>) -> Self {
        let positions = available
            .iter()
            .enumerate()
            .map(|(i, sample)| (sample.clone(), i as u32))
            .collect();

        Self {
            order: (0..available.len()).collect(),
            current: available.clone(),
            available,
            positions,
            subset: None,
        }
    }

    /// Gets every sample, in storage order.
    pub fn available(&self) -> &[String] {
        &self.available
    }

    /// Gets the selected samples, in requested order.
    pub fn current(&self) -> &[String] {
        &self.current
    }

    /// Gets the number of selected samples.
    pub fn len(&self) -> usize {
        self.current.len()
    }

    /// Whether no samples are selected.
    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Gets the ascending storage indices to decode, or [`None`] for every
    /// sample.
    pub fn subset(&self) -> Option<&[u32]> {
        self.subset.as_deref()
    }

    /// Gets, for each selected sample, its row within the decoded subset.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Selects samples by identifier, or every sample with [`None`].
    ///
    /// On error, the selection is left unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// use varwindow::samples::Samples;
    ///
    /// let mut samples = Samples::new(vec![
    ///     String::from("a"),
    ///     String::from("b"),
    ///     String::from("c"),
    /// ]);
    ///
    /// samples.set(Some(&["c", "a"][..]))?;
    /// assert_eq!(samples.subset(), Some(&[0, 2][..]));
    /// assert_eq!(samples.order(), &[1, 0]);
    ///
    /// samples.set::<&str>(None)?;
    /// assert_eq!(samples.subset(), None);
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn set<S>(&mut self, samples: Option<&[S]>) -> Result<()>
    where
        S: AsRef<str>,
    {
        let samples = match samples {
            Some(samples) => samples,
            None => {
                self.reset();
                return Ok(());
            }
        };

        if samples.is_empty() {
            return Err(Error::Empty);
        }

        let unknown = samples
            .iter()
            .map(AsRef::<str>::as_ref)
            .filter(|s| !self.positions.contains_key(*s))
            .map(String::from)
            .collect::<Vec<_>>();

        if !unknown.is_empty() {
            return Err(Error::UnknownSample(unknown));
        }

        let mut seen = HashSet::new();
        let mut requested = Vec::with_capacity(samples.len());

        for sample in samples.iter().map(AsRef::<str>::as_ref) {
            if !seen.insert(sample) {
                return Err(Error::DuplicateSample(sample.to_string()));
            }

            requested.push(self.positions[sample]);
        }

        if requested.len() == self.available.len()
            && requested.iter().enumerate().all(|(i, &s)| s as usize == i)
        {
            self.reset();
            return Ok(());
        }

        let mut subset = requested.clone();
        subset.sort_unstable();

        // Each requested index is unique, so its rank in the sorted subset is
        // the row the decoder writes it to.
        self.order = requested
            .iter()
            .map(|s| subset.partition_point(|x| x < s))
            .collect();
        self.current = samples.iter().map(|s| s.as_ref().to_string()).collect();
        self.subset = Some(subset);

        debug!(
            "samples: selected {} of {} samples",
            self.len(),
            self.available.len()
        );

        Ok(())
    }

    /// Selects every sample in storage order.
    fn reset(&mut self) {
        self.current = self.available.clone();
        self.subset = None;
        self.order = (0..self.available.len()).collect();
    }
}
