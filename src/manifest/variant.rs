//! Variant manifests (`.pvar` and `.bim`).
//!
//! A PVAR file optionally starts with `##`-prefixed meta lines followed by a
//! `#CHROM`-prefixed header line naming its tab-separated columns. A file
//! without any header line is treated as a BIM file, which has five or six
//! headerless columns: `CHROM`, `ID`, an optional `CM`, `POS`, `ALT`, and `REF`.

use std::io;
use std::io::BufRead;
use std::num::ParseIntError;

use crate::manifest::read_line;

/// The prefix for meta lines in a PVAR file.
pub const META_PREFIX: &str = "##";

/// The prefix for the header line in a PVAR file.
pub const HEADER_PREFIX: char = '#';

/// The delimiter between alternate alleles.
pub const ALT_DELIMITER: char = ',';

////////////////////////////////////////////////////////////////////////////////////////
// Errors
////////////////////////////////////////////////////////////////////////////////////////

/// An error associated with parsing a variant manifest line.
#[derive(Debug)]
pub enum ParseError {
    /// A required column is missing from the header.
    MissingColumn(&'static str),

    /// The header contains a `FORMAT` column, which variant manifests do not
    /// support.
    FormatColumn,

    /// A record has fewer fields than the layout requires.
    IncorrectNumberOfFields(usize, usize),

    /// A BIM record has a number of columns other than five or six.
    InvalidBimColumns(usize),

    /// The position could not be parsed.
    InvalidPosition(ParseIntError),

    /// The position was not positive.
    NonPositivePosition(i64),

    /// The reference allele was empty.
    EmptyReference,

    /// The contig name was empty.
    EmptyContig,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::MissingColumn(column) => {
                write!(f, "missing required column: {column}")
            }
            ParseError::FormatColumn => write!(f, "the FORMAT column is not supported"),
            ParseError::IncorrectNumberOfFields(expected, found) => write!(
                f,
                "invalid number of fields: expected at least {expected} fields, found {found} \
                 fields"
            ),
            ParseError::InvalidBimColumns(found) => write!(
                f,
                "invalid number of BIM columns: expected 5 or 6 columns, found {found} columns"
            ),
            ParseError::InvalidPosition(err) => write!(f, "invalid position: {err}"),
            ParseError::NonPositivePosition(pos) => {
                write!(f, "position must be positive, found {pos}")
            }
            ParseError::EmptyReference => write!(f, "empty reference allele"),
            ParseError::EmptyContig => write!(f, "empty contig name"),
        }
    }
}

impl std::error::Error for ParseError {}

/// An error related to a variant manifest [`Reader`].
#[derive(Debug)]
pub enum Error {
    /// An I/O error.
    Io(io::Error),

    /// A parse error on the given (1-based) line.
    Parse(ParseError, usize),

    /// The manifest contained no header and no records.
    Empty,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "i/o error: {err}"),
            Error::Parse(err, line_no) => write!(f, "parse error on line {line_no}: {err}"),
            Error::Empty => write!(f, "no non-comment lines in variant manifest"),
        }
    }
}

impl std::error::Error for Error {}

/// A [`Result`](std::result::Result) with an [`Error`].
type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////////////////////
// Record
////////////////////////////////////////////////////////////////////////////////////////

/// A single variant from a variant manifest.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Record {
    /// The contig name.
    contig: String,

    /// The 1-based position.
    position: u64,

    /// The reference allele.
    reference: String,

    /// The alternate alleles.
    alternates: Vec<String>,
}

impl Record {
    /// Creates a new [`Record`].
    ///
    /// # Examples
    ///
    /// ```
    /// use varwindow::manifest::variant::Record;
    ///
    /// let record = Record::new("chr1", 101, "ACGT", vec![String::from("A")]);
    /// assert_eq!(record.start(), 100);
    /// assert_eq!(record.end(), 104);
    /// assert_eq!(record.ilens(), vec![-3]);
    /// ```
    pub fn new(
        contig: impl Into<String>,
        position: u64,
        reference: impl Into<String>,
        alternates: Vec<String>,
    ) -> Self {
        Self {
            contig: contig.into(),
            position,
            reference: reference.into(),
            alternates,
        }
    }

    /// Gets the contig name.
    pub fn contig(&self) -> &str {
        &self.contig
    }

    /// Gets the 1-based position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Gets the reference allele.
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Gets the alternate alleles.
    pub fn alternates(&self) -> &[String] {
        &self.alternates
    }

    /// Gets the 0-based, inclusive start.
    pub fn start(&self) -> u64 {
        self.position - 1
    }

    /// Gets the 0-based, exclusive end.
    pub fn end(&self) -> u64 {
        self.start() + self.reference.len() as u64
    }

    /// Gets the length difference between each alternate allele and the
    /// reference allele.
    pub fn ilens(&self) -> Vec<i32> {
        let rlen = self.reference.len() as i64;

        self.alternates
            .iter()
            .map(|alt| (alt.len() as i64 - rlen) as i32)
            .collect()
    }
}

////////////////////////////////////////////////////////////////////////////////////////
// Layout
////////////////////////////////////////////////////////////////////////////////////////

/// The column positions of the fields needed from a PVAR file.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Columns {
    /// The `#CHROM` column.
    contig: usize,

    /// The `POS` column.
    position: usize,

    /// The `REF` column.
    reference: usize,

    /// The `ALT` column.
    alternate: usize,
}

impl Columns {
    /// Parses the columns from a PVAR header line.
    fn try_from_header(line: &str) -> std::result::Result<Self, ParseError> {
        let names = line
            .trim_start_matches(HEADER_PREFIX)
            .split('\t')
            .map(str::trim)
            .collect::<Vec<_>>();

        if names.contains(&"FORMAT") {
            return Err(ParseError::FormatColumn);
        }

        let find = |name: &'static str| {
            names
                .iter()
                .position(|column| *column == name)
                .ok_or(ParseError::MissingColumn(name))
        };

        Ok(Self {
            contig: find("CHROM")?,
            position: find("POS")?,
            reference: find("REF")?,
            alternate: find("ALT")?,
        })
    }

    /// The minimum number of fields a record must have.
    fn min_fields(&self) -> usize {
        [self.contig, self.position, self.reference, self.alternate]
            .into_iter()
            .max()
            .unwrap_or_default()
            + 1
    }
}

/// The layout of the variant manifest.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Layout {
    /// A PVAR file with a header line.
    Pvar(Columns),

    /// A headerless BIM file.
    Bim,
}

/// Parses a position column.
fn parse_position(s: &str) -> std::result::Result<i64, ParseError> {
    s.trim().parse::<i64>().map_err(ParseError::InvalidPosition)
}

/// Splits a comma-separated list of alternate alleles.
fn parse_alternates(s: &str) -> Vec<String> {
    s.split(ALT_DELIMITER).map(String::from).collect()
}

impl Layout {
    /// Parses a single record line according to the layout.
    ///
    /// BIM records with a non-positive position are skipped (`Ok(None)`).
    fn parse(&self, line: &str) -> std::result::Result<Option<Record>, ParseError> {
        match self {
            Layout::Pvar(columns) => {
                let fields = line.split('\t').collect::<Vec<_>>();
                if fields.len() < columns.min_fields() {
                    return Err(ParseError::IncorrectNumberOfFields(
                        columns.min_fields(),
                        fields.len(),
                    ));
                }

                if fields[columns.contig].is_empty() {
                    return Err(ParseError::EmptyContig);
                }

                let position = parse_position(fields[columns.position])?;
                if position <= 0 {
                    return Err(ParseError::NonPositivePosition(position));
                }

                let reference = fields[columns.reference];
                if reference.is_empty() {
                    return Err(ParseError::EmptyReference);
                }

                Ok(Some(Record::new(
                    fields[columns.contig],
                    position as u64,
                    reference,
                    parse_alternates(fields[columns.alternate]),
                )))
            }
            Layout::Bim => {
                let fields = line.split_whitespace().collect::<Vec<_>>();
                let (position, alternate, reference) = match fields.len() {
                    6 => (fields[3], fields[4], fields[5]),
                    5 => (fields[2], fields[3], fields[4]),
                    n => return Err(ParseError::InvalidBimColumns(n)),
                };

                let position = parse_position(position)?;
                if position <= 0 {
                    return Ok(None);
                }

                if reference.is_empty() {
                    return Err(ParseError::EmptyReference);
                }

                Ok(Some(Record::new(
                    fields[0],
                    position as u64,
                    reference,
                    parse_alternates(alternate),
                )))
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////
// Reader
////////////////////////////////////////////////////////////////////////////////////////

/// A variant manifest reader.
#[derive(Debug)]
pub struct Reader<T>
where
    T: BufRead,
{
    /// The inner reader.
    inner: T,

    /// The detected layout, once the first non-meta line has been seen.
    layout: Option<Layout>,

    /// The current line number.
    line_no: usize,
}

impl<T> Reader<T>
where
    T: BufRead,
{
    /// Creates a variant manifest reader.
    ///
    /// # Examples
    ///
    /// ```
    /// let data = b"##fileformat=PVARv1.0\n#CHROM\tPOS\tID\tREF\tALT\n1\t100\trs1\tA\tG";
    /// let mut reader = varwindow::manifest::variant::Reader::new(&data[..]);
    ///
    /// let records = reader.records().collect::<Result<Vec<_>, _>>()?;
    /// assert_eq!(records.len(), 1);
    /// assert_eq!(records[0].start(), 99);
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            layout: None,
            line_no: 0,
        }
    }

    /// Gets the detected layout, if any lines have been read yet.
    pub fn layout(&self) -> Option<Layout> {
        self.layout
    }

    /// Consumes self and returns the inner reader.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Reads the next record from the underlying reader.
    pub fn read_record(&mut self, buffer: &mut String) -> Result<Option<Record>> {
        loop {
            let read = read_line(&mut self.inner, buffer).map_err(Error::Io)?;
            if read == 0 {
                return match self.layout {
                    Some(_) => Ok(None),
                    None => Err(Error::Empty),
                };
            }

            self.line_no += 1;

            if buffer.is_empty() || buffer.starts_with(META_PREFIX) {
                continue;
            }

            let layout = match self.layout {
                Some(layout) => layout,
                None if buffer.starts_with(HEADER_PREFIX) => {
                    let columns = Columns::try_from_header(buffer)
                        .map_err(|err| Error::Parse(err, self.line_no))?;
                    self.layout = Some(Layout::Pvar(columns));
                    continue;
                }
                None => {
                    self.layout = Some(Layout::Bim);
                    Layout::Bim
                }
            };

            match layout.parse(buffer) {
                Ok(Some(record)) => return Ok(Some(record)),
                Ok(None) => continue,
                Err(err) => return Err(Error::Parse(err, self.line_no)),
            }
        }
    }

    /// Returns an iterator over the records in the underlying reader.
    pub fn records(&mut self) -> impl Iterator<Item = Result<Record>> + '_ {
        let mut buffer = String::new();
        let mut done = false;

        std::iter::from_fn(move || {
            if done {
                return None;
            }

            match self.read_record(&mut buffer) {
                Ok(Some(record)) => Some(Ok(record)),
                Ok(None) => None,
                Err(err) => {
                    done = true;
                    Some(Err(err))
                }
            }
        })
    }
}
