//! Sample manifests (`.psam` and `.fam`).
//!
//! A PSAM file starts with a `#`-prefixed header line (e.g., `#FID IID SEX` or
//! `#IID SEX`) and the sample identifier is taken from its `IID` column. A file
//! without a header line is treated as a FAM file, where the sample identifier
//! is the second whitespace-delimited column.

use std::fs::File;
use std::io;
use std::io::BufRead;
use std::io::BufReader;
use std::path::Path;

use crate::manifest::read_line;

/// The prefix for the header line in a PSAM file.
pub const HEADER_PREFIX: char = '#';

/// The name of the individual identifier column.
pub const IID_COLUMN: &str = "IID";

/// The column holding the individual identifier within a FAM file.
const FAM_IID_COLUMN: usize = 1;

/// An error related to reading a sample manifest.
#[derive(Debug)]
pub enum Error {
    /// An I/O error.
    Io(io::Error),

    /// The header line has no `IID` column.
    MissingIid,

    /// A record is missing the identifier column on the given (1-based) line.
    MissingField(usize),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "i/o error: {err}"),
            Error::MissingIid => write!(f, "sample manifest header has no {IID_COLUMN} column"),
            Error::MissingField(line_no) => {
                write!(f, "missing sample identifier on line {line_no}")
            }
        }
    }
}

impl std::error::Error for Error {}

/// Reads the sample identifiers from a sample manifest, in storage order.
///
/// # Examples
///
/// ```
/// use varwindow::manifest::sample;
///
/// let data = b"#FID\tIID\tSEX\nf0\ts0\t1\nf1\ts1\t2";
/// let samples = sample::read_ids(&data[..])?;
/// assert_eq!(samples, vec!["s0", "s1"]);
///
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn read_ids<T>(mut reader: T) -> Result<Vec<String>, Error>
where
    T: BufRead,
{
    let mut buffer = String::new();
    let mut column = None;
    let mut line_no = 0usize;
    let mut samples = Vec::new();

    while read_line(&mut reader, &mut buffer).map_err(Error::Io)? > 0 {
        line_no += 1;

        if buffer.trim().is_empty() {
            continue;
        }

        let column = match column {
            Some(column) => column,
            None if buffer.starts_with(HEADER_PREFIX) => {
                let found = buffer
                    .trim_start_matches(HEADER_PREFIX)
                    .split_whitespace()
                    .position(|name| name == IID_COLUMN)
                    .ok_or(Error::MissingIid)?;
                column = Some(found);
                continue;
            }
            None => *column.insert(FAM_IID_COLUMN),
        };

        let id = buffer
            .split_whitespace()
            .nth(column)
            .ok_or(Error::MissingField(line_no))?;

        samples.push(id.to_string());
    }

    Ok(samples)
}

/// Reads the sample identifiers from a sample manifest on disk.
pub fn read_ids_from_path(path: impl AsRef<Path>) -> Result<Vec<String>, Error> {
    let file = File::open(path).map_err(Error::Io)?;
    read_ids(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_psam_without_fid() -> Result<(), Box<dyn std::error::Error>> {
        let data = b"#IID\tSEX\nNA1\t1\nNA2\t2\n\nNA3\tNA\n";
        assert_eq!(read_ids(&data[..])?, vec!["NA1", "NA2", "NA3"]);
        Ok(())
    }

    #[test]
    fn test_fam() -> Result<(), Box<dyn std::error::Error>> {
        let data = b"fam0 ind0 0 0 1 -9\nfam1 ind1 0 0 2 -9";
        assert_eq!(read_ids(&data[..])?, vec!["ind0", "ind1"]);
        Ok(())
    }

    #[test]
    fn test_header_without_iid() {
        let data = b"#FID\tSEX\nf0\t1";
        let err = read_ids(&data[..]).unwrap_err();
        assert_eq!(err.to_string(), "sample manifest header has no IID column");
    }

    #[test]
    fn test_short_record() {
        let data = b"#FID\tIID\nf0";
        let err = read_ids(&data[..]).unwrap_err();
        assert_eq!(err.to_string(), "missing sample identifier on line 2");
    }
}
