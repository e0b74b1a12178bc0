//! The on-disk index cache.
//!
//! Parsing a large variant manifest is slow, so the catalogue derived from it
//! is persisted next to the manifest and loaded on subsequent opens. The cache
//! is a gzip-compressed, little-endian, columnar artifact:
//!
//! ```text
//! magic      b"VWIX"
//! version    u8
//! n_contigs  u32, then per contig: name length (u32) + UTF-8 bytes
//! n_variants u64
//! contig     u32 x n_variants
//! start      u64 x n_variants
//! end        u64 x n_variants
//! ilen       i32 x n_variants
//! alternates u32 x n_variants
//! ```

use std::fs;
use std::fs::File;
use std::io;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::index::Index;
use crate::index::Variant;

/// The magic bytes at the start of every cache.
pub const MAGIC: &[u8; 4] = b"VWIX";

/// The version of the cache layout written by this crate.
pub const VERSION: u8 = 1;

/// The extension appended to a manifest's path to derive its cache path.
pub const EXTENSION: &str = "vwi";

/// The most entries reserved up front for a count read from a cache.
///
/// Counts and lengths in the file are untrusted, so larger collections grow as
/// their bytes are actually read.
const MAX_RESERVED: usize = 1 << 16;

/// An error related to reading or writing the index cache.
#[derive(Debug)]
pub enum Error {
    /// An I/O error.
    Io(io::Error),

    /// The cache does not start with the expected magic bytes.
    InvalidMagic([u8; 4]),

    /// The cache was written with an unsupported layout version.
    UnsupportedVersion(u8),

    /// A contig name was not valid UTF-8.
    InvalidContigName(std::string::FromUtf8Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "i/o error: {err}"),
            Error::InvalidMagic(magic) => write!(f, "invalid magic bytes: {magic:?}"),
            Error::UnsupportedVersion(version) => write!(
                f,
                "unsupported cache version: expected {VERSION}, found {version}"
            ),
            Error::InvalidContigName(err) => write!(f, "invalid contig name: {err}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

/// A [`Result`](std::result::Result) with an [`Error`].
type Result<T> = std::result::Result<T, Error>;

/// Gets the cache path for a variant manifest.
///
/// # Examples
///
/// ```
/// use std::path::Path;
///
/// use varwindow::index::cache;
///
/// assert_eq!(
///     cache::path_for(Path::new("data/cohort.pvar")),
///     Path::new("data/cohort.pvar.vwi")
/// );
/// ```
pub fn path_for(manifest: &Path) -> PathBuf {
    let mut path = manifest.as_os_str().to_owned();
    path.push(".");
    path.push(EXTENSION);
    PathBuf::from(path)
}

/// Writes the catalogue of an [`Index`] (without any filter) to a writer.
pub fn write<W>(writer: W, index: &Index) -> Result<()>
where
    W: Write,
{
    let mut writer = GzEncoder::new(writer, Compression::default());

    writer.write_all(MAGIC)?;
    writer.write_all(&[VERSION])?;

    writer.write_all(&(index.contigs().len() as u32).to_le_bytes())?;
    for contig in index.contigs() {
        writer.write_all(&(contig.len() as u32).to_le_bytes())?;
        writer.write_all(contig.as_bytes())?;
    }

    let variants = index.variants();
    writer.write_all(&(variants.len() as u64).to_le_bytes())?;

    for variant in variants {
        writer.write_all(&variant.contig().to_le_bytes())?;
    }
    for variant in variants {
        writer.write_all(&variant.start().to_le_bytes())?;
    }
    for variant in variants {
        writer.write_all(&variant.end().to_le_bytes())?;
    }
    for variant in variants {
        writer.write_all(&variant.ilen().to_le_bytes())?;
    }
    for variant in variants {
        writer.write_all(&variant.alternates().to_le_bytes())?;
    }

    writer.finish()?.flush()?;
    Ok(())
}

/// Reads a fixed number of bytes.
fn read_array<R, const N: usize>(reader: &mut R) -> io::Result<[u8; N]>
where
    R: Read,
{
    let mut buffer = [0u8; N];
    reader.read_exact(&mut buffer)?;
    Ok(buffer)
}

/// Reads one column of `n` little-endian values.
fn read_column<R, T, const N: usize>(
    reader: &mut R,
    n: usize,
    decode: fn([u8; N]) -> T,
) -> io::Result<Vec<T>>
where
    R: Read,
{
    let mut column = Vec::with_capacity(n.min(MAX_RESERVED));

    for _ in 0..n {
        column.push(decode(read_array(reader)?));
    }

    Ok(column)
}

/// Reads a length-prefixed contig name.
fn read_name<R>(reader: &mut R) -> Result<String>
where
    R: Read,
{
    let len = u64::from(u32::from_le_bytes(read_array(reader)?));

    let mut name = Vec::new();
    reader.by_ref().take(len).read_to_end(&mut name)?;

    if name.len() as u64 != len {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("contig name of {len} bytes ends after {} bytes", name.len()),
        )));
    }

    String::from_utf8(name).map_err(Error::InvalidContigName)
}

/// Reads the contig names and variants from a cache.
pub fn read<R>(reader: R) -> Result<(Vec<String>, Vec<Variant>)>
where
    R: Read,
{
    let mut reader = GzDecoder::new(reader);

    let magic = read_array::<_, 4>(&mut reader)?;
    if &magic != MAGIC {
        return Err(Error::InvalidMagic(magic));
    }

    let [version] = read_array::<_, 1>(&mut reader)?;
    if version != VERSION {
        return Err(Error::UnsupportedVersion(version));
    }

    let n_contigs = u32::from_le_bytes(read_array(&mut reader)?) as usize;
    let mut contigs = Vec::with_capacity(n_contigs.min(MAX_RESERVED));
    for _ in 0..n_contigs {
        contigs.push(read_name(&mut reader)?);
    }

    let n = usize::try_from(u64::from_le_bytes(read_array(&mut reader)?))
        .map_err(|err| Error::Io(io::Error::new(io::ErrorKind::InvalidData, err)))?;
    let contig = read_column(&mut reader, n, u32::from_le_bytes)?;
    let start = read_column(&mut reader, n, u64::from_le_bytes)?;
    let end = read_column(&mut reader, n, u64::from_le_bytes)?;
    let ilen = read_column(&mut reader, n, i32::from_le_bytes)?;
    let alternates = read_column(&mut reader, n, u32::from_le_bytes)?;

    let variants = (0..n)
        .map(|i| Variant::new(i as u32, contig[i], start[i], end[i], ilen[i], alternates[i]))
        .collect();

    Ok((contigs, variants))
}

/// Writes the cache for an [`Index`] to `path`.
///
/// The cache is first written to a sibling temporary file and then renamed
/// into place so that a partially written cache is never observed.
pub fn write_to_path(path: &Path, index: &Index) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let file = File::create(&tmp)?;
    write(BufWriter::new(file), index)?;
    fs::rename(&tmp, path)?;

    Ok(())
}

/// Reads the cache at `path`.
pub fn read_from_path(path: &Path) -> Result<(Vec<String>, Vec<Variant>)> {
    let file = File::open(path)?;
    read(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_preserves_catalogue() -> std::result::Result<(), Box<dyn std::error::Error>>
    {
        let index = Index::try_new(
            vec![String::from("chr1"), String::from("chrX")],
            vec![
                Variant::new(0, 0, 100, 101, 0, 1),
                Variant::new(1, 0, 150, 160, -9, 1),
                Variant::new(2, 1, 7, 8, 3, 2),
            ],
        )?;

        let mut buffer = Vec::new();
        write(&mut buffer, &index)?;

        let (contigs, variants) = read(&buffer[..])?;
        assert_eq!(contigs, index.contigs());
        assert_eq!(variants, index.variants());

        Ok(())
    }

    #[test]
    fn test_invalid_magic() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut buffer = Vec::new();
        let mut encoder = GzEncoder::new(&mut buffer, Compression::default());
        encoder.write_all(b"NOPE\x01")?;
        encoder.finish()?;

        let err = read(&buffer[..]).unwrap_err();
        assert!(matches!(err, Error::InvalidMagic(_)));

        Ok(())
    }

    #[test]
    fn test_truncated_cache() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut buffer = Vec::new();
        let mut encoder = GzEncoder::new(&mut buffer, Compression::default());
        encoder.write_all(MAGIC)?;
        encoder.write_all(&[VERSION])?;
        encoder.write_all(&0u32.to_le_bytes())?;
        encoder.write_all(&2u64.to_le_bytes())?;
        encoder.finish()?;

        let err = read(&buffer[..]).unwrap_err();
        assert!(matches!(err, Error::Io(_)));

        Ok(())
    }

    #[test]
    fn test_corrupt_lengths_fail_without_reserving_them(
    ) -> std::result::Result<(), Box<dyn std::error::Error>> {
        // Every contig name claims four gigabytes, but only three bytes follow.
        let mut buffer = Vec::new();
        let mut encoder = GzEncoder::new(&mut buffer, Compression::default());
        encoder.write_all(MAGIC)?;
        encoder.write_all(&[VERSION])?;
        encoder.write_all(&u32::MAX.to_le_bytes())?;
        encoder.write_all(&u32::MAX.to_le_bytes())?;
        encoder.write_all(b"chr")?;
        encoder.finish()?;

        let err = read(&buffer[..]).unwrap_err();
        match err {
            Error::Io(err) => assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof),
            err => panic!("unexpected error: {err}"),
        }

        // A variant count far beyond the bytes present.
        let mut buffer = Vec::new();
        let mut encoder = GzEncoder::new(&mut buffer, Compression::default());
        encoder.write_all(MAGIC)?;
        encoder.write_all(&[VERSION])?;
        encoder.write_all(&0u32.to_le_bytes())?;
        encoder.write_all(&(u32::MAX as u64).to_le_bytes())?;
        encoder.write_all(&7u32.to_le_bytes())?;
        encoder.finish()?;

        let err = read(&buffer[..]).unwrap_err();
        assert!(matches!(err, Error::Io(_)));

        Ok(())
    }
}
