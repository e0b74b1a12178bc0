//! Readers for the plain-text manifests that accompany a genotype store.
//!
//! Two manifests are supported:
//!
//! - A [variant manifest](variant) (`.pvar` or `.bim`) listing every variant
//!   in storage order.
//! - A [sample manifest](sample) (`.psam` or `.fam`) listing every sample in
//!   storage order.

use std::io;
use std::io::BufRead;

pub mod sample;
pub mod variant;

/// The new line character.
const NEW_LINE: char = '\n';

/// The carriage return character.
const CARRIAGE_RETURN: char = '\r';

/// Reads a line from a buffered reader, stripping the line terminator.
pub(crate) fn read_line<T>(reader: &mut T, buffer: &mut String) -> io::Result<usize>
where
    T: BufRead,
{
    buffer.clear();

    match reader.read_line(buffer) {
        Ok(0) => Ok(0),
        Ok(n) => {
            if buffer.ends_with(NEW_LINE) {
                buffer.pop();

                if buffer.ends_with(CARRIAGE_RETURN) {
                    buffer.pop();
                }
            }

            Ok(n)
        }
        Err(e) => Err(e),
    }
}
