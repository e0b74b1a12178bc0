//! `varwindow` is a crate for range-indexed, memory-bounded access to
//! per-variant genotype stores.
//!
//! The crate provides three main facilities:
//!
//! - Mapping genomic coordinate ranges to compact, ordered sets of variant
//!   indices via a [variant index](crate::index::Index) built from (and
//!   cached next to) a `.pvar` or `.bim` manifest.
//! - Splitting those indices into chunks that each fit within a caller's
//!   [memory budget](crate::budget::Budget), decoded in one of several output
//!   [modes](crate::mode::Mode).
//! - Extending the last chunk of a window so that every haplotype realizes at
//!   least the requested length, which differs from the nominal span of the
//!   window whenever insertions or deletions are present.
//!
//! The bit-level decoding of stored values sits behind the
//! [`Decode`](crate::decode::Decode) trait. The crate ships an in-memory
//! implementation, [`decode::Memory`], for callers that already hold decoded
//! matrices.
//!
//! ## Sessions
//!
//! Most users will interact with a [`Reader`], which ties an
//! [`Index`](crate::index::Index), a [sample
//! selection](crate::samples::Samples), and two decoders together. A
//! [`Reader`] cannot be instantiated directly. Instead, you should use
//! [`reader::Builder`] and the associated [`reader::Builder::try_build()`]
//! method to construct one.
//!
//! Contig names are normalized to the dataset's convention, so `1` and
//! `chr1` refer to the same contig. Coordinates are 0-based and half-open.
//!
//! ```
//! use varwindow::budget::Budget;
//! use varwindow::decode::Memory;
//! use varwindow::index::Index;
//! use varwindow::index::Variant;
//! use varwindow::mode::Mode;
//! use varwindow::reader::Builder;
//!
//! let index = Index::try_new(
//!     vec![String::from("chr1")],
//!     vec![
//!         Variant::new(0, 0, 100, 101, 0, 1),
//!         Variant::new(1, 0, 150, 160, -9, 1),
//!         Variant::new(2, 0, 200, 201, 0, 1),
//!     ],
//! )?;
//!
//! // Two samples, laid out as variants x samples x haplotypes.
//! let decoder = Memory::new(2, 3)
//!     .with_genotypes(vec![0, 0, 1, 1, 1, 0, 0, 0, 0, 1, 1, 0])?
//!     .with_phasing(vec![true; 6])?;
//!
//! let mut reader = Builder::default()
//!     .index(index)?
//!     .samples(vec![String::from("a"), String::from("b")])?
//!     .genotypes(decoder)?
//!     .try_build()?;
//!
//! assert_eq!(reader.count("1", &[90], &[155])?, vec![2]);
//!
//! reader.set_samples(Some(&["b"][..]))?;
//! let mut ranges =
//!     reader.chunk_ranges("1", &[90], &[155], Budget::new(1 << 20), Mode::Genotypes)?;
//!
//! while let Some(range) = ranges.next_range() {
//!     for result in range.into_iter().flatten() {
//!         let data = result?;
//!         assert_eq!(data.genotypes().unwrap().haplotype(0, 0), &[1, 0]);
//!     }
//! }
//!
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Building an index
//!
//! Indexes are built from a variant manifest with an [`index::Builder`]. The
//! first build writes a compressed cache next to the manifest, and later
//! builds load that cache according to the configured
//! [`CachePolicy`](crate::index::CachePolicy).

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]
#![warn(missing_debug_implementations)]
#![warn(clippy::missing_docs_in_private_items)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod budget;
pub mod chunk;
pub mod contig;
pub mod data;
pub mod decode;
pub mod index;
pub mod manifest;
pub mod mode;
pub mod range;
pub mod reader;
pub mod samples;
pub mod window;

pub use self::reader::Reader;
