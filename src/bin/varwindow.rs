//! A command line interface for inspecting variant windows.
//!
//! ```shell
//! cargo run --release --bin=varwindow --features=binaries -- \
//!     plan cohort.pvar --samples cohort.psam --budget 64MiB chr1:+:0-1000000
//! ```
//!
//! Regions are given as interbase intervals on the positive strand (e.g.,
//! `chr1:+:100-200`), which matches the 0-based, half-open coordinates used
//! throughout `varwindow`.

use std::path::PathBuf;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use clap_verbosity_flag::Verbosity;
use omics::coordinate::interval::interbase::Interval;
use omics::coordinate::Strand;
use tracing::info;
use tracing_log::AsTrace as _;
use tracing_subscriber::EnvFilter;
use varwindow::budget::Budget;
use varwindow::chunk;
use varwindow::contig::Normalizer;
use varwindow::data::PLOIDY;
use varwindow::index;
use varwindow::index::CachePolicy;
use varwindow::index::Index;
use varwindow::index::Variant;
use varwindow::manifest::sample;
use varwindow::mode::Mode;
use varwindow::range;

////////////////////////////////////////////////////////////////////////////////////////
// Regions
////////////////////////////////////////////////////////////////////////////////////////

/// A region on a contig.
struct Region {
    /// The region as it was given.
    name: String,

    /// The contig, as named by the user.
    contig: String,

    /// The 0-based start.
    start: u64,

    /// The 0-based, exclusive end.
    end: u64,
}

impl Region {
    /// Parses a region from a positive-stranded interbase interval.
    fn try_new(value: &str) -> Result<Self> {
        let interval = value
            .parse::<Interval>()
            .with_context(|| format!("parsing region `{value}`"))?;

        if interval.strand() != Strand::Positive {
            bail!("region `{value}` must be on the positive strand");
        }

        Ok(Self {
            name: value.to_string(),
            contig: interval.contig().as_str().to_string(),
            start: interval.start().position().get(),
            end: interval.end().position().get(),
        })
    }
}

/// Parses every region and normalizes its contig to the naming convention of
/// the index.
///
/// Regions on contigs the index does not hold are kept with their original
/// contig name, which resolves to no variants.
fn regions(index: &Index, values: &[String]) -> Result<Vec<Region>> {
    let normalizer = Normalizer::new(index.contigs());

    values
        .iter()
        .map(|value| {
            let mut region = Region::try_new(value)?;
            if let Some(contig) = normalizer.norm(&region.contig) {
                region.contig = contig.to_string();
            }
            Ok(region)
        })
        .collect()
}

////////////////////////////////////////////////////////////////////////////////////////
// Main
////////////////////////////////////////////////////////////////////////////////////////

/// What to do with an existing index cache.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Policy {
    /// Load an existing cache as is.
    Trust,

    /// Always rebuild the cache.
    Rebuild,

    /// Rebuild the cache when the manifest is newer.
    CheckModified,
}

impl From<Policy> for CachePolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::Trust => CachePolicy::Trust,
            Policy::Rebuild => CachePolicy::Rebuild,
            Policy::CheckModified => CachePolicy::CheckModified,
        }
    }
}

/// The subcommands.
#[derive(Subcommand)]
enum Command {
    /// Builds (or loads) the index for a variant manifest and summarizes it.
    Index,

    /// Counts the variants overlapping each region.
    Count {
        /// The regions (e.g., `chr1:+:100-200`).
        #[arg(required = true)]
        regions: Vec<String>,
    },

    /// Lists the variant indices overlapping each region.
    Resolve {
        /// The regions (e.g., `chr1:+:100-200`).
        #[arg(required = true)]
        regions: Vec<String>,
    },

    /// Reports how each region would be split into chunks.
    Plan {
        /// The sample manifest (`.psam` or `.fam`).
        #[arg(short, long)]
        samples: PathBuf,

        /// The memory budget per chunk (e.g., `512MiB` or `4g`).
        #[arg(short, long, default_value = "1g")]
        budget: Budget,

        /// The mode to read in.
        #[arg(short, long, default_value = "genotypes")]
        mode: Mode,

        /// The regions (e.g., `chr1:+:100-200`).
        #[arg(required = true)]
        regions: Vec<String>,
    },
}

/// Inspects the variants of a `.pvar` or `.bim` manifest.
#[derive(Parser)]
struct Args {
    /// The variant manifest (`.pvar` or `.bim`).
    manifest: PathBuf,

    /// What to do with an existing index cache.
    #[arg(short, long, value_enum, default_value_t = Policy::CheckModified)]
    policy: Policy,

    /// Excludes multi-allelic variants.
    #[arg(long, default_value_t = false)]
    biallelic_only: bool,

    /// The subcommand.
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    verbose: Verbosity,
}

fn main() -> Result<()> {
    let args = Args::parse();

    match std::env::var("RUST_LOG") {
        Ok(_) => tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .init(),
        Err(_) => tracing_subscriber::fmt()
            .with_max_level(args.verbose.log_level_filter().as_trace())
            .init(),
    };

    run(args)
}

fn run(args: Args) -> Result<()> {
    let mut builder = index::Builder::default().cache_policy(args.policy.into());

    if args.biallelic_only {
        builder = builder.filter(Box::new(|variant: &Variant| !variant.is_multiallelic()));
    }

    info!("varwindow: loading index for {}", args.manifest.display());
    let index = builder
        .try_build_from_path(&args.manifest)
        .with_context(|| format!("building the index for {}", args.manifest.display()))?;

    match args.command {
        Command::Index => summarize(&index),
        Command::Count { regions: values } => {
            for region in regions(&index, &values)? {
                let counts = range::count(&index, &region.contig, &[region.start], &[region.end])
                    .context("counting variants")?;
                println!("{}\t{}", region.name, counts[0]);
            }
        }
        Command::Resolve { regions: values } => {
            for region in regions(&index, &values)? {
                let resolved =
                    range::resolve(&index, &region.contig, &[region.start], &[region.end])
                        .context("resolving variants")?;
                let indices = resolved
                    .indices()
                    .iter()
                    .map(|i| i.to_string())
                    .collect::<Vec<_>>();
                println!("{}\t{}", region.name, indices.join(","));
            }
        }
        Command::Plan {
            samples,
            budget,
            mode,
            regions: values,
        } => {
            let ids = sample::read_ids_from_path(&samples)
                .with_context(|| format!("reading samples from {}", samples.display()))?;
            let per_variant = mode.bytes_per_variant(ids.len(), PLOIDY);

            println!(
                "{} samples, {} per variant in mode `{mode}`, budget {budget}",
                ids.len(),
                Budget::new(per_variant as u64)
            );

            for region in regions(&index, &values)? {
                let counts = range::count(&index, &region.contig, &[region.start], &[region.end])
                    .context("counting variants")?;
                let n_variants = counts[0];
                let vars_per_chunk = chunk::plan(budget, per_variant, n_variants)
                    .context("planning chunks")?;
                let n_chunks = n_variants.div_ceil(vars_per_chunk.max(1));

                println!(
                    "{}\t{n_variants} variants\t{vars_per_chunk} per chunk\t{n_chunks} chunks",
                    region.name
                );
            }
        }
    }

    Ok(())
}

/// Prints a summary of every contig in the index.
fn summarize(index: &Index) {
    println!(
        "{} variants ({} active) across {} contigs",
        index.len(),
        index.n_active(),
        index.contigs().len()
    );

    for (id, contig) in index.contigs().iter().enumerate() {
        let active = index.active_indices(id as u32);
        let span = match (active.first(), active.last()) {
            (Some(&first), Some(&last)) => index
                .variant(first)
                .zip(index.variant(last))
                .map(|(first, last)| format!("{}-{}", first.start(), last.end())),
            _ => None,
        };

        println!(
            "{contig}\t{}\t{}",
            active.len(),
            span.as_deref().unwrap_or("-")
        );
    }

    if !index.supports_length_metadata() {
        println!("multi-allelic variants are active; haplotype lengths are unavailable");
    }
}
