//! Prints the windows of a region for a cohort in which every haplotype
//! carries every alternate allele, which shows how far insertions and
//! deletions push the end of each window.
//!
//! ```shell
//! cargo run --example window -- cohort.pvar cohort.psam chr1:1000-2000 64KiB
//! ```

use std::env;

use varwindow::budget::Budget;
use varwindow::decode::Memory;
use varwindow::index;
use varwindow::index::Variant;
use varwindow::manifest::sample;
use varwindow::mode::Mode;
use varwindow::reader::Builder;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let manifest = env::args().nth(1).expect("missing variant manifest");
    let samples = env::args().nth(2).expect("missing sample manifest");
    let region = env::args().nth(3).expect("missing region");
    let budget = env::args()
        .nth(4)
        .unwrap_or_else(|| String::from("1g"))
        .parse::<Budget>()?;

    let (contig, span) = region.split_once(':').expect("region must be `contig:start-end`");
    let (start, end) = span.split_once('-').expect("region must be `contig:start-end`");
    let (start, end) = (start.parse::<u64>()?, end.parse::<u64>()?);

    let index = index::Builder::default()
        .filter(Box::new(|variant: &Variant| !variant.is_multiallelic()))
        .try_build_from_path(&manifest)?;
    let ids = sample::read_ids_from_path(&samples)?;

    let n_variants = index.len();
    let decoder = Memory::new(ids.len(), n_variants)
        .with_genotypes(vec![1; n_variants * ids.len() * 2])?
        .with_phasing(vec![true; n_variants * ids.len()])?;

    let mut reader = Builder::default()
        .index(index)?
        .samples(ids)?
        .genotypes(decoder)?
        .try_build()?;

    let mut ranges = reader.chunk_ranges_with_length(
        contig,
        &[start],
        &[end],
        budget,
        Mode::GenotypesPhasing,
    )?;

    while let Some(range) = ranges.next_range() {
        let windows = match range {
            Some(windows) => windows,
            None => {
                println!("No variants in {region}.");
                continue;
            }
        };

        for result in windows {
            let window = result?;
            let indices = window.indices();

            print!(
                "variants {}-{} ({} total) end at {}",
                indices.first(),
                indices.last(),
                indices.len(),
                window.end()
            );

            match window.lengths() {
                Some(lengths) => {
                    let shortest = lengths.iter().min().copied().unwrap_or_default();
                    println!(", shortest haplotype is {shortest} bp");
                }
                None => println!(),
            }
        }
    }

    reader.close()?;

    Ok(())
}
