// Command-line argument parsing
use std::path::PathBuf;

use clap::Parser;

use crate::dedup::DedupOptions;
use crate::policy::KeyPolicy;
use crate::stats::{
    DEFAULT_BIN_WIDTH, DEFAULT_MAX_INSERT_SIZE, DEFAULT_MIN_MAPQ, MAX_INSERT_SIZE_LIMIT, StatsConfig,
};

#[derive(Parser, Debug)]
#[command(
    name = "doopa",
    about = "Remove duplicate reads from an indexed, coordinate-sorted BAM"
)]
pub struct Args {
    /// Indexed BAM file; the index is looked up as <INPUT>.bai
    pub input: PathBuf,
    /// Run both passes and print the report, but write no records
    #[arg(short = 'n', long)]
    pub no_output: bool,
    #[arg(short = 'k', long, value_enum, default_value_t = KeyPolicy::Identity)]
    pub key_policy: KeyPolicy,
    /// Fragment histogram bin width
    #[arg(long, default_value_t = DEFAULT_BIN_WIDTH, value_parser = clap::value_parser!(u32).range(1..))]
    pub bin_width: u32,
    /// Fragment sizes above this land in the last bin
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_INSERT_SIZE,
        value_parser = clap::value_parser!(u32).range(..=i64::from(MAX_INSERT_SIZE_LIMIT))
    )]
    pub max_insert_size: u32,
    /// Pairs need a mapping quality above this to enter the histogram
    #[arg(long, default_value_t = DEFAULT_MIN_MAPQ)]
    pub min_mapq: u8,
    /// Pre-size the duplicate table for this many reads instead of the index count
    #[arg(long)]
    pub expected_reads: Option<usize>,
}

impl Args {
    pub fn dedup_options(&self) -> DedupOptions {
        DedupOptions {
            policy: self.key_policy,
            stats: StatsConfig {
                bin_width: self.bin_width,
                max_insert_size: self.max_insert_size,
                min_mapping_quality: self.min_mapq,
            },
            capacity_hint: self.expected_reads,
        }
    }
}
