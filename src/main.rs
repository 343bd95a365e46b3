use std::io;
use std::process;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::info;

use doopa::dedup;
use doopa::utils::format_duration;
use doopa::{Args, BamSink, BamSource, DiscardSink};

#[cfg(not(windows))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("doopa: {e:#}");
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let total_start = Instant::now();
    let source = BamSource::open(&args.input)?;
    let options = args.dedup_options();

    info!(
        "finding duplicates in {} (key policy: {})",
        source.path().display(),
        options.policy
    );
    let scan_start = Instant::now();
    let scan = dedup::scan(&source, &options)?;
    info!("first pass done in {}", format_duration(scan_start.elapsed()));

    // The report goes out whether or not records are written
    eprint!("{}", scan.report());

    let select_start = Instant::now();
    if args.no_output {
        scan.select(&source, &mut DiscardSink)?;
    } else {
        let mut sink = BamSink::new(io::stdout().lock());
        scan.select(&source, &mut sink)
            .context("writing BAM to standard output")?;
    }
    info!("second pass done in {}", format_duration(select_start.elapsed()));

    info!("done in {}", format_duration(total_start.elapsed()));
    Ok(())
}
