//! doopa - two-pass duplicate read removal for indexed BAM files
//!
//! Every mapped primary read gets a clip- and mate-aware positional
//! signature. The first pass keeps, per signature, the read with the highest
//! sum of base qualities; the second pass writes those winners together with
//! every unmapped, secondary, supplementary and QC-failed record, in input
//! order. Read counters and a fragment-size summary are reported along the
//! way.
//!
//! # Example
//!
//! ```ignore
//! use doopa::{BamSource, DedupOptions, DiscardSink, dedup};
//!
//! let source = BamSource::open("input.bam")?;
//! let scan = dedup::scan(&source, &DedupOptions::default())?;
//! eprint!("{}", scan.report());
//! scan.select(&source, &mut DiscardSink)?;
//! ```

pub mod args;
pub mod dedup;
pub mod error;
pub mod io;
pub mod policy;
pub mod record;
pub mod signature;
pub mod stats;
pub mod table;
pub mod utils;

// Re-export commonly used items
pub use args::Args;
pub use dedup::{DedupOptions, Scan, Selection};
pub use error::DedupError;
pub use io::{BamSink, BamSource, DiscardSink, MemorySource, RecordSink, RecordSource};
pub use policy::KeyPolicy;
pub use signature::Signature;
pub use stats::{Report, StatsConfig};
