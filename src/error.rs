//! Fatal error kinds
//!
//! Every variant aborts the run. Nothing is retried.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DedupError {
    #[error("can't open \"{}\"", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot open bam index \"{}\"", path.display())]
    MissingIndex {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("reading headers from \"{}\" failed", path.display())]
    Header {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("reading record {ordinal} failed")]
    Read {
        ordinal: u64,
        #[source]
        source: io::Error,
    },

    #[error("writing records failed")]
    Write(#[source] io::Error),

    #[error("input changed between passes: {0}")]
    SourceChanged(String),
}

pub type Result<T> = std::result::Result<T, DedupError>;
