//! Two-pass duplicate removal
//!
//! Pass 1 ([`scan`]) walks the source once, tallies statistics and keeps, per
//! signature, the ordinal of the record with the highest quality-sum (ties go
//! to the earliest). Pass 2 ([`Scan::select`]) walks the source again and
//! writes every unmapped/secondary/supplementary/QC-failed record plus the
//! mapped records whose ordinal is the stored winner. Signatures are derived
//! afresh in each pass.

use log::{debug, info, warn};

use crate::error::{DedupError, Result};
use crate::io::{RecordSink, RecordSource};
use crate::policy::KeyPolicy;
use crate::record::ReadFields;
use crate::signature::{MateSource, Signature};
use crate::stats::{Report, Statistics, StatsConfig};
use crate::table::DuplicateTable;
use crate::utils::describe_reference;

const PROGRESS_INTERVAL: u64 = 1_000_000;

#[derive(Debug, Clone, Copy, Default)]
pub struct DedupOptions {
    pub policy: KeyPolicy,
    pub stats: StatsConfig,
    /// Overrides the source's expected record count when sizing the table
    pub capacity_hint: Option<usize>,
}

/// Result of the first pass; the table is frozen from here on
pub struct Scan {
    table: DuplicateTable,
    stats: Statistics,
}

/// Outcome of the second pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    pub written: u64,
    pub dropped: u64,
    /// Records emitted without a signature check
    pub passed_through: u64,
}

/// Pass 1: build the duplicate table and collect statistics.
pub fn scan<S: RecordSource>(source: &S, options: &DedupOptions) -> Result<Scan> {
    let header = source.header();
    let capacity = options
        .capacity_hint
        .or_else(|| source.expected_records().map(|n| n as usize))
        .unwrap_or(0);
    debug!("sizing duplicate table for {capacity} records");

    let mut table = DuplicateTable::new(options.policy, capacity);
    let mut stats = Statistics::new(options.stats);
    let mut current_reference: Option<Option<usize>> = None;

    for (ordinal, result) in source.records()?.enumerate() {
        let ordinal = ordinal as u64;
        let record = result.map_err(|source| DedupError::Read { ordinal, source })?;
        let fields = ReadFields::from_record(header, &record)
            .map_err(|source| DedupError::Read { ordinal, source })?;

        stats.counters.total_reads += 1;
        if ordinal > 0 && ordinal % PROGRESS_INTERVAL == 0 {
            debug!("  scanned {ordinal} records");
        }
        if !fields.is_primary_mapped() {
            continue;
        }

        if current_reference != Some(fields.reference_sequence_id) {
            current_reference = Some(fields.reference_sequence_id);
            debug!(
                "  scanning {}",
                describe_reference(header, fields.reference_sequence_id)
            );
        }

        stats.observe_mapped(&fields);
        let (sig, mate) = Signature::derive_with_source(&fields);
        if mate == MateSource::Approximated {
            stats.counters.mates_approximated += 1;
        }
        if table.observe(&sig, ordinal, fields.quality_sum).is_duplicate() {
            stats.counters.duplicate_reads += 1;
        }
    }

    if table.truncated_keys() > 0 {
        warn!(
            "{} keys exceeded the packed field widths and lost precision",
            table.truncated_keys()
        );
    }
    info!(
        "scanned {} records, {} distinct signatures, {} duplicates",
        stats.counters.total_reads,
        table.len(),
        stats.counters.duplicate_reads
    );

    Ok(Scan { table, stats })
}

impl Scan {
    pub fn report(&self) -> Report {
        Report {
            policy: self.table.policy(),
            counters: self.stats.counters,
            distinct_signatures: self.table.len() as u64,
            truncated_keys: self.table.truncated_keys(),
            fragments: self.stats.summarize(),
        }
    }

    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    pub fn table(&self) -> &DuplicateTable {
        &self.table
    }

    /// Pass 2: emit winners and pass-through records in source order.
    ///
    /// Consumes the scan; the table is dropped once selection ends.
    ///
    /// Records are written as they are read. If the source turns out to be
    /// shorter or longer than in the first pass, the error is raised after
    /// the last record and the sink is left unfinished, so a BAM sink holds
    /// a stream without its EOF marker.
    pub fn select<S, W>(self, source: &S, sink: &mut W) -> Result<Selection>
    where
        S: RecordSource,
        W: RecordSink<S::Record>,
    {
        let header = source.header();
        sink.write_header(header).map_err(DedupError::Write)?;

        let mut selection = Selection::default();
        let mut seen = 0u64;

        for (ordinal, result) in source.records()?.enumerate() {
            let ordinal = ordinal as u64;
            let record = result.map_err(|source| DedupError::Read { ordinal, source })?;
            let fields = ReadFields::from_record(header, &record)
                .map_err(|source| DedupError::Read { ordinal, source })?;
            seen += 1;

            let keep = if fields.is_primary_mapped() {
                let sig = Signature::derive(&fields);
                let winner = self.table.winner(&sig).ok_or_else(|| {
                    DedupError::SourceChanged(format!(
                        "record {ordinal} has a signature the first pass never saw"
                    ))
                })?;
                winner.ordinal == ordinal
            } else {
                selection.passed_through += 1;
                true
            };

            if keep {
                sink.write_record(header, &record).map_err(DedupError::Write)?;
                selection.written += 1;
            } else {
                selection.dropped += 1;
            }
        }

        if seen != self.stats.counters.total_reads {
            return Err(DedupError::SourceChanged(format!(
                "first pass read {} records, second pass read {seen}",
                self.stats.counters.total_reads
            )));
        }

        sink.finish().map_err(DedupError::Write)?;
        info!(
            "wrote {} records, dropped {} duplicates",
            selection.written, selection.dropped
        );
        Ok(selection)
    }
}

/// Run both passes back to back.
pub fn run<S, W>(source: &S, sink: &mut W, options: &DedupOptions) -> Result<(Report, Selection)>
where
    S: RecordSource,
    W: RecordSink<S::Record>,
{
    let scan = scan(source, options)?;
    let report = scan.report();
    let selection = scan.select(source, sink)?;
    Ok((report, selection))
}
