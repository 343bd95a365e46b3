//! BAM record sources and sinks
//!
//! A [`RecordSource`] must yield the same records in the same order every
//! time [`RecordSource::records`] is called; the two-pass engine identifies
//! winners by their position in that order.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::debug;
use noodles::bam;
use noodles::bam::bai;
use noodles::bgzf;
use noodles::csi::BinningIndex;
use noodles::csi::binning_index::ReferenceSequence as _;
use noodles::sam;
use noodles::sam::alignment::RecordBuf;
use noodles::sam::alignment::io::Write as AlignmentWrite;

use crate::error::{DedupError, Result};

type BamReader = bam::io::Reader<bgzf::io::Reader<File>>;

pub type RecordIter<'a, R> = Box<dyn Iterator<Item = io::Result<R>> + 'a>;

/// Repeatable, order-stable alignment record stream
pub trait RecordSource {
    type Record: sam::alignment::Record;

    fn header(&self) -> &sam::Header;

    /// Start a fresh traversal from the first record.
    fn records(&self) -> Result<RecordIter<'_, Self::Record>>;

    /// Number of records the source expects to yield, if known
    fn expected_records(&self) -> Option<u64> {
        None
    }
}

/// Indexed BAM file on disk
///
/// The header and index are loaded once; every traversal reopens the file.
pub struct BamSource {
    path: PathBuf,
    header: sam::Header,
    expected_records: Option<u64>,
}

impl BamSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let mut reader = open_reader(&path)?;
        let header = reader.read_header().map_err(|source| DedupError::Header {
            path: path.clone(),
            source,
        })?;

        let index_path = index_path(&path);
        let index = bai::fs::read(&index_path).map_err(|source| DedupError::MissingIndex {
            path: index_path.clone(),
            source,
        })?;
        let expected_records = indexed_record_count(&index);
        debug!(
            "loaded index {} ({} records expected)",
            index_path.display(),
            expected_records.map_or_else(|| "unknown".to_string(), |n| n.to_string())
        );

        Ok(Self {
            path,
            header,
            expected_records,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSource for BamSource {
    type Record = bam::Record;

    fn header(&self) -> &sam::Header {
        &self.header
    }

    fn records(&self) -> Result<RecordIter<'_, bam::Record>> {
        let mut reader = open_reader(&self.path)?;
        reader.read_header().map_err(|source| DedupError::Header {
            path: self.path.clone(),
            source,
        })?;
        Ok(Box::new(BamRecords { reader }))
    }

    fn expected_records(&self) -> Option<u64> {
        self.expected_records
    }
}

fn open_reader(path: &Path) -> Result<BamReader> {
    let file = File::open(path).map_err(|source| DedupError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(bam::io::Reader::from(bgzf::io::Reader::new(file)))
}

/// `<input>.bai` if present, else `<input stem>.bai`, else `<input>.bai`
/// so the error names the conventional location.
pub fn index_path(path: &Path) -> PathBuf {
    let mut appended = path.as_os_str().to_owned();
    appended.push(".bai");
    let appended = PathBuf::from(appended);
    if appended.exists() {
        return appended;
    }
    let replaced = path.with_extension("bai");
    if replaced.exists() { replaced } else { appended }
}

/// Total records recorded in the index metadata pseudo-bins
fn indexed_record_count(index: &bai::Index) -> Option<u64> {
    let mut seen = false;
    let mut total = 0u64;
    for reference_sequence in index.reference_sequences() {
        if let Some(metadata) = reference_sequence.metadata() {
            seen = true;
            total += metadata.mapped_record_count() + metadata.unmapped_record_count();
        }
    }
    if let Some(n) = index.unplaced_unmapped_record_count() {
        seen = true;
        total += n;
    }
    seen.then_some(total)
}

struct BamRecords {
    reader: BamReader,
}

impl Iterator for BamRecords {
    type Item = io::Result<bam::Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut record = bam::Record::default();
        match self.reader.read_record(&mut record) {
            Ok(0) => None,
            Ok(_) => Some(Ok(record)),
            Err(e) => Some(Err(e)),
        }
    }
}

/// In-memory record list
pub struct MemorySource {
    header: sam::Header,
    records: Vec<RecordBuf>,
}

impl MemorySource {
    pub fn new(header: sam::Header, records: Vec<RecordBuf>) -> Self {
        Self { header, records }
    }
}

impl RecordSource for MemorySource {
    type Record = RecordBuf;

    fn header(&self) -> &sam::Header {
        &self.header
    }

    fn records(&self) -> Result<RecordIter<'_, RecordBuf>> {
        Ok(Box::new(self.records.iter().cloned().map(Ok)))
    }

    fn expected_records(&self) -> Option<u64> {
        Some(self.records.len() as u64)
    }
}

/// Destination for the records that survive deduplication
pub trait RecordSink<R> {
    fn write_header(&mut self, header: &sam::Header) -> io::Result<()>;

    fn write_record(&mut self, header: &sam::Header, record: &R) -> io::Result<()>;

    /// Flush and terminate the stream. Later writes fail.
    fn finish(&mut self) -> io::Result<()>;
}

/// BGZF-compressed BAM writer
pub struct BamSink<W: Write> {
    writer: Option<bam::io::Writer<bgzf::io::Writer<W>>>,
    finished: Option<W>,
}

impl<W: Write> BamSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: Some(bam::io::Writer::new(inner)),
            finished: None,
        }
    }

    /// The underlying writer, once the stream has been finished
    pub fn into_inner(self) -> Option<W> {
        self.finished
    }

    fn writer(&mut self) -> io::Result<&mut bam::io::Writer<bgzf::io::Writer<W>>> {
        self.writer
            .as_mut()
            .ok_or_else(|| io::Error::other("BAM writer already finished"))
    }
}

impl<W, R> RecordSink<R> for BamSink<W>
where
    W: Write,
    R: sam::alignment::Record,
{
    fn write_header(&mut self, header: &sam::Header) -> io::Result<()> {
        self.writer()?.write_header(header)
    }

    fn write_record(&mut self, header: &sam::Header, record: &R) -> io::Result<()> {
        self.writer()?.write_alignment_record(header, record)
    }

    fn finish(&mut self) -> io::Result<()> {
        if let Some(writer) = self.writer.take() {
            let mut inner = writer.into_inner().finish()?;
            inner.flush()?;
            self.finished = Some(inner);
        }
        Ok(())
    }
}

/// Drops every record; used when only the report is wanted
#[derive(Debug, Default)]
pub struct DiscardSink;

impl<R> RecordSink<R> for DiscardSink {
    fn write_header(&mut self, _header: &sam::Header) -> io::Result<()> {
        Ok(())
    }

    fn write_record(&mut self, _header: &sam::Header, _record: &R) -> io::Result<()> {
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Keeps written records in memory
#[derive(Debug)]
pub struct CollectSink<R> {
    pub header: Option<sam::Header>,
    pub records: Vec<R>,
    pub finished: bool,
}

impl<R> Default for CollectSink<R> {
    fn default() -> Self {
        Self {
            header: None,
            records: Vec::new(),
            finished: false,
        }
    }
}

impl<R: Clone> RecordSink<R> for CollectSink<R> {
    fn write_header(&mut self, header: &sam::Header) -> io::Result<()> {
        self.header = Some(header.clone());
        Ok(())
    }

    fn write_record(&mut self, _header: &sam::Header, record: &R) -> io::Result<()> {
        self.records.push(record.clone());
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.finished = true;
        Ok(())
    }
}
