//! Alignment record field extraction
//!
//! The engine only needs a handful of fields per record. They are pulled
//! out through the generic noodles alignment record trait so that raw BAM
//! records and `RecordBuf`s go through one code path.

use std::io;

use noodles::sam;
use noodles::sam::alignment::Record;
use noodles::sam::alignment::record::Flags;
use noodles::sam::alignment::record::cigar::op::Kind;
use noodles::sam::alignment::record::data::field::{Tag, Value};

/// BAM stores 0xFF for every base when qualities are absent
pub const MISSING_QUALITY: u8 = 0xFF;

/// Threshold for the high-quality base tally
pub const Q30: u8 = 30;

/// The subset of an alignment record the deduplication engine reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadFields {
    pub flags: Flags,
    pub reference_sequence_id: Option<usize>,
    /// 0-based leftmost aligned position
    pub position: Option<i64>,
    pub cigar: Vec<(Kind, usize)>,
    pub mate_reference_sequence_id: Option<usize>,
    /// 0-based leftmost aligned position of the mate
    pub mate_position: Option<i64>,
    /// Raw text of the `MC` tag, if present
    pub mate_cigar: Option<String>,
    pub mapping_quality: Option<u8>,
    pub template_length: i32,
    pub quality_sum: u64,
    pub q30_bases: u64,
    pub bases: u64,
}

impl ReadFields {
    /// Extract fields from any noodles alignment record
    pub fn from_record<R>(header: &sam::Header, record: &R) -> io::Result<Self>
    where
        R: Record + ?Sized,
    {
        let flags = record.flags()?;
        let reference_sequence_id = record.reference_sequence_id(header).transpose()?;
        let position = record
            .alignment_start()
            .transpose()?
            .map(|p| usize::from(p) as i64 - 1);

        let cigar = record
            .cigar()
            .iter()
            .map(|result| result.map(|op| (op.kind(), op.len())))
            .collect::<io::Result<Vec<_>>>()?;

        let mate_reference_sequence_id = record.mate_reference_sequence_id(header).transpose()?;
        let mate_position = record
            .mate_alignment_start()
            .transpose()?
            .map(|p| usize::from(p) as i64 - 1);
        let mate_cigar = mate_cigar_tag(record)?;

        let mapping_quality = record.mapping_quality().transpose()?.map(|mq| mq.get());
        let template_length = record.template_length()?;

        let mut quality_sum = 0u64;
        let mut q30_bases = 0u64;
        for q in record.quality_scores().iter() {
            let q = q?;
            if q == MISSING_QUALITY {
                continue;
            }
            quality_sum += u64::from(q);
            if q >= Q30 {
                q30_bases += 1;
            }
        }

        Ok(Self {
            flags,
            reference_sequence_id,
            position,
            cigar,
            mate_reference_sequence_id,
            mate_position,
            mate_cigar,
            mapping_quality,
            template_length,
            quality_sum,
            q30_bases,
            bases: record.sequence().len() as u64,
        })
    }

    /// Whether the record takes part in duplicate detection at all.
    ///
    /// Unmapped, secondary, supplementary and QC-failed records bypass the
    /// table and are always passed through.
    #[inline]
    pub fn is_primary_mapped(&self) -> bool {
        let f = self.flags;
        !(f.is_unmapped() || f.is_secondary() || f.is_supplementary() || f.is_qc_fail())
    }

    /// Paired with a mapped mate
    #[inline]
    pub fn has_mapped_mate(&self) -> bool {
        self.flags.is_segmented() && !self.flags.is_mate_unmapped()
    }

    /// Proper pair with a positive insert size and a mapping quality
    /// strictly above `min_mapq`. Only the leftmost mate of a pair has a
    /// positive insert size, so each fragment qualifies once.
    #[inline]
    pub fn is_confidently_paired(&self, min_mapq: u8) -> bool {
        self.flags.is_properly_segmented()
            && self.template_length > 0
            && self.mapping_quality.is_some_and(|mq| mq > min_mapq)
    }
}

fn mate_cigar_tag<R>(record: &R) -> io::Result<Option<String>>
where
    R: Record + ?Sized,
{
    match record.data().get(&Tag::MATE_CIGAR).transpose()? {
        Some(Value::String(s)) => {
            let text = s.to_string();
            if text.is_empty() || text == "*" {
                Ok(None)
            } else {
                Ok(Some(text))
            }
        }
        _ => Ok(None),
    }
}
