//! Canonical positional signature of a read
//!
//! A signature is the clip-aware genomic footprint of a read and, when the
//! mate is mapped, the footprint of its mate. Reads sharing a signature are
//! duplicates of one another. Derivation is a pure function of the record.
//!
//! Coordinates: `start` is the 1-based unclipped start, `end` is the 1-based
//! inclusive unclipped end and `len = end - start`.

use noodles::sam::alignment::record::cigar::op::Kind;

use crate::record::ReadFields;

/// Largest chromosome id representable in the packed form (9 bits)
pub const MAX_PACKED_CHROM: i64 = (1 << 9) - 1;
/// Largest unclipped start representable in the packed form (31 bits)
pub const MAX_PACKED_START: i64 = (1 << 31) - 1;
/// Largest unclipped length representable in the packed form (24 bits)
pub const MAX_PACKED_LEN: i64 = (1 << 24) - 1;

const CHROM_SHIFT: u32 = 55;
const START_SHIFT: u32 = 24;

/// Unclipped extent of one alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Footprint {
    pub chrom: i32,
    pub start: i64,
    pub len: i64,
}

impl Footprint {
    /// Footprint of an alignment anchored at 0-based `pos0` with the given
    /// clip scan.
    fn anchored(chrom: i32, pos0: i64, scan: ClipScan) -> Self {
        let start = pos0 - scan.leading + 1;
        let end = pos0 + scan.ref_len + scan.trailing;
        Self {
            chrom,
            start,
            len: end - start,
        }
    }

    /// Pack into one 64-bit word: chrom (9 bits) | start (31 bits) | len (24 bits).
    ///
    /// Fields outside `[0, MAX_PACKED_*]` are masked to their low bits and
    /// the second element of the returned tuple is set.
    pub fn pack(&self) -> (u64, bool) {
        let chrom = i64::from(self.chrom);
        let truncated = !(0..=MAX_PACKED_CHROM).contains(&chrom)
            || !(0..=MAX_PACKED_START).contains(&self.start)
            || !(0..=MAX_PACKED_LEN).contains(&self.len);

        let word = ((chrom as u64 & MAX_PACKED_CHROM as u64) << CHROM_SHIFT)
            | ((self.start as u64 & MAX_PACKED_START as u64) << START_SHIFT)
            | (self.len as u64 & MAX_PACKED_LEN as u64);
        (word, truncated)
    }

    pub fn unpack(word: u64) -> Self {
        Self {
            chrom: ((word >> CHROM_SHIFT) & MAX_PACKED_CHROM as u64) as i32,
            start: ((word >> START_SHIFT) & MAX_PACKED_START as u64) as i64,
            len: (word & MAX_PACKED_LEN as u64) as i64,
        }
    }
}

/// Where the mate half of a signature came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MateSource {
    /// Unpaired or mate unmapped; mate fields are zero
    Absent,
    /// Clip-adjusted from the `MC` tag
    MateCigar,
    /// Raw mate position with the read's own raw length
    Approximated,
}

/// Packed two-word form of a signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackedSignature {
    /// Primary word in the high 64 bits, mate word in the low 64 bits
    pub bits: u128,
    /// At least one field did not fit its packed width
    pub truncated: bool,
}

/// Canonical duplicate key of a read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Signature {
    pub primary: Footprint,
    pub mate: Footprint,
}

impl Signature {
    /// Derive the signature of a mapped record.
    pub fn derive(fields: &ReadFields) -> Self {
        Self::derive_with_source(fields).0
    }

    /// Derive the signature and report how its mate half was obtained.
    pub fn derive_with_source(fields: &ReadFields) -> (Self, MateSource) {
        let chrom = fields.reference_sequence_id.map_or(-1, |id| id as i32);
        let pos0 = fields.position.unwrap_or(-1);
        let primary_scan = ClipScan::of_ops(fields.cigar.iter().copied());
        let primary = Footprint::anchored(chrom, pos0, primary_scan);

        let (mate, source) = if fields.has_mapped_mate() {
            let mate_chrom = fields.mate_reference_sequence_id.map_or(-1, |id| id as i32);
            let mate_pos0 = fields.mate_position.unwrap_or(-1);
            match fields.mate_cigar.as_deref().and_then(ClipScan::of_text) {
                Some(scan) => (
                    Footprint::anchored(mate_chrom, mate_pos0, scan),
                    MateSource::MateCigar,
                ),
                None => (
                    Footprint {
                        chrom: mate_chrom,
                        start: mate_pos0 + 1,
                        len: primary_scan.ref_len - 1,
                    },
                    MateSource::Approximated,
                ),
            }
        } else {
            (Footprint::default(), MateSource::Absent)
        };

        (Self { primary, mate }, source)
    }

    /// Pack both footprints into one `u128`.
    pub fn pack(&self) -> PackedSignature {
        let (primary, primary_truncated) = self.primary.pack();
        let (mate, mate_truncated) = self.mate.pack();
        PackedSignature {
            bits: (u128::from(primary) << 64) | u128::from(mate),
            truncated: primary_truncated || mate_truncated,
        }
    }

    pub fn unpack(bits: u128) -> Self {
        Self {
            primary: Footprint::unpack((bits >> 64) as u64),
            mate: Footprint::unpack(bits as u64),
        }
    }
}

/// Leading clip, reference span and trailing clip of a CIGAR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClipScan {
    pub leading: i64,
    pub ref_len: i64,
    pub trailing: i64,
}

impl ClipScan {
    /// Soft/hard clips before the first reference-consuming op are leading,
    /// those after it are trailing.
    pub fn of_ops<I>(ops: I) -> Self
    where
        I: IntoIterator<Item = (Kind, usize)>,
    {
        let mut scan = Self::default();
        let mut saw_ref_op = false;
        for (kind, len) in ops {
            let len = len as i64;
            match kind {
                Kind::SoftClip | Kind::HardClip if saw_ref_op => scan.trailing += len,
                Kind::SoftClip | Kind::HardClip => scan.leading += len,
                Kind::Match
                | Kind::Deletion
                | Kind::Skip
                | Kind::SequenceMatch
                | Kind::SequenceMismatch => {
                    scan.ref_len += len;
                    scan.trailing = 0;
                    saw_ref_op = true;
                }
                Kind::Insertion | Kind::Pad => {}
            }
        }
        scan
    }

    /// Scan CIGAR text such as an `MC` tag value. `None` if malformed.
    pub fn of_text(text: &str) -> Option<Self> {
        parse_cigar_text(text).map(Self::of_ops)
    }
}

/// Parse CIGAR text into (kind, length) runs.
///
/// Returns `None` for empty text, unknown op codes, an op without a length
/// or trailing digits without an op.
pub fn parse_cigar_text(text: &str) -> Option<Vec<(Kind, usize)>> {
    if text.is_empty() {
        return None;
    }

    let mut ops = Vec::with_capacity(4);
    let mut len: Option<usize> = None;
    for b in text.bytes() {
        if b.is_ascii_digit() {
            let digit = usize::from(b - b'0');
            len = Some(len.unwrap_or(0).checked_mul(10)?.checked_add(digit)?);
            continue;
        }
        let kind = match b {
            b'M' => Kind::Match,
            b'I' => Kind::Insertion,
            b'D' => Kind::Deletion,
            b'N' => Kind::Skip,
            b'S' => Kind::SoftClip,
            b'H' => Kind::HardClip,
            b'P' => Kind::Pad,
            b'=' => Kind::SequenceMatch,
            b'X' => Kind::SequenceMismatch,
            _ => return None,
        };
        ops.push((kind, len.take()?));
    }

    if len.is_some() { None } else { Some(ops) }
}
