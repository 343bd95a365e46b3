//! End-to-end runs over an indexed BAM on disk

use std::fs::File;
use std::path::{Path, PathBuf};

use bstr::BString;
use doopa::dedup::{self, DedupOptions};
use doopa::{BamSink, BamSource, DiscardSink, KeyPolicy, RecordSource};
use noodles::bam;
use noodles::bam::bai;
use noodles::core::Position;
use noodles::sam;
use noodles::sam::alignment::RecordBuf;
use noodles::sam::alignment::io::Write as AlignmentWrite;
use noodles::sam::alignment::record::cigar::Op;
use noodles::sam::alignment::record::cigar::op::Kind;
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record_buf::data::field::Value;
use noodles::sam::alignment::record::{Flags, MappingQuality};
use noodles::sam::alignment::record_buf::{Cigar, QualityScores, Sequence};
use tempfile::TempDir;

fn header() -> sam::Header {
    "@HD\tVN:1.6\tSO:coordinate\n@SQ\tSN:chr1\tLN:100000\n"
        .parse()
        .unwrap()
}

fn read(name: &str, pos0: Option<usize>, cigar: Vec<Op>, quality: u8) -> RecordBuf {
    let mut builder = RecordBuf::builder()
        .set_name(BString::from(name))
        .set_sequence(Sequence::from(vec![b'A'; 100]))
        .set_quality_scores(QualityScores::from(vec![quality; 100]));
    builder = match pos0 {
        Some(pos0) => builder
            .set_flags(Flags::empty())
            .set_reference_sequence_id(0)
            .set_alignment_start(Position::try_from(pos0 + 1).unwrap())
            .set_mapping_quality(MappingQuality::new(60).unwrap())
            .set_cigar(Cigar::from(cigar)),
        None => builder.set_flags(Flags::UNMAPPED),
    };
    builder.build()
}

/// One mate of a proper pair on chr1, carrying the other mate's CIGAR in `MC`
fn mate(name: &str, pos0: usize, mate_pos0: usize, template_length: i32, mate_cigar: &str) -> RecordBuf {
    let mut record = RecordBuf::builder()
        .set_name(BString::from(name))
        .set_flags(Flags::SEGMENTED | Flags::PROPERLY_SEGMENTED)
        .set_reference_sequence_id(0)
        .set_alignment_start(Position::try_from(pos0 + 1).unwrap())
        .set_mapping_quality(MappingQuality::new(60).unwrap())
        .set_cigar(Cigar::from(vec![Op::new(Kind::Match, 100)]))
        .set_mate_reference_sequence_id(0)
        .set_mate_alignment_start(Position::try_from(mate_pos0 + 1).unwrap())
        .set_template_length(template_length)
        .set_sequence(Sequence::from(vec![b'A'; 100]))
        .set_quality_scores(QualityScores::from(vec![30; 100]))
        .build();
    record
        .data_mut()
        .insert(Tag::MATE_CIGAR, Value::from(mate_cigar));
    record
}

fn clipped() -> Vec<Op> {
    vec![Op::new(Kind::SoftClip, 10), Op::new(Kind::Match, 90)]
}

/// Write a sorted BAM and its `.bai` next to it
fn write_indexed_bam(dir: &Path, records: &[RecordBuf]) -> PathBuf {
    let path = dir.join("reads.bam");
    let header = header();
    {
        let mut writer = bam::io::Writer::new(File::create(&path).unwrap());
        writer.write_header(&header).unwrap();
        for record in records {
            writer.write_alignment_record(&header, record).unwrap();
        }
    }

    let index = bam::fs::index(&path).unwrap();
    let mut index_writer =
        bai::io::Writer::new(File::create(path.with_extension("bam.bai")).unwrap());
    index_writer.write_index(&index).unwrap();
    path
}

fn output_names(bytes: &[u8]) -> Vec<String> {
    let mut reader = bam::io::Reader::new(bytes);
    reader.read_header().unwrap();
    reader
        .records()
        .map(|r| r.unwrap().name().unwrap().to_string())
        .collect()
}

fn scenario() -> Vec<RecordBuf> {
    vec![
        read("q80", Some(100), clipped(), 1),  // quality-sum 100
        read("q95", Some(100), clipped(), 2),  // quality-sum 200
        read("unique", Some(5000), vec![Op::new(Kind::Match, 100)], 1),
        read("unmapped", None, Vec::new(), 30),
    ]
}

#[test]
fn test_bam_round_trip_keeps_best_and_unmapped() {
    let dir = TempDir::new().unwrap();
    let path = write_indexed_bam(dir.path(), &scenario());

    for policy in [KeyPolicy::Identity, KeyPolicy::Compact, KeyPolicy::Digest] {
        let source = BamSource::open(&path).unwrap();
        let options = DedupOptions {
            policy,
            ..Default::default()
        };
        let mut sink = BamSink::new(Vec::new());
        let scan = dedup::scan(&source, &options).unwrap();
        let report = scan.report();
        scan.select(&source, &mut sink).unwrap();

        assert_eq!(report.counters.total_reads, 4);
        assert_eq!(report.counters.mapped_reads, 3);
        assert_eq!(report.counters.duplicate_reads, 1);
        assert!(report.fragments.stdev.is_none());

        let bytes = sink_bytes(sink);
        assert_eq!(output_names(&bytes), vec!["q95", "unique", "unmapped"]);
    }
}

#[test]
fn test_index_counts_size_the_table_and_pairs_are_binned() {
    let dir = TempDir::new().unwrap();
    let records = vec![
        mate("a", 100, 300, 300, "10S90M5S"),
        mate("b", 110, 310, 300, "100M"),
        mate("a", 300, 100, -300, "100M"),
        mate("b", 310, 110, -300, "100M"),
    ];
    let path = write_indexed_bam(dir.path(), &records);
    let source = BamSource::open(&path).unwrap();
    assert_eq!(source.expected_records(), Some(4));

    let scan = dedup::scan(&source, &DedupOptions::default()).unwrap();
    let report = scan.report();
    assert_eq!(report.counters.duplicate_reads, 0);
    assert_eq!(report.counters.mates_approximated, 0);
    assert_eq!(report.fragments.fragments, 2);
    assert_eq!(report.fragments.mean, Some(302.5));
    assert_eq!(report.fragments.median, Some(302.5));
    assert_eq!(report.fragments.stdev, Some(0.0));

    let selection = scan.select(&source, &mut DiscardSink).unwrap();
    assert_eq!(selection.written, 4);
}

#[test]
fn test_no_output_mode_still_reports() {
    let dir = TempDir::new().unwrap();
    let path = write_indexed_bam(dir.path(), &scenario());
    let source = BamSource::open(&path).unwrap();

    let scan = dedup::scan(&source, &DedupOptions::default()).unwrap();
    let report = scan.report().to_string();
    let selection = scan.select(&source, &mut DiscardSink).unwrap();

    assert!(report.contains("duplicate reads:       1"));
    assert_eq!(selection.written, 3);
    assert_eq!(selection.dropped, 1);
}

#[test]
fn test_deduplicated_output_is_stable() {
    let dir = TempDir::new().unwrap();
    let path = write_indexed_bam(dir.path(), &scenario());
    let source = BamSource::open(&path).unwrap();
    let mut sink = BamSink::new(Vec::new());
    dedup::run(&source, &mut sink, &DedupOptions::default()).unwrap();

    // Feed the output back in as a fresh indexed BAM
    let bytes = sink_bytes(sink);
    let mut reader = bam::io::Reader::new(&bytes[..]);
    let header = reader.read_header().unwrap();
    let records: Vec<RecordBuf> = reader
        .records()
        .map(|r| RecordBuf::try_from_alignment_record(&header, &r.unwrap()).unwrap())
        .collect();

    let second_dir = TempDir::new().unwrap();
    let second_path = write_indexed_bam(second_dir.path(), &records);
    let second = BamSource::open(&second_path).unwrap();
    let (report, selection) =
        dedup::run(&second, &mut DiscardSink, &DedupOptions::default()).unwrap();
    assert_eq!(report.counters.duplicate_reads, 0);
    assert_eq!(selection.dropped, 0);
}

fn sink_bytes(sink: BamSink<Vec<u8>>) -> Vec<u8> {
    sink.into_inner().expect("sink finished by the second pass")
}
