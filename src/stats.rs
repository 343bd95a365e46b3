//! Read counters and fragment-size statistics
//!
//! A [`Statistics`] context is threaded through the first pass; it owns the
//! counters and the binned fragment-length histogram. Summary statistics are
//! derived from the bins, so they are exact to within one bin width.

use std::fmt;

use crate::policy::KeyPolicy;
use crate::record::ReadFields;

pub const DEFAULT_BIN_WIDTH: u32 = 5;
pub const DEFAULT_MAX_INSERT_SIZE: u32 = 1000;
pub const DEFAULT_MIN_MAPQ: u8 = 30;
/// Largest accepted histogram ceiling; keeps the bin vector bounded.
pub const MAX_INSERT_SIZE_LIMIT: u32 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsConfig {
    pub bin_width: u32,
    /// Insert sizes above this are clamped into the last bin
    pub max_insert_size: u32,
    /// Mapping quality must be strictly greater than this
    pub min_mapping_quality: u8,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            bin_width: DEFAULT_BIN_WIDTH,
            max_insert_size: DEFAULT_MAX_INSERT_SIZE,
            min_mapping_quality: DEFAULT_MIN_MAPQ,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub total_reads: u64,
    pub mapped_reads: u64,
    /// Two per confidently paired fragment
    pub paired_reads: u64,
    pub duplicate_reads: u64,
    pub total_bases: u64,
    pub q30_bases: u64,
    /// Mapped-mate records whose mate footprint was approximated
    pub mates_approximated: u64,
}

/// Fixed-width histogram of fragment lengths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentHistogram {
    bin_width: u32,
    max_value: u32,
    counts: Vec<u64>,
}

impl FragmentHistogram {
    pub fn new(bin_width: u32, max_value: u32) -> Self {
        let bin_width = bin_width.max(1);
        let max_value = max_value.min(MAX_INSERT_SIZE_LIMIT);
        Self {
            bin_width,
            max_value,
            counts: vec![0; (max_value / bin_width) as usize + 1],
        }
    }

    /// Add one fragment length, clamped to the configured maximum.
    #[inline]
    pub fn add(&mut self, insert_size: u32) {
        let bin = insert_size.min(self.max_value) / self.bin_width;
        self.counts[bin as usize] += 1;
    }

    #[inline]
    pub fn bin_width(&self) -> u32 {
        self.bin_width
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Non-empty bins in ascending order
    pub fn bins(&self) -> impl Iterator<Item = Bin> + '_ {
        let width = self.bin_width;
        self.counts
            .iter()
            .enumerate()
            .filter(|&(_, &count)| count > 0)
            .map(move |(i, &count)| Bin {
                lower: i as u32 * width,
                upper: (i as u32 + 1) * width,
                count,
            })
    }

    /// Mean, median and sample stdev over `n` fragments.
    ///
    /// Each bin contributes at its midpoint. Mean and median are undefined
    /// for `n == 0`, stdev for `n <= 1`.
    pub fn summarize(&self, n: u64) -> FragmentSummary {
        let bins: Vec<Bin> = self.bins().collect();
        if n == 0 {
            return FragmentSummary {
                fragments: 0,
                mean: None,
                median: None,
                stdev: None,
                bins,
            };
        }

        let width = f64::from(self.bin_width);
        let nf = n as f64;
        let mean = bins
            .iter()
            .map(|b| b.midpoint() * b.count as f64)
            .sum::<f64>()
            / nf;

        let half = nf / 2.0;
        let mut before = 0u64;
        let mut median = None;
        for b in &bins {
            if (before + b.count) as f64 >= half {
                let frac = (half - before as f64) / b.count as f64;
                median = Some(f64::from(b.lower) + frac * width);
                break;
            }
            before += b.count;
        }

        let stdev = (n > 1).then(|| {
            let ss: f64 = bins
                .iter()
                .map(|b| b.count as f64 * (b.midpoint() - mean).powi(2))
                .sum();
            (ss / (nf - 1.0)).sqrt()
        });

        FragmentSummary {
            fragments: n,
            mean: Some(mean),
            median,
            stdev,
            bins,
        }
    }
}

/// One histogram bin covering `[lower, upper)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bin {
    pub lower: u32,
    pub upper: u32,
    pub count: u64,
}

impl Bin {
    #[inline]
    pub fn midpoint(&self) -> f64 {
        f64::from(self.lower) + f64::from(self.upper - self.lower) / 2.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FragmentSummary {
    pub fragments: u64,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub stdev: Option<f64>,
    pub bins: Vec<Bin>,
}

/// Statistics context for one run
#[derive(Debug, Clone)]
pub struct Statistics {
    config: StatsConfig,
    pub counters: Counters,
    pub histogram: FragmentHistogram,
}

impl Statistics {
    pub fn new(config: StatsConfig) -> Self {
        Self {
            config,
            counters: Counters::default(),
            histogram: FragmentHistogram::new(config.bin_width, config.max_insert_size),
        }
    }

    #[inline]
    pub fn config(&self) -> &StatsConfig {
        &self.config
    }

    /// Tally a mapped record: mapped count, fragment size and base qualities.
    pub fn observe_mapped(&mut self, fields: &ReadFields) {
        self.counters.mapped_reads += 1;
        if fields.is_confidently_paired(self.config.min_mapping_quality) {
            self.histogram.add(fields.template_length.unsigned_abs());
            self.counters.paired_reads += 2;
        }
        self.counters.total_bases += fields.bases;
        self.counters.q30_bases += fields.q30_bases;
    }

    pub fn summarize(&self) -> FragmentSummary {
        self.histogram.summarize(self.counters.paired_reads / 2)
    }
}

/// End-of-scan report
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub policy: KeyPolicy,
    pub counters: Counters,
    pub distinct_signatures: u64,
    pub truncated_keys: u64,
    pub fragments: FragmentSummary,
}

fn percent(n: u64, d: u64) -> f64 {
    if d == 0 { 0.0 } else { 100.0 * n as f64 / d as f64 }
}

struct Maybe(Option<f64>);

impl fmt::Display for Maybe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{v:.2}"),
            None => f.write_str("NA"),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.counters;
        writeln!(f, "key policy:            {}", self.policy)?;
        writeln!(f, "total reads:           {}", c.total_reads)?;
        writeln!(f, "mapped reads:          {}", c.mapped_reads)?;
        writeln!(f, "confidently paired:    {}", c.paired_reads)?;
        writeln!(
            f,
            "duplicate reads:       {} ({:.2}%)",
            c.duplicate_reads,
            percent(c.duplicate_reads, c.mapped_reads)
        )?;
        writeln!(f, "distinct signatures:   {}", self.distinct_signatures)?;
        writeln!(f, "total bases:           {}", c.total_bases)?;
        writeln!(
            f,
            "Q30 bases:             {} ({:.2}%)",
            c.q30_bases,
            percent(c.q30_bases, c.total_bases)
        )?;
        writeln!(f, "mates approximated:    {}", c.mates_approximated)?;
        writeln!(f, "truncated keys:        {}", self.truncated_keys)?;
        writeln!(f, "fragment size mean:    {}", Maybe(self.fragments.mean))?;
        writeln!(f, "fragment size median:  {}", Maybe(self.fragments.median))?;
        writeln!(f, "fragment size stdev:   {}", Maybe(self.fragments.stdev))?;
        writeln!(f, "fragment size histogram:")?;
        for b in &self.fragments.bins {
            writeln!(f, "  [{}, {})\t{}", b.lower, b.upper, b.count)?;
        }
        Ok(())
    }
}
