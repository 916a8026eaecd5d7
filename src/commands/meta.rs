//! Streaming meta-analysis over a marker file.
//!
//! # Algorithm
//!
//! For each input line:
//! 1. Parse the marker (fatal on malformed numbers)
//! 2. With at least two usable studies, run fixed effects, random effects
//!    and Han-Eskin, then binary effects and m-values when enabled
//! 3. Record the Han-Eskin parts for genomic control
//! 4. Write the row and drop the marker
//!
//! Inflation factors are computed once after the last line.
//!
//! # Memory Complexity
//!
//! O(1) per marker with one thread. With `threads > 1` markers are parsed
//! sequentially into fixed-size batches, each batch is computed in parallel
//! and written back in input order, so memory is bounded by the batch size.

use crate::config::MetaConfig;
use crate::error::Result;
use crate::marker::{MarkerRecord, MarkerResult, MarkerStats};
use crate::parallel::{map_ordered, DEFAULT_BATCH_SIZE};
use crate::reader::MarkerReader;
use crate::seed::RandomStream;
use crate::stats::{
    fixed_effects, han_eskin, random_effects, two_sided_normal_pvalue, BinaryEffectsEstimator,
    CalibrationAccumulator, InflationFactors, MvalueEstimator, MvaluePrior, PvalueTable,
};
use crate::streaming::ResultWriter;
use log::{debug, warn};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Progress is logged every this many analyzed markers.
const PROGRESS_INTERVAL: usize = 1000;

/// M-value settings that apply when `--mvalue` is on.
#[derive(Debug, Clone, Copy)]
struct MvalueSettings {
    estimator: MvalueEstimator,
    prior: MvaluePrior,
    threshold: f64,
}

/// Per-marker statistics pipeline.
///
/// Holds only immutable state, so a single analyzer is shared by all
/// worker threads.
#[derive(Debug, Clone)]
pub struct MarkerAnalyzer<'a> {
    table: &'a PvalueTable,
    lambda_mean: f64,
    lambda_hetero: f64,
    stream: RandomStream,
    binary: Option<BinaryEffectsEstimator>,
    mvalue: Option<MvalueSettings>,
}

impl<'a> MarkerAnalyzer<'a> {
    pub fn new(config: &MetaConfig, table: &'a PvalueTable) -> Self {
        let binary = config
            .compute_binary_effects
            .then(|| BinaryEffectsEstimator::from_config(config));
        let mvalue = config.compute_mvalue.then(|| MvalueSettings {
            estimator: MvalueEstimator::from_config(config),
            prior: MvaluePrior::from_config(config),
            threshold: config.mvalue_p_threshold,
        });
        Self {
            table,
            lambda_mean: config.lambda_mean,
            lambda_hetero: config.lambda_hetero,
            stream: RandomStream::new(config.seed),
            binary,
            mvalue,
        }
    }

    /// Analyze one marker. `ordinal` is the marker's index among analyzed
    /// markers and keys its random sub-seeds.
    pub fn analyze(&self, record: &MarkerRecord, ordinal: u64) -> Result<MarkerResult> {
        let study_pvalues = record
            .studies
            .iter()
            .map(|obs| obs.pair().map(|(b, s)| two_sided_normal_pvalue(b / s)))
            .collect();

        let mut result = MarkerResult {
            rsid: record.rsid.clone(),
            num_observed: record.num_observed(),
            study_pvalues,
            stats: None,
        };
        if !record.is_analyzable() {
            return Ok(result);
        }

        let data = record.observed();
        let fixed = fixed_effects(&data);
        let random = random_effects(&data, &fixed);
        let han_eskin = han_eskin(
            &data,
            &fixed,
            random.tau_square,
            self.lambda_mean,
            self.lambda_hetero,
            self.table,
        )?;

        let binary_effects_pvalue = match &self.binary {
            Some(estimator) => {
                let pvalue = estimator.pvalue(&data, &self.stream, ordinal);
                if pvalue.is_none() {
                    warn!(
                        "{}: {} studies exceed the binary-effects limit ({}); binary-effects p-value not computed",
                        record.rsid,
                        data.len(),
                        estimator.max_studies
                    );
                }
                pvalue
            }
            None => None,
        };

        let mvalues = match &self.mvalue {
            Some(settings)
                if fixed.pvalue <= settings.threshold || han_eskin.pvalue <= settings.threshold =>
            {
                match settings
                    .estimator
                    .estimate(&data, &settings.prior, &self.stream, ordinal)
                {
                    Some(values) => {
                        let mut per_slot = vec![None; record.num_slots()];
                        for (slot, m) in data.slots.iter().zip(values) {
                            per_slot[*slot] = Some(m);
                        }
                        Some(per_slot)
                    }
                    None => {
                        warn!(
                            "{}: {} studies exceed the exact enumeration limit; m-values not computed",
                            record.rsid,
                            data.len()
                        );
                        None
                    }
                }
            }
            _ => None,
        };

        result.stats = Some(MarkerStats {
            fixed,
            random,
            han_eskin,
            binary_effects_pvalue,
            mvalues,
        });
        Ok(result)
    }
}

/// Run-level counters and the final inflation factors.
#[derive(Debug, Clone, Default)]
pub struct MetaAnalysisStats {
    /// Data lines parsed into markers.
    pub markers_read: usize,
    /// Markers with at least two usable studies.
    pub markers_analyzed: usize,
    /// Maximum study count over all data lines.
    pub max_num_studies: usize,
    /// Lines whose trailing unpaired column was dropped.
    pub column_warnings: usize,
    pub mvalues_computed: usize,
    pub binary_effects_computed: usize,
    pub inflation: InflationFactors,
}

/// Streaming meta-analysis command.
#[derive(Debug, Clone)]
pub struct MetaAnalysisCommand {
    config: MetaConfig,
    batch_size: usize,
}

impl MetaAnalysisCommand {
    pub fn new(config: MetaConfig) -> Self {
        Self {
            config,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Set the number of markers computed per parallel batch.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn config(&self) -> &MetaConfig {
        &self.config
    }

    /// Execute the meta-analysis on a marker file.
    pub fn run<P: AsRef<Path>, W: Write>(
        &self,
        input_path: P,
        table: &PvalueTable,
        output: W,
    ) -> Result<MetaAnalysisStats> {
        let file = File::open(input_path.as_ref())?;
        self.run_streaming(MarkerReader::new(file), table, output)
    }

    /// Core streaming loop.
    pub fn run_streaming<R: Read, W: Write>(
        &self,
        reader: MarkerReader<R>,
        table: &PvalueTable,
        output: W,
    ) -> Result<MetaAnalysisStats> {
        let analyzer = MarkerAnalyzer::new(&self.config, table);
        let mut writer = ResultWriter::new(output);
        let mut calibration = CalibrationAccumulator::new();
        let mut stats = MetaAnalysisStats::default();

        writer.write_header()?;

        let mut records = reader.records();
        let outcome = if self.config.threads > 1 {
            self.process_batched(&analyzer, &mut records, &mut writer, &mut stats, &mut calibration)
        } else {
            self.process_sequential(&analyzer, &mut records, &mut writer, &mut stats, &mut calibration)
        };
        // Rows written before a fatal error stay in the output.
        writer.flush()?;
        outcome?;

        stats.max_num_studies = records.reader().max_num_studies();
        stats.column_warnings = records.reader().warnings();
        stats.inflation = calibration.compute(stats.max_num_studies);
        Ok(stats)
    }

    fn process_sequential<I, W>(
        &self,
        analyzer: &MarkerAnalyzer<'_>,
        records: &mut I,
        writer: &mut ResultWriter<W>,
        stats: &mut MetaAnalysisStats,
        calibration: &mut CalibrationAccumulator,
    ) -> Result<()>
    where
        I: Iterator<Item = Result<MarkerRecord>>,
        W: Write,
    {
        for record in records {
            let record = record?;
            let result = analyzer.analyze(&record, stats.markers_analyzed as u64)?;
            account(&result, stats, calibration);
            writer.write_result(&result)?;
        }
        Ok(())
    }

    fn process_batched<I, W>(
        &self,
        analyzer: &MarkerAnalyzer<'_>,
        records: &mut I,
        writer: &mut ResultWriter<W>,
        stats: &mut MetaAnalysisStats,
        calibration: &mut CalibrationAccumulator,
    ) -> Result<()>
    where
        I: Iterator<Item = Result<MarkerRecord>>,
        W: Write,
    {
        let mut batch: Vec<(MarkerRecord, u64)> = Vec::with_capacity(self.batch_size);
        let mut next_ordinal: u64 = 0;

        for record in records {
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    // Keep the output identical to a sequential run up to the bad line.
                    flush_batch(analyzer, &mut batch, writer, stats, calibration)?;
                    return Err(e);
                }
            };
            // Sub-seed ordinals are assigned here, in input order.
            let ordinal = next_ordinal;
            if record.is_analyzable() {
                next_ordinal += 1;
            }
            batch.push((record, ordinal));
            if batch.len() >= self.batch_size {
                flush_batch(analyzer, &mut batch, writer, stats, calibration)?;
            }
        }
        flush_batch(analyzer, &mut batch, writer, stats, calibration)
    }
}

/// Compute a batch in parallel, then write and account for it in order.
fn flush_batch<W: Write>(
    analyzer: &MarkerAnalyzer<'_>,
    batch: &mut Vec<(MarkerRecord, u64)>,
    writer: &mut ResultWriter<W>,
    stats: &mut MetaAnalysisStats,
    calibration: &mut CalibrationAccumulator,
) -> Result<()> {
    let results = map_ordered(batch.as_slice(), |(record, ordinal)| analyzer.analyze(record, *ordinal));
    batch.clear();
    for result in results {
        let result = result?;
        account(&result, stats, calibration);
        writer.write_result(&result)?;
    }
    Ok(())
}

fn account(
    result: &MarkerResult,
    stats: &mut MetaAnalysisStats,
    calibration: &mut CalibrationAccumulator,
) {
    stats.markers_read += 1;
    let Some(marker_stats) = &result.stats else {
        return;
    };

    stats.markers_analyzed += 1;
    calibration.record(&marker_stats.han_eskin);
    if marker_stats.mvalues.is_some() {
        stats.mvalues_computed += 1;
    }
    if marker_stats.binary_effects_pvalue.is_some() {
        stats.binary_effects_computed += 1;
    }
    if stats.markers_analyzed % PROGRESS_INTERVAL == 0 {
        debug!(
            "Analyzing SNP #{} ({})",
            stats.markers_analyzed, result.rsid
        );
    }
}
