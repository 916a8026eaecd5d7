//! metasoft: genetic-association meta-analysis
//!
//! Usage: metasoft --input <FILE> [OPTIONS]

use clap::Parser;
use log::{info, LevelFilter};
use std::fs::File;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

use metasoft::commands::{write_log_file, MetaAnalysisCommand};
use metasoft::config::{MetaConfig, MvalueMethod};
use metasoft::error::{MetaError, Result};
use metasoft::parallel::init_thread_pool;
use metasoft::reader::MarkerReader;
use metasoft::stats::PvalueTable;

#[derive(Parser, Debug)]
#[command(name = "metasoft")]
#[command(version)]
#[command(about = "Meta-analysis of genetic association studies: FE, RE, Han-Eskin, m-values and binary effects", long_about = None)]
struct Cli {
    /// Input file: RSID followed by (beta, standard error) pairs per study
    #[arg(long)]
    input: PathBuf,

    /// Output file
    #[arg(long, default_value = "out")]
    output: PathBuf,

    /// Log file
    #[arg(long, default_value = "log")]
    log: PathBuf,

    /// Han-Eskin p-value table
    #[arg(long, default_value = "HanEskinPvalueTable.txt")]
    pvalue_table: PathBuf,

    /// Inflation factor for the mean effect part of the Han-Eskin statistic
    #[arg(long, default_value_t = 1.0)]
    lambda_mean: f64,

    /// Inflation factor for the heterogeneity part of the Han-Eskin statistic
    #[arg(long, default_value_t = 1.0)]
    lambda_hetero: f64,

    /// Compute per-study m-values for significant markers
    #[arg(long)]
    mvalue: bool,

    /// M-value method
    #[arg(long, value_enum, default_value_t = MvalueMethod::Exact)]
    mvalue_method: MvalueMethod,

    /// Compute m-values only when the FE or Han-Eskin p-value is at or below this
    #[arg(long, default_value_t = 1e-7)]
    mvalue_p_thres: f64,

    /// Prior standard deviation of the non-null effect
    #[arg(long, default_value_t = 0.2)]
    mvalue_prior_sigma: f64,

    /// Beta prior (alpha beta) on the fraction of non-null studies
    #[arg(long, num_args = 2, value_names = ["ALPHA", "BETA"], default_values_t = [1.0, 1.0])]
    mvalue_prior_beta: Vec<f64>,

    /// Skip exact m-values above this many studies
    #[arg(long, default_value_t = 20)]
    mvalue_exact_max_studies: usize,

    /// MCMC sampled iterations
    #[arg(long, default_value_t = 10_000)]
    mcmc_sample: u64,

    /// MCMC burn-in iterations
    #[arg(long, default_value_t = 1_000)]
    mcmc_burnin: u64,

    /// Probability of proposing a uniformly random pattern
    #[arg(long, default_value_t = 0.01)]
    mcmc_prob_random: f64,

    /// Maximum fraction of studies flipped by one proposal
    #[arg(long, default_value_t = 0.1)]
    mcmc_max_num_flip: f64,

    /// Compute the binary-effects p-value
    #[arg(long)]
    binary_effects: bool,

    /// First-stage simulation size for binary effects
    #[arg(long, default_value_t = 1_000)]
    binary_effects_sample: u64,

    /// Second-stage simulation size for binary effects
    #[arg(long, default_value_t = 100_000)]
    binary_effects_large: u64,

    /// Run the second stage when the first-stage p-value is at or below this
    #[arg(long, default_value_t = 1e-4)]
    binary_effects_p_thres: f64,

    /// Skip binary effects above this many studies
    #[arg(long, default_value_t = 10)]
    binary_effects_max_studies: usize,

    /// Random seed
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Number of threads
    #[arg(long, short = 't', default_value_t = 1)]
    threads: usize,

    /// Debug-level diagnostics
    #[arg(long, short = 'v')]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> Result<MetaConfig> {
        let (prior_alpha, prior_beta) = match self.mvalue_prior_beta.as_slice() {
            [a, b] => (*a, *b),
            _ => {
                return Err(MetaError::Config(
                    "--mvalue-prior-beta takes two float values > 0".to_string(),
                ))
            }
        };

        Ok(MetaConfig {
            input: self.input,
            output: self.output,
            log: self.log,
            pvalue_table: self.pvalue_table,
            lambda_mean: self.lambda_mean,
            lambda_hetero: self.lambda_hetero,
            compute_mvalue: self.mvalue,
            mvalue_method: self.mvalue_method,
            mvalue_p_threshold: self.mvalue_p_thres,
            prior_sigma: self.mvalue_prior_sigma,
            prior_alpha,
            prior_beta,
            exact_max_studies: self.mvalue_exact_max_studies,
            mcmc_sample: self.mcmc_sample,
            mcmc_burnin: self.mcmc_burnin,
            mcmc_prob_random: self.mcmc_prob_random,
            mcmc_max_num_flip: self.mcmc_max_num_flip,
            compute_binary_effects: self.binary_effects,
            binary_effects_sample: self.binary_effects_sample,
            binary_effects_large_sample: self.binary_effects_large,
            binary_effects_p_threshold: self.binary_effects_p_thres,
            binary_effects_max_studies: self.binary_effects_max_studies,
            seed: self.seed,
            threads: self.threads,
            verbose: self.verbose,
        })
    }
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new().filter_level(level).init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.into_config()?;
    // All option checks happen before any file is touched.
    config.validate()?;
    info!("Arguments: {}", config.summary());

    init_thread_pool(config.threads);
    let start = Instant::now();

    let table = PvalueTable::from_path(&config.pvalue_table)?;
    info!(
        "Loaded p-value table for {}..={} studies",
        table.min_studies(),
        table.max_studies()
    );

    let reader = MarkerReader::from_path(&config.input)?;
    let output = File::create(&config.output)?;

    info!("Performing meta-analysis");
    let stats = MetaAnalysisCommand::new(config.clone()).run_streaming(reader, &table, output)?;

    write_log_file(&config, &stats)?;
    info!(
        "Analyzed {} of {} markers (max {} studies); lambda mean = {:?}, lambda hetero = {:?}",
        stats.markers_analyzed,
        stats.markers_read,
        stats.max_num_studies,
        stats.inflation.mean_effect,
        stats.inflation.heterogeneity
    );
    info!("Finished in {:.2?}", start.elapsed());
    Ok(())
}
