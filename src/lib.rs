// Clippy allows for the whole crate
#![allow(clippy::too_many_arguments)]

//! metasoft: streaming genetic-association meta-analysis
//!
//! Combines per-study effect sizes and standard errors for each marker into
//! fixed-effects, random-effects and Han-Eskin statistics, with optional
//! per-study m-values and a binary-effects p-value.
//!
//! # Features
//!
//! - **Streaming I/O**: one marker in memory at a time
//! - **Reproducible sampling**: per-marker sub-seeds derived from one run seed
//! - **Parallel processing**: optional order-preserving batches on Rayon
//!
//! # Example
//!
//! ```rust,no_run
//! use metasoft::prelude::*;
//!
//! let config = MetaConfig {
//!     input: "markers.txt".into(),
//!     ..MetaConfig::default()
//! };
//! config.validate().unwrap();
//!
//! let table = PvalueTable::from_path(&config.pvalue_table).unwrap();
//! let output = std::fs::File::create(&config.output).unwrap();
//! let stats = MetaAnalysisCommand::new(config.clone())
//!     .run(&config.input, &table, output)
//!     .unwrap();
//! println!("{} markers analyzed", stats.markers_analyzed);
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod marker;
pub mod parallel;
pub mod reader;
pub mod seed;
pub mod stats;
pub mod streaming;

// Re-export commonly used types
pub use config::{MetaConfig, MvalueMethod};
pub use error::{MetaError, Result};
pub use marker::{MarkerRecord, MarkerResult, StudyObservation};
pub use reader::{parse_markers, MarkerReader};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::commands::{write_log_file, MetaAnalysisCommand, MetaAnalysisStats};
    pub use crate::config::{MetaConfig, MvalueMethod};
    pub use crate::error::{MetaError, Result};
    pub use crate::marker::{MarkerRecord, MarkerResult, StudyObservation};
    pub use crate::reader::MarkerReader;
    pub use crate::stats::PvalueTable;
}
