//! Command implementations for metasoft.

pub mod meta;
pub mod summary;

pub use meta::{MarkerAnalyzer, MetaAnalysisCommand, MetaAnalysisStats};
pub use summary::{write_log_file, write_summary};
