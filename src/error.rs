//! Error taxonomy for the meta-analysis pipeline.
//!
//! Every error is fatal: the driver aborts the whole run on the first one.

use std::io;
use thiserror::Error;

/// Errors that can occur while configuring or running a meta-analysis.
#[derive(Error, Debug)]
pub enum MetaError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Parse error at line {line}: {message}\n{content}")]
    Parse {
        line: usize,
        message: String,
        content: String,
    },

    #[error("p-value table error: {0}")]
    Table(String),
}

pub type Result<T> = std::result::Result<T, MetaError>;
