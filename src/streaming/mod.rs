//! Streaming I/O shared by the meta-analysis driver.
//!
//! - Token-level marker line parsing
//! - Result table formatting
//!
//! Only one input line and one output row are held at a time.

pub mod output;
pub mod parsing;

pub use output::{format_g, ResultWriter, HEADER};
pub use parsing::{is_missing_token, parse_finite, should_skip_line, study_columns};
