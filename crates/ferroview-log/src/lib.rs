//! # FerroView Log
//!
//! Turns the log written by a TeX engine (`<stem>.log`) into a short list of
//! [`LogEntry`](ir::LogEntry) values so a failed compile can be summarised
//! without showing the whole transcript.
//!
//! ```
//! let log = "! Undefined control sequence.\nl.5 \\foo\n";
//! let digest = ferroview_log::digest(log);
//! assert_eq!(digest.error_count(), 1);
//! assert_eq!(digest.first_error().unwrap().line, Some(5));
//! ```

/// Typed log entries.
pub mod ir;
/// Line-oriented log scanner.
pub mod parser;

pub use ir::{LogDigest, LogEntry, Severity};
pub use parser::digest;
