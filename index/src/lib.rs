//! This crate provides the voldex series index: an event-driven DICOM
//! element parser whose callbacks feed a cross-file index organised by
//! Series UID.
//!
//! The typical flow binds a [`DatasetIndexer`]'s callbacks to an
//! [`ElementParser`], parses each file of a directory, and then
//! consults the query methods for slice orderings, structure set
//! contours, and per-file pixel payloads:
//!
//! ```no_run
//! use voldex_index::{DatasetIndexer, ElementParser};
//!
//! let mut parser = ElementParser::new();
//! DatasetIndexer::register_callbacks(&mut parser);
//! DatasetIndexer::register_pixel_callback(&mut parser);
//!
//! let mut index = DatasetIndexer::new();
//! voldex_index::scan_dir("ct-study/", &parser, &mut index)?;
//!
//! for (location, filename) in index.slice_location_pairs(None) {
//!     println!("{:10.2}  {}", location, filename);
//! }
//! # Ok::<(), std::io::Error>(())
//! ```
//!
//! Parsing is strictly single threaded: the parser, the registry, and
//! the indexer share the thread that drives a parse, and callbacks run
//! synchronously. To index many files in parallel, give each worker
//! its own indexer and merge afterwards.
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod indexer;
pub mod parser;
pub mod pixeldata;
pub mod registry;
pub mod source;

mod query;

pub use crate::indexer::{DatasetIndexer, OrderingRecord, PatientRecord, SeriesRecord};
pub use crate::parser::ElementParser;
pub use crate::pixeldata::ImageBuffer;
pub use crate::registry::{CallbackRegistry, ElementContext};
pub use crate::source::FileSource;

use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// The outcome of a directory scan.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    /// files parsed to completion
    pub parsed: usize,
    /// files rejected with a parse error
    pub failed: usize,
}

/// Parse every regular file in the given directory, in file name
/// order, accumulating into `state`.
///
/// A file that fails to parse is logged and skipped; indices built
/// from the files before it are preserved, matching the per-file error
/// containment of the parser itself. Only an unreadable directory is
/// an error.
pub fn scan_dir<P, T>(
    dir: P,
    parser: &ElementParser<T>,
    state: &mut T,
) -> Result<ScanOutcome, io::Error>
where
    P: AsRef<Path>,
{
    let mut entries: Vec<_> = std::fs::read_dir(dir.as_ref())?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    entries.sort();

    let mut outcome = ScanOutcome::default();
    for path in entries {
        match parser.parse_file(&path, state) {
            Ok(()) => {
                debug!("{}: parsed", path.display());
                outcome.parsed += 1;
            }
            Err(e) => {
                warn!("{}: skipped: {}", path.display(), e);
                outcome.failed += 1;
            }
        }
    }
    Ok(outcome)
}
