//! assetsweep - Unused Asset Reclaimer
//!
//! Finds site assets that no content mentions and deletes them on request.
//! A run has three stages:
//!
//! 1. [`store`] lists every managed asset with its size.
//! 2. [`scanner`] removes every asset whose path appears in a content file or
//!    structured entry, plus protected assets (icon disk, logo, favicon).
//! 3. [`reclaim`] reports what is left and deletes it after the operator
//!    picks "Delete all" or confirms assets one by one.

pub mod config;
pub mod content;
pub mod errors;
pub mod reclaim;
pub mod scanner;
pub mod store;

// Re-export commonly used items
pub use config::Config;
pub use content::{ContentSource, Entry, EntryStore, FsContentSource, JsonEntryStore};
pub use errors::SweepError;
pub use reclaim::{
    readable_filesize, summary_line, Choice, Prompter, ReclaimOutcome, Reclaimer,
    TerminalPrompter,
};
pub use scanner::{ProtectionRules, ReadFailurePolicy, ReferenceScanner, ScanReport};
pub use store::{Asset, AssetStore, Container, FsAssetStore};
