//! Reader configuration.

use crate::error::{ExcelError, Result};
use std::collections::HashMap;
use std::path::PathBuf;

/// Tuning knobs for the shared-strings store (see [`crate::shared_strings`]).
#[derive(Debug, Clone)]
pub struct SharedStringsConfiguration {
    /// Keep a RAM-resident prefix of the shared-strings table.
    pub use_cache: bool,
    /// Soft RAM budget for that prefix, in kilobytes. Minimum 8.
    pub cache_size_kilobyte: usize,
    /// Spill strings past the cache budget into seek-optimized files
    /// instead of falling straight back to re-scanning the XML.
    pub use_optimized_files: bool,
    /// Entries per spill file before a new one is started.
    pub optimized_file_entry_count: usize,
    /// Keep spill-file (and XML fallback) handles open between lookups
    /// rather than reopening on every call.
    pub keep_file_handles: bool,
}

impl Default for SharedStringsConfiguration {
    fn default() -> Self {
        SharedStringsConfiguration {
            use_cache: true,
            cache_size_kilobyte: 256,
            use_optimized_files: true,
            optimized_file_entry_count: 2500,
            keep_file_handles: true,
        }
    }
}

impl SharedStringsConfiguration {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.cache_size_kilobyte < 8 {
            return Err(ExcelError::InvalidArg(
                "cache_size_kilobyte must be at least 8".into(),
            ));
        }
        if self.optimized_file_entry_count == 0 {
            return Err(ExcelError::InvalidArg(
                "optimized_file_entry_count must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Top-level reader configuration.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Base directory for extracted parts and spill files. Defaults to
    /// the system temp directory.
    pub temp_dir: Option<PathBuf>,
    /// Return typed date/time values instead of formatted strings for
    /// cells whose style classifies as `DateTime`.
    pub return_date_time_objects: bool,
    /// Remap row keys from 0-based integers to column letters.
    pub output_column_names: bool,
    /// Omit empty cells from a row instead of padding with blanks. A row
    /// that becomes entirely empty is represented as a single `None`.
    pub skip_empty_cells: bool,
    /// Shared-strings cache/spill tuning.
    pub shared_strings_configuration: SharedStringsConfiguration,
    /// Overrides for builtin number formats, keyed by `numFmtId`. Only
    /// applied for ids that already exist in the builtin table.
    pub customized_formats: HashMap<u32, String>,
    pub force_date_format: Option<String>,
    pub force_time_format: Option<String>,
    pub force_datetime_format: Option<String>,
    pub decimal_separator: char,
    pub thousand_separator: char,
    pub currency_code: String,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            temp_dir: None,
            return_date_time_objects: false,
            output_column_names: false,
            skip_empty_cells: false,
            shared_strings_configuration: SharedStringsConfiguration::default(),
            customized_formats: HashMap::new(),
            force_date_format: None,
            force_time_format: None,
            force_datetime_format: None,
            decimal_separator: '.',
            thousand_separator: ',',
            currency_code: "USD".to_string(),
        }
    }
}

impl ReaderConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        self.shared_strings_configuration.validate()
    }
}
