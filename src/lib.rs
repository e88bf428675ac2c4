//! # xlsxstream
//!
//! A memory-bounded, pull-style streaming reader for XLSX (SpreadsheetML)
//! workbooks.
//!
//! Rows are pulled one at a time straight off the worksheet's XML stream;
//! the workbook is never materialized in memory. Shared strings past a
//! configurable RAM budget spill to seek-optimized scratch files instead
//! of being held in full, and number formats (including dates, percents,
//! and fractions) are resolved lazily and cached per format id.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use xlsxstream::ExcelReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut reader = ExcelReader::open("data.xlsx")?;
//! while reader.next()? {
//!     let row = reader.current().unwrap();
//!     println!("row {}: {:?}", reader.key().unwrap(), row);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod package;
pub mod reader;
pub mod row;
pub mod shared_strings;
pub mod styles;
pub mod worksheet;
pub mod xmlreader;

pub use config::{ReaderConfig, SharedStringsConfiguration};
pub use error::{ExcelError, Result};
pub use reader::{ExcelReader, SheetInfo};
pub use row::{CellValue, Row};
