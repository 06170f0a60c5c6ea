//! Local file formats.
//!
//! Delimited text comes in through [`reader`]; query results go out as
//! Excel workbooks through [`excel`] and as Parquet through [`parquet`].

pub mod excel;
pub mod parquet;
pub mod reader;
