//! The two end-to-end pipelines: forecast download and file upload.

pub mod download;
pub mod upload;
