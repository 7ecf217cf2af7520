//! Gallica document downloader.
//!
//! Fetches documents from the Gallica digital library (Bibliothèque
//! nationale de France) as single PDF files, requesting them in bounded
//! blocks of views and stitching the blocks back together.
//!
//! # Architecture
//!
//! - [`parser`] - ARK identifier parsing and canonical formatting
//! - [`gallica`] - URL routes and read-only metadata services
//! - [`download`] - block planning, fetching with retry, PDF assembly and
//!   the download orchestrator

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub mod gallica;
pub mod parser;
mod user_agent;

// Re-export commonly used types
pub use download::{
    Block, BlockFetcher, BlockPlan, DownloadError, DownloadOrchestrator, DownloadReport,
    DownloadRequest, DownloadState, HttpClient, OrchestratorError, PdfAssembler, RetryPolicy,
    partition,
};
pub use gallica::{GallicaClient, GallicaRoutes, MetadataClient};
pub use parser::{Ark, ParseError};
