//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Download documents from the Gallica digital library as PDF.
///
/// Documents are requested in blocks of views, retried on failure, and
/// merged into one file. The output appears only when every block made it.
#[derive(Parser, Debug)]
#[command(name = "gallica-dl")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Gallica base URL [default: https://gallica.bnf.fr]
    #[arg(long, value_name = "URL", global = true)]
    pub base_url: Option<String>,

    /// Read defaults from this config file instead of the standard location
    #[arg(long, value_name = "PATH", global = true, conflicts_with = "no_config")]
    pub config: Option<PathBuf>,

    /// Ignore config files
    #[arg(long, global = true)]
    pub no_config: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download a document, or a range of its views, as one PDF
    Pdf(PdfArgs),

    /// Print the number of views of a document
    Pages {
        /// ARK identifier or Gallica URL
        ark: String,
    },

    /// Parse an ARK identifier and print its components
    Ark {
        /// ARK identifier or Gallica URL
        ark: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the raw answer of a Gallica metadata service
    Meta(MetaArgs),

    /// Show the effective configuration
    Config,
}

#[derive(clap::Args, Debug, Clone)]
pub struct PdfArgs {
    /// ARK identifier or Gallica URL
    pub ark: String,

    /// Output PDF path
    pub output: PathBuf,

    /// First view to download (1-based)
    #[arg(short = 's', long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub start: u32,

    /// Last view to download [default: last view of the document]
    #[arg(short = 'e', long, value_parser = clap::value_parser!(u32).range(1..))]
    pub end: Option<u32>,

    /// Views per request [default: 100]
    #[arg(short = 'b', long, value_parser = clap::value_parser!(u32).range(1..))]
    pub block_size: Option<u32>,

    /// Request the whole range at once
    #[arg(long, conflicts_with = "block_size")]
    pub single_block: bool,

    /// Attempts per block, first one included (1-20) [default: 5]
    #[arg(short = 't', long, value_parser = clap::value_parser!(u32).range(1..=20))]
    pub trials: Option<u32>,

    /// Blocks fetched at the same time (1-16) [default: 1]
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=16))]
    pub concurrency: Option<u8>,

    /// Pages Gallica prepends to every block (0-20) [default: 2]
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=20))]
    pub preamble_pages: Option<u8>,

    /// Fail when a block's page count differs from the views requested
    #[arg(long)]
    pub strict: bool,

    /// Minimum delay between requests in milliseconds (0 to disable, max 60000)
    #[arg(long, value_name = "MS", value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub request_spacing: Option<u64>,

    /// Replace the output file if it exists
    #[arg(short = 'f', long)]
    pub force: bool,

    /// Print the download report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Services reachable through `meta`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaService {
    /// Bibliographic record (OAIRecord)
    Oai,
    /// Views and their labels
    Pagination,
    /// Table of contents
    Toc,
    /// Issues of a periodical
    Issues,
    /// Full-text search inside the document
    Search,
    /// IIIF manifest (JSON)
    Manifest,
    /// Plain-text rendering
    Text,
}

#[derive(clap::Args, Debug, Clone)]
pub struct MetaArgs {
    /// Service to query
    #[arg(value_enum)]
    pub service: MetaService,

    /// ARK identifier or Gallica URL
    pub ark: String,

    /// Year of the issues to list (issues only)
    #[arg(long)]
    pub year: Option<u16>,

    /// Words to search for (search only)
    #[arg(long, required_if_eq("service", "search"))]
    pub query: Option<String>,

    /// Index of the first search result (search only)
    #[arg(long)]
    pub start_result: Option<u32>,
}
