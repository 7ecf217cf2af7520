//! CLI command handlers.

mod ark;
mod config;
mod meta;
mod pages;
mod pdf;

use anyhow::{Context, Result};
use gallica_core::parser::Ark;

pub use ark::run_ark_command;
pub use config::run_config_show_command;
pub use meta::run_meta_command;
pub use pages::run_pages_command;
pub use pdf::run_pdf_command;

/// Reads an ARK from a bare identifier or a pasted Gallica link.
pub(crate) fn parse_ark_arg(input: &str) -> Result<Ark> {
    Ark::from_url(input).with_context(|| format!("Invalid ARK identifier '{}'", input.trim()))
}
