//! `pages`: number of views of a document.

use anyhow::{Context, Result};
use gallica_core::gallica::MetadataClient;

use super::parse_ark_arg;
use crate::settings::Settings;

pub async fn run_pages_command(settings: &Settings, ark: &str) -> Result<()> {
    let ark = parse_ark_arg(ark)?;
    let client = settings.gallica_client()?;
    let count = client
        .page_count(&ark)
        .await
        .with_context(|| format!("Failed to read the number of views of {ark}"))?;
    println!("{count}");
    Ok(())
}
