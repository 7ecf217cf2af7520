//! `meta`: raw answers of the Gallica metadata services.

use anyhow::{Context, Result};

use super::parse_ark_arg;
use crate::cli::{MetaArgs, MetaService};
use crate::settings::Settings;

pub async fn run_meta_command(settings: &Settings, args: &MetaArgs) -> Result<()> {
    let ark = parse_ark_arg(&args.ark)?;
    let client = settings.gallica_client()?;

    let body = match args.service {
        MetaService::Oai => client.oai_record(&ark).await,
        MetaService::Pagination => client.pagination_xml(&ark).await,
        MetaService::Toc => client.toc(&ark).await,
        MetaService::Issues => client.issues(&ark, args.year).await,
        MetaService::Search => {
            let query = args.query.as_deref().unwrap_or_default();
            client.content_search(&ark, query, args.start_result).await
        }
        MetaService::Text => client.text_brut(&ark).await,
        MetaService::Manifest => client
            .iiif_manifest(&ark)
            .await
            .map(|manifest| format!("{manifest:#}")),
    }
    .with_context(|| format!("Metadata request for {ark} failed"))?;

    println!("{body}");
    Ok(())
}
