//! `pdf`: download a document as one PDF.

use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use gallica_core::download::{
    BlockFetcher, DownloadOrchestrator, DownloadReport, DownloadRequest, RetryPolicy,
};
use gallica_core::gallica::GallicaClient;
use tracing::{debug, info};

use super::parse_ark_arg;
use crate::cli::PdfArgs;
use crate::progress::SpinnerObserver;
use crate::settings::Settings;

pub async fn run_pdf_command(settings: &Settings, args: &PdfArgs, quiet: bool) -> Result<()> {
    let ark = parse_ark_arg(&args.ark)?;
    if args.output.exists() && !args.force {
        bail!(
            "Output file '{}' already exists (use --force to replace it)",
            args.output.display()
        );
    }
    if let Some(end) = args.end
        && end < args.start
    {
        bail!("--end ({end}) is before --start ({})", args.start);
    }

    let transport = settings.http_client()?;
    let routes = settings.routes()?;
    let metadata = Arc::new(GallicaClient::new(transport.clone(), routes.clone()));
    let fetcher = BlockFetcher::new(transport, routes)
        .with_policy(RetryPolicy::default())
        .with_throttle(settings.throttle());

    let spinner = Arc::new(SpinnerObserver::new(
        !quiet && !args.json && std::io::stderr().is_terminal(),
    ));
    let orchestrator = DownloadOrchestrator::new(metadata, fetcher)
        .with_concurrency(settings.concurrency)?
        .with_preamble_pages(settings.preamble_pages)
        .strict(args.strict)
        .with_observer(spinner.clone());

    let request = DownloadRequest::new(ark, &args.output)
        .with_range(args.start, args.end)
        .with_block_size(settings.block_size)
        .with_max_trials(settings.trials);
    debug!(?request, "download request");

    let result = orchestrator.run(&request).await;
    spinner.finish();
    let report = result.with_context(|| format!("Download of {} failed", request.ark))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }
    Ok(())
}

fn print_summary(report: &DownloadReport) {
    info!(
        blocks = report.blocks,
        attempts = report.attempts,
        "download finished"
    );
    println!(
        "{}: views {}-{}, {} pages, {} bytes -> {}",
        report.ark,
        report.first_view,
        report.last_view,
        report.pages,
        report.bytes,
        report.output.display()
    );
}
