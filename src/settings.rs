//! Effective settings: built-in defaults, then the config file, then flags.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use gallica_core::download::{
    ClientSettings, DEFAULT_CONCURRENCY, DEFAULT_MAX_TRIALS, DEFAULT_PREAMBLE_PAGES, HostThrottle,
    HttpClient, RECOMMENDED_BLOCK_SIZE,
};
use gallica_core::download::constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_REQUEST_SPACING, READ_TIMEOUT_SECS,
};
use gallica_core::gallica::{GALLICA_BASE_URL, GallicaClient, GallicaRoutes};

use crate::app_config::FileConfig;
use crate::cli::PdfArgs;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub base_url: String,
    pub contact: Option<String>,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub request_spacing: Duration,
    /// `None` downloads the range as one block.
    pub block_size: Option<u32>,
    pub trials: u32,
    pub concurrency: usize,
    pub preamble_pages: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: GALLICA_BASE_URL.to_string(),
            contact: None,
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
            request_spacing: DEFAULT_REQUEST_SPACING,
            block_size: Some(RECOMMENDED_BLOCK_SIZE),
            trials: DEFAULT_MAX_TRIALS,
            concurrency: DEFAULT_CONCURRENCY,
            preamble_pages: DEFAULT_PREAMBLE_PAGES,
        }
    }
}

impl Settings {
    /// Defaults overlaid with the config file and the global `--base-url`.
    #[must_use]
    pub fn resolve(config: Option<&FileConfig>, base_url: Option<&str>) -> Self {
        let mut settings = Self::default();
        if let Some(cfg) = config {
            settings.apply_file(cfg);
        }
        if let Some(base_url) = base_url {
            settings.base_url = base_url.to_string();
        }
        settings
    }

    fn apply_file(&mut self, cfg: &FileConfig) {
        if let Some(base_url) = &cfg.base_url {
            self.base_url.clone_from(base_url);
        }
        if cfg.contact.is_some() {
            self.contact.clone_from(&cfg.contact);
        }
        if let Some(secs) = cfg.connect_timeout_secs {
            self.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = cfg.read_timeout_secs {
            self.read_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = cfg.request_spacing_ms {
            self.request_spacing = Duration::from_millis(ms);
        }
        if let Some(block_size) = cfg.block_size {
            self.block_size = Some(block_size);
        }
        if let Some(trials) = cfg.trials {
            self.trials = trials;
        }
        if let Some(concurrency) = cfg.concurrency {
            self.concurrency = usize::from(concurrency);
        }
        if let Some(preamble) = cfg.preamble_pages {
            self.preamble_pages = usize::from(preamble);
        }
    }

    /// Lets `pdf` flags override the resolved values.
    pub fn apply_pdf_args(&mut self, args: &PdfArgs) {
        if args.single_block {
            self.block_size = None;
        } else if let Some(block_size) = args.block_size {
            self.block_size = Some(block_size);
        }
        if let Some(trials) = args.trials {
            self.trials = trials;
        }
        if let Some(concurrency) = args.concurrency {
            self.concurrency = usize::from(concurrency);
        }
        if let Some(preamble) = args.preamble_pages {
            self.preamble_pages = usize::from(preamble);
        }
        if let Some(ms) = args.request_spacing {
            self.request_spacing = Duration::from_millis(ms);
        }
    }

    pub fn routes(&self) -> Result<GallicaRoutes> {
        GallicaRoutes::new(&self.base_url)
            .with_context(|| format!("Invalid Gallica base URL '{}'", self.base_url))
    }

    pub fn http_client(&self) -> Result<Arc<HttpClient>> {
        let client = HttpClient::with_settings(&ClientSettings {
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
            contact: self.contact.clone(),
        })
        .context("Failed to build HTTP client")?;
        Ok(Arc::new(client))
    }

    #[must_use]
    pub fn throttle(&self) -> Arc<HostThrottle> {
        if self.request_spacing.is_zero() {
            Arc::new(HostThrottle::disabled())
        } else {
            Arc::new(HostThrottle::new(self.request_spacing))
        }
    }

    /// Metadata client over a fresh HTTP client.
    pub fn gallica_client(&self) -> Result<GallicaClient> {
        Ok(GallicaClient::new(self.http_client()?, self.routes()?))
    }
}
