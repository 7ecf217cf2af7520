//! URL builders for the Gallica document API.
//!
//! All routes hang off one base URL (`https://gallica.bnf.fr` in production,
//! a mock server in tests).

use url::Url;
use url::form_urlencoded;

use crate::download::{Block, DownloadError};
use crate::parser::Ark;

/// Production Gallica host.
pub const GALLICA_BASE_URL: &str = "https://gallica.bnf.fr";

/// NAAN of the BnF, assumed for short-form identifiers.
pub const DEFAULT_NAAN: &str = "12148";

/// XML services under `/services/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Issues,
    OaiRecord,
    Pagination,
    ContentSearch,
    Toc,
}

impl Service {
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Issues => "Issues",
            Self::OaiRecord => "OAIRecord",
            Self::Pagination => "Pagination",
            Self::ContentSearch => "ContentSearch",
            Self::Toc => "Toc",
        }
    }
}

/// Sizes served for view images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageResolution {
    Thumbnail,
    Lowres,
    Medres,
    Highres,
}

impl ImageResolution {
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Thumbnail => "thumbnail",
            Self::Lowres => "lowres",
            Self::Medres => "medres",
            Self::Highres => "highres",
        }
    }
}

/// Builds Gallica URLs from identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GallicaRoutes {
    base: String,
}

impl Default for GallicaRoutes {
    fn default() -> Self {
        Self {
            base: GALLICA_BASE_URL.to_string(),
        }
    }
}

impl GallicaRoutes {
    /// Routes rooted at `base_url` (scheme and host, optional path prefix).
    ///
    /// # Errors
    ///
    /// [`DownloadError::InvalidUrl`] unless `base_url` is an http(s) URL with
    /// a host.
    pub fn new(base_url: &str) -> Result<Self, DownloadError> {
        let parsed = Url::parse(base_url).map_err(|_| DownloadError::invalid_url(base_url))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(DownloadError::invalid_url(base_url));
        }
        Ok(Self {
            base: base_url.trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// `ark:/{naan}/{name}`, qualifiers dropped, default NAAN for short forms.
    #[must_use]
    pub fn ark_path(ark: &Ark) -> String {
        format!(
            "ark:/{}/{}",
            ark.naan().unwrap_or(DEFAULT_NAAN),
            ark.name()
        )
    }

    /// PDF rendering of one block: `{base}/ark:/{naan}/{name}/f{start}n{count}.pdf`.
    #[must_use]
    pub fn pdf_block(&self, ark: &Ark, block: Block) -> String {
        self.content(ark, block, "pdf")
    }

    /// Block rendering in another mode (`pdf`, `texteBrut`, ...).
    #[must_use]
    pub fn content(&self, ark: &Ark, block: Block, mode: &str) -> String {
        format!(
            "{}/{}/{}.{mode}",
            self.base,
            Self::ark_path(ark),
            block.qualifier()
        )
    }

    /// Plain-text rendering of the whole document.
    #[must_use]
    pub fn text_brut(&self, ark: &Ark) -> String {
        format!("{}/{}.texteBrut", self.base, Self::ark_path(ark))
    }

    /// One view as an image: `{base}/ark:/{naan}/{name}/f{view}.{resolution}`.
    #[must_use]
    pub fn view_image(&self, ark: &Ark, view: u32, resolution: ImageResolution) -> String {
        format!(
            "{}/{}/f{view}.{}",
            self.base,
            Self::ark_path(ark),
            resolution.suffix()
        )
    }

    /// IIIF Presentation manifest of the whole document.
    #[must_use]
    pub fn iiif_manifest(&self, ark: &Ark) -> String {
        format!("{}/iiif/{}/manifest.json", self.base, Self::ark_path(ark))
    }

    /// IIIF Image API information for one view.
    #[must_use]
    pub fn iiif_info(&self, ark: &Ark, view: u32) -> String {
        format!("{}/iiif/{}/f{view}/info.json", self.base, Self::ark_path(ark))
    }

    /// `{base}/services/{service}?{params}`.
    #[must_use]
    pub fn service(&self, service: Service, params: &[(&str, &str)]) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();
        format!("{}/services/{}?{query}", self.base, service.path())
    }

    /// Number of views and their labels.
    #[must_use]
    pub fn pagination(&self, ark: &Ark) -> String {
        self.service(Service::Pagination, &[("ark", ark.name())])
    }

    /// Bibliographic record.
    #[must_use]
    pub fn oai_record(&self, ark: &Ark) -> String {
        self.service(Service::OaiRecord, &[("ark", ark.name())])
    }

    /// Table of contents.
    #[must_use]
    pub fn toc(&self, ark: &Ark) -> String {
        self.service(Service::Toc, &[("ark", ark.name())])
    }

    /// Issues of a periodical, optionally for one year.
    #[must_use]
    pub fn issues(&self, ark: &Ark, year: Option<u16>) -> String {
        let ark_id = Self::ark_path(ark);
        let year = year.map(|y| y.to_string()).unwrap_or_default();
        self.service(Service::Issues, &[("ark", &ark_id), ("date", &year)])
    }

    /// Full-text search inside one document.
    #[must_use]
    pub fn content_search(&self, ark: &Ark, query: &str, start_result: Option<u32>) -> String {
        let start = start_result.map(|s| s.to_string()).unwrap_or_default();
        self.service(
            Service::ContentSearch,
            &[("ark", ark.name()), ("query", query), ("startResult", &start)],
        )
    }
}
