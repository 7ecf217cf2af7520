//! Read-only Gallica metadata services.
//!
//! [`MetadataClient`] is what the downloader needs (the number of views of a
//! document). [`GallicaClient`] implements it over any [`Transport`] and also
//! exposes the other XML/JSON services for the `meta` command.
//!
//! None of these calls retry; a failed lookup is reported as is.

mod routes;

pub use routes::{
    DEFAULT_NAAN, GALLICA_BASE_URL, GallicaRoutes, ImageResolution, Service,
};

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::download::{DownloadError, Transport};
use crate::parser::Ark;

#[allow(clippy::expect_used)]
static NB_VUE_IMAGES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<nbVueImages>\s*([^<]*?)\s*</nbVueImages>")
        .expect("nbVueImages regex is valid") // Static pattern, safe to panic
});

/// Errors from metadata lookups.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error(transparent)]
    Request(#[from] DownloadError),

    #[error("pagination response for {ark} has no <nbVueImages> element")]
    MissingPageCount { ark: String },

    #[error("invalid view count '{value}' for {ark}")]
    InvalidPageCount { ark: String, value: String },

    #[error("invalid JSON from {url}: {source}")]
    Json {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Source of document metadata needed for planning.
#[async_trait]
pub trait MetadataClient: Send + Sync {
    /// Total number of views of the document named by `ark`.
    ///
    /// # Errors
    ///
    /// [`MetadataError`] when the service is unreachable or its answer has
    /// no usable count.
    async fn page_count(&self, ark: &Ark) -> Result<u32, MetadataError>;
}

/// Gallica services over a shared transport.
#[derive(Clone)]
pub struct GallicaClient {
    transport: Arc<dyn Transport>,
    routes: GallicaRoutes,
}

impl std::fmt::Debug for GallicaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GallicaClient")
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}

impl GallicaClient {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, routes: GallicaRoutes) -> Self {
        Self { transport, routes }
    }

    #[must_use]
    pub fn routes(&self) -> &GallicaRoutes {
        &self.routes
    }

    async fn fetch_text(&self, url: &str) -> Result<String, MetadataError> {
        let body = self.transport.get_bytes(url).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Any XML service with arbitrary parameters.
    ///
    /// # Errors
    ///
    /// [`MetadataError::Request`] on transport failure.
    #[instrument(skip(self, params), fields(service = service.path()))]
    pub async fn service_text(
        &self,
        service: Service,
        params: &[(&str, &str)],
    ) -> Result<String, MetadataError> {
        self.fetch_text(&self.routes.service(service, params)).await
    }

    /// Raw Pagination XML.
    ///
    /// # Errors
    ///
    /// [`MetadataError::Request`] on transport failure.
    #[instrument(skip(self), fields(ark = %ark))]
    pub async fn pagination_xml(&self, ark: &Ark) -> Result<String, MetadataError> {
        self.fetch_text(&self.routes.pagination(ark)).await
    }

    /// Raw OAI record XML.
    ///
    /// # Errors
    ///
    /// [`MetadataError::Request`] on transport failure.
    #[instrument(skip(self), fields(ark = %ark))]
    pub async fn oai_record(&self, ark: &Ark) -> Result<String, MetadataError> {
        self.fetch_text(&self.routes.oai_record(ark)).await
    }

    /// Raw table-of-contents XML.
    ///
    /// # Errors
    ///
    /// [`MetadataError::Request`] on transport failure.
    #[instrument(skip(self), fields(ark = %ark))]
    pub async fn toc(&self, ark: &Ark) -> Result<String, MetadataError> {
        self.fetch_text(&self.routes.toc(ark)).await
    }

    /// Raw Issues XML of a periodical.
    ///
    /// # Errors
    ///
    /// [`MetadataError::Request`] on transport failure.
    #[instrument(skip(self), fields(ark = %ark))]
    pub async fn issues(&self, ark: &Ark, year: Option<u16>) -> Result<String, MetadataError> {
        self.fetch_text(&self.routes.issues(ark, year)).await
    }

    /// Raw ContentSearch XML.
    ///
    /// # Errors
    ///
    /// [`MetadataError::Request`] on transport failure.
    #[instrument(skip(self), fields(ark = %ark))]
    pub async fn content_search(
        &self,
        ark: &Ark,
        query: &str,
        start_result: Option<u32>,
    ) -> Result<String, MetadataError> {
        self.fetch_text(&self.routes.content_search(ark, query, start_result))
            .await
    }

    /// Plain-text rendering of the whole document.
    ///
    /// # Errors
    ///
    /// [`MetadataError::Request`] on transport failure.
    #[instrument(skip(self), fields(ark = %ark))]
    pub async fn text_brut(&self, ark: &Ark) -> Result<String, MetadataError> {
        self.fetch_text(&self.routes.text_brut(ark)).await
    }

    /// IIIF manifest decoded as JSON.
    ///
    /// # Errors
    ///
    /// [`MetadataError::Request`] on transport failure,
    /// [`MetadataError::Json`] when the body is not JSON.
    #[instrument(skip(self), fields(ark = %ark))]
    pub async fn iiif_manifest(&self, ark: &Ark) -> Result<serde_json::Value, MetadataError> {
        let url = self.routes.iiif_manifest(ark);
        let body = self.transport.get_bytes(&url).await?;
        serde_json::from_slice(&body).map_err(|source| MetadataError::Json { url, source })
    }
}

#[async_trait]
impl MetadataClient for GallicaClient {
    #[instrument(skip(self), fields(ark = %ark))]
    async fn page_count(&self, ark: &Ark) -> Result<u32, MetadataError> {
        let xml = self.pagination_xml(ark).await?;
        let count = parse_page_count(&xml, ark)?;
        debug!(count, "view count from Pagination");
        Ok(count)
    }
}

/// Reads `<nbVueImages>` from a Pagination response.
///
/// # Errors
///
/// [`MetadataError::MissingPageCount`] or [`MetadataError::InvalidPageCount`].
pub fn parse_page_count(xml: &str, ark: &Ark) -> Result<u32, MetadataError> {
    let Some(captures) = NB_VUE_IMAGES.captures(xml) else {
        return Err(MetadataError::MissingPageCount {
            ark: ark.to_string(),
        });
    };
    let value = captures.get(1).map_or("", |m| m.as_str());
    value
        .parse::<u32>()
        .map_err(|_| MetadataError::InvalidPageCount {
            ark: ark.to_string(),
            value: value.to_string(),
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    const PAGINATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<livre>
  <structure>
    <hasToc>false</hasToc>
    <nbVueImages>
      412
    </nbVueImages>
    <premierNumero>1</premierNumero>
  </structure>
  <pages><page><numero>1</numero><ordre>1</ordre></page></pages>
</livre>"#;

    /// Serves one canned body and records requested URLs.
    struct CannedTransport {
        body: Vec<u8>,
        requested: Mutex<Vec<String>>,
    }

    impl CannedTransport {
        fn new(body: &[u8]) -> Arc<Self> {
            Arc::new(Self {
                body: body.to_vec(),
                requested: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Transport for CannedTransport {
        async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
            self.requested.lock().unwrap().push(url.to_string());
            Ok(self.body.clone())
        }
    }

    struct DownTransport;

    #[async_trait]
    impl Transport for DownTransport {
        async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
            Err(DownloadError::http_status(url, 503))
        }
    }

    fn ark() -> Ark {
        Ark::parse("ark:/12148/bpt6k5619759j").unwrap()
    }

    #[test]
    fn test_parse_page_count_reads_nb_vue_images() {
        assert_eq!(parse_page_count(PAGINATION, &ark()).unwrap(), 412);
    }

    #[test]
    fn test_parse_page_count_missing_element() {
        let err = parse_page_count("<livre><structure/></livre>", &ark()).unwrap_err();
        assert!(matches!(err, MetadataError::MissingPageCount { .. }));
    }

    #[test]
    fn test_parse_page_count_non_numeric() {
        let err = parse_page_count("<nbVueImages>many</nbVueImages>", &ark()).unwrap_err();
        assert!(matches!(err, MetadataError::InvalidPageCount { ref value, .. } if value == "many"));
    }

    #[tokio::test]
    async fn test_page_count_queries_pagination_service() {
        let transport = CannedTransport::new(PAGINATION.as_bytes());
        let client = GallicaClient::new(transport.clone(), GallicaRoutes::default());

        assert_eq!(client.page_count(&ark()).await.unwrap(), 412);
        assert_eq!(
            transport.requested.lock().unwrap().as_slice(),
            ["https://gallica.bnf.fr/services/Pagination?ark=bpt6k5619759j"]
        );
    }

    #[tokio::test]
    async fn test_page_count_propagates_transport_error() {
        let client = GallicaClient::new(Arc::new(DownTransport), GallicaRoutes::default());
        let err = client.page_count(&ark()).await.unwrap_err();
        assert!(matches!(
            err,
            MetadataError::Request(DownloadError::HttpStatus { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn test_service_text_passes_parameters() {
        let transport = CannedTransport::new(b"<results/>");
        let client = GallicaClient::new(transport.clone(), GallicaRoutes::default());
        let body = client
            .service_text(Service::Issues, &[("ark", "ark:/12148/cb32798952c/date"), ("date", "")])
            .await
            .unwrap();
        assert_eq!(body, "<results/>");
        assert_eq!(
            transport.requested.lock().unwrap().as_slice(),
            ["https://gallica.bnf.fr/services/Issues?ark=ark%3A%2F12148%2Fcb32798952c%2Fdate&date="]
        );
    }

    #[tokio::test]
    async fn test_iiif_manifest_decodes_json() {
        let transport = CannedTransport::new(br#"{"@id": "manifest", "sequences": []}"#);
        let client = GallicaClient::new(transport, GallicaRoutes::default());
        let manifest = client.iiif_manifest(&ark()).await.unwrap();
        assert_eq!(manifest["@id"], "manifest");

        let client = GallicaClient::new(CannedTransport::new(b"<html/>"), GallicaRoutes::default());
        assert!(matches!(
            client.iiif_manifest(&ark()).await.unwrap_err(),
            MetadataError::Json { .. }
        ));
    }
}
