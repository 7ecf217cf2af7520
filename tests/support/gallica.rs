//! A fake Gallica: Pagination XML and block PDFs served by wiremock.

use std::sync::atomic::{AtomicUsize, Ordering};

use lopdf::{Document, Object, Stream, dictionary};
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const NAME: &str = "bpt6k5619759j";
pub const ARK: &str = "ark:/12148/bpt6k5619759j";
pub const PREAMBLE: usize = 2;

/// PDF whose page `n` draws `"{label} page {n}"`.
pub fn sample_pdf(label: &str, pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let mut kids: Vec<Object> = Vec::new();
    for n in 0..pages {
        let text = format!("BT /F1 12 Tf 72 720 Td ({label} page {n}) Tj ET");
        let content_id = doc.add_object(Stream::new(dictionary! {}, text.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(595),
                Object::Integer(842),
            ],
        });
        kids.push(page_id.into());
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => i64::try_from(pages).expect("page count fits i64"),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("serialize sample PDF");
    bytes
}

/// Decoded content stream of every page, in order.
pub fn page_texts(bytes: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(bytes).expect("readable PDF");
    doc.get_pages()
        .into_values()
        .map(|id| {
            String::from_utf8_lossy(&doc.get_page_content(id).expect("page content")).into_owned()
        })
        .collect()
}

pub fn pagination_xml(views: u32) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<livre><structure><nbVueImages>{views}</nbVueImages></structure></livre>"
    )
}

/// `(start, count)` from a `.../f{start}n{count}.pdf` path.
pub fn block_bounds(request_path: &str) -> (u32, u32) {
    let tail = request_path
        .rsplit('/')
        .next()
        .expect("non-empty path")
        .trim_end_matches(".pdf");
    let (start, count) = tail
        .trim_start_matches('f')
        .split_once('n')
        .expect("f{start}n{count} qualifier");
    (
        start.parse().expect("numeric start"),
        count.parse().expect("numeric count"),
    )
}

/// Serves `preamble + count` pages for each block; the first `failures`
/// requests get `failure_status` instead.
pub struct BlockResponder {
    failures: usize,
    failure_status: u16,
    fail_start: Option<u32>,
    served: AtomicUsize,
}

impl BlockResponder {
    pub fn healthy() -> Self {
        Self {
            failures: 0,
            failure_status: 503,
            fail_start: None,
            served: AtomicUsize::new(0),
        }
    }

    /// Fails the first `failures` requests with `status`.
    pub fn flaky(failures: usize, status: u16) -> Self {
        Self {
            failures,
            failure_status: status,
            ..Self::healthy()
        }
    }

    /// Always fails the block starting at `start` with `status`.
    pub fn broken_block(start: u32, status: u16) -> Self {
        Self {
            failure_status: status,
            fail_start: Some(start),
            ..Self::healthy()
        }
    }
}

impl Respond for BlockResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let seen = self.served.fetch_add(1, Ordering::SeqCst);
        let (start, count) = block_bounds(request.url.path());
        if seen < self.failures || self.fail_start == Some(start) {
            return ResponseTemplate::new(self.failure_status);
        }
        ResponseTemplate::new(200)
            .insert_header("content-type", "application/pdf")
            .set_body_bytes(sample_pdf(&format!("f{start}"), count as usize + PREAMBLE))
    }
}

pub async fn mount_pagination(server: &MockServer, views: u32) {
    Mock::given(method("GET"))
        .and(path("/services/Pagination"))
        .and(query_param("ark", NAME))
        .respond_with(ResponseTemplate::new(200).set_body_string(pagination_xml(views)))
        .mount(server)
        .await;
}

pub async fn mount_blocks(server: &MockServer, responder: BlockResponder) {
    Mock::given(method("GET"))
        .and(path_regex(format!(r"^/ark:/12148/{NAME}/f\d+n\d+\.pdf$")))
        .respond_with(responder)
        .mount(server)
        .await;
}

/// Block requests received so far, as `(start, count)`.
pub async fn block_requests(server: &MockServer) -> Vec<(u32, u32)> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path().ends_with(".pdf"))
        .map(|request| block_bounds(request.url.path()))
        .collect()
}
