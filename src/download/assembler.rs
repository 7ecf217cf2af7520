//! Merges fetched block PDFs into one document.
//!
//! Gallica prepends a fixed preamble (licence and cover pages, two by
//! default) to every PDF it renders. The first block keeps it so the result
//! reads like a single-request download; every later block loses exactly
//! `preamble_pages` leading pages.
//!
//! Blocks are fed in plan order with [`PdfAssembler::push`], which parses and
//! checks each payload immediately; [`PdfAssembler::finish`] stitches the
//! page trees together and serialises the result.

use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};
use thiserror::Error;
use tracing::{debug, instrument};

use super::constants::DEFAULT_PREAMBLE_PAGES;
use super::plan::Block;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Page-tree depth guard against malformed `Parent` cycles.
const MAX_TREE_DEPTH: usize = 64;

/// Errors raised while merging blocks.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("block {index} ({block}) is not a readable PDF: {source}")]
    Malformed {
        index: usize,
        block: Block,
        #[source]
        source: lopdf::Error,
    },

    #[error("block {index} ({block}) has {pages} pages, fewer than the {preamble}-page preamble")]
    Truncated {
        index: usize,
        block: Block,
        pages: usize,
        preamble: usize,
    },

    #[error("block {index} ({block}) has {actual} pages, expected {expected}")]
    PageCountMismatch {
        index: usize,
        block: Block,
        expected: usize,
        actual: usize,
    },

    #[error("first block has no document catalog")]
    MissingCatalog,

    #[error("no blocks to assemble")]
    Empty,

    #[error("failed to serialize merged PDF: {reason}")]
    Write { reason: String },
}

/// The merged output, ready to be written.
#[derive(Debug, Clone)]
pub struct AssembledDocument {
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

struct Part {
    index: usize,
    block: Block,
    document: Document,
    /// Leading pages to drop.
    skip: usize,
}

/// Incremental block merger.
pub struct PdfAssembler {
    preamble_pages: usize,
    strict: bool,
    parts: Vec<Part>,
    page_count: usize,
}

impl std::fmt::Debug for PdfAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfAssembler")
            .field("preamble_pages", &self.preamble_pages)
            .field("strict", &self.strict)
            .field("blocks", &self.parts.len())
            .field("page_count", &self.page_count)
            .finish()
    }
}

impl Default for PdfAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfAssembler {
    /// Assembler stripping [`DEFAULT_PREAMBLE_PAGES`] pages, lenient page counts.
    #[must_use]
    pub fn new() -> Self {
        Self {
            preamble_pages: DEFAULT_PREAMBLE_PAGES,
            strict: false,
            parts: Vec::new(),
            page_count: 0,
        }
    }

    #[must_use]
    pub fn with_preamble_pages(mut self, preamble_pages: usize) -> Self {
        self.preamble_pages = preamble_pages;
        self
    }

    /// When set, every block must hold exactly `preamble + block.count()` pages.
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Pages the merged document will have so far.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Parses and queues the next block; returns the number of pages kept.
    ///
    /// # Errors
    ///
    /// [`AssemblyError::Malformed`], [`AssemblyError::Truncated`], or in
    /// strict mode [`AssemblyError::PageCountMismatch`].
    #[instrument(skip(self, payload), fields(index = self.parts.len(), bytes = payload.len()))]
    pub fn push(&mut self, block: Block, payload: &[u8]) -> Result<usize, AssemblyError> {
        let index = self.parts.len();
        let document = Document::load_mem(payload).map_err(|source| AssemblyError::Malformed {
            index,
            block,
            source,
        })?;
        let pages = document.get_pages().len();

        if pages < self.preamble_pages {
            return Err(AssemblyError::Truncated {
                index,
                block,
                pages,
                preamble: self.preamble_pages,
            });
        }
        if self.strict {
            let expected = self.preamble_pages + block.count() as usize;
            if pages != expected {
                return Err(AssemblyError::PageCountMismatch {
                    index,
                    block,
                    expected,
                    actual: pages,
                });
            }
        }

        let skip = if index == 0 { 0 } else { self.preamble_pages };
        let kept = pages - skip;
        self.page_count += kept;
        debug!(pages, kept, "block queued for assembly");
        self.parts.push(Part {
            index,
            block,
            document,
            skip,
        });
        Ok(kept)
    }

    /// Convenience: push every `(block, payload)` in order, then finish.
    ///
    /// # Errors
    ///
    /// Any error of [`PdfAssembler::push`] or [`PdfAssembler::finish`].
    pub fn assemble<I, P>(mut self, payloads: I) -> Result<AssembledDocument, AssemblyError>
    where
        I: IntoIterator<Item = (Block, P)>,
        P: AsRef<[u8]>,
    {
        for (block, payload) in payloads {
            self.push(block, payload.as_ref())?;
        }
        self.finish()
    }

    /// Merges the queued blocks into a single PDF.
    ///
    /// # Errors
    ///
    /// [`AssemblyError::Empty`] with nothing queued,
    /// [`AssemblyError::MissingCatalog`] if the first block has no catalog,
    /// [`AssemblyError::Write`] if serialisation fails.
    #[instrument(skip(self), fields(blocks = self.parts.len(), pages = self.page_count))]
    pub fn finish(self) -> Result<AssembledDocument, AssemblyError> {
        let Some(version) = self.parts.first().map(|p| p.document.version.clone()) else {
            return Err(AssemblyError::Empty);
        };

        let mut merged = Document::with_version(version);
        let mut next_id = 1;
        let mut catalog: Option<(ObjectId, Dictionary)> = None;
        let mut kept_pages: Vec<(ObjectId, Dictionary)> = Vec::with_capacity(self.page_count);

        for Part {
            index,
            block,
            mut document,
            skip,
        } in self.parts
        {
            document.renumber_objects_with(next_id);
            next_id = document.max_id + 1;

            for page_id in document.get_pages().into_values().skip(skip) {
                let mut page = document
                    .get_object(page_id)
                    .and_then(Object::as_dict)
                    .cloned()
                    .map_err(|source| AssemblyError::Malformed {
                        index,
                        block,
                        source,
                    })?;
                materialize_inherited(&document, &mut page);
                kept_pages.push((page_id, page));
            }

            if catalog.is_none() {
                catalog = root_catalog(&document);
            }

            for (id, object) in document.objects {
                match type_name(&object) {
                    Some(b"Catalog" | b"Pages" | b"Page" | b"Outlines" | b"Outline") => {}
                    _ => {
                        merged.objects.insert(id, object);
                    }
                }
            }
        }

        let (catalog_id, mut catalog) = catalog.ok_or(AssemblyError::MissingCatalog)?;

        merged.max_id = next_id.saturating_sub(1);
        let pages_id = merged.new_object_id();
        let page_count = kept_pages.len();
        let kids: Vec<Object> = kept_pages
            .iter()
            .map(|(id, _)| Object::Reference(*id))
            .collect();
        for (id, mut page) in kept_pages {
            page.set("Parent", pages_id);
            merged.objects.insert(id, Object::Dictionary(page));
        }
        merged.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => i64::try_from(page_count).unwrap_or(i64::MAX),
            }),
        );

        catalog.set("Pages", pages_id);
        // Both index into the original page sequence.
        catalog.remove(b"Outlines");
        catalog.remove(b"PageLabels");
        merged.objects.insert(catalog_id, Object::Dictionary(catalog));
        merged.trailer.set("Root", catalog_id);

        merged.prune_objects();
        merged.renumber_objects();
        merged.compress();

        let mut bytes = Vec::new();
        merged
            .save_to(&mut bytes)
            .map_err(|e| AssemblyError::Write {
                reason: e.to_string(),
            })?;

        debug!(page_count, bytes = bytes.len(), "merged PDF serialized");
        Ok(AssembledDocument { bytes, page_count })
    }
}

fn root_catalog(document: &Document) -> Option<(ObjectId, Dictionary)> {
    let root = document
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .ok()?;
    let catalog = document
        .get_object(root)
        .and_then(Object::as_dict)
        .ok()?
        .clone();
    Some((root, catalog))
}

fn type_name(object: &Object) -> Option<&[u8]> {
    let dict = match object {
        Object::Dictionary(dict) => dict,
        Object::Stream(stream) => &stream.dict,
        _ => return None,
    };
    dict.get(b"Type").and_then(Object::as_name).ok()
}

/// Copies inheritable attributes down from the page's ancestors.
///
/// The original intermediate `Pages` nodes are dropped during the merge.
fn materialize_inherited(document: &Document, page: &mut Dictionary) {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;
    while let Some(parent_id) = parent {
        if depth >= MAX_TREE_DEPTH {
            break;
        }
        depth += 1;
        let Ok(node) = document.get_object(parent_id).and_then(Object::as_dict) else {
            break;
        };
        for key in INHERITABLE {
            if !page.has(key)
                && let Ok(value) = node.get(key)
            {
                page.set(key, value.clone());
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
}
