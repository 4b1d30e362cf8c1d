/// Failure to read a PDF byte stream.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct PdfReadError(pub String);

/// Splits a PDF byte stream into per-page text, in page order.
pub trait PdfReader: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the bytes are not a readable PDF or a page's text
    /// cannot be decoded.
    fn read_pages(&self, bytes: &[u8]) -> Result<Vec<String>, PdfReadError>;
}

/// [`PdfReader`] backed by `lopdf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfReader;

impl PdfReader for LopdfReader {
    fn read_pages(&self, bytes: &[u8]) -> Result<Vec<String>, PdfReadError> {
        let doc = lopdf::Document::load_mem(bytes).map_err(|e| PdfReadError(e.to_string()))?;

        // BTreeMap keyed by 1-based page number, so iteration is page order.
        let pages = doc.get_pages();
        let mut texts = Vec::with_capacity(pages.len());
        for page_number in pages.keys() {
            let text = doc
                .extract_text(&[*page_number])
                .map_err(|e| PdfReadError(format!("page {page_number}: {e}")))?;
            texts.push(text);
        }
        Ok(texts)
    }
}

/// Minimal PDF generation for tests.
#[cfg(any(test, feature = "mock"))]
pub mod fixture {
    use lopdf::content::{Content, Operation};
    use lopdf::{Document, Object, Stream, dictionary};

    /// Build a PDF with one page per entry, each page showing its text in Courier.
    ///
    /// # Panics
    ///
    /// Panics if `lopdf` fails to encode or serialize the document.
    #[must_use]
    pub fn text_pdf(pages: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![50.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            });
            kids.push(page_id.into());
        }

        let count = i64::try_from(kids.len()).unwrap();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }
}
