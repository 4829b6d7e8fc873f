//! Page-ordered document text sources.
//!
//! The engine never parses binary formats itself. A [`DocumentSource`]
//! hands it plain text, one string per page, in page order.

use crate::error::Result;

/// Supplies the text of a document, one entry per page.
pub trait DocumentSource: Send + Sync {
    /// Return the text of every page in order. Page `i` of the result is page `i + 1`.
    fn pages(&self) -> Result<Vec<String>>;
}

/// A document whose pages are already split.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PagedText {
    pages: Vec<String>,
}

impl PagedText {
    /// Create a source from an ordered list of page texts.
    pub fn new<I, S>(pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { pages: pages.into_iter().map(Into::into).collect() }
    }
}

impl DocumentSource for PagedText {
    fn pages(&self) -> Result<Vec<String>> {
        Ok(self.pages.clone())
    }
}

/// A single plain-text string with pages separated by form feeds (`\x0c`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlainText {
    text: String,
}

impl PlainText {
    /// Page separator used by text extractors such as `pdftotext`.
    pub const PAGE_BREAK: char = '\x0c';

    /// Wrap a plain-text document.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl DocumentSource for PlainText {
    fn pages(&self) -> Result<Vec<String>> {
        if self.text.is_empty() {
            return Ok(Vec::new());
        }
        let mut pages: Vec<String> =
            self.text.split(Self::PAGE_BREAK).map(str::to_string).collect();
        // Extractors terminate the last page with a form feed as well.
        if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
            pages.pop();
        }
        Ok(pages)
    }
}
