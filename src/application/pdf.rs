//! PDF post-processing with `lopdf`: document info, outlines built from the
//! viewer's table of contents, and the press-ready rewrite.

use std::{
    fs, io,
    io::Write,
    path::{Path, PathBuf},
};

use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};
use tempfile::NamedTempFile;
use thiserror::Error;
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};
use tracing::debug;

use super::render::viewer::{ExtractedMetadata, TocItem};

const PRODUCER: &str = concat!("bindery ", env!("CARGO_PKG_VERSION"));
const PDF_DATE: &[BorrowedFormatItem<'static>] =
    format_description!("D:[year][month][day][hour][minute][second]Z");
const PDFX_VERSION: &str = "PDF/X-1:2001";
const PDFX_CONDITION: &str = "CGATS TR 001";
const PDFX_REGISTRY: &str = "http://www.color.org";
const MAX_NAME_TREE_DEPTH: usize = 32;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("failed to parse PDF: {0}")]
    Parse(#[source] lopdf::Error),
    #[error("PDF has no usable document catalog")]
    MissingCatalog,
    #[error("PDF document info is not a dictionary")]
    InvalidInfo,
    #[error("failed to serialise PDF: {0}")]
    Serialize(#[source] lopdf::Error),
    #[error("failed to format modification date: {0}")]
    Date(#[from] time::error::Format),
    #[error("failed to write `{path}`: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Values written into the Info dictionary and catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub language: Option<String>,
    pub subject: Option<String>,
    pub keywords: Vec<String>,
}

impl DocumentInfo {
    pub fn from_metadata(metadata: &ExtractedMetadata) -> Self {
        let creators = metadata.creators();
        Self {
            title: metadata.title().map(str::to_string),
            author: (!creators.is_empty()).then(|| creators.join(", ")),
            language: metadata.language().map(str::to_string),
            subject: metadata.description().map(str::to_string),
            keywords: metadata
                .subjects()
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }

    /// Fill missing title, author and language from configuration.
    pub fn with_fallbacks(
        mut self,
        title: Option<&str>,
        author: Option<&str>,
        language: &str,
    ) -> Self {
        self.title = self.title.or_else(|| title.map(str::to_string));
        self.author = self.author.or_else(|| author.map(str::to_string));
        self.language = self.language.or_else(|| Some(language.to_string()));
        self
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SaveOptions {
    pub press_ready: bool,
}

pub struct PdfDocument {
    inner: Document,
}

impl PdfDocument {
    pub fn load(bytes: &[u8]) -> Result<Self, PdfError> {
        let inner = Document::load_mem(bytes).map_err(PdfError::Parse)?;
        Ok(Self { inner })
    }

    pub fn apply_metadata(&mut self, info: &DocumentInfo) -> Result<(), PdfError> {
        let modified = OffsetDateTime::now_utc().format(PDF_DATE)?;

        let dictionary = self.info_mut()?;
        if let Some(title) = info.title.as_deref() {
            dictionary.set("Title", text_string(title));
        }
        if let Some(author) = info.author.as_deref() {
            dictionary.set("Author", text_string(author));
        }
        if let Some(subject) = info.subject.as_deref() {
            dictionary.set("Subject", text_string(subject));
        }
        if !info.keywords.is_empty() {
            dictionary.set("Keywords", text_string(&info.keywords.join(", ")));
        }
        dictionary.set("Producer", text_string(PRODUCER));
        dictionary.set("ModDate", Object::string_literal(modified));

        if let Some(language) = info.language.as_deref() {
            self.catalog_mut()?.set("Lang", text_string(language));
        }
        Ok(())
    }

    /// Replace the outline tree with one item per TOC entry, nested as given.
    /// Returns the number of outline items written.
    pub fn apply_toc(&mut self, items: &[TocItem]) -> Result<usize, PdfError> {
        if items.is_empty() {
            return Ok(0);
        }

        let outlines_id = self.inner.new_object_id();
        let (first, last, written) = self.build_level(items, outlines_id)?;

        let mut root = Dictionary::new();
        root.set("Type", Object::Name(b"Outlines".to_vec()));
        root.set("First", Object::Reference(first));
        root.set("Last", Object::Reference(last));
        root.set("Count", Object::Integer(items.len() as i64));
        self.inner
            .objects
            .insert(outlines_id, Object::Dictionary(root));

        let catalog = self.catalog_mut()?;
        catalog.set("Outlines", Object::Reference(outlines_id));
        catalog.set("PageMode", Object::Name(b"UseOutlines".to_vec()));

        debug!(target = "bindery::pdf", items = written, "Wrote outline tree");
        Ok(written)
    }

    pub fn save(&mut self, path: &Path, options: SaveOptions) -> Result<(), PdfError> {
        if options.press_ready {
            self.apply_press_ready()?;
        }

        let mut buffer = Vec::new();
        self.inner
            .save_to(&mut buffer)
            .map_err(|e| PdfError::Serialize(e.into()))?;
        write_atomically(path, &buffer)
    }

    pub fn to_bytes(&mut self) -> Result<Vec<u8>, PdfError> {
        let mut buffer = Vec::new();
        self.inner
            .save_to(&mut buffer)
            .map_err(|e| PdfError::Serialize(e.into()))?;
        Ok(buffer)
    }

    fn build_level(
        &mut self,
        items: &[TocItem],
        parent: ObjectId,
    ) -> Result<(ObjectId, ObjectId, usize), PdfError> {
        let ids: Vec<ObjectId> = items.iter().map(|_| self.inner.new_object_id()).collect();
        let mut written = items.len();

        for (index, item) in items.iter().enumerate() {
            let mut entry = Dictionary::new();
            entry.set("Title", text_string(&item.title));
            entry.set("Parent", Object::Reference(parent));
            if !item.id.is_empty() {
                entry.set("Dest", self.destination(&item.id));
            }
            if index > 0 {
                entry.set("Prev", Object::Reference(ids[index - 1]));
            }
            if let Some(next) = ids.get(index + 1) {
                entry.set("Next", Object::Reference(*next));
            }
            if !item.children.is_empty() {
                let (first, last, nested) = self.build_level(&item.children, ids[index])?;
                entry.set("First", Object::Reference(first));
                entry.set("Last", Object::Reference(last));
                entry.set("Count", Object::Integer(-(item.children.len() as i64)));
                written += nested;
            }
            self.inner
                .objects
                .insert(ids[index], Object::Dictionary(entry));
        }

        let first = ids[0];
        let last = ids[ids.len() - 1];
        Ok((first, last, written))
    }

    /// Explicit destination for a named anchor when the document declares
    /// one, otherwise the name itself.
    fn destination(&self, name: &str) -> Object {
        self.lookup_named_destination(name.as_bytes())
            .unwrap_or_else(|| Object::Name(name.as_bytes().to_vec()))
    }

    fn lookup_named_destination(&self, key: &[u8]) -> Option<Object> {
        let catalog = self.catalog().ok()?;

        if let Some(dests) = catalog.get(b"Dests").ok().and_then(|obj| self.resolve_dict(obj)) {
            if let Ok(found) = dests.get(key) {
                return self.explicit_destination(found);
            }
        }

        let names = catalog
            .get(b"Names")
            .ok()
            .and_then(|obj| self.resolve_dict(obj))?;
        let tree = names
            .get(b"Dests")
            .ok()
            .and_then(|obj| self.resolve_dict(obj))?;
        self.search_name_tree(tree, key, 0)
    }

    fn search_name_tree(&self, node: &Dictionary, key: &[u8], depth: usize) -> Option<Object> {
        if depth > MAX_NAME_TREE_DEPTH {
            return None;
        }

        if let Some(Object::Array(names)) = node.get(b"Names").ok().map(|obj| self.resolve(obj)) {
            for pair in names.chunks(2) {
                if let [Object::String(name, _), value] = pair {
                    if name.as_slice() == key {
                        return self.explicit_destination(value);
                    }
                }
            }
        }

        if let Some(Object::Array(kids)) = node.get(b"Kids").ok().map(|obj| self.resolve(obj)) {
            for kid in kids {
                let found = self
                    .resolve_dict(kid)
                    .and_then(|child| self.search_name_tree(child, key, depth + 1));
                if found.is_some() {
                    return found;
                }
            }
        }
        None
    }

    fn explicit_destination(&self, value: &Object) -> Option<Object> {
        match self.resolve(value) {
            Object::Array(array) => Some(Object::Array(array.clone())),
            Object::Dictionary(dict) => dict
                .get(b"D")
                .ok()
                .map(|dest| self.resolve(dest).clone()),
            _ => None,
        }
    }

    /// Mark the document as PDF/X-1a and set page trim boxes.
    ///
    /// Only the identification keys and the output intent are written. Page
    /// content is left as captured: colours stay RGB, transparency is not
    /// flattened and font embedding is not checked, so the result will not
    /// pass a conformance preflight without a separate conversion step.
    fn apply_press_ready(&mut self) -> Result<(), PdfError> {
        let info = self.info_mut()?;
        info.set("GTS_PDFXVersion", Object::string_literal(PDFX_VERSION));
        info.set("Trapped", Object::Name(b"False".to_vec()));

        let mut intent = Dictionary::new();
        intent.set("Type", Object::Name(b"OutputIntent".to_vec()));
        intent.set("S", Object::Name(b"GTS_PDFX".to_vec()));
        intent.set(
            "OutputConditionIdentifier",
            Object::string_literal(PDFX_CONDITION),
        );
        intent.set("RegistryName", Object::string_literal(PDFX_REGISTRY));
        intent.set("Info", Object::string_literal(PDFX_CONDITION));
        let intent_id = self.inner.add_object(intent);
        self.catalog_mut()?.set(
            "OutputIntents",
            Object::Array(vec![Object::Reference(intent_id)]),
        );

        let boxes: Vec<(ObjectId, Object)> = self
            .inner
            .get_pages()
            .values()
            .filter_map(|page_id| {
                self.inherited_media_box(*page_id)
                    .map(|media_box| (*page_id, media_box))
            })
            .collect();
        for (page_id, media_box) in boxes {
            if let Ok(page) = self
                .inner
                .get_object_mut(page_id)
                .and_then(Object::as_dict_mut)
            {
                page.set("TrimBox", media_box);
            }
        }
        Ok(())
    }

    fn inherited_media_box(&self, page_id: ObjectId) -> Option<Object> {
        let mut current = self.inner.get_dictionary(page_id).ok()?;
        for _ in 0..MAX_NAME_TREE_DEPTH {
            if let Ok(media_box) = current.get(b"MediaBox") {
                return Some(self.resolve(media_box).clone());
            }
            current = current
                .get(b"Parent")
                .ok()
                .and_then(|parent| self.resolve_dict(parent))?;
        }
        None
    }

    fn catalog(&self) -> Result<&Dictionary, PdfError> {
        let id = self.catalog_id()?;
        self.inner
            .get_dictionary(id)
            .map_err(|_| PdfError::MissingCatalog)
    }

    fn catalog_mut(&mut self) -> Result<&mut Dictionary, PdfError> {
        let id = self.catalog_id()?;
        self.inner
            .get_object_mut(id)
            .and_then(Object::as_dict_mut)
            .map_err(|_| PdfError::MissingCatalog)
    }

    fn catalog_id(&self) -> Result<ObjectId, PdfError> {
        self.inner
            .trailer
            .get(b"Root")
            .and_then(Object::as_reference)
            .map_err(|_| PdfError::MissingCatalog)
    }

    fn info_mut(&mut self) -> Result<&mut Dictionary, PdfError> {
        let existing = self
            .inner
            .trailer
            .get(b"Info")
            .and_then(Object::as_reference)
            .ok();
        let id = match existing {
            Some(id) => id,
            None => {
                let id = self.inner.add_object(Dictionary::new());
                self.inner.trailer.set("Info", Object::Reference(id));
                id
            }
        };
        self.inner
            .get_object_mut(id)
            .and_then(Object::as_dict_mut)
            .map_err(|_| PdfError::InvalidInfo)
    }

    fn resolve<'a>(&'a self, object: &'a Object) -> &'a Object {
        match object {
            Object::Reference(id) => self.inner.get_object(*id).unwrap_or(object),
            other => other,
        }
    }

    fn resolve_dict<'a>(&'a self, object: &'a Object) -> Option<&'a Dictionary> {
        match self.resolve(object) {
            Object::Dictionary(dict) => Some(dict),
            _ => None,
        }
    }
}

/// PDF text string: literal for ASCII, UTF-16BE with byte order mark otherwise.
fn text_string(value: &str) -> Object {
    if value.is_ascii() {
        return Object::string_literal(value);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), PdfError> {
    let write_error = |source: io::Error| PdfError::Write {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(write_error)?;

    let mut file = NamedTempFile::new_in(parent).map_err(write_error)?;
    file.write_all(bytes).map_err(write_error)?;
    file.flush().map_err(write_error)?;
    file.persist(path).map_err(|err| write_error(err.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_text_stays_literal() {
        let Object::String(bytes, format) = text_string("Book") else {
            panic!("expected string");
        };
        assert_eq!(format, StringFormat::Literal);
        assert_eq!(bytes, b"Book".to_vec());
    }

    #[test]
    fn non_ascii_text_is_utf16_with_bom() {
        let Object::String(bytes, format) = text_string("é") else {
            panic!("expected string");
        };
        assert_eq!(format, StringFormat::Hexadecimal);
        assert_eq!(bytes, vec![0xFE, 0xFF, 0x00, 0xE9]);
    }

    #[test]
    fn fallbacks_fill_only_gaps() {
        let info = DocumentInfo {
            title: Some("From Viewer".into()),
            ..DocumentInfo::default()
        }
        .with_fallbacks(Some("From Config"), Some("Ann"), "en");

        assert_eq!(info.title.as_deref(), Some("From Viewer"));
        assert_eq!(info.author.as_deref(), Some("Ann"));
        assert_eq!(info.language.as_deref(), Some("en"));
    }
}
