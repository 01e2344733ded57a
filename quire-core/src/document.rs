//! Documents and the ordered document store.

use crate::error::BuildError;
use chrono::NaiveDate;
use quire_types::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Field names served by the fixed core rather than the field bag
pub const CORE_FIELDS: &[&str] = &["path", "slug", "content_hash", "skip"];

/// Blake3 hex digest of a document body
pub fn content_hash(body: &str) -> String {
    blake3::hash(body.as_bytes()).to_hex().to_string()
}

/// One content unit: a fixed core plus an open field bag
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    path: PathBuf,
    content_hash: String,
    raw: String,
    slug: Option<String>,
    /// Skipped documents stay in the store but produce no output
    pub skip: bool,
    fields: BTreeMap<String, Value>,
}

impl Document {
    pub fn new(path: impl Into<PathBuf>, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            path: path.into(),
            content_hash: content_hash(&raw),
            raw,
            slug: None,
            skip: false,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_fields(mut self, fields: BTreeMap<String, Value>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Builder-style [`Document::set`]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Body text, without frontmatter
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn slug(&self) -> Option<&str> {
        self.slug.as_deref()
    }

    /// Assign the slug; once set it may only be re-set to the same value
    pub fn set_slug(&mut self, slug: impl Into<String>) -> Result<(), BuildError> {
        let slug = slug.into();
        match &self.slug {
            Some(current) if *current != slug => Err(BuildError::SlugChanged {
                path: self.path.clone(),
                current: current.clone(),
                requested: slug,
            }),
            Some(_) => Ok(()),
            None => {
                self.slug = Some(slug);
                Ok(())
            }
        }
    }

    /// Field bag entry
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Core field or field bag entry
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "path" => Some(Value::Str(self.path.to_string_lossy().into_owned())),
            "slug" => self.slug.clone().map(Value::Str),
            "content_hash" => Some(Value::Str(self.content_hash.clone())),
            "skip" => Some(Value::Bool(self.skip)),
            _ => self.fields.get(name).cloned(),
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    pub fn title(&self) -> Option<&str> {
        self.get("title").and_then(Value::as_str)
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.get("date").and_then(Value::as_date)
    }

    pub fn status(&self) -> Option<&str> {
        self.get("status").and_then(Value::as_str)
    }

    /// String tags; non-string entries are ignored
    pub fn tags(&self) -> Vec<&str> {
        self.get("tags")
            .and_then(Value::as_list)
            .map(|tags| tags.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Rendered HTML, once a render hook has produced it
    pub fn html(&self) -> Option<&str> {
        self.get("html").and_then(Value::as_str)
    }
}

/// Documents in load order; paths are unique
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: Vec<Document>,
    by_path: HashMap<PathBuf, usize>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a document, returning its index
    pub fn append(&mut self, document: Document) -> Result<usize, BuildError> {
        if self.by_path.contains_key(document.path()) {
            return Err(BuildError::DuplicatePath(document.path().to_path_buf()));
        }
        let index = self.documents.len();
        self.by_path.insert(document.path().to_path_buf(), index);
        self.documents.push(document);
        Ok(index)
    }

    /// Every document in load order, skipped ones included
    pub fn all(&self) -> &[Document] {
        &self.documents
    }

    pub fn get(&self, index: usize) -> Option<&Document> {
        self.documents.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Document> {
        self.documents.get_mut(index)
    }

    pub fn position(&self, path: &Path) -> Option<usize> {
        self.by_path.get(path).copied()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Document> {
        self.documents.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_pure() {
        let a = Document::new("a.md", "body");
        let b = Document::new("b.md", "body");
        assert_eq!(a.content_hash(), b.content_hash());
        assert_ne!(a.content_hash(), Document::new("c.md", "other").content_hash());
        assert_eq!(a.content_hash().len(), 64);
    }

    #[test]
    fn test_slug_is_write_once() {
        let mut doc = Document::new("a.md", "");
        doc.set_slug("first").unwrap();
        doc.set_slug("first").unwrap();
        let err = doc.set_slug("second").unwrap_err();
        assert!(matches!(err, BuildError::SlugChanged { ref current, .. } if current == "first"));
        assert_eq!(doc.slug(), Some("first"));
    }

    #[test]
    fn test_typed_accessors() {
        let doc = Document::new("a.md", "")
            .with("title", "Hello")
            .with("status", "draft")
            .with("tags", vec!["x", "y"])
            .with("date", NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
        assert_eq!(doc.title(), Some("Hello"));
        assert_eq!(doc.status(), Some("draft"));
        assert_eq!(doc.tags(), vec!["x", "y"]);
        assert_eq!(doc.date(), NaiveDate::from_ymd_opt(2021, 1, 1));
        assert_eq!(doc.html(), None);
    }

    #[test]
    fn test_core_fields_take_precedence() {
        let doc = Document::new("a.md", "").with("path", "spoofed");
        assert_eq!(doc.field("path"), Some(Value::from("a.md")));
        assert_eq!(doc.field("skip"), Some(Value::Bool(false)));
        assert_eq!(doc.field("slug"), None);
    }

    #[test]
    fn test_duplicate_path_rejected() {
        let mut store = DocumentStore::new();
        assert_eq!(store.append(Document::new("a.md", "1")).unwrap(), 0);
        assert_eq!(store.append(Document::new("b.md", "2")).unwrap(), 1);
        assert!(matches!(
            store.append(Document::new("a.md", "3")),
            Err(BuildError::DuplicatePath(_))
        ));
        assert_eq!(store.len(), 2);
        assert_eq!(store.position(Path::new("b.md")), Some(1));
    }

    #[test]
    fn test_all_keeps_load_order_and_skipped() {
        let mut store = DocumentStore::new();
        store.append(Document::new("z.md", "")).unwrap();
        store.append(Document::new("a.md", "")).unwrap();
        store.get_mut(0).unwrap().skip = true;
        let paths: Vec<_> = store.all().iter().map(|d| d.path().to_path_buf()).collect();
        assert_eq!(paths, vec![PathBuf::from("z.md"), PathBuf::from("a.md")]);
    }
}
