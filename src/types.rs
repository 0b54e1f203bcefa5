//! Core catalog types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Backing representation of a record: a JSON object without the identifier.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Linkage of a record to an external catalog service (e.g. a handle string).
pub type ServiceConnection = BTreeMap<String, String>;

/// Unique identifier for a record (assigned by the backing collection).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub u64);

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl RecordId {
    pub fn next(self) -> Self {
        RecordId(self.0 + 1)
    }
}

/// Kind of catalog entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordType {
    #[default]
    Book,
    Magazine,
}

/// One catalog entry.
///
/// A record is transient (`id == None`) until it is handed to
/// [`RecordStore::insert_record`](crate::store::RecordStore::insert_record),
/// which writes the assigned identifier back onto it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Record {
    /// Identifier (assigned by the store, immutable afterwards).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,

    #[serde(rename = "type")]
    pub record_type: RecordType,

    pub title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,

    /// Authors in display order.
    pub authors: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Publication date (ISO-8601, possibly partial like `1965` or `1965-08`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Magazine title for magazine issues.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub magazine_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_connection: Option<ServiceConnection>,
}

impl Record {
    /// Create a transient book record.
    pub fn book(title: impl Into<String>) -> Self {
        Self {
            record_type: RecordType::Book,
            title: title.into(),
            ..Default::default()
        }
    }

    /// Create a transient magazine record.
    pub fn magazine(title: impl Into<String>) -> Self {
        Self {
            record_type: RecordType::Magazine,
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authors = authors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_isbn(mut self, isbn: impl Into<String>) -> Self {
        self.isbn = Some(isbn.into());
        self
    }

    pub fn with_field(mut self, field: RecordField, value: impl Into<String>) -> Self {
        field.set(&mut self, Some(value.into()));
        self
    }

    /// Attach a service connection entry.
    pub fn with_service(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.service_connection
            .get_or_insert_with(ServiceConnection::new)
            .insert(key.into(), value.into());
        self
    }

    /// Convert to the backing representation (identifier excluded).
    pub fn to_document(&self) -> Result<Document, serde_json::Error> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(mut map) => {
                map.remove("id");
                Ok(map)
            }
            _ => Ok(Document::new()),
        }
    }

    /// Rebuild a record from its backing representation.
    pub fn from_document(id: RecordId, document: &Document) -> Result<Self, serde_json::Error> {
        let mut record: Record =
            serde_json::from_value(serde_json::Value::Object(document.clone()))?;
        record.id = Some(id);
        Ok(record)
    }
}

/// Scalar text fields of a [`Record`], addressable by document key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordField {
    Title,
    Subtitle,
    Isbn,
    Publisher,
    Language,
    Published,
    Notes,
    MagazineName,
}

impl RecordField {
    pub const ALL: [RecordField; 8] = [
        RecordField::Title,
        RecordField::Subtitle,
        RecordField::Isbn,
        RecordField::Publisher,
        RecordField::Language,
        RecordField::Published,
        RecordField::Notes,
        RecordField::MagazineName,
    ];

    /// Document key of this field.
    pub fn name(self) -> &'static str {
        match self {
            RecordField::Title => "title",
            RecordField::Subtitle => "subtitle",
            RecordField::Isbn => "isbn",
            RecordField::Publisher => "publisher",
            RecordField::Language => "language",
            RecordField::Published => "published",
            RecordField::Notes => "notes",
            RecordField::MagazineName => "magazine_name",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.name() == name)
    }

    pub fn get(self, record: &Record) -> Option<&str> {
        match self {
            RecordField::Title => Some(record.title.as_str()),
            RecordField::Subtitle => record.subtitle.as_deref(),
            RecordField::Isbn => record.isbn.as_deref(),
            RecordField::Publisher => record.publisher.as_deref(),
            RecordField::Language => record.language.as_deref(),
            RecordField::Published => record.published.as_deref(),
            RecordField::Notes => record.notes.as_deref(),
            RecordField::MagazineName => record.magazine_name.as_deref(),
        }
    }

    /// Set the field; `None` clears it (the title becomes empty).
    pub fn set(self, record: &mut Record, value: Option<String>) {
        match self {
            RecordField::Title => record.title = value.unwrap_or_default(),
            RecordField::Subtitle => record.subtitle = value,
            RecordField::Isbn => record.isbn = value,
            RecordField::Publisher => record.publisher = value,
            RecordField::Language => record.language = value,
            RecordField::Published => record.published = value,
            RecordField::Notes => record.notes = value,
            RecordField::MagazineName => record.magazine_name = value,
        }
    }
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Store statistics.
#[derive(Clone, Debug, Default)]
pub struct StoreStats {
    pub record_count: u64,
    pub listener_count: u64,
    /// On-disk size of the collection (0 for in-memory collections).
    pub storage_size_bytes: u64,
}
