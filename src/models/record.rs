//! Listing record data structure.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Which fields identify a record within a lineage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKey {
    /// Title only. Duplicate titles collapse into one identity.
    #[default]
    Title,
    /// Title plus link, for sites that reuse titles.
    TitleAndLink,
}

impl IdentityKey {
    /// Identity of `record` under this key.
    pub fn key<'a>(&self, record: &'a Record) -> (&'a str, &'a str) {
        match self {
            IdentityKey::Title => (record.title(), ""),
            IdentityKey::TitleAndLink => (record.title(), record.link().unwrap_or_default()),
        }
    }
}

/// One listing row: an ordered mapping of field name to value.
///
/// Always carries a non-empty `Title`, which identifies the record within its
/// lineage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub const TITLE: &'static str = "Title";
    pub const LINK: &'static str = "Link";
    pub const STATUS: &'static str = "Status";

    /// Create a record with the three standard leading fields.
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        status: impl Into<String>,
    ) -> Result<Self> {
        Self::from_fields([
            (Self::TITLE.to_string(), title.into()),
            (Self::LINK.to_string(), link.into()),
            (Self::STATUS.to_string(), status.into()),
        ])
    }

    /// Build a record from field pairs, keeping their order.
    ///
    /// A repeated field name keeps its first position and its last value.
    pub fn from_fields<I, K, V>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut record = Self { fields: Vec::new() };
        for (key, value) in fields {
            record.set(key.into(), value.into());
        }

        match record.get(Self::TITLE) {
            Some(title) if !title.trim().is_empty() => Ok(record),
            _ => Err(AppError::validation("record has no Title")),
        }
    }

    /// Return a copy of this record with one more field set.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        if key != Self::TITLE {
            self.set(key, value.into());
        }
        self
    }

    fn set(&mut self, key: String, value: String) {
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((key, value)),
        }
    }

    /// Look up a field value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn title(&self) -> &str {
        self.get(Self::TITLE).unwrap_or_default()
    }

    pub fn link(&self) -> Option<&str> {
        self.get(Self::LINK)
    }

    pub fn status(&self) -> Option<&str> {
        self.get(Self::STATUS)
    }

    /// Field pairs in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Field names in insertion order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }
}
