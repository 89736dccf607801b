use std::fmt;
use std::str::FromStr;

use bson::oid::ObjectId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::OffsetDateTime;

/// Store-assigned identifier of a book, a MongoDB ObjectId on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BookId(ObjectId);

impl BookId {
    pub fn generate() -> Self {
        Self(ObjectId::new())
    }

    pub fn object_id(self) -> ObjectId {
        self.0
    }
}

impl From<ObjectId> for BookId {
    fn from(oid: ObjectId) -> Self {
        Self(oid)
    }
}

impl FromStr for BookId {
    type Err = bson::oid::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        ObjectId::parse_str(raw).map(Self)
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_hex())
    }
}

impl Serialize for BookId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_hex())
    }
}

impl<'de> Deserialize<'de> for BookId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A catalog entry and its borrow status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub is_borrowed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// The two borrow-status changes a book can go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Borrow,
    Return,
}

impl Transition {
    /// `isBorrowed` value the book must currently have.
    pub fn requires(self) -> bool {
        match self {
            Transition::Borrow => false,
            Transition::Return => true,
        }
    }

    /// `isBorrowed` value after the change.
    pub fn target(self) -> bool {
        !self.requires()
    }

    pub fn verb(self) -> &'static str {
        match self {
            Transition::Borrow => "borrow",
            Transition::Return => "return",
        }
    }
}

/// Which books a listing should include.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookFilter {
    Available,
    All,
}

impl BookFilter {
    pub fn matches(self, book: &Book) -> bool {
        match self {
            BookFilter::Available => !book.is_borrowed,
            BookFilter::All => true,
        }
    }
}

/// Request body for creating a book. Fields are optional so that a missing
/// field is reported like an empty one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateBook {
    pub title: Option<String>,
    pub author: Option<String>,
}

/// A create request that passed validation; values are trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBook {
    pub title: String,
    pub author: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub error: &'static str,
}

impl CreateBook {
    /// Check both fields and produce the trimmed values, or every problem found.
    pub fn validate(&self) -> Result<NewBook, Vec<FieldError>> {
        let title = required(self.title.as_deref());
        let author = required(self.author.as_deref());

        match (title, author) {
            (Some(title), Some(author)) => Ok(NewBook {
                title: title.to_string(),
                author: author.to_string(),
            }),
            (title, author) => {
                let mut errors = Vec::new();
                if title.is_none() {
                    errors.push(FieldError {
                        field: "title",
                        error: "Title is required",
                    });
                }
                if author.is_none() {
                    errors.push(FieldError {
                        field: "author",
                        error: "Author is required",
                    });
                }
                Err(errors)
            }
        }
    }
}

fn required(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
