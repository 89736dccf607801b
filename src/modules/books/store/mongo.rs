use async_trait::async_trait;
use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::{
    options::{IndexOptions, ReturnDocument},
    Collection, Database, IndexModel,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{BookStore, StoreError};
use crate::modules::books::models::{Book, BookFilter, BookId, NewBook, Transition};

/// Shape of a book inside the collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookDocument {
    #[serde(rename = "_id")]
    id: ObjectId,
    title: String,
    author: String,
    is_borrowed: bool,
    created_at: DateTime,
    updated_at: DateTime,
}

impl From<BookDocument> for Book {
    fn from(doc: BookDocument) -> Self {
        Book {
            id: doc.id.into(),
            title: doc.title,
            author: doc.author,
            is_borrowed: doc.is_borrowed,
            created_at: doc.created_at.to_time_0_3(),
            updated_at: doc.updated_at.to_time_0_3(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct MongoBookStore {
    database: Database,
    books: Collection<BookDocument>,
}

impl MongoBookStore {
    pub fn new(database: &Database, collection: &str) -> Self {
        Self {
            database: database.clone(),
            books: database.collection(collection),
        }
    }
}

fn filter_document(filter: BookFilter) -> Document {
    match filter {
        BookFilter::Available => doc! { "isBorrowed": false },
        BookFilter::All => doc! {},
    }
}

/// Pipeline update so `updatedAt` can be clamped against the stored `createdAt`.
fn transition_update(transition: Transition, now: OffsetDateTime) -> Vec<Document> {
    vec![doc! {
        "$set": {
            "isBorrowed": transition.target(),
            "updatedAt": { "$max": ["$createdAt", DateTime::from_time_0_3(now)] },
        }
    }]
}

#[async_trait]
impl BookStore for MongoBookStore {
    async fn insert(&self, book: NewBook, now: OffsetDateTime) -> Result<Book, StoreError> {
        let stamp = DateTime::from_time_0_3(now);
        let document = BookDocument {
            id: ObjectId::new(),
            title: book.title,
            author: book.author,
            is_borrowed: false,
            created_at: stamp,
            updated_at: stamp,
        };

        self.books.insert_one(&document).await?;
        Ok(document.into())
    }

    async fn find(&self, id: BookId) -> Result<Option<Book>, StoreError> {
        let found = self
            .books
            .find_one(doc! { "_id": id.object_id() })
            .await?;
        Ok(found.map(Book::from))
    }

    async fn transition(
        &self,
        id: BookId,
        transition: Transition,
        now: OffsetDateTime,
    ) -> Result<Option<Book>, StoreError> {
        let updated = self
            .books
            .find_one_and_update(
                doc! { "_id": id.object_id(), "isBorrowed": transition.requires() },
                transition_update(transition, now),
            )
            .return_document(ReturnDocument::After)
            .await?;
        Ok(updated.map(Book::from))
    }

    async fn list(&self, filter: BookFilter) -> Result<Vec<Book>, StoreError> {
        let mut cursor = self
            .books
            .find(filter_document(filter))
            .sort(doc! { "createdAt": -1, "_id": -1 })
            .await?;

        let mut books = Vec::new();
        while cursor.advance().await? {
            books.push(cursor.deserialize_current()?.into());
        }
        Ok(books)
    }

    async fn ensure_indexes(&self) -> Result<(), StoreError> {
        let indexes = vec![
            IndexModel::builder()
                .keys(doc! { "isBorrowed": 1, "createdAt": -1 })
                .options(
                    IndexOptions::builder()
                        .name("books_available_by_created".to_string())
                        .build(),
                )
                .build(),
            IndexModel::builder()
                .keys(doc! { "createdAt": -1 })
                .options(
                    IndexOptions::builder()
                        .name("books_by_created".to_string())
                        .build(),
                )
                .build(),
        ];

        self.books.create_indexes(indexes).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.database.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::Bson;

    #[test]
    fn available_filter_matches_unborrowed_only() {
        assert_eq!(
            filter_document(BookFilter::Available),
            doc! { "isBorrowed": false }
        );
        assert!(filter_document(BookFilter::All).is_empty());
    }

    #[test]
    fn transition_update_sets_target_and_clamps_timestamp() {
        let now = OffsetDateTime::UNIX_EPOCH;
        let update = transition_update(Transition::Return, now);
        let set = update[0].get_document("$set").unwrap();

        assert!(!set.get_bool("isBorrowed").unwrap());
        let max = set
            .get_document("updatedAt")
            .unwrap()
            .get_array("$max")
            .unwrap();
        assert_eq!(max[0], Bson::String("$createdAt".to_string()));
        assert_eq!(max[1], Bson::DateTime(DateTime::from_time_0_3(now)));
    }

    #[test]
    fn document_converts_to_book() {
        let stamp = DateTime::from_millis(1_700_000_000_000);
        let oid = ObjectId::new();
        let book: Book = BookDocument {
            id: oid,
            title: "Dune".to_string(),
            author: "Herbert".to_string(),
            is_borrowed: true,
            created_at: stamp,
            updated_at: stamp,
        }
        .into();

        assert_eq!(book.id, BookId::from(oid));
        assert!(book.is_borrowed);
        assert_eq!(book.created_at.unix_timestamp(), 1_700_000_000);
    }

    #[test]
    fn document_uses_camel_case_field_names() {
        let stamp = DateTime::now();
        let document = bson::to_document(&BookDocument {
            id: ObjectId::new(),
            title: "Dune".to_string(),
            author: "Herbert".to_string(),
            is_borrowed: false,
            created_at: stamp,
            updated_at: stamp,
        })
        .unwrap();

        assert!(document.contains_key("_id"));
        assert!(document.contains_key("isBorrowed"));
        assert!(document.contains_key("createdAt"));
        assert!(document.contains_key("updatedAt"));
    }
}
