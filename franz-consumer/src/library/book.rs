use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ProcessingError;
use crate::library::values;
use crate::processor::Processor;
use crate::repository::{Identified, Repository};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Book {
    pub id: i32,
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub published_on: DateTime<Utc>,
    #[serde(default = "default_copies")]
    pub copies_available: i32,
}

fn default_copies() -> i32 {
    1
}

impl Book {
    pub const ENTITY_TYPE: &'static str = "Book";

    /// Validate every field, returning the book with normalized values.
    pub fn validated(self) -> Result<Self, ProcessingError> {
        if self.copies_available < 0 {
            return Err(ProcessingError::validation(
                Self::ENTITY_TYPE,
                "CopiesAvailable cannot be negative",
            ));
        }

        Ok(Book {
            isbn: values::isbn(Self::ENTITY_TYPE, &self.isbn)?,
            title: values::non_blank(Self::ENTITY_TYPE, "Title", &self.title)?,
            author: values::non_blank(Self::ENTITY_TYPE, "Author", &self.author)?,
            ..self
        })
    }
}

impl Identified for Book {
    fn id(&self) -> i32 {
        self.id
    }
}

pub struct BookProcessor {
    books: Arc<dyn Repository<Book>>,
}

impl BookProcessor {
    pub fn new(books: Arc<dyn Repository<Book>>) -> Self {
        Self { books }
    }
}

#[async_trait]
impl Processor for BookProcessor {
    type Entity = Book;
    const ENTITY_TYPE: &'static str = Book::ENTITY_TYPE;

    async fn process(&self, book: Book) -> Result<(), ProcessingError> {
        debug!(id = book.id, "validating book");
        let book = book.validated()?;

        let id = book.id;
        self.books.upsert(book).await?;
        info!(id, "stored book");
        Ok(())
    }
}
