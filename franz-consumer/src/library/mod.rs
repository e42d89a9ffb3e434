//! Library catalogue entities consumed by the default binary.

use std::sync::Arc;

use crate::error::RegistryError;
use crate::registry::ProcessorRegistry;
use crate::repository::Repository;

mod book;
mod member;
pub mod values;

pub use book::{Book, BookProcessor};
pub use member::{Member, MemberProcessor};

/// Fully-qualified names sent by producers that tag messages with their own type names.
pub const BOOK_ALIAS: &str = "Franz.Domain.Entities.Book";
pub const MEMBER_ALIAS: &str = "Franz.Domain.Entities.Member";

/// Register the book and member processors, along with their fully-qualified aliases.
pub fn register(
    registry: &mut ProcessorRegistry,
    books: Arc<dyn Repository<Book>>,
    members: Arc<dyn Repository<Member>>,
) -> Result<(), RegistryError> {
    registry
        .register(BookProcessor::new(books))?
        .register_alias(BOOK_ALIAS, Book::ENTITY_TYPE)?
        .register(MemberProcessor::new(members))?
        .register_alias(MEMBER_ALIAS, Member::ENTITY_TYPE)?;
    Ok(())
}
