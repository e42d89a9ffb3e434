use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ProcessingError;
use crate::library::values;
use crate::processor::Processor;
use crate::repository::{Identified, Repository};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Member {
    pub id: i32,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub borrowed_books: Vec<i32>,
}

impl Member {
    pub const ENTITY_TYPE: &'static str = "Member";

    pub fn validated(self) -> Result<Self, ProcessingError> {
        let mut seen = HashSet::with_capacity(self.borrowed_books.len());
        if let Some(book) = self.borrowed_books.iter().find(|id| !seen.insert(**id)) {
            return Err(ProcessingError::validation(
                Self::ENTITY_TYPE,
                format!("book {book} is borrowed more than once"),
            ));
        }

        Ok(Member {
            full_name: values::non_blank(Self::ENTITY_TYPE, "FullName", &self.full_name)?,
            email: values::email(Self::ENTITY_TYPE, &self.email)?,
            ..self
        })
    }
}

impl Identified for Member {
    fn id(&self) -> i32 {
        self.id
    }
}

pub struct MemberProcessor {
    members: Arc<dyn Repository<Member>>,
}

impl MemberProcessor {
    pub fn new(members: Arc<dyn Repository<Member>>) -> Self {
        Self { members }
    }
}

#[async_trait]
impl Processor for MemberProcessor {
    type Entity = Member;
    const ENTITY_TYPE: &'static str = Member::ENTITY_TYPE;

    async fn process(&self, member: Member) -> Result<(), ProcessingError> {
        debug!(id = member.id, "validating member");
        let member = member.validated()?;

        let id = member.id;
        let borrowed = member.borrowed_books.len();
        self.members.upsert(member).await?;
        info!(id, borrowed, "stored member");
        Ok(())
    }
}
