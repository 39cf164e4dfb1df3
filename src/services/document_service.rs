use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::Result;

/// Lookup for resume and attachment references. Blobs live elsewhere; the
/// pipeline only checks that a reference points at a known document.
#[async_trait]
pub trait DocumentResolver: Send + Sync {
    async fn exists(&self, reference: &str) -> Result<bool>;
}

#[derive(Clone)]
pub struct PgDocumentResolver {
    pool: PgPool,
}

impl PgDocumentResolver {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentResolver for PgDocumentResolver {
    async fn exists(&self, reference: &str) -> Result<bool> {
        let found: Option<String> =
            sqlx::query_scalar("SELECT reference FROM documents WHERE reference = $1")
                .bind(reference)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticDocuments {
    references: HashSet<String>,
}

impl StaticDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, reference: impl Into<String>) -> Self {
        self.references.insert(reference.into());
        self
    }
}

#[async_trait]
impl DocumentResolver for StaticDocuments {
    async fn exists(&self, reference: &str) -> Result<bool> {
        Ok(self.references.contains(reference))
    }
}
