use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;

/// Resolves which company owns a job posting.
#[async_trait]
pub trait JobDirectory: Send + Sync {
    async fn company_for_job(&self, job_id: Uuid) -> Result<Option<Uuid>>;
}

#[derive(Clone)]
pub struct PgJobDirectory {
    pool: PgPool,
}

impl PgJobDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobDirectory for PgJobDirectory {
    async fn company_for_job(&self, job_id: Uuid) -> Result<Option<Uuid>> {
        let company_id = sqlx::query_scalar("SELECT company_id FROM jobs WHERE id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(company_id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticJobDirectory {
    jobs: HashMap<Uuid, Uuid>,
}

impl StaticJobDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_job(mut self, job_id: Uuid, company_id: Uuid) -> Self {
        self.jobs.insert(job_id, company_id);
        self
    }
}

#[async_trait]
impl JobDirectory for StaticJobDirectory {
    async fn company_for_job(&self, job_id: Uuid) -> Result<Option<Uuid>> {
        Ok(self.jobs.get(&job_id).copied())
    }
}
