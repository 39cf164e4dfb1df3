//! Employer-side access control.
//!
//! Roles are ranked; a member satisfies any requirement at or below their own
//! rank. Which role an operation needs is a pure mapping on [`Permission`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Viewer,
    Interviewer,
    Recruiter,
    Admin,
    Owner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Interviewer => "interviewer",
            Role::Recruiter => "recruiter",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }

    pub fn satisfies(self, required: Role) -> bool {
        self >= required
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "viewer" => Ok(Role::Viewer),
            "interviewer" => Ok(Role::Interviewer),
            "recruiter" => Ok(Role::Recruiter),
            "admin" => Ok(Role::Admin),
            "owner" => Ok(Role::Owner),
            other => Err(Error::Internal(format!("Unknown member role: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Move applications between stages, alone or in bulk.
    ManagePipeline,
    /// Schedule, reschedule and cancel interviews.
    ManageInterviews,
    /// Record the outcome of an interview.
    ConductInterviews,
    WriteNotes,
    ViewApplications,
}

impl Permission {
    pub fn required_role(self) -> Role {
        match self {
            Permission::ManagePipeline | Permission::ManageInterviews => Role::Recruiter,
            Permission::ConductInterviews | Permission::WriteNotes => Role::Interviewer,
            Permission::ViewApplications => Role::Viewer,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthorizationProvider: Send + Sync {
    async fn has_role(&self, actor_id: Uuid, company_id: Uuid, required: Role) -> Result<bool>;
}

/// Reads membership from the `company_members` table.
#[derive(Clone)]
pub struct PgAuthorization {
    pool: PgPool,
}

impl PgAuthorization {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuthorizationProvider for PgAuthorization {
    async fn has_role(&self, actor_id: Uuid, company_id: Uuid, required: Role) -> Result<bool> {
        let role: Option<String> = sqlx::query_scalar(
            "SELECT role FROM company_members WHERE company_id = $1 AND user_id = $2",
        )
        .bind(company_id)
        .bind(actor_id)
        .fetch_optional(&self.pool)
        .await?;

        match role {
            Some(role) => Ok(role.parse::<Role>()?.satisfies(required)),
            None => Ok(false),
        }
    }
}

/// Fixed grant table, for tests and single-tenant setups.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthorization {
    grants: HashMap<(Uuid, Uuid), Role>,
}

impl StaticAuthorization {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, company_id: Uuid, actor_id: Uuid, role: Role) -> Self {
        self.grants.insert((company_id, actor_id), role);
        self
    }
}

#[async_trait]
impl AuthorizationProvider for StaticAuthorization {
    async fn has_role(&self, actor_id: Uuid, company_id: Uuid, required: Role) -> Result<bool> {
        Ok(self
            .grants
            .get(&(company_id, actor_id))
            .map(|role| role.satisfies(required))
            .unwrap_or(false))
    }
}
