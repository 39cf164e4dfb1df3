use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::database::store::ApplicationStore;
use crate::error::{Error, Result};
use crate::models::application::{Application, ApplicationStatus, StatusChange};
use crate::utils::time::Clock;

/// Per-application admission check run after the application is loaded and
/// before any rule is evaluated.
#[async_trait]
pub trait AccessGate: Send + Sync {
    async fn admit(&self, application: &Application) -> Result<()>;
}

/// Admits every application.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenGate;

#[async_trait]
impl AccessGate for OpenGate {
    async fn admit(&self, _application: &Application) -> Result<()> {
        Ok(())
    }
}

/// Legality of moving `application` to `target` on behalf of `actor_id`.
///
/// Forward moves advance exactly one stage. `rejected` is reachable from any
/// open stage, `withdrawn` too but only for the owning candidate.
pub fn check_transition(
    application: &Application,
    target: ApplicationStatus,
    actor_id: Uuid,
) -> Result<()> {
    let from = application.status;
    if from.is_terminal() {
        return Err(Error::AlreadyTerminal(format!(
            "Application {} is already {}",
            application.id, from
        )));
    }

    match target {
        ApplicationStatus::Rejected => Ok(()),
        ApplicationStatus::Withdrawn if application.is_owned_by(actor_id) => Ok(()),
        ApplicationStatus::Withdrawn => Err(Error::NotAuthorized(
            "Only the candidate may withdraw an application".to_string(),
        )),
        _ if from.next_stage() == Some(target) => Ok(()),
        _ => Err(Error::InvalidTransition { from, to: target }),
    }
}

/// Outcome of a bulk move, in input order for the written applications.
#[derive(Debug, Default)]
pub struct BulkTransitionReport {
    pub succeeded: Vec<Application>,
    pub failed: HashMap<Uuid, Error>,
}

impl BulkTransitionReport {
    pub fn succeeded_ids(&self) -> Vec<Uuid> {
        self.succeeded.iter().map(|a| a.id).collect()
    }
}

#[derive(Clone)]
pub struct ApplicationStateMachine {
    store: Arc<dyn ApplicationStore>,
    clock: Arc<dyn Clock>,
}

impl ApplicationStateMachine {
    pub fn new(store: Arc<dyn ApplicationStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn load(&self, id: Uuid) -> Result<Application> {
        self.store
            .get_application(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Application {} not found", id)))
    }

    /// Returns the application as written; its `version` is the new token.
    pub async fn transition(
        &self,
        id: Uuid,
        expected_version: i64,
        target: ApplicationStatus,
        actor_id: Uuid,
        note: Option<String>,
        gate: &dyn AccessGate,
    ) -> Result<Application> {
        let application = self.load(id).await?;
        gate.admit(&application).await?;
        self.apply(&application, expected_version, target, actor_id, note)
            .await
    }

    /// Best effort: every id is loaded, checked and written on its own, using
    /// the version it just read. Repeated ids are processed once.
    pub async fn bulk_transition(
        &self,
        ids: &[Uuid],
        target: ApplicationStatus,
        actor_id: Uuid,
        note: Option<String>,
        gate: &dyn AccessGate,
    ) -> BulkTransitionReport {
        let mut report = BulkTransitionReport::default();
        let mut seen = HashSet::new();

        for &id in ids {
            if !seen.insert(id) {
                continue;
            }
            match self
                .transition_current(id, target, actor_id, note.clone(), gate)
                .await
            {
                Ok(application) => report.succeeded.push(application),
                Err(err) => {
                    tracing::debug!(application_id = %id, error = %err, "bulk transition item failed");
                    report.failed.insert(id, err);
                }
            }
        }
        report
    }

    async fn transition_current(
        &self,
        id: Uuid,
        target: ApplicationStatus,
        actor_id: Uuid,
        note: Option<String>,
        gate: &dyn AccessGate,
    ) -> Result<Application> {
        let application = self.load(id).await?;
        gate.admit(&application).await?;
        let version = application.version;
        self.apply(&application, version, target, actor_id, note)
            .await
    }

    async fn apply(
        &self,
        application: &Application,
        expected_version: i64,
        target: ApplicationStatus,
        actor_id: Uuid,
        note: Option<String>,
    ) -> Result<Application> {
        if application.version != expected_version {
            return Err(Error::ConcurrentModification {
                expected: expected_version,
                actual: application.version,
            });
        }
        check_transition(application, target, actor_id)?;

        let change = StatusChange {
            status: target,
            actor_id,
            note,
            changed_at: self.clock.now(),
        };
        self.store
            .record_transition(application.id, expected_version, change)
            .await
    }
}
