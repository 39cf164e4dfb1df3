pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use crate::database::postgres::PgStore;
use crate::services::{
    authorization::PgAuthorization,
    document_service::PgDocumentResolver,
    job_directory::PgJobDirectory,
    notification_service::{NoopNotifier, NotificationSink, WebhookNotifier},
    pipeline_service::{Collaborators, PipelineService, PipelineSettings},
};
use crate::utils::time::SystemClock;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: PipelineService,
    pub jwt_secret: Arc<str>,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let config = crate::config::get_config();

        let notifier: Arc<dyn NotificationSink> = match &config.notification_webhook_url {
            Some(url) => Arc::new(WebhookNotifier::new(
                url.clone(),
                config.webhook_secret.clone(),
            )),
            None => Arc::new(NoopNotifier),
        };
        let collaborators = Collaborators {
            authorization: Arc::new(PgAuthorization::new(pool.clone())),
            jobs: Arc::new(PgJobDirectory::new(pool.clone())),
            documents: Arc::new(PgDocumentResolver::new(pool.clone())),
            notifier,
        };
        let settings = PipelineSettings {
            max_bulk_size: config.max_bulk_size,
            max_interview_minutes: config.max_interview_minutes,
        };

        let pipeline = PipelineService::new(
            Arc::new(PgStore::new(pool)),
            collaborators,
            Arc::new(SystemClock),
            settings,
        );
        Self::with_pipeline(pipeline, &config.jwt_secret)
    }

    pub fn with_pipeline(pipeline: PipelineService, jwt_secret: &str) -> Self {
        Self {
            pipeline,
            jwt_secret: Arc::from(jwt_secret),
        }
    }
}
