pub mod authorization;
pub mod document_service;
pub mod interview_scheduler;
pub mod job_directory;
pub mod note_service;
pub mod notification_service;
pub mod pipeline_service;
pub mod state_machine;
