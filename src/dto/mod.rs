pub mod application_dto;
pub mod interview_dto;
pub mod note_dto;
