pub mod application;
pub mod interview;
pub mod note;
