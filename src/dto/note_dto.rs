use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::note::NoteVisibility;

fn default_visibility() -> NoteVisibility {
    NoteVisibility::Shared
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddNotePayload {
    #[validate(length(min = 1, max = 10000))]
    pub content: String,
    #[serde(default = "default_visibility")]
    pub visibility: NoteVisibility,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateNotePayload {
    #[validate(length(min = 1, max = 10000))]
    pub content: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BookmarkPayload {
    pub value: bool,
}
