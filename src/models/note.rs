use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteVisibility {
    Private,
    Shared,
}

impl NoteVisibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteVisibility::Private => "private",
            NoteVisibility::Shared => "shared",
        }
    }
}

impl FromStr for NoteVisibility {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(NoteVisibility::Private),
            "shared" => Ok(NoteVisibility::Shared),
            other => Err(Error::Internal(format!("Unknown note visibility: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub application_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub visibility: NoteVisibility,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    pub fn visible_to(&self, viewer_id: Uuid) -> bool {
        self.visibility == NoteVisibility::Shared || self.author_id == viewer_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagKind {
    Bookmark,
    Viewed,
}

impl FlagKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagKind::Bookmark => "bookmark",
            FlagKind::Viewed => "viewed",
        }
    }
}

impl FromStr for FlagKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bookmark" => Ok(FlagKind::Bookmark),
            "viewed" => Ok(FlagKind::Viewed),
            other => Err(Error::Internal(format!("Unknown flag kind: {}", other))),
        }
    }
}

/// Per-actor advisory marker on an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorFlag {
    pub application_id: Uuid,
    pub actor_id: Uuid,
    pub kind: FlagKind,
    pub value: bool,
    pub updated_at: DateTime<Utc>,
}

/// Both flags of one actor on one application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorFlags {
    pub bookmarked: bool,
    pub viewed: bool,
    pub viewed_at: Option<DateTime<Utc>>,
}

impl ActorFlags {
    pub fn from_flags(flags: &[ActorFlag]) -> Self {
        let mut out = ActorFlags::default();
        for flag in flags {
            match flag.kind {
                FlagKind::Bookmark => out.bookmarked = flag.value,
                FlagKind::Viewed => {
                    out.viewed = flag.value;
                    out.viewed_at = flag.value.then_some(flag.updated_at);
                }
            }
        }
        out
    }
}
