use std::sync::Arc;

use uuid::Uuid;

use crate::database::store::NoteStore;
use crate::error::{Error, Result};
use crate::models::note::{ActorFlag, ActorFlags, FlagKind, Note, NoteVisibility};
use crate::utils::time::Clock;

#[derive(Clone)]
pub struct NoteService {
    store: Arc<dyn NoteStore>,
    clock: Arc<dyn Clock>,
}

impl NoteService {
    pub fn new(store: Arc<dyn NoteStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn load(&self, note_id: Uuid) -> Result<Note> {
        self.store
            .get_note(note_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Note {} not found", note_id)))
    }

    pub async fn add(
        &self,
        application_id: Uuid,
        author_id: Uuid,
        content: String,
        visibility: NoteVisibility,
    ) -> Result<Note> {
        let now = self.clock.now();
        let note = Note {
            id: Uuid::new_v4(),
            application_id,
            author_id,
            content,
            visibility,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_note(note).await
    }

    /// Last write wins; only the author may edit.
    pub async fn update(&self, note_id: Uuid, author_id: Uuid, content: String) -> Result<Note> {
        let note = self.load(note_id).await?;
        if note.author_id != author_id {
            return Err(Error::NotAuthor);
        }
        self.store
            .update_note_content(note_id, content, self.clock.now())
            .await
    }

    /// Shared notes plus the viewer's own private ones.
    pub async fn list_visible(&self, application_id: Uuid, viewer_id: Uuid) -> Result<Vec<Note>> {
        let notes = self.store.list_notes(application_id).await?;
        Ok(notes.into_iter().filter(|n| n.visible_to(viewer_id)).collect())
    }

    pub async fn set_bookmark(&self, application_id: Uuid, actor_id: Uuid, value: bool) -> Result<ActorFlag> {
        self.set_flag(application_id, actor_id, FlagKind::Bookmark, value)
            .await
    }

    pub async fn mark_viewed(&self, application_id: Uuid, actor_id: Uuid) -> Result<ActorFlag> {
        self.set_flag(application_id, actor_id, FlagKind::Viewed, true)
            .await
    }

    pub async fn flags(&self, application_id: Uuid, actor_id: Uuid) -> Result<ActorFlags> {
        let flags = self.store.get_flags(application_id, actor_id).await?;
        Ok(ActorFlags::from_flags(&flags))
    }

    async fn set_flag(
        &self,
        application_id: Uuid,
        actor_id: Uuid,
        kind: FlagKind,
        value: bool,
    ) -> Result<ActorFlag> {
        self.store
            .upsert_flag(ActorFlag {
                application_id,
                actor_id,
                kind,
                value,
                updated_at: self.clock.now(),
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::utils::time::FixedClock;
    use chrono::{DateTime, Duration, Utc};

    fn service() -> (NoteService, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new("2030-02-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap()));
        (
            NoteService::new(Arc::new(MemoryStore::new()), clock.clone()),
            clock,
        )
    }

    #[tokio::test]
    async fn only_the_author_can_edit() {
        let (notes, clock) = service();
        let author = Uuid::new_v4();
        let note = notes
            .add(Uuid::new_v4(), author, "first call went well".into(), NoteVisibility::Shared)
            .await
            .unwrap();

        let err = notes
            .update(note.id, Uuid::new_v4(), "overwritten".into())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotAuthor));

        clock.advance(Duration::minutes(5));
        let edited = notes
            .update(note.id, author, "first call went very well".into())
            .await
            .unwrap();
        assert_eq!(edited.content, "first call went very well");
        assert!(edited.updated_at > note.updated_at);
        assert_eq!(edited.created_at, note.created_at);
    }

    #[tokio::test]
    async fn private_notes_stay_with_their_author() {
        let (notes, _) = service();
        let application = Uuid::new_v4();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        notes
            .add(application, alice, "shared".into(), NoteVisibility::Shared)
            .await
            .unwrap();
        notes
            .add(application, alice, "alice only".into(), NoteVisibility::Private)
            .await
            .unwrap();

        assert_eq!(notes.list_visible(application, alice).await.unwrap().len(), 2);
        let for_bob = notes.list_visible(application, bob).await.unwrap();
        assert_eq!(for_bob.len(), 1);
        assert_eq!(for_bob[0].content, "shared");
    }

    #[tokio::test]
    async fn mark_viewed_is_idempotent() {
        let (notes, clock) = service();
        let application = Uuid::new_v4();
        let actor = Uuid::new_v4();

        let first = notes.mark_viewed(application, actor).await.unwrap();
        let once = notes.flags(application, actor).await.unwrap();
        clock.advance(Duration::hours(1));
        let second = notes.mark_viewed(application, actor).await.unwrap();
        let twice = notes.flags(application, actor).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(once, twice);
        assert!(twice.viewed);
    }

    #[tokio::test]
    async fn flags_are_per_actor() {
        let (notes, _) = service();
        let application = Uuid::new_v4();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        notes.set_bookmark(application, alice, true).await.unwrap();
        assert!(notes.flags(application, alice).await.unwrap().bookmarked);
        assert!(!notes.flags(application, bob).await.unwrap().bookmarked);

        notes.set_bookmark(application, alice, false).await.unwrap();
        assert!(!notes.flags(application, alice).await.unwrap().bookmarked);
    }
}
