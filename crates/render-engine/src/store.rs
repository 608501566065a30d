//! Session store: the single writer of the session snapshot.
//!
//! Readers get an `Arc<SessionSnapshot>` that never changes underneath
//! them. Every write goes through [`SessionStore::dispatch`], which applies
//! an [`Action`] to a copy, bumps the version, swaps the copy in, and then
//! notifies subscribers outside the lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use splice_common::clock::Millis;
use splice_timeline_model::{Effect, EffectId, SessionSnapshot, Transform};

use crate::error::{RenderError, RenderResult};

/// Explicit write entry points into the session.
#[derive(Debug, Clone)]
pub enum Action {
    Play,
    Pause,
    /// Jump the playhead (user seek).
    Seek(Millis),
    /// Advance the playhead (render loop clock).
    SetTimecode(Millis),
    SetTransform {
        effect: EffectId,
        transform: Transform,
    },
    MoveEffect {
        effect: EffectId,
        start_at_position: Millis,
        track: usize,
    },
    Trim {
        effect: EffectId,
        start: Millis,
        end: Millis,
    },
    /// Insert a new effect or replace the one with the same id.
    UpsertEffect(Effect),
    /// Remove an effect and every transition, animation, and filter on it.
    RemoveEffect(EffectId),
    /// Replace the whole snapshot (session load).
    Replace(SessionSnapshot),
}

impl Action {
    /// Whether the action changes timeline structure and must leave a valid
    /// snapshot behind.
    fn is_structural(&self) -> bool {
        !matches!(
            self,
            Action::Play | Action::Pause | Action::Seek(_) | Action::SetTimecode(_)
        )
    }
}

type Listener = Arc<dyn Fn(&Arc<SessionSnapshot>) + Send + Sync>;

struct StoreInner {
    snapshot: RwLock<Arc<SessionSnapshot>>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener: AtomicU64,
}

/// Cheaply clonable handle to the shared session.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<StoreInner>,
}

impl SessionStore {
    pub fn new(snapshot: SessionSnapshot) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                snapshot: RwLock::new(Arc::new(snapshot)),
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(1),
            }),
        }
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<SessionSnapshot> {
        self.inner
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn version(&self) -> u64 {
        self.snapshot().version
    }

    /// Apply an action and return the new snapshot version.
    ///
    /// A rejected action leaves the snapshot untouched and notifies nobody.
    pub fn dispatch(&self, action: Action) -> RenderResult<u64> {
        let published = {
            let mut guard = self
                .inner
                .snapshot
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let mut next = (**guard).clone();
            let structural = action.is_structural();
            apply(&mut next, action)?;
            if structural {
                let errors = next.validate();
                if !errors.is_empty() {
                    return Err(RenderError::InvalidSnapshot(errors));
                }
            }
            next.version = guard.version + 1;
            let next = Arc::new(next);
            *guard = next.clone();
            next
        };

        tracing::debug!(version = published.version, "Session snapshot updated");

        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(&published);
        }
        Ok(published.version)
    }

    /// Register a listener called after every successful dispatch.
    /// Dropping the returned [`Subscription`] removes it.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Arc<SessionSnapshot>) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        Subscription {
            id,
            store: Arc::downgrade(&self.inner),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("version", &self.version())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Disposer for a store listener.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    store: Weak<StoreInner>,
}

impl Subscription {
    /// Remove the listener now.
    pub fn dispose(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|(id, _)| *id != self.id);
        }
    }
}

fn editable<'a>(snapshot: &'a mut SessionSnapshot, id: &EffectId) -> RenderResult<&'a mut Effect> {
    let track = snapshot
        .effect(id)
        .map(|e| snapshot.track_of(e))
        .ok_or_else(|| RenderError::UnknownEffect { id: id.clone() })?;
    let effect = snapshot
        .effect_mut(id)
        .ok_or_else(|| RenderError::UnknownEffect { id: id.clone() })?;
    if track.locked {
        return Err(RenderError::LockedTrack {
            id: id.clone(),
            track: effect.track,
        });
    }
    Ok(effect)
}

fn apply(snapshot: &mut SessionSnapshot, action: Action) -> RenderResult<()> {
    match action {
        Action::Play => snapshot.is_playing = true,
        Action::Pause => snapshot.is_playing = false,
        Action::Seek(timecode) | Action::SetTimecode(timecode) => {
            snapshot.timecode = timecode.max(0.0);
        }
        Action::SetTransform { effect, transform } => {
            let target = editable(snapshot, &effect)?;
            let slot = target
                .transform_mut()
                .ok_or_else(|| RenderError::rejected(format!("{effect} has no transform")))?;
            *slot = transform;
        }
        Action::MoveEffect {
            effect,
            start_at_position,
            track,
        } => {
            if snapshot.tracks.get(track).is_some_and(|t| t.locked) {
                return Err(RenderError::LockedTrack { id: effect, track });
            }
            let target = editable(snapshot, &effect)?;
            target.start_at_position = start_at_position.max(0.0);
            target.track = track;
        }
        Action::Trim { effect, start, end } => {
            let target = editable(snapshot, &effect)?;
            target.start = start;
            target.end = end;
        }
        Action::UpsertEffect(effect) => {
            if snapshot.tracks.get(effect.track).is_some_and(|t| t.locked) {
                return Err(RenderError::LockedTrack {
                    id: effect.id,
                    track: effect.track,
                });
            }
            match snapshot.effect_mut(&effect.id) {
                Some(existing) => *existing = effect,
                None => snapshot.effects.push(effect),
            }
        }
        Action::RemoveEffect(id) => {
            editable(snapshot, &id)?;
            snapshot.effects.retain(|e| e.id != id);
            snapshot.transitions.retain(|t| !t.references(&id));
            snapshot.animations.retain(|a| a.effect != id);
            snapshot.filters.retain(|f| f.effect != id);
        }
        Action::Replace(next) => *snapshot = next,
    }
    Ok(())
}
