//! Playback state machine: transport controls over the session clock.

use std::sync::Arc;
use std::time::Instant;

use splice_common::clock::{Millis, PlaybackClock};
use splice_decode_engine::MediaCatalog;

use crate::compositor::{ComposeReport, Compositor, SeekReport};
use crate::error::{RenderError, RenderResult};
use crate::store::{Action, SessionStore};

/// Current transport state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
    /// Waiting for the frames at `target`; settles into `Playing` when
    /// `resume` is set, `Paused` otherwise.
    Seeking { target: Millis, resume: bool },
}

/// Drives a [`Compositor`] from the session clock.
pub struct Player {
    store: SessionStore,
    compositor: Compositor,
    clock: PlaybackClock,
    state: PlaybackState,
    /// Ticks spent in `Seeking` so far.
    seek_ticks: u32,
}

impl Player {
    pub fn new(store: SessionStore, compositor: Compositor) -> Self {
        let position = store.snapshot().timecode;
        Self {
            store,
            compositor,
            clock: PlaybackClock::new(position),
            state: PlaybackState::Stopped,
            seek_ticks: 0,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn position(&self) -> Millis {
        self.clock.position()
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn compositor_mut(&mut self) -> &mut Compositor {
        &mut self.compositor
    }

    pub fn set_rate(&mut self, rate: f64) {
        self.clock.set_rate(rate);
        tracing::debug!(rate, "Playback rate changed");
    }

    /// Rebuild the scene from the stored snapshot; opens the ready gate.
    pub fn recreate(&mut self, media: Arc<dyn MediaCatalog>, now: Instant) -> RenderResult<()> {
        let snapshot = self.store.snapshot();
        self.clock.set_position(snapshot.timecode, now);
        self.compositor.recreate(snapshot, media)
    }

    /// `Stopped`/`Paused` → `Playing`, re-anchoring the clock at `now`.
    pub fn play(&mut self, now: Instant) -> RenderResult<()> {
        match self.state {
            PlaybackState::Playing => return Ok(()),
            PlaybackState::Seeking { target, .. } => {
                self.state = PlaybackState::Seeking {
                    target,
                    resume: true,
                };
                return Ok(());
            }
            PlaybackState::Stopped | PlaybackState::Paused => {}
        }
        self.clock.start(now);
        self.state = PlaybackState::Playing;
        self.store.dispatch(Action::Play)?;
        tracing::debug!(position = self.clock.position(), "Playback started");
        Ok(())
    }

    /// Freeze the clock. Decode buffers are kept.
    pub fn pause(&mut self, now: Instant) -> RenderResult<()> {
        match self.state {
            PlaybackState::Playing => {}
            PlaybackState::Seeking { target, .. } => {
                self.state = PlaybackState::Seeking {
                    target,
                    resume: false,
                };
                return Ok(());
            }
            PlaybackState::Stopped | PlaybackState::Paused => return Ok(()),
        }
        self.clock.pause(now);
        let position = self.clock.position();
        self.state = PlaybackState::Paused;
        self.store.dispatch(Action::Pause)?;
        self.store.dispatch(Action::SetTimecode(position))?;
        tracing::debug!(position, "Playback paused");
        Ok(())
    }

    /// Rewind to zero and tear down every decode context.
    pub fn stop(&mut self, now: Instant) -> RenderResult<()> {
        self.clock.pause(now);
        self.clock.set_position(0.0, now);
        self.state = PlaybackState::Stopped;
        self.seek_ticks = 0;
        self.compositor.release_all();
        self.store.dispatch(Action::Pause)?;
        self.store.dispatch(Action::Seek(0.0))?;
        tracing::debug!("Playback stopped");
        Ok(())
    }

    /// Jump to `target` from any state.
    ///
    /// Applies every active decode manager's seek policy and redraws. If
    /// the redraw already shows current frames the player settles at once;
    /// otherwise it stays in `Seeking` until [`Player::tick`] sees them.
    pub fn seek(&mut self, target: Millis, now: Instant) -> RenderResult<SeekReport> {
        if !self.compositor.is_ready() {
            tracing::warn!(target, "Seek before recreate ignored");
            return Err(RenderError::NotReady);
        }
        let target = target.max(0.0);
        let resume = match self.state {
            PlaybackState::Playing => true,
            PlaybackState::Seeking { resume, .. } => resume,
            PlaybackState::Stopped | PlaybackState::Paused => false,
        };
        self.clock.pause(now);
        self.clock.set_position(target, now);
        self.state = PlaybackState::Seeking { target, resume };
        self.seek_ticks = 0;
        self.store.dispatch(Action::Seek(target))?;
        tracing::debug!(target, resume, "Seeking");

        self.compositor.sync(self.store.snapshot());
        let report = self.compositor.seek(target, true)?;
        if report.redraw.as_ref().is_some_and(is_settled) {
            self.settle(now)?;
        }
        Ok(report)
    }

    /// Advance one render tick. Returns `None` until the scene is ready.
    pub fn tick(&mut self, now: Instant) -> RenderResult<Option<ComposeReport>> {
        if !self.compositor.is_ready() {
            return Ok(None);
        }

        match self.state {
            PlaybackState::Playing => {
                let mut position = self.clock.advance(now);
                let end = self.store.snapshot().duration();
                if position >= end {
                    position = end;
                    self.clock.pause(now);
                    self.clock.set_position(end, now);
                    self.state = PlaybackState::Paused;
                    self.store.dispatch(Action::Pause)?;
                    tracing::info!(position, "Reached end of timeline");
                }
                self.store.dispatch(Action::SetTimecode(position))?;
                let snapshot = self.store.snapshot();
                self.compositor.compose(&snapshot, position, false).map(Some)
            }
            PlaybackState::Paused | PlaybackState::Stopped => {
                let snapshot = self.store.snapshot();
                self.compositor
                    .compose(&snapshot, self.clock.position(), false)
                    .map(Some)
            }
            PlaybackState::Seeking { target, .. } => {
                let snapshot = self.store.snapshot();
                let report = self.compositor.compose(&snapshot, target, false)?;
                self.seek_ticks += 1;
                let budget = self.compositor.context().config.miss_threshold.max(1);
                if is_settled(&report) || self.seek_ticks >= budget {
                    self.settle(now)?;
                }
                Ok(Some(report))
            }
        }
    }

    fn settle(&mut self, now: Instant) -> RenderResult<()> {
        let PlaybackState::Seeking { target, resume } = self.state else {
            return Ok(());
        };
        self.seek_ticks = 0;
        if resume {
            self.clock.start(now);
            self.state = PlaybackState::Playing;
            self.store.dispatch(Action::Play)?;
        } else {
            self.state = PlaybackState::Paused;
            self.store.dispatch(Action::Pause)?;
        }
        tracing::debug!(target, state = ?self.state, "Seek settled");
        Ok(())
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("state", &self.state)
            .field("position", &self.clock.position())
            .field("compositor", &self.compositor)
            .finish()
    }
}

fn is_settled(report: &ComposeReport) -> bool {
    report.missing.is_empty() && report.stale.is_empty()
}
