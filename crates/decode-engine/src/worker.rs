//! Decode worker: an isolated task that demuxes and decodes one source.
//!
//! The worker shares nothing with its controller. It receives
//! [`WorkerCommand`]s and answers with [`WorkerEvent`]s. Demuxing is paced
//! by decoder queue depth and paused entirely while the controller's
//! backlog (frames sent but not yet received, plus frames buffered) is at
//! capacity.

use std::collections::VecDeque;
use std::sync::Arc;

use splice_common::config::PacingConfig;
use tokio::runtime::Handle;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::frame::{FrameLedger, Micros};
use crate::media::{Demuxer, EncodedChunk, MediaSource, VideoDecoder};
use crate::pacing::pacing_delay;
use crate::protocol::{WorkerCommand, WorkerEvent};
use crate::ms_to_us;

/// Controller-side handle to a running worker.
pub struct WorkerHandle {
    source_id: String,
    commands: UnboundedSender<WorkerCommand>,
    events: UnboundedReceiver<WorkerEvent>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Spawn a worker for `source` on `runtime`.
    pub fn spawn(
        runtime: &Handle,
        source: Arc<dyn MediaSource>,
        ledger: Arc<FrameLedger>,
        pacing: PacingConfig,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let source_id = source.hash().to_string();
        let worker = DecodeWorker::new(source, ledger, pacing, event_tx);
        let task = runtime.spawn(worker.run(command_rx));
        Self {
            source_id,
            commands: command_tx,
            events: event_rx,
            task,
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Send a command. Returns `false` once the worker has exited.
    pub fn send(&self, command: WorkerCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    /// Next pending event without waiting.
    pub fn try_recv(&mut self) -> Option<WorkerEvent> {
        self.events.try_recv().ok()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop event delivery and release every frame still in the channel.
    /// Returns how many frames were released.
    pub fn stop_delivery(&mut self) -> usize {
        self.events.close();
        let mut released = 0;
        while let Ok(event) = self.events.try_recv() {
            if matches!(event, WorkerEvent::NewFrame { .. }) {
                released += 1;
            }
            event.discard();
        }
        released
    }

    /// Send `Cleanup` and abort the task.
    pub fn terminate(self) {
        let _ = self.commands.send(WorkerCommand::Cleanup);
        self.task.abort();
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Debug, Clone, Copy)]
struct DemuxState {
    start_us: Micros,
    window_end_us: Micros,
}

struct DecodeWorker {
    source: Arc<dyn MediaSource>,
    source_id: String,
    decoder: Box<dyn VideoDecoder>,
    demuxer: Option<Box<dyn Demuxer>>,
    pacing: PacingConfig,
    events: UnboundedSender<WorkerEvent>,

    configured: bool,
    /// Chunks received before configuration completed.
    pending: VecDeque<EncodedChunk>,
    pending_eof: bool,
    /// Chunks arrive through `Chunk` messages instead of our own demuxer.
    external_feed: bool,

    demux: Option<DemuxState>,
    draining: bool,
    ended: bool,

    sent: u64,
    received: u64,
    buffered: usize,
    capacity: Option<usize>,
    last_depth: Option<usize>,
    closed: bool,
}

impl DecodeWorker {
    fn new(
        source: Arc<dyn MediaSource>,
        ledger: Arc<FrameLedger>,
        pacing: PacingConfig,
        events: UnboundedSender<WorkerEvent>,
    ) -> Self {
        let decoder = source.create_decoder(ledger);
        let source_id = source.hash().to_string();
        Self {
            source,
            source_id,
            decoder,
            demuxer: None,
            pacing,
            events,
            configured: false,
            pending: VecDeque::new(),
            pending_eof: false,
            external_feed: false,
            demux: None,
            draining: false,
            ended: false,
            sent: 0,
            received: 0,
            buffered: 0,
            capacity: None,
            last_depth: None,
            closed: false,
        }
    }

    async fn run(mut self, mut commands: UnboundedReceiver<WorkerCommand>) {
        tracing::debug!(source = %self.source_id, "Decode worker started");

        while !self.closed {
            let command = if self.wants_demux() {
                match commands.try_recv() {
                    Ok(command) => Some(command),
                    Err(TryRecvError::Empty) => None,
                    Err(TryRecvError::Disconnected) => break,
                }
            } else {
                match commands.recv().await {
                    Some(command) => Some(command),
                    None => break,
                }
            };

            if let Some(command) = command {
                if !self.handle(command) {
                    break;
                }
                continue;
            }

            if !self.demux_step() {
                break;
            }

            let delay = pacing_delay(&self.pacing, self.decoder.queue_depth());
            if delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(delay).await;
            }
        }

        self.decoder.reset();
        tracing::debug!(source = %self.source_id, frames = self.sent, "Decode worker stopped");
    }

    fn backlog(&self) -> usize {
        self.sent.saturating_sub(self.received) as usize + self.buffered
    }

    fn wants_demux(&self) -> bool {
        self.configured
            && self.demux.is_some()
            && !self.external_feed
            && !self.draining
            && !self.ended
            && self.capacity.map_or(true, |c| self.backlog() < c)
    }

    /// Apply one command. Returns `false` when the worker should exit.
    fn handle(&mut self, command: WorkerCommand) -> bool {
        match command {
            WorkerCommand::Configure(config) => match self.decoder.configure(&config) {
                Ok(()) => {
                    self.configured = true;
                    tracing::debug!(source = %self.source_id, codec = %config.codec, "Decoder configured");
                    self.emit(WorkerEvent::Configured);
                    while let Some(chunk) = self.pending.pop_front() {
                        if !self.feed(chunk) {
                            return false;
                        }
                    }
                    if self.pending_eof {
                        self.pending_eof = false;
                        self.begin_drain();
                    }
                    self.drain_decoder();
                }
                Err(err) => {
                    tracing::warn!(source = %self.source_id, error = %err, "Decoder configuration failed");
                    self.emit(WorkerEvent::Failed(err));
                    return false;
                }
            },

            WorkerCommand::Demux {
                window,
                start_ms,
                timebase,
            } => {
                let start_us = ms_to_us(start_ms.max(window.start_ms).min(window.end_ms));
                if !self.external_feed && !self.open_at(start_us) {
                    return false;
                }
                self.demux = Some(DemuxState {
                    start_us,
                    window_end_us: ms_to_us(window.end_ms),
                });
                tracing::debug!(
                    source = %self.source_id,
                    start_ms,
                    window_end_ms = window.end_ms,
                    fps = timebase,
                    "Demux started"
                );
                self.drain_decoder();
                self.maybe_end();
            }

            WorkerCommand::Chunk(chunk) => {
                self.external_feed = true;
                if !self.configured {
                    self.pending.push_back(chunk);
                } else if !self.feed(chunk) {
                    return false;
                } else {
                    self.drain_decoder();
                }
            }

            WorkerCommand::Eof => {
                self.external_feed = true;
                if self.configured {
                    self.begin_drain();
                    self.drain_decoder();
                    self.maybe_end();
                } else {
                    self.pending_eof = true;
                }
            }

            WorkerCommand::BufferLevel {
                buffered,
                received,
                capacity,
            } => {
                self.buffered = buffered;
                self.received = received;
                self.capacity = Some(capacity.max(1));
            }

            WorkerCommand::Cleanup => {
                self.decoder.reset();
                self.pending.clear();
                self.demux = None;
                return false;
            }
        }
        self.report_depth();
        !self.closed
    }

    /// Open (or reuse) the demuxer and position it at `start_us`.
    fn open_at(&mut self, start_us: Micros) -> bool {
        if self.demuxer.is_none() {
            match self.source.open_demuxer() {
                Ok(demuxer) => self.demuxer = Some(demuxer),
                Err(err) => {
                    self.emit(WorkerEvent::Failed(err));
                    return false;
                }
            }
        }
        if let Some(demuxer) = self.demuxer.as_mut() {
            if let Err(err) = demuxer.seek(start_us) {
                self.emit(WorkerEvent::Failed(err));
                return false;
            }
        }
        self.decoder.reset();
        self.draining = false;
        self.ended = false;
        true
    }

    /// Pull one chunk from the demuxer and decode it.
    fn demux_step(&mut self) -> bool {
        let Some(state) = self.demux else {
            return true;
        };
        let Some(demuxer) = self.demuxer.as_mut() else {
            return true;
        };

        match demuxer.next_chunk() {
            Ok(Some(chunk)) if chunk.timestamp_us <= state.window_end_us => {
                if !self.feed(chunk) {
                    return false;
                }
            }
            Ok(_) => self.begin_drain(),
            Err(err) => {
                tracing::warn!(source = %self.source_id, error = %err, "Demux failed");
                self.emit(WorkerEvent::Failed(err));
                return false;
            }
        }

        self.drain_decoder();
        self.report_depth();
        self.maybe_end();
        !self.closed
    }

    fn feed(&mut self, chunk: EncodedChunk) -> bool {
        match self.decoder.decode(chunk) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(source = %self.source_id, error = %err, "Decode failed");
                self.emit(WorkerEvent::Failed(err));
                false
            }
        }
    }

    fn begin_drain(&mut self) {
        self.decoder.flush();
        self.draining = true;
    }

    /// Forward every ready frame inside the demux window; release the rest.
    fn drain_decoder(&mut self) {
        let Some(state) = self.demux else {
            return;
        };
        while let Some(frame) = self.decoder.poll_frame() {
            if frame.end_us() <= state.start_us || frame.timestamp_us() > state.window_end_us {
                frame.release();
                continue;
            }
            let event = WorkerEvent::NewFrame {
                timecode_us: frame.timestamp_us(),
                frame,
                source_id: self.source_id.clone(),
            };
            if !self.emit(event) {
                return;
            }
            self.sent += 1;
        }
    }

    fn maybe_end(&mut self) {
        if self.draining && !self.ended && self.demux.is_some() && self.decoder.queue_depth() == 0
        {
            self.ended = true;
            tracing::debug!(source = %self.source_id, frames = self.sent, "Demux window exhausted");
            self.emit(WorkerEvent::End);
        }
    }

    fn report_depth(&mut self) {
        let depth = self.decoder.queue_depth();
        if self.last_depth != Some(depth) {
            self.last_depth = Some(depth);
            self.emit(WorkerEvent::QueueDepth(depth));
        }
    }

    /// Send an event; a frame that cannot be delivered is released here.
    fn emit(&mut self, event: WorkerEvent) -> bool {
        match self.events.send(event) {
            Ok(()) => true,
            Err(mpsc::error::SendError(event)) => {
                event.discard();
                self.closed = true;
                false
            }
        }
    }
}
