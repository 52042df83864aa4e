//! Timed playback of a replay timeline
//!
//! A single task owns the timeline, the position and the pending deadline.
//! It awaits each transmit before doing anything else, so at most one frame
//! is ever in flight, and it schedules the next frame at "transmit finished
//! + original gap". Commands (load, play, pause, rewind) are applied between
//! steps and answered with the resulting status.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hookline_core::FrameId;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use super::decode::{decode_replay, ReplayFrame};
use crate::error::{ClientError, ClientResult};
use crate::export::read_csv;
use crate::report::Reporter;

/// Where replayed frames go
#[async_trait]
pub trait FrameSink: Send + Sync {
    async fn send_raw(&self, id: FrameId, data: Vec<u8>) -> ClientResult<()>;
}

#[async_trait]
impl<S: FrameSink + ?Sized> FrameSink for Arc<S> {
    async fn send_raw(&self, id: FrameId, data: Vec<u8>) -> ClientResult<()> {
        (**self).send_raw(id, data).await
    }
}

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayState {
    /// Nothing loaded
    Idle,
    /// Loaded and not playing
    Loaded,
    Running,
    Paused,
}

impl std::fmt::Display for ReplayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplayState::Idle => write!(f, "idle"),
            ReplayState::Loaded => write!(f, "loaded"),
            ReplayState::Running => write!(f, "running"),
            ReplayState::Paused => write!(f, "paused"),
        }
    }
}

/// Snapshot of the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStatus {
    pub state: ReplayState,
    /// Next frame to send
    pub index: usize,
    pub total: usize,
}

impl ReplayStatus {
    pub fn remaining(&self) -> usize {
        self.total - self.index
    }
}

enum Command {
    Load(Vec<ReplayFrame>),
    Play,
    Pause,
    Rewind,
}

type Envelope = (Command, oneshot::Sender<ReplayStatus>);

/// Handle to a running replay task
///
/// Dropping the handle stops playback.
pub struct ReplayScheduler {
    commands: mpsc::Sender<Envelope>,
    status: watch::Receiver<ReplayStatus>,
    task: JoinHandle<()>,
}

impl ReplayScheduler {
    /// Start the playback task
    pub fn spawn<S>(sink: S, reporter: Arc<dyn Reporter>) -> Self
    where
        S: FrameSink + 'static,
    {
        let initial = ReplayStatus {
            state: ReplayState::Idle,
            index: 0,
            total: 0,
        };
        let (status_tx, status) = watch::channel(initial);
        let (commands, rx) = mpsc::channel(16);

        let player = Player {
            sink,
            reporter,
            frames: Vec::new(),
            index: 0,
            state: ReplayState::Idle,
            deadline: None,
            status_tx,
        };
        let task = tokio::spawn(player.run(rx));

        Self {
            commands,
            status,
            task,
        }
    }

    async fn command(&self, command: Command) -> ClientResult<ReplayStatus> {
        let (ack, done) = oneshot::channel();
        self.commands
            .send((command, ack))
            .await
            .map_err(|_| ClientError::SchedulerClosed)?;
        done.await.map_err(|_| ClientError::SchedulerClosed)
    }

    /// Replace the timeline. Position goes back to the start, not playing.
    pub async fn load(&self, frames: Vec<ReplayFrame>) -> ClientResult<ReplayStatus> {
        self.command(Command::Load(frames)).await
    }

    /// Decode a CSV capture and load it
    ///
    /// On a decode error nothing changes and the previous timeline stays
    /// loaded.
    pub async fn load_csv<R: Read>(&self, reader: R) -> ClientResult<ReplayStatus> {
        let frames = decode_replay(&read_csv(reader)?)?;
        info!(frames = frames.len(), "Replay file decoded");
        self.load(frames).await
    }

    pub async fn load_file(&self, path: &Path) -> ClientResult<ReplayStatus> {
        let file = File::open(path)?;
        self.load_csv(file).await
    }

    /// Start, or resume from a pause (the current frame is sent at once)
    pub async fn play(&self) -> ClientResult<ReplayStatus> {
        self.command(Command::Play).await
    }

    pub async fn pause(&self) -> ClientResult<ReplayStatus> {
        self.command(Command::Pause).await
    }

    /// Cancel any pending frame and go back to the first one
    pub async fn rewind(&self) -> ClientResult<ReplayStatus> {
        self.command(Command::Rewind).await
    }

    /// Latest published status
    pub fn status(&self) -> ReplayStatus {
        *self.status.borrow()
    }

    /// Receiver updated after every command and every step
    pub fn subscribe(&self) -> watch::Receiver<ReplayStatus> {
        self.status.clone()
    }
}

impl Drop for ReplayScheduler {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct Player<S> {
    sink: S,
    reporter: Arc<dyn Reporter>,
    frames: Vec<ReplayFrame>,
    index: usize,
    state: ReplayState,
    /// When the frame at `index` is due
    deadline: Option<Instant>,
    status_tx: watch::Sender<ReplayStatus>,
}

impl<S: FrameSink> Player<S> {
    async fn run(mut self, mut commands: mpsc::Receiver<Envelope>) {
        loop {
            let deadline = self.deadline;
            tokio::select! {
                command = commands.recv() => match command {
                    Some((command, ack)) => {
                        self.apply(command);
                        let _ = ack.send(self.publish());
                    }
                    None => break,
                },
                _ = wait(deadline), if deadline.is_some() => {
                    self.deadline = None;
                    self.step().await;
                    self.publish();
                }
            }
        }
        debug!("Replay task finished");
    }

    fn status(&self) -> ReplayStatus {
        ReplayStatus {
            state: self.state,
            index: self.index,
            total: self.frames.len(),
        }
    }

    fn publish(&self) -> ReplayStatus {
        let status = self.status();
        self.status_tx.send_replace(status);
        status
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Load(frames) => {
                self.frames = frames;
                self.index = 0;
                self.deadline = None;
                self.state = if self.frames.is_empty() {
                    ReplayState::Idle
                } else {
                    ReplayState::Loaded
                };
            }
            Command::Play => match self.state {
                ReplayState::Loaded | ReplayState::Paused if self.index < self.frames.len() => {
                    self.state = ReplayState::Running;
                    self.deadline = Some(Instant::now());
                    info!(index = self.index, total = self.frames.len(), "Replay running");
                }
                _ => {}
            },
            Command::Pause => {
                if self.state == ReplayState::Running {
                    self.state = ReplayState::Paused;
                    self.deadline = None;
                }
            }
            Command::Rewind => {
                self.deadline = None;
                self.index = 0;
                if self.state != ReplayState::Idle {
                    self.state = ReplayState::Loaded;
                }
            }
        }
    }

    /// Send the frame at `index` and schedule the next one
    async fn step(&mut self) {
        if self.state != ReplayState::Running {
            return;
        }
        let Some(frame) = self.frames.get(self.index) else {
            self.state = ReplayState::Loaded;
            return;
        };
        let (id, data, time_ms) = (frame.id, frame.data.clone(), frame.time_ms);

        match self.sink.send_raw(id, data).await {
            Ok(()) => {
                self.index += 1;
                match self.frames.get(self.index) {
                    Some(next) => {
                        let gap = (next.time_ms - time_ms).max(0.0);
                        let deadline = Duration::try_from_secs_f64(gap / 1000.0)
                            .ok()
                            .and_then(|gap| Instant::now().checked_add(gap));
                        match deadline {
                            Some(deadline) => self.deadline = Some(deadline),
                            None => {
                                let e = ClientError::validation(format!(
                                    "gap of {} ms before frame {} is out of range",
                                    gap, self.index
                                ));
                                self.reporter.report("replay schedule", &e);
                                self.state = ReplayState::Paused;
                            }
                        }
                    }
                    None => {
                        self.state = ReplayState::Loaded;
                        info!(total = self.frames.len(), "Replay finished");
                    }
                }
            }
            Err(e) => {
                self.reporter.report("replay transmit", &e);
                self.state = ReplayState::Paused;
            }
        }
    }
}

async fn wait(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
