use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;

use crate::integrator::step_missile;
use crate::protocol::{MissileStepRequest, MissileStepResponse};

/// Failure talking to a background worker. Never fatal: callers log it and fall
/// back to computing on the simulation thread.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("worker channel disconnected")]
    Disconnected,
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

pub enum PhysicsCommand {
    /// `UPDATE_MISSILE_PHYSICS`
    Step(MissileStepRequest),
    /// `BATCH_UPDATE_MISSILES`
    Batch(Vec<MissileStepRequest>),
    Shutdown,
}

pub enum PhysicsEvent {
    Stepped(MissileStepResponse),
    BatchStepped(Vec<MissileStepResponse>),
}

impl PhysicsEvent {
    pub fn into_responses(self) -> Vec<MissileStepResponse> {
        match self {
            PhysicsEvent::Stepped(r) => vec![r],
            PhysicsEvent::BatchStepped(rs) => rs,
        }
    }
}

/// Background thread that owns the missile integrator.
pub struct MissileWorker {
    tx_cmd: Sender<PhysicsCommand>,
    rx_evt: Receiver<PhysicsEvent>,
    thread: Option<JoinHandle<()>>,
}

impl MissileWorker {
    pub fn spawn() -> Result<Self, WorkerError> {
        let (tx_cmd, rx_cmd) = mpsc::channel::<PhysicsCommand>();
        let (tx_evt, rx_evt) = mpsc::channel::<PhysicsEvent>();

        let thread = thread::Builder::new()
            .name("missile-physics-worker".to_string())
            .spawn(move || worker_loop(rx_cmd, tx_evt))?;

        Ok(Self {
            tx_cmd,
            rx_evt,
            thread: Some(thread),
        })
    }

    pub fn send(&self, cmd: PhysicsCommand) -> Result<(), WorkerError> {
        self.tx_cmd.send(cmd).map_err(|_| WorkerError::Disconnected)
    }

    /// Submit a batch; a single request goes out as `Step`.
    pub fn submit(&self, mut requests: Vec<MissileStepRequest>) -> Result<(), WorkerError> {
        match requests.len() {
            0 => Ok(()),
            1 => match requests.pop() {
                Some(req) => self.send(PhysicsCommand::Step(req)),
                None => Ok(()),
            },
            _ => self.send(PhysicsCommand::Batch(requests)),
        }
    }

    /// Non-blocking poll.
    pub fn try_recv(&self) -> Option<PhysicsEvent> {
        self.rx_evt.try_recv().ok()
    }

    /// Every response that has already arrived.
    pub fn drain(&self) -> Vec<MissileStepResponse> {
        let mut out = Vec::new();
        while let Some(evt) = self.try_recv() {
            out.extend(evt.into_responses());
        }
        out
    }

    /// Blocking poll with a deadline, for drivers that want to wait a frame out.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<PhysicsEvent>, WorkerError> {
        match self.rx_evt.recv_timeout(timeout) {
            Ok(evt) => Ok(Some(evt)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(WorkerError::Disconnected),
        }
    }
}

impl Drop for MissileWorker {
    fn drop(&mut self) {
        let _ = self.tx_cmd.send(PhysicsCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn worker_loop(rx_cmd: Receiver<PhysicsCommand>, tx_evt: Sender<PhysicsEvent>) {
    while let Ok(cmd) = rx_cmd.recv() {
        let evt = match cmd {
            PhysicsCommand::Step(req) => PhysicsEvent::Stepped(step_missile(&req)),
            PhysicsCommand::Batch(reqs) => PhysicsEvent::BatchStepped(reqs.iter().map(step_missile).collect()),
            PhysicsCommand::Shutdown => break,
        };
        if tx_evt.send(evt).is_err() {
            break;
        }
    }
    log::debug!("Missile physics worker exiting");
}
