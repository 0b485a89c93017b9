//! Shared plumbing for both missile kinds: the authoritative body state, the
//! per-missile request bookkeeping, and dispatch to the physics worker.
//!
//! Each missile has at most one step in flight. Time that passes while waiting
//! is banked in `pending_dt` and submitted with the next request, so a slow or
//! dropped response never loses simulated time. A response is applied only if it
//! answers the request currently in flight; anything older is discarded.

use std::time::Duration;

use engine_core::Pose;
use glam::Vec3;
use physics::{
    step_missile, to_triple, MissileId, MissileKind, MissileStepRequest, MissileStepResponse, MissileWorker,
    Waypoints,
};

use crate::config::WorkerMode;

/// Hands out missile ids. Never reuses one.
#[derive(Debug, Default)]
pub struct MissileIds {
    next: u64,
}

impl MissileIds {
    pub fn allocate(&mut self) -> MissileId {
        self.next += 1;
        MissileId(self.next)
    }
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    seq: u64,
    sent_at: f64,
    delta_time: f32,
}

/// Authoritative state common to every missile.
#[derive(Debug, Clone)]
pub struct MissileBody {
    pub id: MissileId,
    pub kind: MissileKind,
    pub pose: Pose,
    pub velocity: Vec3,
    /// Seconds since launch.
    pub life_time: f32,
    pub exploded: bool,
    /// Simulated time not yet covered by an applied step.
    pending_dt: f32,
    next_seq: u64,
    in_flight: Option<InFlight>,
}

/// Fields a guidance law contributes to a request.
#[derive(Debug, Clone, Copy)]
pub struct Guidance {
    pub target: Vec3,
    pub speed: f32,
    pub turn_rate: f32,
    pub path_time: f32,
    pub path_speed: f32,
    pub waypoints: Option<(Vec3, Vec3)>,
    pub launched: bool,
    pub max_life_time: f32,
}

impl MissileBody {
    pub fn new(id: MissileId, kind: MissileKind, position: Vec3, velocity: Vec3) -> Self {
        let mut pose = Pose::from_position(position);
        pose.face_velocity(velocity);
        Self {
            id,
            kind,
            pose,
            velocity,
            life_time: 0.0,
            exploded: false,
            pending_dt: 0.0,
            next_seq: 0,
            in_flight: None,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.pose.position
    }

    /// Advance the clock of a live missile.
    pub fn age(&mut self, dt: f32) {
        if !self.exploded {
            self.life_time += dt;
            self.pending_dt += dt;
        }
    }

    /// Past its fuse by more than `grace` and still flying: the worker never
    /// answered the step that should have fused it.
    pub fn overdue(&self, max_life: f32, grace: f32) -> bool {
        !self.exploded && self.life_time >= max_life + grace
    }

    /// Build the next step request, or `None` if one is already in flight and
    /// has not timed out. An abandoned request's response will be discarded.
    pub fn next_request(&mut self, now: f64, timeout: f32, guidance: &Guidance) -> Option<MissileStepRequest> {
        if self.exploded || self.pending_dt <= 0.0 {
            return None;
        }
        if let Some(flight) = self.in_flight {
            if now - flight.sent_at < timeout as f64 {
                return None;
            }
            log::debug!("Missile {:?} step {} timed out, re-submitting", self.id, flight.seq);
        }

        self.next_seq += 1;
        let delta_time = self.pending_dt;
        self.in_flight = Some(InFlight {
            seq: self.next_seq,
            sent_at: now,
            delta_time,
        });

        Some(MissileStepRequest {
            id: self.id,
            seq: self.next_seq,
            position: to_triple(self.pose.position),
            velocity: to_triple(self.velocity),
            rotation: self.pose.euler(),
            target_position: to_triple(guidance.target),
            speed: guidance.speed,
            turn_rate: guidance.turn_rate,
            delta_time,
            path_time: guidance.path_time,
            path_speed: guidance.path_speed,
            waypoints: guidance.waypoints.map(|(start, end)| Waypoints {
                start: to_triple(start),
                end: to_triple(end),
            }),
            launched: guidance.launched,
            exploded: self.exploded,
            life_time: (self.life_time - delta_time).max(0.0),
            max_life_time: guidance.max_life_time,
            kind: self.kind,
        })
    }

    /// Apply a worker response. Returns `false` (and changes nothing) for stale
    /// responses and for missiles that already exploded.
    pub fn apply(&mut self, res: &MissileStepResponse) -> bool {
        if self.exploded {
            return false;
        }
        let flight = match self.in_flight {
            Some(flight) if flight.seq == res.seq => flight,
            _ => {
                log::debug!("Discarding stale step {} for missile {:?}", res.seq, self.id);
                return false;
            }
        };
        let position = Vec3::from_array(res.position);
        let velocity = Vec3::from_array(res.velocity);
        if !position.is_finite() || !velocity.is_finite() {
            log::warn!("Non-finite step for missile {:?}, keeping last state", self.id);
            self.in_flight = None;
            return false;
        }

        self.pose.position = position;
        self.velocity = velocity;
        let [pitch, yaw, roll] = res.rotation;
        if pitch.is_finite() && yaw.is_finite() && roll.is_finite() {
            self.pose.pitch = pitch;
            self.pose.yaw = yaw;
            self.pose.roll = roll;
        }
        self.pending_dt = (self.pending_dt - flight.delta_time).max(0.0);
        self.in_flight = None;
        true
    }

    /// Mark exploded. Position is frozen from here on.
    pub fn explode(&mut self) {
        self.exploded = true;
        self.in_flight = None;
        self.pending_dt = 0.0;
    }
}

/// Routes step requests to the worker thread, or runs them inline.
pub struct MissileDispatcher {
    worker: Option<MissileWorker>,
    inline_results: Vec<MissileStepResponse>,
}

impl MissileDispatcher {
    pub fn new(mode: WorkerMode) -> Self {
        let worker = match mode {
            WorkerMode::Inline => None,
            WorkerMode::Threaded => match MissileWorker::spawn() {
                Ok(w) => Some(w),
                Err(e) => {
                    log::warn!("{}; integrating missiles on the simulation thread", e);
                    None
                }
            },
        };
        Self {
            worker,
            inline_results: Vec::new(),
        }
    }

    pub fn is_threaded(&self) -> bool {
        self.worker.is_some()
    }

    /// Send a tick's requests as one batch.
    pub fn dispatch(&mut self, requests: Vec<MissileStepRequest>) {
        if requests.is_empty() {
            return;
        }
        if let Some(worker) = &self.worker {
            let fallback = requests.clone();
            match worker.submit(requests) {
                Ok(()) => return,
                Err(e) => {
                    log::warn!("{}; integrating missiles on the simulation thread", e);
                    self.worker = None;
                    self.inline_results.extend(fallback.iter().map(step_missile));
                }
            }
        } else {
            self.inline_results.extend(requests.iter().map(step_missile));
        }
    }

    /// Every response available right now. Never blocks.
    pub fn collect(&mut self) -> Vec<MissileStepResponse> {
        let mut out = std::mem::take(&mut self.inline_results);
        if let Some(worker) = &self.worker {
            out.extend(worker.drain());
        }
        out
    }

    /// Wait up to `timeout` for at least one worker response (drivers and tests).
    pub fn wait(&mut self, timeout: Duration) -> Vec<MissileStepResponse> {
        let mut out = std::mem::take(&mut self.inline_results);
        if let Some(worker) = &self.worker {
            if out.is_empty() {
                if let Ok(Some(evt)) = worker.recv_timeout(timeout) {
                    out.extend(evt.into_responses());
                }
            }
            out.extend(worker.drain());
        }
        out
    }
}
