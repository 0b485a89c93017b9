//! Background chunk generation. The worker owns its own RNG for building
//! placement and a copy of the heightfield; requests and results move by value,
//! so the heightmap buffer is handed back without copying.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use physics::WorkerError;
use procgen::{generate_chunk, ChunkKey, GeneratedChunk, HeightField};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug, Clone, Copy)]
pub struct ChunkRequest {
    pub key: ChunkKey,
    /// Monotonic id; a response only lands if the slot still waits for this id.
    pub request_id: u64,
    pub chunk_size: f32,
    pub subdivisions: usize,
}

#[derive(Debug)]
pub struct ChunkResponse {
    pub key: ChunkKey,
    pub request_id: u64,
    pub generated: GeneratedChunk,
}

pub enum TerrainCommand {
    Generate(ChunkRequest),
    Shutdown,
}

/// Run one request. Shared by the worker thread and the inline fallback.
pub fn run_request(field: &HeightField, req: &ChunkRequest, rng: &mut StdRng) -> ChunkResponse {
    ChunkResponse {
        key: req.key,
        request_id: req.request_id,
        generated: generate_chunk(field, req.key, req.chunk_size, req.subdivisions, rng),
    }
}

pub struct ChunkWorker {
    tx_cmd: Sender<TerrainCommand>,
    rx_evt: Receiver<ChunkResponse>,
    thread: Option<JoinHandle<()>>,
}

impl ChunkWorker {
    /// Start the worker. `building_seed` pins building placement; `None` uses entropy.
    pub fn spawn(field: HeightField, building_seed: Option<u64>) -> Result<Self, WorkerError> {
        let (tx_cmd, rx_cmd) = mpsc::channel::<TerrainCommand>();
        let (tx_evt, rx_evt) = mpsc::channel::<ChunkResponse>();

        let thread = thread::Builder::new()
            .name("terrain-worker".to_string())
            .spawn(move || worker_loop(field, placement_rng(building_seed), rx_cmd, tx_evt))?;

        Ok(Self {
            tx_cmd,
            rx_evt,
            thread: Some(thread),
        })
    }

    pub fn send(&self, req: ChunkRequest) -> Result<(), WorkerError> {
        self.tx_cmd
            .send(TerrainCommand::Generate(req))
            .map_err(|_| WorkerError::Disconnected)
    }

    pub fn try_recv(&self) -> Option<ChunkResponse> {
        self.rx_evt.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<ChunkResponse> {
        self.rx_evt.recv_timeout(timeout).ok()
    }
}

impl Drop for ChunkWorker {
    fn drop(&mut self) {
        let _ = self.tx_cmd.send(TerrainCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// RNG for building placement.
pub fn placement_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn worker_loop(field: HeightField, mut rng: StdRng, rx_cmd: Receiver<TerrainCommand>, tx_evt: Sender<ChunkResponse>) {
    while let Ok(cmd) = rx_cmd.recv() {
        match cmd {
            TerrainCommand::Generate(req) => {
                let res = run_request(&field, &req, &mut rng);
                if tx_evt.send(res).is_err() {
                    break;
                }
            }
            TerrainCommand::Shutdown => break,
        }
    }
    log::debug!("Terrain worker exiting");
}
