//! Radius queries over streamed buildings, with a short-lived result cache.
//!
//! Results are keyed by the query point's 50 u cell and the radius, and are
//! reused for `query_cache_time` seconds unless the terrain's epoch moved
//! (a launcher was destroyed or a building placed).

use std::collections::HashMap;

use glam::Vec3;

use crate::building::BuildingId;
use crate::config::WorldConfig;
use crate::terrain::{horizontal_distance, TerrainManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct QueryKey {
    cell_x: i32,
    cell_z: i32,
    radius_bits: u32,
}

#[derive(Debug)]
struct CachedQuery {
    at: f64,
    epoch: u64,
    result: Vec<BuildingId>,
}

pub struct SpatialQuery {
    cell: f32,
    ttl: f64,
    cache: HashMap<QueryKey, CachedQuery>,
    hits: u64,
    misses: u64,
}

impl SpatialQuery {
    pub fn new(config: &WorldConfig) -> Self {
        Self {
            cell: config.query_cell.max(1.0),
            ttl: config.query_cache_time as f64,
            cache: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Buildings whose footprint centre is within `radius` (horizontally) of `p`.
    pub fn buildings_in_radius(&mut self, terrain: &TerrainManager, p: Vec3, radius: f32, now: f64) -> Vec<BuildingId> {
        let key = QueryKey {
            cell_x: (p.x / self.cell).floor() as i32,
            cell_z: (p.z / self.cell).floor() as i32,
            radius_bits: radius.to_bits(),
        };
        let epoch = terrain.epoch();
        if let Some(hit) = self.cache.get(&key) {
            if hit.epoch == epoch && now - hit.at < self.ttl {
                self.hits += 1;
                return hit.result.clone();
            }
        }

        self.misses += 1;
        let result: Vec<BuildingId> = terrain
            .ready_chunks_near(p, radius)
            .flat_map(|c| c.buildings.iter())
            .filter(|b| horizontal_distance(b.spec.position, p) <= radius)
            .map(|b| b.id)
            .collect();

        let ttl = self.ttl;
        self.cache.retain(|_, q| q.epoch == epoch && now - q.at < ttl);
        self.cache.insert(
            key,
            CachedQuery {
                at: now,
                epoch,
                result: result.clone(),
            },
        );
        result
    }

    /// Drop every cached result.
    pub fn invalidate(&mut self) {
        self.cache.clear();
    }

    /// `(hits, misses)` since construction.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}
