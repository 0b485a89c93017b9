//! Decoy flares. Any cruise missile whose seeker sees one within range chases it
//! instead of its building.

use engine_core::Lifetime;
use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlareId(pub u64);

#[derive(Debug, Clone, Copy)]
pub struct Flare {
    pub id: FlareId,
    pub position: Vec3,
    pub lifetime: Lifetime,
}

/// Every flare currently burning.
#[derive(Debug, Default)]
pub struct FlareField {
    flares: Vec<Flare>,
    next_id: u64,
}

impl FlareField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deploy(&mut self, position: Vec3, lifetime: f32) -> FlareId {
        self.next_id += 1;
        let id = FlareId(self.next_id);
        self.flares.push(Flare {
            id,
            position,
            lifetime: Lifetime::new(lifetime),
        });
        id
    }

    pub fn remove(&mut self, id: FlareId) -> bool {
        let before = self.flares.len();
        self.flares.retain(|f| f.id != id);
        self.flares.len() != before
    }

    /// Drift flares down and burn them out. Returns the ids that expired.
    pub fn update(&mut self, dt: f32, fall_speed: f32) -> Vec<FlareId> {
        let mut expired = Vec::new();
        self.flares.retain_mut(|f| {
            f.position.y -= fall_speed * dt;
            if f.lifetime.update(dt) {
                expired.push(f.id);
                false
            } else {
                true
            }
        });
        expired
    }

    /// Closest flare within `range` of `point`.
    pub fn nearest_within(&self, point: Vec3, range: f32) -> Option<&Flare> {
        self.flares
            .iter()
            .map(|f| (f, f.position.distance(point)))
            .filter(|(_, d)| *d <= range)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(f, _)| f)
    }

    pub fn get(&self, id: FlareId) -> Option<&Flare> {
        self.flares.iter().find(|f| f.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Flare> {
        self.flares.iter()
    }

    pub fn len(&self) -> usize {
        self.flares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flares.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_within_respects_range() {
        let mut field = FlareField::new();
        let far = field.deploy(Vec3::new(0.0, 0.0, 60.0), 4.0);
        let near = field.deploy(Vec3::new(0.0, 0.0, 30.0), 4.0);
        assert_eq!(field.nearest_within(Vec3::ZERO, 50.0).map(|f| f.id), Some(near));
        field.remove(near);
        assert!(field.nearest_within(Vec3::ZERO, 50.0).is_none());
        assert!(field.get(far).is_some());
    }

    #[test]
    fn flares_fall_and_burn_out() {
        let mut field = FlareField::new();
        let id = field.deploy(Vec3::new(0.0, 100.0, 0.0), 1.0);
        assert!(field.update(0.5, 4.0).is_empty());
        assert_eq!(field.get(id).map(|f| f.position.y), Some(98.0));
        assert_eq!(field.update(0.5, 4.0), vec![id]);
        assert!(field.is_empty());
    }
}
