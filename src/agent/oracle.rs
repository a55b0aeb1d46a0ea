use crate::geometry::Position;

/// Estimates what it costs an agent to reach a target.
///
/// `None` means the target is unreachable from `from`. Agents never bid on
/// unreachable targets.
pub trait CostOracle: Send + Sync + std::fmt::Debug {
    fn cost(&self, from: Position, to: Position) -> Option<f64>;
}

/// Straight-line distance. Everything is reachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanOracle;

impl CostOracle for EuclideanOracle {
    fn cost(&self, from: Position, to: Position) -> Option<f64> {
        Some(from.distance_to(&to))
    }
}

/// Axis-aligned rectangle on the x/z plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Zone {
    pub min_x: f64,
    pub max_x: f64,
    pub min_z: f64,
    pub max_z: f64,
}

impl Zone {
    pub fn new(min_x: f64, max_x: f64, min_z: f64, max_z: f64) -> Self {
        Self {
            min_x: min_x.min(max_x),
            max_x: min_x.max(max_x),
            min_z: min_z.min(max_z),
            max_z: min_z.max(max_z),
        }
    }

    /// Rectangle with the given half-extents, centred on the origin.
    pub fn centered(half_x: f64, half_z: f64) -> Self {
        Self::new(-half_x, half_x, -half_z, half_z)
    }

    pub fn contains(&self, p: Position) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.z >= self.min_z && p.z <= self.max_z
    }
}

/// Navigable field: targets outside `bounds` or inside a blocked zone are
/// unreachable, everything else costs the straight-line distance times
/// `terrain_factor`.
#[derive(Debug, Clone)]
pub struct FieldOracle {
    bounds: Zone,
    blocked: Vec<Zone>,
    terrain_factor: f64,
}

impl FieldOracle {
    pub fn new(bounds: Zone) -> Self {
        Self {
            bounds,
            blocked: Vec::new(),
            terrain_factor: 1.0,
        }
    }

    pub fn with_blocked(mut self, zone: Zone) -> Self {
        self.blocked.push(zone);
        self
    }

    /// Factors below 1.0 are clamped to 1.0.
    pub fn with_terrain_factor(mut self, factor: f64) -> Self {
        self.terrain_factor = if factor.is_finite() { factor.max(1.0) } else { 1.0 };
        self
    }

    pub fn is_reachable(&self, to: Position) -> bool {
        self.bounds.contains(to) && !self.blocked.iter().any(|z| z.contains(to))
    }
}

impl CostOracle for FieldOracle {
    fn cost(&self, from: Position, to: Position) -> Option<f64> {
        if !self.is_reachable(to) {
            return None;
        }
        Some(from.distance_to(&to) * self.terrain_factor)
    }
}
