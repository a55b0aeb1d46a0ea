use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::FieldConfig;
use crate::geometry::Position;

/// Produces new jobs at random spots on the field.
#[derive(Debug)]
pub struct JobSource {
    rng: StdRng,
    half_extent_x: f64,
    half_extent_z: f64,
}

impl JobSource {
    pub fn new(config: &FieldConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            half_extent_x: config.half_extent_x,
            half_extent_z: config.half_extent_z,
        }
    }

    /// Next job name and target. Names are not unique across a run.
    pub fn next_job(&mut self) -> (String, Position) {
        let x = self.rng.gen_range(-self.half_extent_x..=self.half_extent_x);
        let z = self.rng.gen_range(-self.half_extent_z..=self.half_extent_z);
        let name = format!("Job-{}", self.rng.gen_range(100..=999));
        (name, Position::new(x, 0.0, z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(seed: u64) -> JobSource {
        JobSource::new(&FieldConfig {
            seed: Some(seed),
            ..Default::default()
        })
    }

    #[test]
    fn jobs_stay_inside_field() {
        let mut source = seeded(7);
        for _ in 0..500 {
            let (name, p) = source.next_job();
            assert!(p.x.abs() <= 14.5);
            assert!(p.z.abs() <= 14.5);
            assert_eq!(p.y, 0.0);
            let n: u32 = name.trim_start_matches("Job-").parse().unwrap();
            assert!((100..=999).contains(&n));
        }
    }

    #[test]
    fn same_seed_same_jobs() {
        let mut a = seeded(42);
        let mut b = seeded(42);
        for _ in 0..10 {
            assert_eq!(a.next_job(), b.next_job());
        }
    }
}
