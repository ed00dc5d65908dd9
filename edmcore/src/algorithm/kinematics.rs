use std::ops::{Add, AddAssign};
use nalgebra::Vector3;

pub fn momentum_vector(momentum: &[f32; 3]) -> Vector3<f64> {
    Vector3::new(momentum[0] as f64, momentum[1] as f64, momentum[2] as f64)
}

pub fn momentum_magnitude(momentum: &[f32; 3]) -> f64 {
    momentum_vector(momentum).norm()
}

pub fn transverse_momentum(momentum: &[f32; 3]) -> f64 {
    momentum_vector(momentum).xy().norm()
}

/// Energy of a particle with given mass and momentum, E = sqrt(m² + |p|²).
pub fn energy_from_mass(mass: f64, momentum: &[f32; 3]) -> f64 {
    (mass * mass + momentum_vector(momentum).norm_squared()).sqrt()
}

/// Invariant mass of an (E, p) pair; space-like combinations are clamped to zero.
pub fn invariant_mass(energy: f64, momentum: &Vector3<f64>) -> f64 {
    (energy * energy - momentum.norm_squared()).max(0.0).sqrt()
}

/// Energy-momentum four-vector used to sum constituents.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FourMomentum {
    pub energy: f64,
    pub momentum: Vector3<f64>,
}

impl FourMomentum {
    pub fn new(energy: f64, momentum: Vector3<f64>) -> Self {
        FourMomentum { energy, momentum }
    }

    pub fn zero() -> Self {
        FourMomentum { energy: 0.0, momentum: Vector3::zeros() }
    }

    pub fn from_parts(energy: f64, momentum: &[f32; 3]) -> Self {
        FourMomentum { energy, momentum: momentum_vector(momentum) }
    }

    /// Massless four-vector of energy `energy` pointing from the origin to `position`.
    pub fn massless_towards(energy: f64, position: &[f32; 3]) -> Self {
        let direction = momentum_vector(position);
        let norm = direction.norm();
        if norm <= 0.0 {
            return FourMomentum::new(energy, Vector3::zeros());
        }
        FourMomentum::new(energy, direction * (energy / norm))
    }

    pub fn mass(&self) -> f64 {
        invariant_mass(self.energy, &self.momentum)
    }

    pub fn p(&self) -> f64 {
        self.momentum.norm()
    }
}

impl Default for FourMomentum {
    fn default() -> Self {
        FourMomentum::zero()
    }
}

impl Add for FourMomentum {
    type Output = FourMomentum;

    fn add(self, other: FourMomentum) -> FourMomentum {
        FourMomentum::new(self.energy + other.energy, self.momentum + other.momentum)
    }
}

impl AddAssign for FourMomentum {
    fn add_assign(&mut self, other: FourMomentum) {
        self.energy += other.energy;
        self.momentum += other.momentum;
    }
}
