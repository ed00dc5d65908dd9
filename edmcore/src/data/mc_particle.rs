use serde::{Serialize, Deserialize};
use crate::algorithm::kinematics::{energy_from_mass, FourMomentum};
use crate::data::ids::ObjectId;

pub const PDG_PHOTON: i32 = 22;
pub const PDG_ELECTRON: i32 = 11;

/// A simulated (truth) particle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct McParticle {
    pub id: ObjectId,
    pub pdg: i32,
    pub generator_status: i32,
    pub charge: f32,
    pub mass: f64,
    pub momentum: [f32; 3],  // GeV at production vertex
    pub vertex: [f64; 3],    // mm
    #[serde(default)]
    pub parents: Vec<ObjectId>,
    #[serde(default)]
    pub daughters: Vec<ObjectId>,
}

impl McParticle {
    /// Creates a new `McParticle` produced at the origin without parents or daughters.
    ///
    /// # Arguments
    ///
    /// * `id` - Identity of the particle in its collection.
    /// * `pdg` - PDG code.
    /// * `charge` - Electric charge in units of e.
    /// * `mass` - Mass in GeV.
    /// * `momentum` - Momentum (px, py, pz) in GeV.
    ///
    pub fn new(id: ObjectId, pdg: i32, charge: f32, mass: f64, momentum: [f32; 3]) -> Self {
        McParticle {
            id,
            pdg,
            generator_status: 1,
            charge,
            mass,
            momentum,
            vertex: [0.0; 3],
            parents: Vec::new(),
            daughters: Vec::new(),
        }
    }

    pub fn energy(&self) -> f64 {
        energy_from_mass(self.mass, &self.momentum)
    }

    pub fn four_momentum(&self) -> FourMomentum {
        FourMomentum::from_parts(self.energy(), &self.momentum)
    }

    pub fn is_photon(&self) -> bool {
        self.pdg == PDG_PHOTON
    }

    /// True for electrons and positrons.
    pub fn is_electron(&self) -> bool {
        self.pdg.abs() == PDG_ELECTRON
    }
}
