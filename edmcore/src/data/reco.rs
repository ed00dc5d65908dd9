use std::fmt;
use std::fmt::{Display, Formatter};
use serde::{Serialize, Deserialize};
use crate::algorithm::kinematics::FourMomentum;
use crate::data::ids::ObjectId;

/// Reference from a reconstructed particle to one of its building blocks.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Constituent {
    CaloHit(ObjectId),
    Track(ObjectId),
}

impl Constituent {
    pub fn id(&self) -> ObjectId {
        match self {
            Constituent::CaloHit(id) | Constituent::Track(id) => *id,
        }
    }
}

impl Display for Constituent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Constituent::CaloHit(id) => write!(f, "CaloHit({})", id),
            Constituent::Track(id) => write!(f, "Track({})", id),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Kinematics {
    pub energy: f32,
    pub momentum: [f32; 3],
    pub charge: f32,
    pub mass: f32,
}

impl Kinematics {
    /// Takes energy and momentum from a summed four-vector; mass is the invariant mass.
    pub fn from_four_momentum(p4: &FourMomentum, charge: f32) -> Self {
        Kinematics {
            energy: p4.energy as f32,
            momentum: [p4.momentum.x as f32, p4.momentum.y as f32, p4.momentum.z as f32],
            charge,
            mass: p4.mass() as f32,
        }
    }
}

/// Particle-flow object as handed back by the pattern-recognition engine.
///
/// # Description
///
/// The orchestration layer treats the particle as opaque apart from its constituent
/// references. Kinematics are optional; engines that do not provide them leave the
/// field empty.
///
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconstructedParticle {
    pub pdg: i32,
    #[serde(default)]
    pub kinematics: Option<Kinematics>,
    #[serde(default)]
    pub constituents: Vec<Constituent>,
}

impl ReconstructedParticle {
    pub fn new(pdg: i32) -> Self {
        ReconstructedParticle { pdg, kinematics: None, constituents: Vec::new() }
    }

    pub fn with_kinematics(mut self, kinematics: Kinematics) -> Self {
        self.kinematics = Some(kinematics);
        self
    }

    pub fn with_calo_hit(mut self, id: ObjectId) -> Self {
        self.constituents.push(Constituent::CaloHit(id));
        self
    }

    pub fn with_track(mut self, id: ObjectId) -> Self {
        self.constituents.push(Constituent::Track(id));
        self
    }

    pub fn calo_hits(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.constituents.iter().filter_map(|c| match c {
            Constituent::CaloHit(id) => Some(*id),
            _ => None,
        })
    }

    pub fn tracks(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.constituents.iter().filter_map(|c| match c {
            Constituent::Track(id) => Some(*id),
            _ => None,
        })
    }
}
