use std::fmt;
use std::fmt::{Display, Formatter};
use serde::{Serialize, Deserialize};
use crate::algorithm::kinematics::{momentum_magnitude, transverse_momentum};
use crate::data::ids::ObjectId;

/// A calibrated calorimeter cell measurement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalorimeterHit {
    pub id: ObjectId,
    pub cell_id: u64,
    pub energy: f32,        // GeV
    #[serde(default)]
    pub energy_error: f32,
    #[serde(default)]
    pub time: f32,          // ns
    pub position: [f32; 3], // mm
    #[serde(default)]
    pub hit_type: i32,
}

impl CalorimeterHit {
    pub fn new(id: ObjectId, cell_id: u64, energy: f32, position: [f32; 3]) -> Self {
        CalorimeterHit { id, cell_id, energy, energy_error: 0.0, time: 0.0, position, hit_type: 0 }
    }

    /// Distance of the hit from the beam axis in mm.
    pub fn radius(&self) -> f32 {
        (self.position[0] * self.position[0] + self.position[1] * self.position[1]).sqrt()
    }
}

/// A fitted charged-particle track, reduced to what the orchestration layer reads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: ObjectId,
    #[serde(default)]
    pub track_type: i32,
    #[serde(default)]
    pub chi2: f32,
    #[serde(default)]
    pub ndf: i32,
    #[serde(default)]
    pub dedx: f32,
    pub momentum: [f32; 3], // GeV at the reference point
    pub charge: f32,
    #[serde(default)]
    pub n_hits: u32,
}

impl Track {
    pub fn new(id: ObjectId, momentum: [f32; 3], charge: f32) -> Self {
        Track { id, track_type: 0, chi2: 0.0, ndf: 0, dedx: 0.0, momentum, charge, n_hits: 0 }
    }

    pub fn p(&self) -> f64 {
        momentum_magnitude(&self.momentum)
    }

    pub fn pt(&self) -> f64 {
        transverse_momentum(&self.momentum)
    }
}

/// Vertex finder a vertex collection comes from.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub enum VertexKind {
    Kink,
    Prong,
    Split,
    V0,
}

impl Display for VertexKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            VertexKind::Kink => write!(f, "Kink"),
            VertexKind::Prong => write!(f, "Prong"),
            VertexKind::Split => write!(f, "Split"),
            VertexKind::V0 => write!(f, "V0"),
        }
    }
}

/// A reconstructed decay or interaction vertex.
///
/// The vertex kind is a property of the collection holding the vertex; the cache
/// reports it per collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub id: ObjectId,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub chi2: f32,
    #[serde(default)]
    pub probability: f32,
    pub position: [f32; 3], // mm
    #[serde(default)]
    pub particle: Option<usize>,
}

impl Vertex {
    pub fn new(id: ObjectId, position: [f32; 3]) -> Self {
        Vertex { id, primary: false, chi2: 0.0, probability: 0.0, position, particle: None }
    }
}
