use serde::{Serialize, Deserialize};
use crate::data::ids::ObjectId;

/// Calorimeter truth weights come as a pair: the electromagnetic fraction of the
/// deposited energy and the total deposited energy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CaloRelationWeight {
    pub em_fraction: f32,
    pub total: f32,
}

impl CaloRelationWeight {
    pub fn new(em_fraction: f32, total: f32) -> Self {
        CaloRelationWeight { em_fraction, total }
    }
}

/// Edge from a calorimeter hit to the simulated particle that deposited energy in it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaloTruthRelation {
    pub rec: ObjectId,
    pub sim: ObjectId,
    pub weight: CaloRelationWeight,
}

impl CaloTruthRelation {
    pub fn new(rec: ObjectId, sim: ObjectId, weight: CaloRelationWeight) -> Self {
        CaloTruthRelation { rec, sim, weight }
    }
}

/// Edge from a tracker object (track) to a simulated particle, with a scalar weight.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackerTruthRelation {
    pub rec: ObjectId,
    pub sim: ObjectId,
    pub weight: f32,
}

impl TrackerTruthRelation {
    pub fn new(rec: ObjectId, sim: ObjectId, weight: f32) -> Self {
        TrackerTruthRelation { rec, sim, weight }
    }
}
