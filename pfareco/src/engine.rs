use std::collections::HashMap;
use edmcore::algorithm::kinematics::FourMomentum;
use edmcore::data::ids::ObjectId;
use edmcore::data::reco::{Constituent, Kinematics, ReconstructedParticle};
use crate::cache::CollectionCache;
use crate::error::{PfaError, Result};
use crate::truth::relation::{CaloWeight, RelationIndex, TruthLink, TruthRelationSource};

pub const PION_MASS: f64 = 0.13957;
pub const PDG_PION: i32 = 211;
pub const PDG_PHOTON: i32 = 22;

/// Boundary to the pattern-recognition engine and its input/output adapters.
///
/// Per event the job calls `reset`, then `build_inputs` with the freshly updated
/// cache, then `extract_particles` once.
pub trait PatternRecognition {
    fn name(&self) -> &str;

    fn reset(&mut self) {}

    /// Turns cached collections into engine inputs.
    fn build_inputs(&mut self, cache: &CollectionCache<'_>) -> Result<()>;

    /// Hands back the reconstructed particles of the current event.
    fn extract_particles(&mut self) -> Result<Vec<ReconstructedParticle>>;
}

/// Engine stand-in returning a hand-authored particle list every event.
#[derive(Clone, Debug, Default)]
pub struct FixedOutputEngine {
    particles: Vec<ReconstructedParticle>,
    failure: Option<String>,
    pub inputs_built: usize,
}

impl FixedOutputEngine {
    pub fn new(particles: Vec<ReconstructedParticle>) -> Self {
        FixedOutputEngine { particles, failure: None, inputs_built: 0 }
    }

    /// Engine whose extraction always fails with `message`.
    pub fn failing(message: &str) -> Self {
        FixedOutputEngine { particles: Vec::new(), failure: Some(message.to_string()), inputs_built: 0 }
    }
}

impl PatternRecognition for FixedOutputEngine {
    fn name(&self) -> &str {
        "fixed"
    }

    fn build_inputs(&mut self, _cache: &CollectionCache<'_>) -> Result<()> {
        self.inputs_built += 1;
        Ok(())
    }

    fn extract_particles(&mut self) -> Result<Vec<ReconstructedParticle>> {
        match &self.failure {
            Some(message) => Err(PfaError::Engine(message.clone())),
            None => Ok(self.particles.clone()),
        }
    }
}

struct Seed {
    sim: Option<ObjectId>,
    constituents: Vec<Constituent>,
    calo: FourMomentum,
    track: FourMomentum,
    charge: f32,
    n_tracks: usize,
}

impl Seed {
    fn new(sim: Option<ObjectId>) -> Self {
        Seed {
            sim,
            constituents: Vec::new(),
            calo: FourMomentum::zero(),
            track: FourMomentum::zero(),
            charge: 0.0,
            n_tracks: 0,
        }
    }
}

fn dominant(links: &[TruthLink]) -> Option<ObjectId> {
    links.iter()
        .filter(|l| l.weight > 0.0)
        .fold(None, |best: Option<&TruthLink>, l| match best {
            Some(b) if b.weight >= l.weight => Some(b),
            _ => Some(l),
        })
        .map(|l| l.sim)
}

/// Cheating engine: every hit and track goes to the truth particle that dominates
/// its relations, one reconstructed particle per truth particle.
///
/// Charged groups take their kinematics from tracks, neutral groups from the
/// calorimeter energy flow. Objects without truth links end up in one extra
/// particle with PDG 0 when `keep_unmatched` is set.
pub struct TruthSeededEngine {
    pub calo_weight: CaloWeight,
    pub keep_unmatched: bool,
    prepared: Vec<ReconstructedParticle>,
}

impl TruthSeededEngine {
    pub fn new(calo_weight: CaloWeight) -> Self {
        TruthSeededEngine { calo_weight, keep_unmatched: true, prepared: Vec::new() }
    }
}

impl Default for TruthSeededEngine {
    fn default() -> Self {
        TruthSeededEngine::new(CaloWeight::default())
    }
}

impl PatternRecognition for TruthSeededEngine {
    fn name(&self) -> &str {
        "truth-seeded"
    }

    fn reset(&mut self) {
        self.prepared.clear();
    }

    fn build_inputs(&mut self, cache: &CollectionCache<'_>) -> Result<()> {
        let calo_index = RelationIndex::calorimeter(cache, self.calo_weight);
        let track_index = RelationIndex::tracker(cache);

        let mut seeds: Vec<Seed> = Vec::new();
        let mut by_sim: HashMap<Option<ObjectId>, usize> = HashMap::new();
        let mut seed_for = |sim: Option<ObjectId>, seeds: &mut Vec<Seed>| -> usize {
            *by_sim.entry(sim).or_insert_with(|| {
                seeds.push(Seed::new(sim));
                seeds.len() - 1
            })
        };

        for hit in cache.calo_hits.elements() {
            let sim = dominant(calo_index.lookup(&hit.id));
            if sim.is_none() && !self.keep_unmatched {
                continue;
            }
            let i = seed_for(sim, &mut seeds);
            seeds[i].constituents.push(Constituent::CaloHit(hit.id));
            seeds[i].calo += FourMomentum::massless_towards(hit.energy as f64, &hit.position);
        }

        for track in cache.tracks.elements() {
            let sim = dominant(track_index.lookup(&track.id));
            if sim.is_none() && !self.keep_unmatched {
                continue;
            }
            let i = seed_for(sim, &mut seeds);
            let energy = (PION_MASS * PION_MASS + track.p() * track.p()).sqrt();
            seeds[i].constituents.push(Constituent::Track(track.id));
            seeds[i].track += FourMomentum::from_parts(energy, &track.momentum);
            seeds[i].charge += track.charge;
            seeds[i].n_tracks += 1;
        }

        self.prepared = seeds.into_iter().map(|seed| {
            let (p4, pdg) = if seed.n_tracks > 0 {
                let sign = if seed.charge < 0.0 { -1 } else { 1 };
                (seed.track, sign * PDG_PION)
            } else {
                (seed.calo, PDG_PHOTON)
            };
            let pdg = match seed.sim {
                None => 0,
                Some(sim) => cache.resolve_mc_particle(&sim).map(|mc| mc.pdg).unwrap_or(pdg),
            };
            ReconstructedParticle {
                pdg,
                kinematics: Some(Kinematics::from_four_momentum(&p4, seed.charge)),
                constituents: seed.constituents,
            }
        }).collect();

        Ok(())
    }

    fn extract_particles(&mut self) -> Result<Vec<ReconstructedParticle>> {
        Ok(std::mem::take(&mut self.prepared))
    }
}
