use std::cmp::Ordering;
use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use edmcore::data::ids::ObjectId;
use edmcore::data::reco::{Constituent, ReconstructedParticle};
use crate::cache::CollectionCache;
use crate::error::{PfaError, Result};
use crate::truth::relation::{sanitize_weight, CaloWeight, RelationIndex, TruthLink, TruthRelationSource};

/// Ranked truth content of one reconstructed particle.
///
/// `links` holds unique simulated particles with positive weight, best first.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParticleTruthAssociation {
    pub particle: usize,
    pub links: Vec<TruthLink>,
}

impl ParticleTruthAssociation {
    pub fn best(&self) -> Option<&TruthLink> {
        self.links.first()
    }

    pub fn total_weight(&self) -> f64 {
        self.links.iter().map(|l| l.weight as f64).sum()
    }

    /// Share of the total weight carried by link `i`, 0 if out of range or empty.
    pub fn fraction(&self, i: usize) -> f32 {
        let total = self.total_weight();
        match self.links.get(i) {
            Some(link) if total > 0.0 => (link.weight as f64 / total) as f32,
            _ => 0.0,
        }
    }

    pub fn weight_of(&self, sim: &ObjectId) -> Option<f32> {
        self.links.iter().find(|l| l.sim == *sim).map(|l| l.weight)
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

/// Flat reco ↔ truth record as written to the association output collection.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecoMcLink {
    pub rec: usize,
    pub sim: ObjectId,
    pub weight: f32,
}

pub fn flatten(associations: &[ParticleTruthAssociation]) -> Vec<RecoMcLink> {
    associations.iter()
        .flat_map(|a| a.links.iter().map(move |l| RecoMcLink { rec: a.particle, sim: l.sim, weight: l.weight }))
        .collect()
}

/// Per-particle weight sums keyed by simulated particle, in discovery order.
#[derive(Default)]
struct WeightAccumulator {
    sims: Vec<ObjectId>,
    weights: Vec<f64>,
    position: HashMap<ObjectId, usize>,
}

impl WeightAccumulator {
    fn add(&mut self, sim: ObjectId, weight: f32) {
        let weight = sanitize_weight(weight);
        if weight == 0.0 {
            return;
        }
        match self.position.get(&sim) {
            Some(&i) => self.weights[i] += weight as f64,
            None => {
                self.position.insert(sim, self.sims.len());
                self.sims.push(sim);
                self.weights.push(weight as f64);
            }
        }
    }

    fn into_links(self) -> Vec<TruthLink> {
        let mut links: Vec<(ObjectId, f64)> = self.sims.into_iter().zip(self.weights).collect();
        // stable: equal weights keep discovery order
        links.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        // sums past the f32 range saturate instead of becoming inf
        links.into_iter().map(|(sim, w)| TruthLink::new(sim, w.min(f32::MAX as f64) as f32)).collect()
    }
}

/// Aggregates hit-level truth links into particle-level associations.
///
/// # Description
///
/// Calorimeter-hit constituents are looked up in the calorimeter source, track
/// constituents in the tracker source. Contributions to the same simulated particle
/// are summed across constituents and subsystems, so the sum does not depend on
/// constituent order.
///
pub struct TruthAssociationBuilder<C = RelationIndex, T = RelationIndex> {
    calo: C,
    tracker: T,
}

impl TruthAssociationBuilder<RelationIndex, RelationIndex> {
    /// Indexes both relation categories of the cache, one scan each.
    pub fn from_cache(cache: &CollectionCache<'_>, calo_weight: CaloWeight) -> Self {
        TruthAssociationBuilder {
            calo: RelationIndex::calorimeter(cache, calo_weight),
            tracker: RelationIndex::tracker(cache),
        }
    }
}

impl<C: TruthRelationSource, T: TruthRelationSource> TruthAssociationBuilder<C, T> {
    pub fn with_sources(calo: C, tracker: T) -> Self {
        TruthAssociationBuilder { calo, tracker }
    }

    pub fn calo_source(&self) -> &C {
        &self.calo
    }

    pub fn tracker_source(&self) -> &T {
        &self.tracker
    }

    /// Builds the association of a single particle with index `particle`.
    pub fn associate_one(
        &self,
        particle: usize,
        reco: &ReconstructedParticle,
        cache: &CollectionCache<'_>,
    ) -> Result<ParticleTruthAssociation> {
        let mut acc = WeightAccumulator::default();

        for constituent in &reco.constituents {
            let (resolved, links) = match constituent {
                Constituent::CaloHit(id) => (cache.resolve_calo_hit(id).is_some(), self.calo.lookup(id)),
                Constituent::Track(id) => (cache.resolve_track(id).is_some(), self.tracker.lookup(id)),
            };
            if !resolved {
                return Err(PfaError::UnresolvedConstituent { particle, constituent: *constituent });
            }
            for link in links {
                acc.add(link.sim, link.weight);
            }
        }

        Ok(ParticleTruthAssociation { particle, links: acc.into_links() })
    }

    /// One association per particle, in engine order. Particles without truth get an
    /// empty association; the first unresolvable constituent fails the whole event.
    pub fn associate(
        &self,
        particles: &[ReconstructedParticle],
        cache: &CollectionCache<'_>,
    ) -> Result<Vec<ParticleTruthAssociation>> {
        particles.iter()
            .enumerate()
            .map(|(i, p)| self.associate_one(i, p, cache))
            .collect()
    }
}
