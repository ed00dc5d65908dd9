use serde::{Deserialize, Serialize};
use edmcore::data::event::EventHeader;
use edmcore::data::reco::ReconstructedParticle;
use crate::cache::CollectionCache;
use crate::truth::association::ParticleTruthAssociation;

/// Flat view of one reconstructed particle and its ranked truth content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecoParticleRow {
    pub run: u32,
    pub event: u32,
    pub particle: usize,
    pub pdg: i32,
    pub mass: f32,
    pub energy: f32,
    pub px: f32,
    pub py: f32,
    pub pz: f32,
    pub charge: f32,

    // ranked, parallel vectors
    pub mc_collection: Vec<u32>,
    pub mc_index: Vec<u32>,
    pub mc_weight: Vec<f32>,

    // both -1 without truth
    pub top_mc_collection: i64,
    pub top_mc_index: i64,
    pub top_weight: f32,
    pub top_fraction: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct McParticleRow {
    pub collection: u32,
    pub index: u32,
    pub n_parents: usize,
    pub pdg: i32,
    pub mass: f32,
    pub px: f32,
    pub py: f32,
    pub pz: f32,
    pub charge: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HitRow {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub energy: f32,
}

/// One row group per event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    pub run: u32,
    pub event: u32,
    pub has_conversion: bool,
    pub particles: Vec<RecoParticleRow>,
    pub mc_particles: Vec<McParticleRow>,
    pub hits: Vec<HitRow>,
}

impl EventSummary {
    pub fn matched_particles(&self) -> usize {
        self.particles.iter().filter(|r| r.top_mc_index >= 0).count()
    }
}

impl From<(&EventHeader, &ReconstructedParticle, &ParticleTruthAssociation)> for RecoParticleRow {
    fn from((header, particle, association): (&EventHeader, &ReconstructedParticle, &ParticleTruthAssociation)) -> Self {
        let k = particle.kinematics.unwrap_or_default();

        let (top_mc_collection, top_mc_index, top_weight) = match association.best() {
            Some(link) => (link.sim.collection_id as i64, link.sim.index as i64, link.weight),
            None => (-1, -1, 0.0),
        };

        RecoParticleRow {
            run: header.run,
            event: header.event,
            particle: association.particle,
            pdg: particle.pdg,
            mass: k.mass,
            energy: k.energy,
            px: k.momentum[0],
            py: k.momentum[1],
            pz: k.momentum[2],
            charge: k.charge,
            mc_collection: association.links.iter().map(|l| l.sim.collection_id).collect(),
            mc_index: association.links.iter().map(|l| l.sim.index).collect(),
            mc_weight: association.links.iter().map(|l| l.weight).collect(),
            top_mc_collection,
            top_mc_index,
            top_weight,
            top_fraction: association.fraction(0),
        }
    }
}

/// A photon among the truth particles with an electron or positron daughter.
pub fn has_conversion(cache: &CollectionCache<'_>) -> bool {
    cache.mc_particles.elements()
        .filter(|mc| mc.is_photon())
        .any(|photon| photon.daughters.iter()
            .filter_map(|d| cache.resolve_mc_particle(d))
            .any(|d| d.is_electron()))
}

/// Projects one event into summary rows. Read-only on every input.
///
/// Rows are produced for every particle; a particle without kinematics gives zeros,
/// a particle without an association at its position gets an empty truth part.
pub fn extract_summary(
    cache: &CollectionCache<'_>,
    particles: &[ReconstructedParticle],
    associations: &[ParticleTruthAssociation],
) -> EventSummary {
    let header = cache.header().unwrap_or_default();

    let rows = particles.iter().enumerate().map(|(i, p)| {
        let fallback;
        let association = match associations.get(i) {
            Some(a) if a.particle == i => a,
            _ => {
                fallback = ParticleTruthAssociation { particle: i, links: Vec::new() };
                &fallback
            }
        };
        RecoParticleRow::from((&header, p, association))
    }).collect();

    let mc_particles = cache.mc_particles.elements().map(|mc| McParticleRow {
        collection: mc.id.collection_id,
        index: mc.id.index,
        n_parents: mc.parents.len(),
        pdg: mc.pdg,
        mass: mc.mass as f32,
        px: mc.momentum[0],
        py: mc.momentum[1],
        pz: mc.momentum[2],
        charge: mc.charge,
    }).collect();

    let hits = cache.calo_hits.elements().map(|h| HitRow {
        x: h.position[0],
        y: h.position[1],
        z: h.position[2],
        energy: h.energy,
    }).collect();

    EventSummary {
        run: header.run,
        event: header.event,
        has_conversion: has_conversion(cache),
        particles: rows,
        mc_particles,
        hits,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edmcore::data::event::{Collection, EventStore};
    use edmcore::data::hits::{CalorimeterHit, Track};
    use edmcore::data::ids::ObjectId;
    use edmcore::data::mc_particle::McParticle;
    use edmcore::data::reco::Kinematics;
    use crate::config::PfaConfig;
    use crate::truth::relation::TruthLink;

    fn event(with_conversion: bool) -> EventStore {
        let mut event = EventStore::new(EventHeader { run: 3, event: 17 });
        let mc = event.id_for("MCParticle");
        let mut photon = McParticle::new(ObjectId::new(mc, 0), 22, 0.0, 0.0, [0.0, 0.0, 4.0]);
        let mut electron = McParticle::new(ObjectId::new(mc, 1), if with_conversion { 11 } else { 22 }, -1.0, 0.000511, [0.0, 0.0, 2.0]);
        photon.daughters.push(electron.id);
        electron.parents.push(photon.id);
        event.insert("MCParticle", Collection::McParticles(vec![photon, electron]));

        let ecal = event.id_for("ECALBarrel");
        event.insert("ECALBarrel", Collection::CaloHits(vec![
            CalorimeterHit::new(ObjectId::new(ecal, 0), 0, 1.5, [1.0, 2.0, 3.0]),
        ]));
        let trk = event.id_for("MarlinTrkTracks");
        event.insert("MarlinTrkTracks", Collection::Tracks(vec![Track::new(ObjectId::new(trk, 0), [0.0, 0.0, 2.0], -1.0)]));
        event
    }

    #[test]
    fn test_row_count_equals_particle_count() {
        let event = event(true);
        let mut cache = CollectionCache::from_config(&PfaConfig::default());
        cache.update(&event).unwrap();

        let mc = event.get("MCParticle").unwrap().collection_id;
        let particles = vec![
            ReconstructedParticle::new(22).with_kinematics(Kinematics { energy: 4.0, momentum: [0.0, 0.0, 4.0], charge: 0.0, mass: 0.0 }),
            ReconstructedParticle::new(0),
        ];
        let associations = vec![
            ParticleTruthAssociation { particle: 0, links: vec![TruthLink::new(ObjectId::new(mc, 0), 3.0), TruthLink::new(ObjectId::new(mc, 1), 1.0)] },
            ParticleTruthAssociation { particle: 1, links: Vec::new() },
        ];

        let summary = extract_summary(&cache, &particles, &associations);
        assert_eq!(summary.run, 3);
        assert_eq!(summary.event, 17);
        assert_eq!(summary.particles.len(), 2);
        assert_eq!(summary.matched_particles(), 1);

        let first = &summary.particles[0];
        assert_eq!(first.top_mc_collection, mc as i64);
        assert_eq!(first.top_mc_index, 0);
        assert_eq!(first.mc_index, vec![0, 1]);
        assert_eq!(first.mc_weight, vec![3.0, 1.0]);
        assert!((first.top_fraction - 0.75).abs() < 1e-6);
        assert_eq!(first.energy, 4.0);

        let second = &summary.particles[1];
        assert_eq!(second.top_mc_collection, -1);
        assert_eq!(second.top_mc_index, -1);
        assert_eq!(second.energy, 0.0);
        assert_eq!(second.mass, 0.0);
        assert!(second.mc_weight.is_empty());

        assert_eq!(summary.mc_particles.len(), 2);
        assert_eq!(summary.mc_particles[1].n_parents, 1);
        assert_eq!(summary.hits, vec![HitRow { x: 1.0, y: 2.0, z: 3.0, energy: 1.5 }]);
    }

    #[test]
    fn test_missing_association_still_yields_row() {
        let event = event(false);
        let mut cache = CollectionCache::from_config(&PfaConfig::default());
        cache.update(&event).unwrap();

        let particles = vec![ReconstructedParticle::new(22), ReconstructedParticle::new(22)];
        let summary = extract_summary(&cache, &particles, &[]);
        assert_eq!(summary.particles.len(), 2);
        assert!(summary.particles.iter().all(|r| r.top_mc_index == -1));
        assert_eq!(summary.particles[1].particle, 1);
    }

    #[test]
    fn test_conversion_flag() {
        for (with, expected) in [(true, true), (false, false)] {
            let event = event(with);
            let mut cache = CollectionCache::from_config(&PfaConfig::default());
            cache.update(&event).unwrap();
            assert_eq!(has_conversion(&cache), expected);
        }
    }

    #[test]
    fn test_top_match_keeps_collection() {
        let event = event(false);
        let mut cache = CollectionCache::from_config(&PfaConfig::default());
        cache.update(&event).unwrap();

        let particles = vec![ReconstructedParticle::new(22), ReconstructedParticle::new(22)];
        let associations = vec![
            ParticleTruthAssociation { particle: 0, links: vec![TruthLink::new(ObjectId::new(7, 0), 2.0)] },
            ParticleTruthAssociation { particle: 1, links: vec![TruthLink::new(ObjectId::new(9, 0), 2.0)] },
        ];
        let summary = extract_summary(&cache, &particles, &associations);

        assert_eq!(summary.particles[0].top_mc_index, summary.particles[1].top_mc_index);
        assert_eq!(summary.particles[0].top_mc_collection, 7);
        assert_eq!(summary.particles[1].top_mc_collection, 9);
    }
}
