use std::f64::consts::PI;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use edmcore::data::event::{Collection, EventHeader, EventStore};
use edmcore::data::hits::{CalorimeterHit, Track, Vertex};
use edmcore::data::ids::ObjectId;
use edmcore::data::mc_particle::{McParticle, PDG_ELECTRON, PDG_PHOTON};
use edmcore::data::relation::{CaloRelationWeight, CaloTruthRelation, TrackerTruthRelation};
use crate::engine::{PDG_PION, PION_MASS};

pub const PDG_NEUTRON: i32 = 2112;
const NEUTRON_MASS: f64 = 0.93957;
const ELECTRON_MASS: f64 = 0.000511;

const ECAL_RADIUS: f64 = 1800.0;
const HCAL_RADIUS: f64 = 2100.0;

#[derive(Clone, Copy, Debug, PartialEq)]
enum Species {
    Photon,
    ChargedPion,
    Neutron,
}

struct Sink<'a> {
    ecal_id: u32,
    hcal_id: u32,
    ecal: &'a mut Vec<CalorimeterHit>,
    hcal: &'a mut Vec<CalorimeterHit>,
    relations: &'a mut Vec<CaloTruthRelation>,
    next_cell: u64,
}

/// Seeded generator of small, fully consistent events using the default collection names.
///
/// Each primary is a photon, a charged pion or a neutron. Photons shower in the ECal
/// barrel, hadrons in the HCal barrel; charged pions also leave a track. A fraction of
/// hits carry a second truth contribution from the previous primary and some photons
/// convert into an electron pair with a V0 vertex.
pub struct SyntheticEventBuilder {
    rng: StdRng,
    pub run: u32,
    pub n_particles: usize,
    pub hits_per_particle: usize,
    pub noise_hits: usize,
    pub overlap_probability: f64,
    pub conversion_probability: f64,
    next_event: u32,
}

impl SyntheticEventBuilder {
    pub fn new(seed: u64) -> Self {
        SyntheticEventBuilder {
            rng: StdRng::seed_from_u64(seed),
            run: 0,
            n_particles: 4,
            hits_per_particle: 5,
            noise_hits: 2,
            overlap_probability: 0.2,
            conversion_probability: 0.3,
            next_event: 0,
        }
    }

    pub fn with_particles(mut self, n_particles: usize) -> Self {
        self.n_particles = n_particles;
        self
    }

    pub fn with_run(mut self, run: u32) -> Self {
        self.run = run;
        self
    }

    pub fn generate(&mut self, n_events: usize) -> Vec<EventStore> {
        (0..n_events).map(|_| self.next_event()).collect()
    }

    pub fn next_event(&mut self) -> EventStore {
        let mut event = EventStore::new(EventHeader { run: self.run, event: self.next_event });
        self.next_event += 1;

        let mc_id = event.id_for("MCParticle");
        let ecal_id = event.id_for("ECALBarrel");
        let hcal_id = event.id_for("HCALBarrel");
        let track_id = event.id_for("MarlinTrkTracks");
        let vertex_id = event.id_for("V0Vertices");

        let mut mc_particles: Vec<McParticle> = Vec::new();
        let mut tracks: Vec<Track> = Vec::new();
        let mut vertices: Vec<Vertex> = Vec::new();
        let mut track_relations: Vec<TrackerTruthRelation> = Vec::new();
        let mut ecal: Vec<CalorimeterHit> = Vec::new();
        let mut hcal: Vec<CalorimeterHit> = Vec::new();
        let mut relations: Vec<CaloTruthRelation> = Vec::new();

        let mut sink = Sink {
            ecal_id, hcal_id,
            ecal: &mut ecal, hcal: &mut hcal, relations: &mut relations,
            next_cell: 0,
        };

        let p_dist = Uniform::new(1.0f64, 20.0);
        let cos_dist = Uniform::new(-0.9f64, 0.9);
        let phi_dist = Uniform::new(0.0f64, 2.0 * PI);

        let mut previous: Option<ObjectId> = None;
        for _ in 0..self.n_particles {
            let species = match self.rng.gen_range(0..3) {
                0 => Species::Photon,
                1 => Species::ChargedPion,
                _ => Species::Neutron,
            };
            let p = p_dist.sample(&mut self.rng);
            let direction = unit_vector(cos_dist.sample(&mut self.rng), phi_dist.sample(&mut self.rng));
            let momentum = [(p * direction[0]) as f32, (p * direction[1]) as f32, (p * direction[2]) as f32];

            let id = ObjectId::new(mc_id, mc_particles.len() as u32);
            let (pdg, charge, mass) = match species {
                Species::Photon => (PDG_PHOTON, 0.0, 0.0),
                Species::ChargedPion => {
                    let charge: f32 = if self.rng.gen_bool(0.5) { 1.0 } else { -1.0 };
                    (charge as i32 * PDG_PION, charge, PION_MASS)
                }
                Species::Neutron => (PDG_NEUTRON, 0.0, NEUTRON_MASS),
            };
            let mut primary = McParticle::new(id, pdg, charge, mass, momentum);
            primary.generator_status = 1;
            let energy = primary.energy();

            let overlap = previous.filter(|_| self.rng.gen_bool(self.overlap_probability));
            match species {
                Species::Photon => self.shower(&mut sink, id, overlap, energy, &direction, true),
                Species::ChargedPion => {
                    let track = ObjectId::new(track_id, tracks.len() as u32);
                    let mut t = Track::new(track, momentum, charge);
                    t.n_hits = 200;
                    t.ndf = 2 * t.n_hits as i32 - 5;
                    t.chi2 = t.ndf as f32;
                    tracks.push(t);
                    track_relations.push(TrackerTruthRelation::new(track, id, 1.0));
                    self.shower(&mut sink, id, overlap, 0.7 * energy, &direction, false);
                }
                Species::Neutron => self.shower(&mut sink, id, overlap, 0.8 * (energy - mass), &direction, false),
            }

            let converts = species == Species::Photon && self.rng.gen_bool(self.conversion_probability);
            mc_particles.push(primary);

            if converts {
                let radius = self.rng.gen_range(300.0..1500.0);
                let position = [
                    (radius * direction[0]) as f32,
                    (radius * direction[1]) as f32,
                    (radius * direction[2]) as f32,
                ];
                let share = self.rng.gen_range(0.2f32..0.8);
                for (sign, fraction) in [(1, share), (-1, 1.0 - share)] {
                    let daughter_id = ObjectId::new(mc_id, mc_particles.len() as u32);
                    let daughter_momentum = [momentum[0] * fraction, momentum[1] * fraction, momentum[2] * fraction];
                    let mut daughter = McParticle::new(
                        daughter_id, sign * PDG_ELECTRON, -(sign as f32), ELECTRON_MASS, daughter_momentum,
                    );
                    daughter.vertex = [position[0] as f64, position[1] as f64, position[2] as f64];
                    daughter.parents.push(id);
                    mc_particles[id.index_usize()].daughters.push(daughter_id);
                    mc_particles.push(daughter);
                }
                vertices.push(Vertex::new(ObjectId::new(vertex_id, vertices.len() as u32), position));
            }

            previous = Some(id);
        }

        for _ in 0..self.noise_hits {
            let direction = unit_vector(cos_dist.sample(&mut self.rng), phi_dist.sample(&mut self.rng));
            let energy = self.rng.gen_range(0.01f32..0.1);
            let id = ObjectId::new(sink.ecal_id, sink.ecal.len() as u32);
            let position = scale(&direction, ECAL_RADIUS);
            sink.ecal.push(CalorimeterHit::new(id, sink.next_cell, energy, position));
            sink.next_cell += 1;
        }

        event.insert("MCParticle", Collection::McParticles(mc_particles));
        event.insert("ECALBarrel", Collection::CaloHits(ecal));
        event.insert("HCALBarrel", Collection::CaloHits(hcal));
        event.insert("MarlinTrkTracks", Collection::Tracks(tracks));
        event.insert("V0Vertices", Collection::Vertices(vertices));
        event.insert("RelationCaloHit", Collection::CaloRelations(relations));
        event.insert("MarlinTrkTracksMCTruthLink", Collection::TrackerRelations(track_relations));
        event
    }

    /// Deposits `energy` in `hits_per_particle` hits along `direction`.
    fn shower(
        &mut self,
        sink: &mut Sink<'_>,
        sim: ObjectId,
        overlap: Option<ObjectId>,
        energy: f64,
        direction: &[f64; 3],
        electromagnetic: bool,
    ) {
        let n = self.hits_per_particle.max(1);
        let shares: Vec<f64> = (0..n).map(|_| self.rng.gen_range(0.5..1.5)).collect();
        let total: f64 = shares.iter().sum();
        let em_fraction = if electromagnetic { 1.0 } else { 0.0 };
        let (radius, step) = if electromagnetic { (ECAL_RADIUS, 5.0) } else { (HCAL_RADIUS, 25.0) };

        for (layer, share) in shares.iter().enumerate() {
            let deposit = (energy * share / total) as f32;
            let hits = if electromagnetic { &mut *sink.ecal } else { &mut *sink.hcal };
            let collection_id = if electromagnetic { sink.ecal_id } else { sink.hcal_id };
            let id = ObjectId::new(collection_id, hits.len() as u32);
            let position = scale(direction, radius + step * layer as f64);

            let (own, shared) = match overlap {
                Some(other) if layer == 0 => {
                    let shared = 0.1 * deposit;
                    sink.relations.push(CaloTruthRelation::new(id, other, CaloRelationWeight::new(em_fraction, shared)));
                    (deposit - shared, shared)
                }
                _ => (deposit, 0.0),
            };
            sink.relations.push(CaloTruthRelation::new(id, sim, CaloRelationWeight::new(em_fraction, own)));

            hits.push(CalorimeterHit::new(id, sink.next_cell, own + shared, position));
            sink.next_cell += 1;
        }
    }
}

fn unit_vector(cos_theta: f64, phi: f64) -> [f64; 3] {
    let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();
    [sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta]
}

fn scale(direction: &[f64; 3], radius: f64) -> [f32; 3] {
    [
        (radius * direction[0]) as f32,
        (radius * direction[1]) as f32,
        (radius * direction[2]) as f32,
    ]
}
