use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use edmcore::data::hits::VertexKind;
use crate::error::{PfaError, Result};
use crate::truth::relation::CaloWeight;

pub use edmcore::data::event::CollectionKind as Category;

pub const ALL_CATEGORIES: [Category; 6] = [
    Category::McParticles,
    Category::CaloHits,
    Category::Vertices,
    Category::Tracks,
    Category::CaloRelations,
    Category::TrackerRelations,
];

fn names(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

/// Input collection names, grouped the way the detector description groups them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    pub mc_particles: Vec<String>,

    pub ecal_hits: Vec<String>,
    pub hcal_hits: Vec<String>,
    pub lcal_hits: Vec<String>,
    pub lhcal_hits: Vec<String>,
    pub muon_hits: Vec<String>,

    pub tracks: Vec<String>,

    pub kink_vertices: Vec<String>,
    pub prong_vertices: Vec<String>,
    pub split_vertices: Vec<String>,
    pub v0_vertices: Vec<String>,

    pub calo_relations: Vec<String>,
    pub track_relations: Vec<String>,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        CollectionConfig {
            mc_particles: names(&["MCParticle"]),
            ecal_hits: names(&["ECALBarrel", "ECALEndcap", "ECALOther"]),
            hcal_hits: names(&["HCALBarrel", "HCALEndcap", "HCALOther"]),
            lcal_hits: names(&["LCAL"]),
            lhcal_hits: names(&["LHCAL"]),
            muon_hits: names(&["MUON"]),
            tracks: names(&["MarlinTrkTracks"]),
            kink_vertices: names(&["KinkVertices"]),
            prong_vertices: names(&["ProngVertices"]),
            split_vertices: names(&["SplitVertices"]),
            v0_vertices: names(&["V0Vertices"]),
            calo_relations: names(&["RelationCaloHit", "RelationMuonHit"]),
            track_relations: names(&["MarlinTrkTracksMCTruthLink"]),
        }
    }
}

impl CollectionConfig {
    /// Names configured for `category`, in configuration order, first occurrence wins.
    pub fn names_for(&self, category: Category) -> Vec<String> {
        let groups: Vec<&Vec<String>> = match category {
            Category::McParticles => vec![&self.mc_particles],
            Category::CaloHits => vec![
                &self.ecal_hits,
                &self.hcal_hits,
                &self.lcal_hits,
                &self.lhcal_hits,
                &self.muon_hits,
            ],
            Category::Vertices => vec![
                &self.kink_vertices,
                &self.prong_vertices,
                &self.split_vertices,
                &self.v0_vertices,
            ],
            Category::Tracks => vec![&self.tracks],
            Category::CaloRelations => vec![&self.calo_relations],
            Category::TrackerRelations => vec![&self.track_relations],
        };
        groups.into_iter().flatten().unique().cloned().collect()
    }

    /// Kind of the vertex finder group `name` is configured under; the first group wins.
    pub fn vertex_kind(&self, name: &str) -> Option<VertexKind> {
        [
            (VertexKind::Kink, &self.kink_vertices),
            (VertexKind::Prong, &self.prong_vertices),
            (VertexKind::Split, &self.split_vertices),
            (VertexKind::V0, &self.v0_vertices),
        ]
        .into_iter()
        .find(|(_, names)| names.iter().any(|n| n == name))
        .map(|(kind, _)| kind)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub pfo_collection: String,
    pub cluster_collection: String,
    pub start_vertex_collection: String,
    pub association_collection: String,
    /// Destination of the event summary flush; no summary is kept when unset.
    pub summary_path: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            pfo_collection: "PandoraPFOs".to_string(),
            cluster_collection: "PandoraClusters".to_string(),
            start_vertex_collection: "PandoraPFANewStartVertices".to_string(),
            association_collection: "pfoMCRecoParticleAssociation".to_string(),
            summary_path: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PfaConfig {
    pub collections: CollectionConfig,
    pub mandatory: Vec<Category>,
    pub calo_weight: CaloWeight,
    pub output: OutputConfig,
    pub n_events_to_skip: usize,
    pub skip_incomplete_events: bool,
}

impl Default for PfaConfig {
    fn default() -> Self {
        PfaConfig {
            collections: CollectionConfig::default(),
            mandatory: vec![Category::McParticles, Category::CaloHits, Category::Tracks],
            calo_weight: CaloWeight::default(),
            output: OutputConfig::default(),
            n_events_to_skip: 0,
            skip_incomplete_events: true,
        }
    }
}

impl PfaConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: PfaConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn is_mandatory(&self, category: Category) -> bool {
        self.mandatory.contains(&category)
    }

    pub fn validate(&self) -> Result<()> {
        for category in &self.mandatory {
            if self.collections.names_for(*category).is_empty() {
                return Err(PfaError::Config(format!(
                    "category {} is mandatory but has no configured collection", category
                )));
            }
        }

        let outputs = [
            ("pfo_collection", &self.output.pfo_collection),
            ("cluster_collection", &self.output.cluster_collection),
            ("start_vertex_collection", &self.output.start_vertex_collection),
            ("association_collection", &self.output.association_collection),
        ];
        for (key, value) in outputs {
            if value.trim().is_empty() {
                return Err(PfaError::Config(format!("output.{} must not be empty", key)));
            }
        }

        if let Some(path) = &self.output.summary_path {
            if path.trim().is_empty() {
                return Err(PfaError::Config("output.summary_path must not be empty".to_string()));
            }
        }
        Ok(())
    }
}
