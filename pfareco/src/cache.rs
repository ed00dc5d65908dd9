use std::collections::{BTreeMap, HashMap};
use edmcore::data::event::{EventHeader, EventStore};
use edmcore::data::hits::{CalorimeterHit, Track, Vertex, VertexKind};
use edmcore::data::ids::ObjectId;
use edmcore::data::mc_particle::McParticle;
use edmcore::data::relation::{CaloTruthRelation, TrackerTruthRelation};
use crate::config::{Category, PfaConfig, ALL_CATEGORIES};
use crate::error::{PfaError, Result};

/// Which names to pick up per category and which categories must not come up empty.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheLayout {
    pub names: BTreeMap<Category, Vec<String>>,
    pub mandatory: Vec<Category>,
    pub vertex_kinds: BTreeMap<String, VertexKind>,
}

impl CacheLayout {
    pub fn from_config(config: &PfaConfig) -> Self {
        let names = ALL_CATEGORIES.iter()
            .map(|&c| (c, config.collections.names_for(c)))
            .collect();
        let vertex_kinds = config.collections.names_for(Category::Vertices)
            .into_iter()
            .filter_map(|name| config.collections.vertex_kind(&name).map(|kind| (name, kind)))
            .collect();
        CacheLayout { names, mandatory: config.mandatory.clone(), vertex_kinds }
    }

    pub fn names_for(&self, category: Category) -> &[String] {
        self.names.get(&category).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

#[derive(Clone, Debug)]
pub struct CachedCollection<'ev, T> {
    pub name: String,
    pub collection_id: u32,
    pub elements: &'ev [T],
}

/// Name → borrowed collection view for one category, kept in configuration order.
#[derive(Clone, Debug)]
pub struct CategoryMap<'ev, T> {
    entries: Vec<CachedCollection<'ev, T>>,
    by_name: HashMap<String, usize>,
}

impl<'ev, T> Default for CategoryMap<'ev, T> {
    fn default() -> Self {
        CategoryMap { entries: Vec::new(), by_name: HashMap::new() }
    }
}

impl<'ev, T> CategoryMap<'ev, T> {
    fn clear(&mut self) {
        self.entries.clear();
        self.by_name.clear();
    }

    /// Returns the entry position; a name already present is not inserted twice.
    fn insert(&mut self, name: &str, collection_id: u32, elements: &'ev [T]) -> usize {
        if let Some(&pos) = self.by_name.get(name) {
            return pos;
        }
        let pos = self.entries.len();
        self.entries.push(CachedCollection { name: name.to_string(), collection_id, elements });
        self.by_name.insert(name.to_string(), pos);
        pos
    }

    pub fn get(&self, name: &str) -> Option<&'ev [T]> {
        self.by_name.get(name).map(|&pos| self.entries[pos].elements)
    }

    /// Missing names read as empty collections.
    pub fn get_or_empty(&self, name: &str) -> &'ev [T] {
        self.get(name).unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn entries(&self) -> &[CachedCollection<'ev, T>] {
        &self.entries
    }

    /// Number of collections held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn element_count(&self) -> usize {
        self.entries.iter().map(|e| e.elements.len()).sum()
    }

    /// All elements across collections, in configuration order.
    pub fn elements(&self) -> impl Iterator<Item = &'ev T> + '_ {
        self.entries.iter().flat_map(|e| {
            let elements: &'ev [T] = e.elements;
            elements.iter()
        })
    }

    fn element_at(&self, pos: usize, index: usize) -> Option<&'ev T> {
        let elements: &'ev [T] = self.entries.get(pos)?.elements;
        elements.get(index)
    }
}

/// Per-category collection counts after an update.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CacheStatus {
    pub collections: BTreeMap<Category, usize>,
}

impl CacheStatus {
    pub fn count(&self, category: Category) -> usize {
        self.collections.get(&category).copied().unwrap_or(0)
    }
}

/// Event-scoped, non-owning views of every input collection category.
///
/// # Description
///
/// The cache borrows from the `EventStore` it was updated with; the `'ev` lifetime
/// keeps any view from outliving that event. `update` always starts from an empty
/// state, so mappings are replaced, never merged.
///
pub struct CollectionCache<'ev> {
    layout: CacheLayout,
    header: Option<EventHeader>,
    pub mc_particles: CategoryMap<'ev, McParticle>,
    pub calo_hits: CategoryMap<'ev, CalorimeterHit>,
    pub vertices: CategoryMap<'ev, Vertex>,
    pub tracks: CategoryMap<'ev, Track>,
    pub calo_relations: CategoryMap<'ev, CaloTruthRelation>,
    pub tracker_relations: CategoryMap<'ev, TrackerTruthRelation>,
    // collection id -> (category, entry position)
    by_id: HashMap<u32, (Category, usize)>,
}

impl<'ev> CollectionCache<'ev> {
    pub fn new(layout: CacheLayout) -> Self {
        CollectionCache {
            layout,
            header: None,
            mc_particles: CategoryMap::default(),
            calo_hits: CategoryMap::default(),
            vertices: CategoryMap::default(),
            tracks: CategoryMap::default(),
            calo_relations: CategoryMap::default(),
            tracker_relations: CategoryMap::default(),
            by_id: HashMap::new(),
        }
    }

    pub fn from_config(config: &PfaConfig) -> Self {
        CollectionCache::new(CacheLayout::from_config(config))
    }

    pub fn layout(&self) -> &CacheLayout {
        &self.layout
    }

    pub fn header(&self) -> Option<EventHeader> {
        self.header
    }

    pub fn clear(&mut self) {
        self.header = None;
        self.mc_particles.clear();
        self.calo_hits.clear();
        self.vertices.clear();
        self.tracks.clear();
        self.calo_relations.clear();
        self.tracker_relations.clear();
        self.by_id.clear();
    }

    /// Rebuilds every mapping from `event`.
    ///
    /// Configured names that are absent, or present with a different element type,
    /// are skipped. If a mandatory category ends up without any collection the cache
    /// stays populated with what was found and `PfaError::NotFound` is returned.
    /// Two cached collections sharing one collection id give
    /// `PfaError::DuplicateCollectionId`; ids then resolve into the first one only.
    pub fn update(&mut self, event: &'ev EventStore) -> Result<CacheStatus> {
        self.clear();
        self.header = Some(event.header);

        let layout = self.layout.clone();
        let mut owners: HashMap<u32, &str> = HashMap::new();
        let mut duplicate: Option<PfaError> = None;
        for category in ALL_CATEGORIES {
            for name in layout.names_for(category) {
                let Some(stored) = event.get(name) else { continue };
                let cid = stored.collection_id;
                let c = &stored.collection;
                let pos = match category {
                    Category::McParticles => c.as_mc_particles().map(|e| self.mc_particles.insert(name, cid, e)),
                    Category::CaloHits => c.as_calo_hits().map(|e| self.calo_hits.insert(name, cid, e)),
                    Category::Vertices => c.as_vertices().map(|e| self.vertices.insert(name, cid, e)),
                    Category::Tracks => c.as_tracks().map(|e| self.tracks.insert(name, cid, e)),
                    Category::CaloRelations => c.as_calo_relations().map(|e| self.calo_relations.insert(name, cid, e)),
                    Category::TrackerRelations => c.as_tracker_relations().map(|e| self.tracker_relations.insert(name, cid, e)),
                };
                if let Some(pos) = pos {
                    match owners.get(&cid) {
                        Some(first) => {
                            if duplicate.is_none() {
                                duplicate = Some(PfaError::DuplicateCollectionId {
                                    collection_id: cid,
                                    first: first.to_string(),
                                    second: name.clone(),
                                });
                            }
                        }
                        None => {
                            owners.insert(cid, name);
                            self.by_id.insert(cid, (category, pos));
                        }
                    }
                }
            }
        }

        if let Some(e) = duplicate {
            return Err(e);
        }

        let status = CacheStatus {
            collections: ALL_CATEGORIES.iter().map(|&c| (c, self.collection_count(c))).collect(),
        };

        let missing: Vec<Category> = layout.mandatory.iter()
            .copied()
            .filter(|&c| status.count(c) == 0)
            .collect();

        if missing.is_empty() {
            Ok(status)
        } else {
            Err(PfaError::NotFound { categories: missing })
        }
    }

    pub fn collection_count(&self, category: Category) -> usize {
        match category {
            Category::McParticles => self.mc_particles.len(),
            Category::CaloHits => self.calo_hits.len(),
            Category::Vertices => self.vertices.len(),
            Category::Tracks => self.tracks.len(),
            Category::CaloRelations => self.calo_relations.len(),
            Category::TrackerRelations => self.tracker_relations.len(),
        }
    }

    pub fn collection_names(&self, category: Category) -> Vec<&str> {
        match category {
            Category::McParticles => self.mc_particles.names().collect(),
            Category::CaloHits => self.calo_hits.names().collect(),
            Category::Vertices => self.vertices.names().collect(),
            Category::Tracks => self.tracks.names().collect(),
            Category::CaloRelations => self.calo_relations.names().collect(),
            Category::TrackerRelations => self.tracker_relations.names().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        ALL_CATEGORIES.iter().all(|&c| self.collection_count(c) == 0)
    }

    fn locate(&self, id: &ObjectId, category: Category) -> Option<usize> {
        match self.by_id.get(&id.collection_id) {
            Some(&(c, pos)) if c == category => Some(pos),
            _ => None,
        }
    }

    pub fn resolve_calo_hit(&self, id: &ObjectId) -> Option<&'ev CalorimeterHit> {
        self.locate(id, Category::CaloHits)
            .and_then(|pos| self.calo_hits.element_at(pos, id.index_usize()))
    }

    pub fn resolve_track(&self, id: &ObjectId) -> Option<&'ev Track> {
        self.locate(id, Category::Tracks)
            .and_then(|pos| self.tracks.element_at(pos, id.index_usize()))
    }

    pub fn resolve_mc_particle(&self, id: &ObjectId) -> Option<&'ev McParticle> {
        self.locate(id, Category::McParticles)
            .and_then(|pos| self.mc_particles.element_at(pos, id.index_usize()))
    }

    pub fn resolve_vertex(&self, id: &ObjectId) -> Option<&'ev Vertex> {
        self.locate(id, Category::Vertices)
            .and_then(|pos| self.vertices.element_at(pos, id.index_usize()))
    }

    /// Kind of a cached vertex collection, from the group it is configured under.
    pub fn vertex_kind(&self, name: &str) -> Option<VertexKind> {
        if !self.vertices.contains(name) {
            return None;
        }
        self.layout.vertex_kinds.get(name).copied()
    }

    /// Kind of the collection a vertex id points into.
    pub fn vertex_kind_of(&self, id: &ObjectId) -> Option<VertexKind> {
        let pos = self.locate(id, Category::Vertices)?;
        let entry = self.vertices.entries().get(pos)?;
        self.layout.vertex_kinds.get(&entry.name).copied()
    }

    /// Every cached vertex of one kind, in configuration order.
    pub fn vertices_of_kind(&self, kind: VertexKind) -> impl Iterator<Item = &'ev Vertex> + '_ {
        self.vertices.entries().iter()
            .filter(move |e| self.layout.vertex_kinds.get(&e.name) == Some(&kind))
            .flat_map(|e| {
                let elements: &'ev [Vertex] = e.elements;
                elements.iter()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edmcore::data::event::{Collection, EventHeader};

    fn event_with(names: &[&str]) -> EventStore {
        let mut event = EventStore::new(EventHeader { run: 1, event: 5 });
        for name in names {
            let cid = event.id_for(name);
            let collection = match *name {
                "MCParticle" => Collection::McParticles(vec![
                    McParticle::new(ObjectId::new(cid, 0), 22, 0.0, 0.0, [0.0, 0.0, 10.0]),
                ]),
                "MarlinTrkTracks" => Collection::Tracks(vec![
                    Track::new(ObjectId::new(cid, 0), [1.0, 0.0, 0.0], 1.0),
                ]),
                "V0Vertices" => Collection::Vertices(Vec::new()),
                "KinkVertices" => Collection::Vertices(vec![
                    Vertex::new(ObjectId::new(cid, 0), [10.0, 0.0, 0.0]),
                    Vertex::new(ObjectId::new(cid, 1), [20.0, 0.0, 0.0]),
                ]),
                _ => Collection::CaloHits(vec![
                    CalorimeterHit::new(ObjectId::new(cid, 0), 1, 0.5, [1800.0, 0.0, 0.0]),
                    CalorimeterHit::new(ObjectId::new(cid, 1), 2, 0.3, [1810.0, 0.0, 0.0]),
                ]),
            };
            event.insert(name, collection);
        }
        event
    }

    #[test]
    fn test_clear_empties_every_category() {
        let event = event_with(&["MCParticle", "ECALBarrel", "MarlinTrkTracks"]);
        let mut cache = CollectionCache::from_config(&PfaConfig::default());
        cache.update(&event).unwrap();
        assert!(!cache.is_empty());

        cache.clear();
        assert!(cache.is_empty());
        for category in ALL_CATEGORIES {
            assert_eq!(cache.collection_count(category), 0);
        }
        assert!(cache.header().is_none());

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_update_picks_configured_present_names_once() {
        let event = event_with(&["MCParticle", "ECALBarrel", "HCALEndcap", "MarlinTrkTracks", "NotConfigured"]);
        let mut cache = CollectionCache::from_config(&PfaConfig::default());
        let status = cache.update(&event).unwrap();

        assert_eq!(cache.collection_names(Category::CaloHits), vec!["ECALBarrel", "HCALEndcap"]);
        assert!(!cache.calo_hits.contains("ECALEndcap"));
        assert!(!cache.calo_hits.contains("NotConfigured"));
        assert_eq!(status.count(Category::CaloHits), 2);
        assert_eq!(cache.calo_hits.element_count(), 4);
        assert_eq!(cache.calo_hits.get_or_empty("LCAL").len(), 0);
    }

    #[test]
    fn test_update_replaces_previous_event() {
        let first = event_with(&["MCParticle", "ECALBarrel", "HCALBarrel", "MarlinTrkTracks"]);
        let second = event_with(&["MCParticle", "MUON", "MarlinTrkTracks"]);

        let mut cache = CollectionCache::from_config(&PfaConfig::default());
        cache.update(&first).unwrap();
        cache.update(&second).unwrap();

        assert_eq!(cache.collection_names(Category::CaloHits), vec!["MUON"]);
    }

    #[test]
    fn test_update_is_idempotent() {
        let event = event_with(&["MCParticle", "ECALBarrel", "LCAL", "MarlinTrkTracks", "V0Vertices"]);
        let mut cache = CollectionCache::from_config(&PfaConfig::default());

        cache.update(&event).unwrap();
        let names_once: Vec<Vec<String>> = ALL_CATEGORIES.iter()
            .map(|&c| cache.collection_names(c).iter().map(|s| s.to_string()).collect())
            .collect();

        cache.update(&event).unwrap();
        let names_twice: Vec<Vec<String>> = ALL_CATEGORIES.iter()
            .map(|&c| cache.collection_names(c).iter().map(|s| s.to_string()).collect())
            .collect();

        assert_eq!(names_once, names_twice);
        assert_eq!(cache.calo_hits.element_count(), 4);
    }

    #[test]
    fn test_missing_mandatory_is_not_found_but_populated() {
        let event = event_with(&["MCParticle", "ECALBarrel"]);
        let mut cache = CollectionCache::from_config(&PfaConfig::default());

        match cache.update(&event) {
            Err(PfaError::NotFound { categories }) => assert_eq!(categories, vec![Category::Tracks]),
            other => panic!("expected NotFound, got {:?}", other.map(|_| ())),
        }
        assert_eq!(cache.calo_hits.len(), 1);
        assert_eq!(cache.mc_particles.len(), 1);
    }

    #[test]
    fn test_wrong_element_type_counts_as_absent() {
        let mut event = event_with(&["MCParticle", "ECALBarrel"]);
        // calorimeter hits stored under the track collection's name
        event.insert("MarlinTrkTracks", Collection::CaloHits(Vec::new()));

        let mut cache = CollectionCache::from_config(&PfaConfig::default());
        assert!(cache.update(&event).is_err());
        assert!(cache.tracks.is_empty());
    }

    #[test]
    fn test_resolution_checks_category_and_range() {
        let event = event_with(&["MCParticle", "ECALBarrel", "MarlinTrkTracks"]);
        let ecal = event.get("ECALBarrel").unwrap().collection_id;
        let trk = event.get("MarlinTrkTracks").unwrap().collection_id;

        let mut cache = CollectionCache::from_config(&PfaConfig::default());
        cache.update(&event).unwrap();

        assert_eq!(cache.resolve_calo_hit(&ObjectId::new(ecal, 1)).map(|h| h.cell_id), Some(2));
        assert!(cache.resolve_calo_hit(&ObjectId::new(ecal, 2)).is_none());
        assert!(cache.resolve_calo_hit(&ObjectId::new(trk, 0)).is_none());
        assert!(cache.resolve_track(&ObjectId::new(trk, 0)).is_some());
        assert!(cache.resolve_track(&ObjectId::new(999, 0)).is_none());
    }

    #[test]
    fn test_vertex_kind_comes_from_collection_group() {
        let event = event_with(&["MCParticle", "ECALBarrel", "MarlinTrkTracks", "KinkVertices", "V0Vertices"]);
        let kink = event.get("KinkVertices").unwrap().collection_id;

        let mut cache = CollectionCache::from_config(&PfaConfig::default());
        cache.update(&event).unwrap();

        assert_eq!(cache.vertex_kind("KinkVertices"), Some(VertexKind::Kink));
        assert_eq!(cache.vertex_kind("V0Vertices"), Some(VertexKind::V0));
        assert_eq!(cache.vertex_kind("ProngVertices"), None);
        assert_eq!(cache.vertex_kind_of(&ObjectId::new(kink, 1)), Some(VertexKind::Kink));
        assert_eq!(cache.resolve_vertex(&ObjectId::new(kink, 1)).map(|v| v.position[0]), Some(20.0));
        assert_eq!(cache.vertices_of_kind(VertexKind::Kink).count(), 2);
        assert_eq!(cache.vertices_of_kind(VertexKind::V0).count(), 0);
    }

    #[test]
    fn test_shared_collection_id_is_rejected() {
        let mut event = event_with(&["MCParticle", "ECALBarrel", "MarlinTrkTracks"]);
        let ecal = event.get("ECALBarrel").unwrap().collection_id;
        event.insert_with_id("HCALBarrel", ecal, Collection::CaloHits(vec![
            CalorimeterHit::new(ObjectId::new(ecal, 0), 7, 0.9, [2100.0, 0.0, 0.0]),
        ]));

        let mut cache = CollectionCache::from_config(&PfaConfig::default());
        match cache.update(&event) {
            Err(PfaError::DuplicateCollectionId { collection_id, first, second }) => {
                assert_eq!(collection_id, ecal);
                assert_eq!(first, "ECALBarrel");
                assert_eq!(second, "HCALBarrel");
            }
            other => panic!("expected DuplicateCollectionId, got {:?}", other.map(|_| ())),
        }
        // ids keep resolving into the first collection
        assert_eq!(cache.resolve_calo_hit(&ObjectId::new(ecal, 1)).map(|h| h.cell_id), Some(2));
    }
}
