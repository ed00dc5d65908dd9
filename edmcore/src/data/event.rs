use std::collections::BTreeMap;
use std::fmt;
use std::fmt::{Display, Formatter};
use serde::{Serialize, Deserialize};
use crate::data::hits::{CalorimeterHit, Track, Vertex};
use crate::data::mc_particle::McParticle;
use crate::data::relation::{CaloTruthRelation, TrackerTruthRelation};

/// Element type carried by a collection.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub enum CollectionKind {
    McParticles,
    CaloHits,
    Tracks,
    Vertices,
    CaloRelations,
    TrackerRelations,
}

impl Display for CollectionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CollectionKind::McParticles => write!(f, "McParticles"),
            CollectionKind::CaloHits => write!(f, "CaloHits"),
            CollectionKind::Tracks => write!(f, "Tracks"),
            CollectionKind::Vertices => write!(f, "Vertices"),
            CollectionKind::CaloRelations => write!(f, "CaloRelations"),
            CollectionKind::TrackerRelations => write!(f, "TrackerRelations"),
        }
    }
}

/// One typed, ordered sequence of event records.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Collection {
    McParticles(Vec<McParticle>),
    CaloHits(Vec<CalorimeterHit>),
    Tracks(Vec<Track>),
    Vertices(Vec<Vertex>),
    CaloRelations(Vec<CaloTruthRelation>),
    TrackerRelations(Vec<TrackerTruthRelation>),
}

impl Collection {
    pub fn kind(&self) -> CollectionKind {
        match self {
            Collection::McParticles(_) => CollectionKind::McParticles,
            Collection::CaloHits(_) => CollectionKind::CaloHits,
            Collection::Tracks(_) => CollectionKind::Tracks,
            Collection::Vertices(_) => CollectionKind::Vertices,
            Collection::CaloRelations(_) => CollectionKind::CaloRelations,
            Collection::TrackerRelations(_) => CollectionKind::TrackerRelations,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Collection::McParticles(v) => v.len(),
            Collection::CaloHits(v) => v.len(),
            Collection::Tracks(v) => v.len(),
            Collection::Vertices(v) => v.len(),
            Collection::CaloRelations(v) => v.len(),
            Collection::TrackerRelations(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_mc_particles(&self) -> Option<&[McParticle]> {
        match self { Collection::McParticles(v) => Some(v), _ => None }
    }

    pub fn as_calo_hits(&self) -> Option<&[CalorimeterHit]> {
        match self { Collection::CaloHits(v) => Some(v), _ => None }
    }

    pub fn as_tracks(&self) -> Option<&[Track]> {
        match self { Collection::Tracks(v) => Some(v), _ => None }
    }

    pub fn as_vertices(&self) -> Option<&[Vertex]> {
        match self { Collection::Vertices(v) => Some(v), _ => None }
    }

    pub fn as_calo_relations(&self) -> Option<&[CaloTruthRelation]> {
        match self { Collection::CaloRelations(v) => Some(v), _ => None }
    }

    pub fn as_tracker_relations(&self) -> Option<&[TrackerTruthRelation]> {
        match self { Collection::TrackerRelations(v) => Some(v), _ => None }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NamedCollection {
    pub collection_id: u32,
    pub collection: Collection,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventHeader {
    pub run: u32,
    pub event: u32,
}

impl Display for EventHeader {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "run {} event {}", self.run, self.event)
    }
}

/// All input collections of one event, addressed by name.
///
/// # Description
///
/// Every collection carries a numeric id that element identities (`ObjectId`) refer
/// to. Ids are allocated per name: asking for the id of an existing name returns the
/// same id, inserting under an existing name replaces its content.
///
/// # Example
///
/// ```
/// use edmcore::data::event::{Collection, EventHeader, EventStore};
/// use edmcore::data::hits::CalorimeterHit;
/// use edmcore::data::ids::ObjectId;
///
/// let mut event = EventStore::new(EventHeader { run: 1, event: 42 });
/// let cid = event.id_for("ECALBarrel");
/// let hit = CalorimeterHit::new(ObjectId::new(cid, 0), 0, 0.25, [1800.0, 0.0, 10.0]);
/// event.insert("ECALBarrel", Collection::CaloHits(vec![hit]));
///
/// assert_eq!(event.get("ECALBarrel").map(|c| c.collection_id), Some(cid));
/// assert_eq!(event.len(), 1);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventStore {
    pub header: EventHeader,
    #[serde(default)]
    collections: BTreeMap<String, NamedCollection>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    reserved: BTreeMap<String, u32>,
}

impl EventStore {
    pub fn new(header: EventHeader) -> Self {
        EventStore { header, collections: BTreeMap::new(), reserved: BTreeMap::new() }
    }

    /// Returns the collection id registered for `name`, reserving a fresh one if needed.
    /// A reserved id without content is not visible through `get`.
    pub fn id_for(&mut self, name: &str) -> u32 {
        if let Some(existing) = self.collections.get(name) {
            return existing.collection_id;
        }
        if let Some(&reserved) = self.reserved.get(name) {
            return reserved;
        }
        let next = self.collections.values().map(|c| c.collection_id)
            .chain(self.reserved.values().copied())
            .max()
            .map_or(1, |m| m + 1);
        self.reserved.insert(name.to_string(), next);
        next
    }

    /// Stores `collection` under `name` and returns its collection id.
    pub fn insert(&mut self, name: &str, collection: Collection) -> u32 {
        let collection_id = self.id_for(name);
        self.insert_with_id(name, collection_id, collection);
        collection_id
    }

    /// Stores `collection` under an explicit id, replacing any collection of that name.
    pub fn insert_with_id(&mut self, name: &str, collection_id: u32, collection: Collection) {
        self.reserved.remove(name);
        self.collections.insert(name.to_string(), NamedCollection { collection_id, collection });
    }

    pub fn get(&self, name: &str) -> Option<&NamedCollection> {
        self.collections.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ids::ObjectId;

    #[test]
    fn test_ids_are_stable_per_name() {
        let mut event = EventStore::new(EventHeader::default());
        let a = event.id_for("MCParticle");
        let b = event.id_for("MarlinTrkTracks");
        assert_ne!(a, b);
        assert_eq!(event.id_for("MCParticle"), a);

        let replaced = event.insert("MCParticle", Collection::McParticles(Vec::new()));
        assert_eq!(replaced, a);
    }

    #[test]
    fn test_typed_access() {
        let mut event = EventStore::new(EventHeader { run: 0, event: 3 });
        let cid = event.id_for("MarlinTrkTracks");
        let track = Track::new(ObjectId::new(cid, 0), [1.0, 0.0, 0.0], 1.0);
        event.insert("MarlinTrkTracks", Collection::Tracks(vec![track]));

        let stored = event.get("MarlinTrkTracks").unwrap();
        assert_eq!(stored.collection.kind(), CollectionKind::Tracks);
        assert_eq!(stored.collection.as_tracks().map(|t| t.len()), Some(1));
        assert!(stored.collection.as_calo_hits().is_none());
    }

    #[test]
    fn test_json_round_trip_keeps_ids() {
        let mut event = EventStore::new(EventHeader { run: 7, event: 1 });
        event.insert("V0Vertices", Collection::Vertices(Vec::new()));
        event.insert("MCParticle", Collection::McParticles(Vec::new()));

        let text = serde_json::to_string(&event).unwrap();
        let back: EventStore = serde_json::from_str(&text).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.get("MCParticle").map(|c| c.collection_id), Some(2));
    }
}
