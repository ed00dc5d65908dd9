use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use edmcore::data::ids::ObjectId;
use edmcore::data::relation::{CaloRelationWeight, CaloTruthRelation, TrackerTruthRelation};
use crate::cache::CollectionCache;

/// One weighted link from a reconstructed object to a simulated particle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TruthLink {
    pub sim: ObjectId,
    pub weight: f32,
}

impl TruthLink {
    pub fn new(sim: ObjectId, weight: f32) -> Self {
        TruthLink { sim, weight }
    }
}

/// Negative, NaN and infinite weights carry no contribution.
#[inline]
pub fn sanitize_weight(weight: f32) -> f32 {
    if weight.is_finite() && weight > 0.0 { weight } else { 0.0 }
}

/// How a calorimeter relation's (EM fraction, total) pair collapses to one weight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaloWeight {
    /// Total deposited energy.
    #[default]
    Total,
    /// Electromagnetic fraction only.
    EmFraction,
    /// Electromagnetic part of the deposit, fraction × total.
    EmScaledTotal,
}

impl CaloWeight {
    pub fn extract(&self, weight: &CaloRelationWeight) -> f32 {
        match self {
            CaloWeight::Total => weight.total,
            CaloWeight::EmFraction => weight.em_fraction,
            CaloWeight::EmScaledTotal => weight.em_fraction * weight.total,
        }
    }
}

/// Uniform hit-id → truth-links lookup, independent of the subsystem behind it.
pub trait TruthRelationSource {
    fn label(&self) -> &str;
    /// Links recorded for `hit`; empty when the hit has no truth information.
    fn lookup(&self, hit: &ObjectId) -> &[TruthLink];
}

/// Relation source backed by a hash index built once per event.
#[derive(Clone, Debug, Default)]
pub struct RelationIndex {
    label: String,
    links: HashMap<ObjectId, Vec<TruthLink>>,
    n_relations: usize,
}

impl RelationIndex {
    pub fn new(label: &str) -> Self {
        RelationIndex { label: label.to_string(), links: HashMap::new(), n_relations: 0 }
    }

    /// Indexes `relations` with a caller-chosen weight extraction.
    ///
    /// # Arguments
    ///
    /// * `label` - Name of the source, used in diagnostics.
    /// * `relations` - Relation records in a stable order; per-hit link order follows it.
    /// * `extract` - Maps one record to (reconstructed id, simulated id, raw weight).
    ///
    pub fn from_relations<'a, R: 'a>(
        label: &str,
        relations: impl IntoIterator<Item = &'a R>,
        extract: impl Fn(&R) -> (ObjectId, ObjectId, f32),
    ) -> Self {
        let mut index = RelationIndex::new(label);
        for relation in relations {
            let (rec, sim, weight) = extract(relation);
            index.push(rec, TruthLink::new(sim, sanitize_weight(weight)));
        }
        index
    }

    pub fn push(&mut self, rec: ObjectId, link: TruthLink) {
        self.links.entry(rec).or_default().push(link);
        self.n_relations += 1;
    }

    pub fn calorimeter(cache: &CollectionCache<'_>, weight: CaloWeight) -> Self {
        RelationIndex::from_relations(
            "calorimeter",
            cache.calo_relations.elements(),
            |r: &CaloTruthRelation| (r.rec, r.sim, weight.extract(&r.weight)),
        )
    }

    pub fn tracker(cache: &CollectionCache<'_>) -> Self {
        RelationIndex::from_relations(
            "tracker",
            cache.tracker_relations.elements(),
            |r: &TrackerTruthRelation| (r.rec, r.sim, r.weight),
        )
    }

    /// Number of distinct reconstructed objects with at least one link.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn relation_count(&self) -> usize {
        self.n_relations
    }
}

impl TruthRelationSource for RelationIndex {
    fn label(&self) -> &str {
        &self.label
    }

    fn lookup(&self, hit: &ObjectId) -> &[TruthLink] {
        self.links.get(hit).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_weight(2.5), 2.5);
        assert_eq!(sanitize_weight(-1.0), 0.0);
        assert_eq!(sanitize_weight(f32::NAN), 0.0);
        assert_eq!(sanitize_weight(f32::INFINITY), 0.0);
    }

    #[test]
    fn test_calo_weight_modes() {
        let w = CaloRelationWeight::new(0.25, 8.0);
        assert_eq!(CaloWeight::Total.extract(&w), 8.0);
        assert_eq!(CaloWeight::EmFraction.extract(&w), 0.25);
        assert_eq!(CaloWeight::EmScaledTotal.extract(&w), 2.0);
    }

    #[test]
    fn test_index_groups_by_hit_in_order() {
        let hit = ObjectId::new(1, 0);
        let a = ObjectId::new(5, 0);
        let b = ObjectId::new(5, 1);
        let relations = vec![
            CaloTruthRelation::new(hit, b, CaloRelationWeight::new(1.0, 0.4)),
            CaloTruthRelation::new(ObjectId::new(1, 1), a, CaloRelationWeight::new(1.0, 0.2)),
            CaloTruthRelation::new(hit, a, CaloRelationWeight::new(1.0, -3.0)),
        ];
        let index = RelationIndex::from_relations("calorimeter", &relations, |r| {
            (r.rec, r.sim, CaloWeight::Total.extract(&r.weight))
        });

        assert_eq!(index.len(), 2);
        assert_eq!(index.relation_count(), 3);
        assert_eq!(index.lookup(&hit), &[TruthLink::new(b, 0.4), TruthLink::new(a, 0.0)]);
        assert!(index.lookup(&ObjectId::new(1, 9)).is_empty());
        assert_eq!(index.label(), "calorimeter");
    }
}
