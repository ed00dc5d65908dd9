use thiserror::Error;
use edmcore::data::reco::Constituent;
use crate::config::Category;

pub type Result<T> = std::result::Result<T, PfaError>;

#[derive(Error, Debug)]
pub enum PfaError {
    /// A mandatory input category has no collection in the event. Recoverable.
    #[error("No collection found for mandatory categories: {}", format_categories(.categories))]
    NotFound { categories: Vec<Category> },

    /// Engine output points at something the cache does not hold. Fatal for the event.
    #[error("Reconstructed particle {particle} references unknown {constituent}")]
    UnresolvedConstituent { particle: usize, constituent: Constituent },

    /// Two input collections of one event carry the same collection id. Fatal for the event.
    #[error("Collection id {collection_id} is used by both {first} and {second}")]
    DuplicateCollectionId { collection_id: u32, first: String, second: String },

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Bincode error: {0}")]
    Bincode(#[from] bincode::Error),
}

impl PfaError {
    /// Recoverable conditions leave the decision to skip or continue with the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PfaError::NotFound { .. })
    }

    /// Conditions that abort the current event but not the job.
    pub fn is_event_fatal(&self) -> bool {
        matches!(
            self,
            PfaError::UnresolvedConstituent { .. } | PfaError::DuplicateCollectionId { .. } | PfaError::Engine(_)
        )
    }
}

fn format_categories(categories: &[Category]) -> String {
    categories.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use edmcore::data::ids::ObjectId;

    #[test]
    fn test_classification() {
        let not_found = PfaError::NotFound { categories: vec![Category::Tracks] };
        assert!(not_found.is_recoverable());
        assert!(!not_found.is_event_fatal());

        let unresolved = PfaError::UnresolvedConstituent {
            particle: 0,
            constituent: Constituent::CaloHit(ObjectId::new(9, 9)),
        };
        assert!(unresolved.is_event_fatal());
        assert!(!unresolved.is_recoverable());

        let duplicate = PfaError::DuplicateCollectionId {
            collection_id: 2,
            first: "ECALBarrel".to_string(),
            second: "HCALBarrel".to_string(),
        };
        assert!(duplicate.is_event_fatal());
        assert_eq!(duplicate.to_string(), "Collection id 2 is used by both ECALBarrel and HCALBarrel");
    }

    #[test]
    fn test_messages() {
        let err = PfaError::NotFound { categories: vec![Category::McParticles, Category::CaloHits] };
        assert_eq!(err.to_string(), "No collection found for mandatory categories: McParticles, CaloHits");
    }
}
