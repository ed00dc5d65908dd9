use std::fmt;
use std::fmt::{Display, Formatter};
use serde::{Serialize, Deserialize};

/// Identity of a single element inside one event.
///
/// # Description
///
/// An element is addressed by the numeric id of the collection it lives in and its
/// position inside that collection. Ids are only meaningful within the event that
/// assigned them.
///
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct ObjectId {
    pub collection_id: u32,
    pub index: u32,
}

impl ObjectId {
    /// Creates a new `ObjectId`.
    ///
    /// # Arguments
    ///
    /// * `collection_id` - Numeric id of the owning collection.
    /// * `index` - Position of the element inside the collection.
    ///
    /// # Example
    ///
    /// ```
    /// use edmcore::data::ids::ObjectId;
    ///
    /// let id = ObjectId::new(3, 7);
    /// assert_eq!(id.collection_id, 3);
    /// assert_eq!(id.index, 7);
    /// ```
    pub fn new(collection_id: u32, index: u32) -> Self {
        ObjectId { collection_id, index }
    }

    pub fn index_usize(&self) -> usize {
        self.index as usize
    }
}

impl Display for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.collection_id, self.index)
    }
}
