//! The payload of a changeset upload.
//!
//! See: https://wiki.openstreetmap.org/wiki/OsmChange
use crate::fetch::FetchCache;
use crate::geo::{features_bbox, Boundary};
use crate::OsmFeature;

/// Features to create, modify and delete in one changeset.
///
/// Features in `create` carry negative placeholder ids which are unique within the change and
/// consistent with the references of their siblings. Features in `modify` and `delete` carry
/// the server id and the version they were fetched at, so the server can detect conflicts.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct OsmChange {
    pub create: Vec<OsmFeature>,
    pub modify: Vec<OsmFeature>,
    pub delete: Vec<OsmFeature>,
}

impl OsmChange {
    /// Total number of features in the change.
    pub fn len(&self) -> usize {
        self.create.len() + self.modify.len() + self.delete.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All features, created first, then modified, then deleted.
    pub fn iter(&self) -> impl Iterator<Item = &OsmFeature> {
        self.create
            .iter()
            .chain(self.modify.iter())
            .chain(self.delete.iter())
    }

    /// Extent of the change for previewing. Ways and relations can only contribute nodes found
    /// in `cache`, so the result may be inverted (not finite) if nothing resolves.
    pub fn bbox(&self, cache: &FetchCache, seed: Option<Boundary>) -> Boundary {
        features_bbox(self.iter(), cache, seed)
    }
}
