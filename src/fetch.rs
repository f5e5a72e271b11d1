//! Batched fetching of existing features, and the cache the fetched features are kept in.
//!
//! The OSM API answers multi-fetch requests (`/api/0.6/nodes?nodes=1,2,3`) for a limited number
//! of ids, so requests are split into chunks of [`DEFAULT_CHUNK_SIZE`] ids.
//!
//! [`DEFAULT_CHUNK_SIZE`]: constant.DEFAULT_CHUNK_SIZE.html
use crate::error::Result;
use crate::osm_io::read_features;
use crate::{ElementId, ElementType, OsmFeature};
use log::info;
use std::collections::{BTreeMap, HashMap};
use std::io::BufRead;
use std::path::Path;

/// Upstream limit for the number of ids in one multi-fetch request.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Service that can return the current version of existing features.
///
/// Implementations should return every feature they know of among `ids`. Ids the service does
/// not know are left out of the result, the caller decides if that is an error. Any transport
/// failure must be returned as an error, a partial answer is never treated as complete.
pub trait FeatureSource {
    fn get_features(&self, kind: ElementType, ids: &[i64]) -> Result<Vec<OsmFeature>>;
}

/// Ids to fetch, grouped by element type.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ToFetch {
    ids: BTreeMap<ElementType, Vec<i64>>,
}

/// Features fetched from the server during one editing session, keyed by type and id.
///
/// Entries are never modified, edits are made on copies so the fetched version stays
/// available for diffing.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FetchCache {
    features: HashMap<ElementId, OsmFeature>,
}

/// A `FeatureSource` backed by features held in memory, e.g. read from an OSM XML extract.
///
/// # Examples
/// ```
/// # use nz_osm_patch::fetch::{FeatureSource, LocalSource};
/// # use nz_osm_patch::ElementType;
/// let xml = r#"<osm><node id="1" lat="-41.2" lon="174.7" version="2"/></osm>"#;
/// let source = LocalSource::from_reader(xml.as_bytes()).unwrap();
///
/// let features = source.get_features(ElementType::Node, &[1, 2]).unwrap();
/// assert_eq!(features.len(), 1);
/// assert_eq!(features[0].version(), 2);
/// ```
#[derive(Debug, Default, Clone)]
pub struct LocalSource {
    features: HashMap<ElementId, OsmFeature>,
}

impl ToFetch {
    /// Add an id, ids already present are ignored.
    pub fn push(&mut self, id: ElementId) {
        let ids = self.ids.entry(id.kind).or_insert_with(Vec::new);
        if !ids.contains(&id.id) {
            ids.push(id.id);
        }
    }

    pub fn get(&self, kind: ElementType) -> &[i64] {
        self.ids.get(&kind).map(|ids| &ids[..]).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.ids.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn iter(&self) -> impl Iterator<Item = (ElementType, &[i64])> {
        self.ids.iter().map(|(kind, ids)| (*kind, &ids[..]))
    }
}

impl std::iter::FromIterator<ElementId> for ToFetch {
    fn from_iter<T: IntoIterator<Item = ElementId>>(iter: T) -> Self {
        let mut to_fetch = ToFetch::default();
        for id in iter {
            to_fetch.push(id);
        }
        to_fetch
    }
}

impl FetchCache {
    pub fn get(&self, id: &ElementId) -> Option<&OsmFeature> {
        self.features.get(id)
    }

    pub fn contains(&self, id: &ElementId) -> bool {
        self.features.contains_key(id)
    }

    /// Add a feature under its own type and id, replacing an older entry.
    pub fn insert(&mut self, feature: OsmFeature) {
        self.features.insert(feature.element_id(), feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OsmFeature> {
        self.features.values()
    }
}

impl std::iter::FromIterator<OsmFeature> for FetchCache {
    fn from_iter<T: IntoIterator<Item = OsmFeature>>(iter: T) -> Self {
        let mut cache = FetchCache::default();
        for feature in iter {
            cache.insert(feature);
        }
        cache
    }
}

impl LocalSource {
    pub fn new<I: IntoIterator<Item = OsmFeature>>(features: I) -> Self {
        let mut source = LocalSource::default();
        for feature in features {
            source.insert(feature);
        }
        source
    }

    /// Read features from OSM XML.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        Ok(LocalSource::new(read_features(reader)?))
    }

    /// Read features from an OSM XML file.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(LocalSource::new(crate::osm_io::read_features_file(path)?))
    }

    /// Add a feature, a newer version replaces an older one.
    pub fn insert(&mut self, feature: OsmFeature) {
        let id = feature.element_id();
        match self.features.get(&id) {
            Some(existing) if existing.version() > feature.version() => {}
            _ => {
                self.features.insert(id, feature);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl FeatureSource for LocalSource {
    fn get_features(&self, kind: ElementType, ids: &[i64]) -> Result<Vec<OsmFeature>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.features.get(&ElementId::new(kind, *id)))
            .cloned()
            .collect())
    }
}

/// Split `items` into consecutive slices of at most `limit` items. A `limit` of 0 is treated
/// as 1.
///
/// # Examples
/// ```
/// # use nz_osm_patch::fetch::chunk;
/// let chunks = chunk(&[1, 2, 3, 4, 5], 2);
/// assert_eq!(chunks, vec![&[1, 2][..], &[3, 4][..], &[5][..]]);
/// ```
pub fn chunk<T>(items: &[T], limit: usize) -> Vec<&[T]> {
    items.chunks(limit.max(1)).collect()
}

/// Fetch every id in `to_fetch` that is not in `existing` yet, in batches of `chunk_size`.
///
/// Returns a new cache holding the entries of `existing` plus everything fetched. `existing`
/// itself is left untouched. If any batch fails, the whole fetch fails.
pub fn fetch_chunked<S: FeatureSource + ?Sized>(
    source: &S,
    to_fetch: &ToFetch,
    existing: Option<&FetchCache>,
    chunk_size: usize,
) -> Result<FetchCache> {
    let mut cache = existing.cloned().unwrap_or_default();

    for (kind, ids) in to_fetch.iter() {
        let missing: Vec<i64> = ids
            .iter()
            .filter(|id| !cache.contains(&ElementId::new(kind, **id)))
            .cloned()
            .collect();

        for batch in chunk(&missing, chunk_size) {
            info!(kind = kind.as_str(), count = batch.len(); "Fetching features");
            for feature in source.get_features(kind, batch)? {
                cache.insert(feature);
            }
        }
    }

    Ok(cache)
}

#[cfg(test)]
mod tests {
    use crate::error::{Error, ErrorKind, Result};
    use crate::fetch::{fetch_chunked, FeatureSource, FetchCache, LocalSource, ToFetch};
    use crate::{ElementId, ElementType, Meta, Node, OsmFeature, Way};
    use std::cell::RefCell;

    /// Records every request made through it.
    struct Recording {
        inner: LocalSource,
        requests: RefCell<Vec<(ElementType, Vec<i64>)>>,
    }

    impl FeatureSource for Recording {
        fn get_features(&self, kind: ElementType, ids: &[i64]) -> Result<Vec<OsmFeature>> {
            self.requests.borrow_mut().push((kind, ids.to_vec()));
            self.inner.get_features(kind, ids)
        }
    }

    struct Failing;

    impl FeatureSource for Failing {
        fn get_features(&self, _: ElementType, _: &[i64]) -> Result<Vec<OsmFeature>> {
            Err(Error::from(ErrorKind::Fetch("connection reset".to_owned())))
        }
    }

    fn node(id: i64, version: u32) -> OsmFeature {
        Node {
            id,
            meta: Meta {
                version,
                ..Meta::default()
            },
            ..Node::default()
        }
        .into()
    }

    fn recording(features: Vec<OsmFeature>) -> Recording {
        Recording {
            inner: LocalSource::new(features),
            requests: RefCell::new(Vec::new()),
        }
    }

    #[test]
    fn fetch_in_chunks() {
        let source = recording((1..=250).map(|id| node(id, 1)).collect());
        let to_fetch: ToFetch = (1..=250).map(ElementId::node).collect();

        let cache = fetch_chunked(&source, &to_fetch, None, 100).unwrap();
        assert_eq!(cache.len(), 250);

        let sizes: Vec<usize> = source
            .requests
            .borrow()
            .iter()
            .map(|(_, ids)| ids.len())
            .collect();
        assert_eq!(sizes, vec![100, 100, 50]);
    }

    #[test]
    fn fetch_skips_cached_ids() {
        let source = recording(vec![node(1, 2), node(2, 2)]);
        let existing: FetchCache = vec![node(1, 1)].into_iter().collect();
        let to_fetch: ToFetch = vec![ElementId::node(1), ElementId::node(2)]
            .into_iter()
            .collect();

        let cache = fetch_chunked(&source, &to_fetch, Some(&existing), 100).unwrap();

        assert_eq!(
            *source.requests.borrow(),
            vec![(ElementType::Node, vec![2])]
        );
        // The cached version wins, the caller's cache is not modified.
        assert_eq!(cache.get(&ElementId::node(1)).unwrap().version(), 1);
        assert_eq!(cache.len(), 2);
        assert_eq!(existing.len(), 1);
    }

    #[test]
    fn fetch_types_separately() {
        let way: OsmFeature = Way {
            id: 1,
            ..Way::default()
        }
        .into();
        let source = recording(vec![node(1, 1), way]);
        let to_fetch: ToFetch = vec![ElementId::way(1), ElementId::node(1)]
            .into_iter()
            .collect();

        let cache = fetch_chunked(&source, &to_fetch, None, 100).unwrap();

        assert_eq!(cache.get(&ElementId::node(1)).unwrap().kind(), ElementType::Node);
        assert_eq!(cache.get(&ElementId::way(1)).unwrap().kind(), ElementType::Way);
        assert_eq!(source.requests.borrow().len(), 2);
    }

    #[test]
    fn fetch_nothing() {
        let source = recording(vec![]);
        let cache = fetch_chunked(&source, &ToFetch::default(), None, 100).unwrap();
        assert!(cache.is_empty());
        assert!(source.requests.borrow().is_empty());
    }

    #[test]
    fn fetch_failure_fails_everything() {
        let to_fetch: ToFetch = vec![ElementId::node(1)].into_iter().collect();
        let err = fetch_chunked(&Failing, &to_fetch, None, 100).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to fetch features: connection reset"
        );
    }

    #[test]
    fn to_fetch_ignores_duplicates() {
        let to_fetch: ToFetch = vec![ElementId::node(1), ElementId::node(1), ElementId::way(1)]
            .into_iter()
            .collect();
        assert_eq!(to_fetch.len(), 2);
        assert_eq!(to_fetch.get(ElementType::Node), &[1]);
        assert_eq!(to_fetch.get(ElementType::Relation), &[] as &[i64]);
    }

    #[test]
    fn local_source_keeps_newest_version() {
        let source = LocalSource::new(vec![node(1, 3), node(1, 2)]);
        let features = source.get_features(ElementType::Node, &[1]).unwrap();
        assert_eq!(features[0].version(), 3);
    }
}
