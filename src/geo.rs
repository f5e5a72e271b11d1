//! General geographic data structures, and the walk from elements down to their nodes used to
//! find the extent of a change.
use crate::fetch::FetchCache;
use crate::{ElementId, Node, OsmFeature};

/// Represents a coordinate containing latitude and longitude in degrees.
///
/// # Examples
/// ```
/// # use nz_osm_patch::geo::Coordinate;
/// let coordinate = Coordinate::new(-36.8, 174.8);
/// assert_eq!(coordinate.lat, -36.8);
/// assert_eq!(coordinate.lon, 174.8);
///
/// // You can also use the `Into` trait to construct coordinates, latitude first.
/// let coordinate: Coordinate = (-36.8, 174.8).into();
/// ```
#[derive(Debug, PartialEq, Copy, Clone)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

/// Represents coordinate boundary, i.e. min and max latitude and longitude.
///
/// A boundary that nothing has been added to is inverted: its minimums are `+inf` and its
/// maximums `-inf`. Such a boundary is not a valid area, check [`is_finite`] before using it.
///
/// # Examples
/// ```
/// # use nz_osm_patch::geo::Boundary;
/// let mut bounds = Boundary::inverted();
/// assert!(!bounds.is_finite());
///
/// bounds.expand((10.0, 20.0).into());
/// bounds.expand((30.0, 40.0).into());
///
/// assert_eq!(bounds.min.lat, 10.0);
/// assert_eq!(bounds.min.lon, 20.0);
/// assert_eq!(bounds.max.lat, 30.0);
/// assert_eq!(bounds.max.lon, 40.0);
/// assert!(bounds.is_finite());
/// ```
///
/// [`is_finite`]: struct.Boundary.html#method.is_finite
#[derive(Debug, PartialEq, Copy, Clone)]
pub struct Boundary {
    pub min: Coordinate,
    pub max: Coordinate,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Coordinate {
        Coordinate { lat, lon }
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((lat, lon): (f64, f64)) -> Self {
        Coordinate::new(lat, lon)
    }
}

impl Boundary {
    pub fn new<C: Into<Coordinate>>(min: C, max: C) -> Boundary {
        Boundary {
            min: min.into(),
            max: max.into(),
        }
    }

    /// Empty boundary with min set to `+inf` and max set to `-inf`, intended to be expanded by
    /// coordinates.
    pub fn inverted() -> Self {
        Boundary {
            min: (f64::INFINITY, f64::INFINITY).into(),
            max: (f64::NEG_INFINITY, f64::NEG_INFINITY).into(),
        }
    }

    /// Expand boundary if necessary to include a coordinate.
    pub fn expand(&mut self, c: Coordinate) {
        if c.lat > self.max.lat {
            self.max.lat = c.lat;
        }
        if c.lat < self.min.lat {
            self.min.lat = c.lat;
        }
        if c.lon > self.max.lon {
            self.max.lon = c.lon;
        }
        if c.lon < self.min.lon {
            self.min.lon = c.lon;
        }
    }

    /// False as long as no coordinate has been added, i.e. there is nothing to preview.
    pub fn is_finite(&self) -> bool {
        self.min.lat.is_finite()
            && self.min.lon.is_finite()
            && self.max.lat.is_finite()
            && self.max.lon.is_finite()
    }
}

impl Default for Boundary {
    fn default() -> Self {
        Boundary::inverted()
    }
}

/// Resolve a feature to the nodes it is built from.
///
/// A node resolves to itself. Ways and relations are looked up in the fetch cache, anything
/// missing from the cache is skipped, so the result may be incomplete but this never fails.
/// Nodes reachable through several paths are returned once per path.
///
/// A relation that is already being resolved further up (a membership cycle) is skipped.
pub fn recurse_to_nodes<'a>(feature: &'a OsmFeature, cache: &'a FetchCache) -> Vec<&'a Node> {
    let mut nodes = Vec::new();
    let mut path = Vec::new();
    collect_nodes(feature, cache, &mut path, &mut nodes);
    nodes
}

fn collect_nodes<'a>(
    feature: &'a OsmFeature,
    cache: &'a FetchCache,
    path: &mut Vec<ElementId>,
    nodes: &mut Vec<&'a Node>,
) {
    match feature {
        OsmFeature::Node(node) => nodes.push(node),
        OsmFeature::Way(way) => {
            for id in &way.refs {
                if let Some(OsmFeature::Node(node)) = cache.get(&ElementId::node(*id)) {
                    nodes.push(node);
                }
            }
        }
        OsmFeature::Relation(relation) => {
            let id = ElementId::relation(relation.id);
            if path.contains(&id) {
                return;
            }
            path.push(id);
            for member in &relation.members {
                if let Some(sub_feature) = cache.get(&member.element_id()) {
                    collect_nodes(sub_feature, cache, path, nodes);
                }
            }
            path.pop();
        }
    }
}

/// Envelope of every node reachable from `features`, starting from `seed` (or an inverted
/// boundary). See [`recurse_to_nodes`] for how features are resolved.
///
/// [`recurse_to_nodes`]: fn.recurse_to_nodes.html
pub fn features_bbox<'a, I>(features: I, cache: &FetchCache, seed: Option<Boundary>) -> Boundary
where
    I: IntoIterator<Item = &'a OsmFeature>,
{
    let mut boundary = seed.unwrap_or_else(Boundary::inverted);
    for feature in features {
        for node in recurse_to_nodes(feature, cache) {
            boundary.expand(node.coordinate);
        }
    }
    boundary
}
