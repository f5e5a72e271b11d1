//! OSM elements.
//!
//! See: https://wiki.openstreetmap.org/wiki/Elements

use crate::geo::Coordinate;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

type RelationRole = String;

/// Key value pairs, keys are unique. See OSM docs for [`Tags`].
///
/// [`Tags`]: https://wiki.openstreetmap.org/wiki/Tags
pub type Tags = BTreeMap<String, String>;

/// The three kinds of OSM elements.
#[derive(Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Copy, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Node,
    Way,
    Relation,
}

/// Identifies an element on the server. Node 1 and way 1 are different elements, so the type is
/// part of the key.
///
/// The textual form is the type letter followed by the id, e.g. `n123`, `w-1` or `r42`.
///
/// # Examples
/// ```
/// # use nz_osm_patch::{ElementId, ElementType};
/// let id: ElementId = "w42".parse().unwrap();
/// assert_eq!(id, ElementId::new(ElementType::Way, 42));
/// assert_eq!(id.to_string(), "w42");
/// ```
#[derive(Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Copy, Clone)]
pub struct ElementId {
    pub kind: ElementType,
    pub id: i64,
}

/// A coordinate with meta data. See OSM docs for [`Node`].
///
/// [`Node`]: https://wiki.openstreetmap.org/wiki/Node
#[derive(Debug, PartialEq, Clone)]
pub struct Node {
    pub id: i64,
    pub coordinate: Coordinate,
    pub meta: Meta,
}

/// Group of nodes and meta data. See OSM docs for [`Way`].
///
/// [`Way`]: https://wiki.openstreetmap.org/wiki/Way
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct Way {
    pub id: i64,
    pub refs: Vec<i64>,
    pub meta: Meta,
}

/// Group of elements (node, way or relation). See OSM docs for [`Relation`].
///
/// [`Relation`]: https://wiki.openstreetmap.org/wiki/Relation
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct Relation {
    pub id: i64,
    pub members: Vec<RelationMember>,
    pub meta: Meta,
}

/// Any element as returned by the OSM API, or synthesized locally with a negative id.
#[derive(Debug, PartialEq, Clone)]
pub enum OsmFeature {
    Node(Node),
    Way(Way),
    Relation(Relation),
}

/// Common meta data used by all elements.
///
/// `version` is 0 and `author` is `None` for elements that do not exist on the server yet.
#[derive(Debug, Eq, PartialEq, Clone, Default)]
pub struct Meta {
    pub tags: Tags,
    pub version: u32,
    pub author: Option<AuthorInformation>,
}

/// Server assigned information about the last edit of an element. Meaningless on elements that
/// are not uploaded yet.
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct AuthorInformation {
    pub created: i64,
    pub change_set: u64,
    pub uid: u64,
    pub user: String,
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub struct RelationMember {
    pub kind: ElementType,
    pub ref_id: i64,
    pub role: RelationRole,
}

impl ElementType {
    /// Single letter prefix used in compact ids.
    pub fn letter(self) -> char {
        match self {
            ElementType::Node => 'n',
            ElementType::Way => 'w',
            ElementType::Relation => 'r',
        }
    }

    pub fn from_letter(c: char) -> Option<Self> {
        match c {
            'n' => Some(ElementType::Node),
            'w' => Some(ElementType::Way),
            'r' => Some(ElementType::Relation),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ElementType::Node => "node",
            ElementType::Way => "way",
            ElementType::Relation => "relation",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "node" => Some(ElementType::Node),
            "way" => Some(ElementType::Way),
            "relation" | "rel" => Some(ElementType::Relation),
            _ => None,
        }
    }
}

impl Display for ElementType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ElementId {
    pub fn new(kind: ElementType, id: i64) -> Self {
        ElementId { kind, id }
    }

    pub fn node(id: i64) -> Self {
        ElementId::new(ElementType::Node, id)
    }

    pub fn way(id: i64) -> Self {
        ElementId::new(ElementType::Way, id)
    }

    pub fn relation(id: i64) -> Self {
        ElementId::new(ElementType::Relation, id)
    }
}

impl Display for ElementId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.kind.letter(), self.id)
    }
}

impl FromStr for ElementId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let kind = chars
            .next()
            .and_then(ElementType::from_letter)
            .ok_or_else(|| format!("'{}' does not start with n, w or r.", s))?;
        let digits = chars.as_str();
        let id = Some(digits)
            .filter(|d| !d.starts_with('+'))
            .and_then(|d| d.parse().ok())
            .ok_or_else(|| format!("'{}' does not end with an integer id.", s))?;
        Ok(ElementId { kind, id })
    }
}

impl OsmFeature {
    pub fn id(&self) -> i64 {
        match self {
            OsmFeature::Node(n) => n.id,
            OsmFeature::Way(w) => w.id,
            OsmFeature::Relation(r) => r.id,
        }
    }

    pub fn kind(&self) -> ElementType {
        match self {
            OsmFeature::Node(_) => ElementType::Node,
            OsmFeature::Way(_) => ElementType::Way,
            OsmFeature::Relation(_) => ElementType::Relation,
        }
    }

    pub fn element_id(&self) -> ElementId {
        ElementId::new(self.kind(), self.id())
    }

    pub fn meta(&self) -> &Meta {
        match self {
            OsmFeature::Node(n) => &n.meta,
            OsmFeature::Way(w) => &w.meta,
            OsmFeature::Relation(r) => &r.meta,
        }
    }

    pub fn meta_mut(&mut self) -> &mut Meta {
        match self {
            OsmFeature::Node(n) => &mut n.meta,
            OsmFeature::Way(w) => &mut w.meta,
            OsmFeature::Relation(r) => &mut r.meta,
        }
    }

    pub fn tags(&self) -> &Tags {
        &self.meta().tags
    }

    pub fn version(&self) -> u32 {
        self.meta().version
    }
}

impl From<Node> for OsmFeature {
    fn from(node: Node) -> Self {
        OsmFeature::Node(node)
    }
}

impl From<Way> for OsmFeature {
    fn from(way: Way) -> Self {
        OsmFeature::Way(way)
    }
}

impl From<Relation> for OsmFeature {
    fn from(relation: Relation) -> Self {
        OsmFeature::Relation(relation)
    }
}

impl RelationMember {
    pub fn new(kind: ElementType, ref_id: i64, role: &str) -> Self {
        RelationMember {
            kind,
            ref_id,
            role: role.to_owned(),
        }
    }

    pub fn node(ref_id: i64, role: &str) -> Self {
        RelationMember::new(ElementType::Node, ref_id, role)
    }

    pub fn way(ref_id: i64, role: &str) -> Self {
        RelationMember::new(ElementType::Way, ref_id, role)
    }

    pub fn relation(ref_id: i64, role: &str) -> Self {
        RelationMember::new(ElementType::Relation, ref_id, role)
    }

    /// The referenced element.
    pub fn element_id(&self) -> ElementId {
        ElementId::new(self.kind, self.ref_id)
    }

    /// True if both members reference the same element, regardless of role.
    pub fn same_element(&self, other: &RelationMember) -> bool {
        self.kind == other.kind && self.ref_id == other.ref_id
    }
}

impl Default for Node {
    fn default() -> Self {
        Node {
            id: 0,
            coordinate: Coordinate { lat: 0.0, lon: 0.0 },
            meta: Default::default(),
        }
    }
}

impl Default for Way {
    fn default() -> Self {
        Way {
            id: 0,
            refs: vec![],
            meta: Default::default(),
        }
    }
}

impl Default for Relation {
    fn default() -> Self {
        Relation {
            id: 0,
            members: vec![],
            meta: Default::default(),
        }
    }
}

/// Build a `Tags` map from string pairs.
///
/// # Examples
/// ```
/// # use nz_osm_patch::tags_from;
/// let tags = tags_from(&[("amenity", "cafe")]);
/// assert_eq!(tags["amenity"], "cafe");
/// ```
pub fn tags_from(pairs: &[(&str, &str)]) -> Tags {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}
