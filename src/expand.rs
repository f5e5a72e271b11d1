//! Turning the GeoJSON geometry of a created patch feature into new OSM elements.
//!
//! New elements get negative placeholder ids that the server replaces on upload. References
//! between the new elements (way node lists, relation members) use the placeholders.
use crate::error::ErrorKind;
use crate::geo::Coordinate;
use crate::{ElementType, Meta, Node, OsmFeature, Relation, RelationMember, Tags, Way};
use geojson::{Geometry, Value};

/// Hands out placeholder ids, `-1`, `-2`, ... with one sequence per element type.
///
/// Use one allocator for everything created in the same change, ids are never handed out twice.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    node: i64,
    way: i64,
    relation: i64,
}

impl IdAllocator {
    pub fn new() -> Self {
        IdAllocator {
            node: 0,
            way: 0,
            relation: 0,
        }
    }

    pub fn next(&mut self, kind: ElementType) -> i64 {
        let counter = match kind {
            ElementType::Node => &mut self.node,
            ElementType::Way => &mut self.way,
            ElementType::Relation => &mut self.relation,
        };
        *counter -= 1;
        *counter
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        IdAllocator::new()
    }
}

/// Name of the geometry type, as written in GeoJSON.
pub fn geometry_name(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}

/// Convert a GeoJSON position (`[lon, lat, ...]`) to a coordinate.
pub fn position_to_coordinate(position: &[f64]) -> Result<Coordinate, ErrorKind> {
    match position {
        [lon, lat, ..] => Ok(Coordinate::new(*lat, *lon)),
        _ => Err(ErrorKind::InvalidPatch(format!(
            "Position {:?} needs a longitude and a latitude",
            position
        ))),
    }
}

/// Create the elements representing `geometry`. The element carrying `tags` is the last one
/// returned, every element is returned after the elements it references.
///
/// | Geometry             | Result                                                       |
/// |----------------------|--------------------------------------------------------------|
/// | `Point`              | A tagged node.                                               |
/// | `MultiPoint`         | Untagged nodes and a tagged `type=site` relation of them.    |
/// | `LineString`         | Untagged nodes and a tagged way.                             |
/// | `MultiLineString`    | Untagged nodes and ways, and a `type=multilinestring` relation. |
/// | `GeometryCollection` | A tagged relation with `members` (none if `None`).           |
///
/// Polygons can not be created, they fail with `UnsupportedGeometry`.
///
/// # Examples
/// ```
/// # use nz_osm_patch::expand::{expand_geometry, IdAllocator};
/// # use nz_osm_patch::{tags_from, OsmFeature};
/// # use geojson::{Geometry, Value};
/// let mut ids = IdAllocator::new();
/// let line = Geometry::new(Value::LineString(vec![vec![174.7, -41.2], vec![174.8, -41.3]]));
///
/// let features = expand_geometry(&mut ids, &line, tags_from(&[("highway", "path")]), None).unwrap();
/// assert_eq!(features.len(), 3);
/// match &features[2] {
///     OsmFeature::Way(way) => assert_eq!(way.refs, vec![-1, -2]),
///     f => panic!("Expected a way, got {:?}", f),
/// }
/// ```
pub fn expand_geometry(
    ids: &mut IdAllocator,
    geometry: &Geometry,
    tags: Tags,
    members: Option<&[RelationMember]>,
) -> Result<Vec<OsmFeature>, ErrorKind> {
    let mut builder = FeatureBuilder::new(ids);

    match &geometry.value {
        Value::Point(position) => {
            builder.add_node(position, tags)?;
        }
        Value::MultiPoint(positions) => {
            let mut members = Vec::new();
            for position in positions {
                let id = builder.add_node(position, Tags::new())?;
                members.push(RelationMember::node(id, ""));
            }
            builder.add_relation(members, with_type(tags, "site"));
        }
        Value::LineString(positions) => {
            builder.add_polyline(positions, tags)?;
        }
        Value::MultiLineString(lines) => {
            let mut members = Vec::new();
            for positions in lines {
                let id = builder.add_polyline(positions, Tags::new())?;
                members.push(RelationMember::way(id, ""));
            }
            builder.add_relation(members, with_type(tags, "multilinestring"));
        }
        Value::GeometryCollection(_) => {
            let members = members.map(<[_]>::to_vec).unwrap_or_default();
            builder.add_relation(members, tags);
        }
        value @ Value::Polygon(_) | value @ Value::MultiPolygon(_) => {
            return Err(ErrorKind::UnsupportedGeometry(
                geometry_name(value).to_owned(),
            ));
        }
    }

    Ok(builder.build())
}

fn with_type(mut tags: Tags, value: &str) -> Tags {
    tags.insert("type".to_owned(), value.to_owned());
    tags
}

/// Collects new elements, allocating their ids.
struct FeatureBuilder<'a> {
    ids: &'a mut IdAllocator,
    features: Vec<OsmFeature>,
}

impl<'a> FeatureBuilder<'a> {
    fn new(ids: &'a mut IdAllocator) -> Self {
        FeatureBuilder {
            ids,
            features: Vec::new(),
        }
    }

    fn build(self) -> Vec<OsmFeature> {
        self.features
    }

    fn add_polyline(&mut self, positions: &[Vec<f64>], tags: Tags) -> Result<i64, ErrorKind> {
        let refs = self.add_nodes(positions)?;
        let id = self.ids.next(ElementType::Way);
        self.features.push(
            Way {
                id,
                refs,
                meta: meta(tags),
            }
            .into(),
        );
        Ok(id)
    }

    fn add_relation(&mut self, members: Vec<RelationMember>, tags: Tags) -> i64 {
        let id = self.ids.next(ElementType::Relation);
        self.features.push(
            Relation {
                id,
                members,
                meta: meta(tags),
            }
            .into(),
        );
        id
    }

    fn add_nodes(&mut self, positions: &[Vec<f64>]) -> Result<Vec<i64>, ErrorKind> {
        positions
            .iter()
            .map(|p| self.add_node(p, Tags::new()))
            .collect()
    }

    fn add_node(&mut self, position: &[f64], tags: Tags) -> Result<i64, ErrorKind> {
        let coordinate = position_to_coordinate(position)?;
        let id = self.ids.next(ElementType::Node);
        self.features.push(
            Node {
                id,
                coordinate,
                meta: meta(tags),
            }
            .into(),
        );
        Ok(id)
    }
}

fn meta(tags: Tags) -> Meta {
    Meta {
        tags,
        ..Meta::default()
    }
}
