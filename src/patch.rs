//! osmPatch documents: GeoJSON feature collections describing changes to OSM data.
//!
//! Each feature's properties are the tags to set. Two special properties control what is done:
//!
//! * `__action`: `edit`, `move` or `delete` on the existing feature named by the feature id
//!   (`n123`, `w123` or `r123`). Without an action the feature is created from its geometry.
//! * `__members`: a list of `{"type", "ref", "role"}` objects. On an edit it is a diff of the
//!   relation's members, on a create it is the complete member list.
//!
//! The document may carry `instructions` to show to the person uploading and suggested
//! `changesetTags`.
use crate::error::{ErrorKind, Result};
use crate::expand::position_to_coordinate;
use crate::geo::Boundary;
use crate::{ElementType, RelationMember, Tags};
use geojson::{feature, Feature, GeoJson, Geometry, Value};
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use std::fs;
use std::path::Path;
use std::str::FromStr;

const ACTION_KEY: &str = "__action";
const MEMBERS_KEY: &str = "__members";
const DEFAULT_CREATED_BY: &str = "LINZ Data Import 2.0.0";

/// What to do with the existing feature a patch feature refers to.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum Action {
    Edit,
    Move,
    Delete,
}

/// One feature of a patch.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchFeature {
    pub id: Option<String>,
    pub geometry: Option<Geometry>,
    /// `None` means create.
    pub action: Option<Action>,
    /// Tags to set. A value of [`DELETE_SENTINEL`] removes the tag.
    ///
    /// [`DELETE_SENTINEL`]: ../tags/constant.DELETE_SENTINEL.html
    pub tags: Tags,
    pub members: Option<Vec<RelationMember>>,
}

/// A parsed osmPatch document.
///
/// # Examples
/// ```
/// # use nz_osm_patch::patch::{Action, OsmPatch};
/// let patch: OsmPatch = r#"{
///     "type": "FeatureCollection",
///     "instructions": "Check the new names",
///     "features": [{
///         "type": "Feature",
///         "id": "n100",
///         "geometry": null,
///         "properties": { "__action": "edit", "name": "Te Aro" }
///     }]
/// }"#.parse().unwrap();
///
/// assert_eq!(patch.features[0].action, Some(Action::Edit));
/// assert_eq!(patch.features[0].tags["name"], "Te Aro");
/// assert_eq!(patch.instructions, vec!["Check the new names"]);
/// ```
#[derive(Debug, Default, Clone, PartialEq)]
pub struct OsmPatch {
    pub features: Vec<PatchFeature>,
    pub instructions: Vec<String>,
    pub changeset_tags: Tags,
}

#[derive(Deserialize)]
struct MemberEntry {
    #[serde(rename = "type")]
    kind: ElementType,
    #[serde(rename = "ref")]
    ref_id: i64,
    #[serde(default)]
    role: String,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Edit => "edit",
            Action::Move => "move",
            Action::Delete => "delete",
        }
    }
}

impl FromStr for Action {
    type Err = ErrorKind;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "edit" => Ok(Action::Edit),
            "move" => Ok(Action::Move),
            "delete" => Ok(Action::Delete),
            _ => Err(ErrorKind::InvalidPatch(format!("Unknown action '{}'", s))),
        }
    }
}

impl OsmPatch {
    /// Read a `.osmPatch.geo.json` file.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| ErrorKind::InvalidPatch(e.to_string()))?;
        text.parse()
    }

    pub fn from_geojson(geojson: GeoJson) -> Result<Self> {
        let collection = match geojson {
            GeoJson::FeatureCollection(collection) => collection,
            _ => {
                return Err(ErrorKind::InvalidPatch(
                    "Expected a FeatureCollection".to_owned(),
                )
                .into())
            }
        };

        let features = collection
            .features
            .into_iter()
            .map(parse_feature)
            .collect::<Result<Vec<_>>>()?;

        let mut patch = OsmPatch {
            features,
            ..OsmPatch::default()
        };

        if let Some(members) = collection.foreign_members {
            if let Some(JsonValue::String(instructions)) = members.get("instructions") {
                if !instructions.is_empty() {
                    patch.instructions.push(instructions.clone());
                }
            }
            if let Some(value) = members.get("changesetTags") {
                let tags = value.as_object().ok_or_else(|| {
                    ErrorKind::InvalidPatch("changesetTags must be an object".to_owned())
                })?;
                patch.changeset_tags = parse_tags(tags)?;
            }
        }

        Ok(patch)
    }

    /// Combine several patches into one, as when uploading them in one changeset.
    ///
    /// Features are concatenated in order. Changeset tags present in several patches get their
    /// distinct values joined with `;`. If there are any changeset tags, `created_by` is filled
    /// in when missing. Repeated instructions are kept once.
    pub fn merge(patches: Vec<OsmPatch>) -> OsmPatch {
        let mut merged = OsmPatch::default();

        for patch in patches {
            merged.features.extend(patch.features);

            for instruction in patch.instructions {
                if !instruction.is_empty() && !merged.instructions.contains(&instruction) {
                    merged.instructions.push(instruction);
                }
            }

            for (key, value) in patch.changeset_tags {
                match merged.changeset_tags.get_mut(&key) {
                    Some(existing) => {
                        if !existing.split(';').any(|v| v == value) {
                            existing.push(';');
                            existing.push_str(&value);
                        }
                    }
                    None => {
                        merged.changeset_tags.insert(key, value);
                    }
                }
            }
        }

        if !merged.changeset_tags.is_empty() {
            let created_by = merged
                .changeset_tags
                .entry("created_by".to_owned())
                .or_default();
            if created_by.is_empty() {
                created_by.push_str(DEFAULT_CREATED_BY);
            }
        }

        merged
    }

    /// Extent of the patch geometries, without fetching anything. Geometry collections and
    /// features without geometry don't contribute. The result is inverted if nothing does.
    pub fn bbox(&self) -> Boundary {
        let mut boundary = Boundary::inverted();
        for geometry in self.features.iter().filter_map(|f| f.geometry.as_ref()) {
            for position in positions(&geometry.value) {
                if let Ok(coordinate) = position_to_coordinate(position) {
                    boundary.expand(coordinate);
                }
            }
        }
        boundary
    }
}

impl FromStr for OsmPatch {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        let geojson: GeoJson = s.parse()?;
        OsmPatch::from_geojson(geojson)
    }
}

fn positions(value: &Value) -> Vec<&Vec<f64>> {
    match value {
        Value::Point(p) => vec![p],
        Value::MultiPoint(ps) | Value::LineString(ps) => ps.iter().collect(),
        Value::MultiLineString(lines) | Value::Polygon(lines) => lines.iter().flatten().collect(),
        Value::MultiPolygon(polygons) => polygons.iter().flatten().flatten().collect(),
        Value::GeometryCollection(_) => Vec::new(),
    }
}

fn parse_feature(feature: Feature) -> Result<PatchFeature> {
    let id = match &feature.id {
        Some(feature::Id::String(s)) => Some(s.clone()),
        Some(feature::Id::Number(n)) => Some(n.to_string()),
        None => None,
    };

    parse_properties(feature.properties.unwrap_or_default(), id.clone(), feature.geometry)
        .map_err(|e| e.with_feature(id.as_deref()))
}

fn parse_properties(
    mut properties: Map<String, JsonValue>,
    id: Option<String>,
    geometry: Option<Geometry>,
) -> Result<PatchFeature> {
    let action = match properties.remove(ACTION_KEY) {
        None | Some(JsonValue::Null) => None,
        Some(JsonValue::String(s)) if s.is_empty() => None,
        Some(JsonValue::String(s)) => Some(s.parse::<Action>()?),
        Some(v) => {
            return Err(ErrorKind::InvalidPatch(format!(
                "{} must be a string, got {}",
                ACTION_KEY, v
            ))
            .into())
        }
    };

    let members = match properties.remove(MEMBERS_KEY) {
        None | Some(JsonValue::Null) => None,
        Some(value) => Some(parse_members(value)?),
    };

    Ok(PatchFeature {
        id,
        geometry,
        action,
        tags: parse_tags(&properties)?,
        members,
    })
}

fn parse_members(value: JsonValue) -> Result<Vec<RelationMember>> {
    let entries: Vec<MemberEntry> = serde_json::from_value(value)?;
    Ok(entries
        .into_iter()
        .map(|e| RelationMember::new(e.kind, e.ref_id, &e.role))
        .collect())
}

fn parse_tags(properties: &Map<String, JsonValue>) -> Result<Tags> {
    let mut tags = Tags::new();
    for (key, value) in properties {
        let value = match value {
            JsonValue::Null => continue,
            JsonValue::String(s) => s.clone(),
            JsonValue::Number(n) => n.to_string(),
            JsonValue::Bool(b) => b.to_string(),
            JsonValue::Array(_) | JsonValue::Object(_) => {
                return Err(ErrorKind::InvalidPatch(format!(
                    "Value of tag '{}' must be a string",
                    key
                ))
                .into())
            }
        };
        tags.insert(key.clone(), value);
    }
    Ok(tags)
}
