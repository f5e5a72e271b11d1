use crate::error::{Error, ErrorKind, Result};
use crate::expand::{expand_geometry, geometry_name, position_to_coordinate, IdAllocator};
use crate::fetch::{fetch_chunked, FeatureSource, FetchCache, ToFetch, DEFAULT_CHUNK_SIZE};
use crate::members::update_members;
use crate::patch::{Action, OsmPatch, PatchFeature};
use crate::tags::update_tags;
use crate::{ElementId, OsmChange, OsmFeature};
use geojson::Value;
use log::{debug, warn};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

/// Settings for [`compile_with_options`].
///
/// Missing fields take their default when deserialized, so `{}` is a valid configuration.
///
/// [`compile_with_options`]: fn.compile_with_options.html
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Max number of ids per fetch request.
    pub chunk_size: usize,
    /// Fail when the same existing feature is referenced by more than one action.
    pub reject_duplicates: bool,
}

/// Result of compiling a patch.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Compiled {
    pub change: OsmChange,
    /// Every feature referenced by the patch, plus anything passed in as existing cache.
    pub fetch_cache: FetchCache,
    /// Patch feature id of each created feature, to the id of the element carrying its tags.
    pub created: HashMap<String, ElementId>,
    /// Features that could not be created.
    pub skipped: Vec<SkippedFeature>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedFeature {
    pub feature_id: Option<String>,
    /// GeoJSON geometry type, e.g. `Polygon`.
    pub geometry: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            chunk_size: DEFAULT_CHUNK_SIZE,
            reject_duplicates: true,
        }
    }
}

/// Compile `patch` into a change, with default options.
///
/// Features referenced by edit, move and delete actions are fetched from `source` unless they
/// are in `existing` already. See [`compile_with_options`].
///
/// # Examples
/// ```
/// # use nz_osm_patch::{compile, OsmFeature};
/// # use nz_osm_patch::fetch::LocalSource;
/// # use nz_osm_patch::patch::OsmPatch;
/// let source = LocalSource::from_reader(
///     r#"<osm><node id="100" lat="-41.29" lon="174.78" version="3">
///         <tag k="name" v="Old"/>
///     </node></osm>"#.as_bytes(),
/// ).unwrap();
///
/// let patch: OsmPatch = r#"{"type": "FeatureCollection", "features": [{
///     "type": "Feature", "id": "n100", "geometry": null,
///     "properties": { "__action": "edit", "name": "🗑️" }
/// }]}"#.parse().unwrap();
///
/// let compiled = compile(&patch, &source, None).unwrap();
/// let edited = &compiled.change.modify[0];
/// assert_eq!(edited.version(), 3);
/// assert!(edited.tags().is_empty());
/// ```
///
/// [`compile_with_options`]: fn.compile_with_options.html
pub fn compile<S: FeatureSource + ?Sized>(
    patch: &OsmPatch,
    source: &S,
    existing: Option<&FetchCache>,
) -> Result<Compiled> {
    compile_with_options(patch, source, existing, &CompileOptions::default())
}

/// Compile `patch` into a change.
///
/// All referenced features are fetched before anything is compiled, then each patch feature is
/// handled in document order:
/// * `edit`: tags (and members of relations) are updated, the result is modified.
/// * `move`: the node is moved to the second position of the feature's two point line.
/// * `delete`: the fetched feature is deleted as is.
/// * no action: new features are created from the geometry. Geometry that can't be created is
///   skipped and listed in [`Compiled::skipped`].
///
/// Any other failure fails the whole compile, with the id of the offending patch feature
/// attached to the error when known.
///
/// [`Compiled::skipped`]: struct.Compiled.html#structfield.skipped
pub fn compile_with_options<S: FeatureSource + ?Sized>(
    patch: &OsmPatch,
    source: &S,
    existing: Option<&FetchCache>,
    options: &CompileOptions,
) -> Result<Compiled> {
    let to_fetch = referenced_features(patch, options.reject_duplicates)?;
    let fetch_cache = fetch_chunked(source, &to_fetch, existing, options.chunk_size)?;

    let mut compiler = Compiler::new(&fetch_cache);
    for feature in &patch.features {
        compiler
            .add(feature)
            .map_err(|e| e.with_feature(feature.id.as_deref()))?;
    }
    let Compiler {
        change,
        created,
        skipped,
        ..
    } = compiler;

    debug!(
        create = change.create.len(),
        modify = change.modify.len(),
        delete = change.delete.len(),
        skipped = skipped.len();
        "Compiled patch"
    );

    Ok(Compiled {
        change,
        fetch_cache,
        created,
        skipped,
    })
}

/// Parse the id of a feature with an action.
fn element_id(feature: &PatchFeature) -> Result<ElementId> {
    let id = feature
        .id
        .as_deref()
        .ok_or_else(|| ErrorKind::InvalidPatch("Feature with an action has no id".to_owned()))?;
    id.parse::<ElementId>()
        .map_err(|e| ErrorKind::InvalidPatch(e).into())
}

/// Collect the ids of all existing features the patch refers to.
fn referenced_features(patch: &OsmPatch, reject_duplicates: bool) -> Result<ToFetch> {
    let mut seen = HashSet::new();
    let mut to_fetch = ToFetch::default();

    for feature in patch.features.iter().filter(|f| f.action.is_some()) {
        let id = element_id(feature).map_err(|e| e.with_feature(feature.id.as_deref()))?;
        if !seen.insert(id) && reject_duplicates {
            return Err(Error::new(
                ErrorKind::DuplicateFeature(id),
                feature.id.clone(),
            ));
        }
        to_fetch.push(id);
    }

    Ok(to_fetch)
}

struct Compiler<'a> {
    cache: &'a FetchCache,
    ids: IdAllocator,
    change: OsmChange,
    created: HashMap<String, ElementId>,
    skipped: Vec<SkippedFeature>,
}

impl<'a> Compiler<'a> {
    fn new(cache: &'a FetchCache) -> Self {
        Compiler {
            cache,
            ids: IdAllocator::new(),
            change: OsmChange::default(),
            created: HashMap::new(),
            skipped: Vec::new(),
        }
    }

    fn add(&mut self, feature: &PatchFeature) -> Result<()> {
        match feature.action {
            Some(Action::Edit) => self.edit(feature),
            Some(Action::Move) => self.move_node(feature),
            Some(Action::Delete) => {
                let original = self.original(feature)?;
                self.change.delete.push(original.clone());
                Ok(())
            }
            None => self.create(feature),
        }
    }

    fn original(&self, feature: &PatchFeature) -> Result<&'a OsmFeature> {
        let id = element_id(feature)?;
        self.cache
            .get(&id)
            .ok_or_else(|| ErrorKind::FeatureNotFound(id).into())
    }

    fn edit(&mut self, feature: &PatchFeature) -> Result<()> {
        let original = self.original(feature)?;
        let mut updated = update_tags(original, &feature.tags);

        if let Some(diff) = &feature.members {
            match &mut updated {
                OsmFeature::Relation(relation) => {
                    relation.members = update_members(&relation.members, diff);
                }
                other => warn!(
                    feature = other.element_id().to_string().as_str();
                    "Ignoring member changes, not a relation"
                ),
            }
        }

        self.change.modify.push(updated);
        Ok(())
    }

    fn move_node(&mut self, feature: &PatchFeature) -> Result<()> {
        let original = self.original(feature)?;
        if !matches!(original, OsmFeature::Node(_)) {
            return Err(ErrorKind::InvalidMove(format!(
                "{} is not a node",
                original.element_id()
            ))
            .into());
        }

        let target = match feature.geometry.as_ref().map(|g| &g.value) {
            Some(Value::LineString(positions)) if positions.len() == 2 => &positions[1],
            _ => {
                return Err(ErrorKind::InvalidMove(
                    "Geometry must be a LineString from the old to the new position".to_owned(),
                )
                .into())
            }
        };
        let coordinate = position_to_coordinate(target)?;

        let mut updated = update_tags(original, &feature.tags);
        if let OsmFeature::Node(node) = &mut updated {
            node.coordinate = coordinate;
        }
        self.change.modify.push(updated);
        Ok(())
    }

    fn create(&mut self, feature: &PatchFeature) -> Result<()> {
        let geometry = feature.geometry.as_ref().ok_or_else(|| {
            ErrorKind::InvalidPatch("Feature to create has no geometry".to_owned())
        })?;

        if feature.members.is_some() && !matches!(geometry.value, Value::GeometryCollection(_)) {
            warn!(
                feature = feature.id.as_deref().unwrap_or(""),
                geometry = geometry_name(&geometry.value);
                "Ignoring members, not a GeometryCollection"
            );
        }

        let features = match expand_geometry(
            &mut self.ids,
            geometry,
            feature.tags.clone(),
            feature.members.as_deref(),
        ) {
            Ok(features) => features,
            Err(ErrorKind::UnsupportedGeometry(name)) => {
                warn!(
                    feature = feature.id.as_deref().unwrap_or(""),
                    geometry = name.as_str();
                    "Skipping feature, geometry can't be created"
                );
                self.skipped.push(SkippedFeature {
                    feature_id: feature.id.clone(),
                    geometry: name,
                });
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if let (Some(id), Some(root)) = (&feature.id, features.last()) {
            self.created.insert(id.clone(), root.element_id());
        }
        self.change.create.extend(features);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::compile::{compile, compile_with_options, CompileOptions, SkippedFeature};
    use crate::error::{ErrorKind, Result};
    use crate::fetch::{FeatureSource, FetchCache, LocalSource};
    use crate::geo::Coordinate;
    use crate::patch::OsmPatch;
    use crate::{
        tags_from, ElementId, ElementType, Meta, Node, OsmFeature, Relation, RelationMember, Way,
    };
    use std::cell::Cell;

    fn patch(features: &str) -> OsmPatch {
        format!(r#"{{"type": "FeatureCollection", "features": [{}]}}"#, features)
            .parse()
            .unwrap()
    }

    fn source() -> LocalSource {
        LocalSource::new(vec![
            Node {
                id: 100,
                coordinate: Coordinate::new(-41.29, 174.78),
                meta: Meta {
                    tags: tags_from(&[("name", "Old")]),
                    version: 3,
                    author: None,
                },
            }
            .into(),
            Way {
                id: 20,
                refs: vec![100],
                meta: Meta {
                    tags: tags_from(&[("highway", "footway")]),
                    version: 7,
                    author: None,
                },
            }
            .into(),
            Relation {
                id: 5,
                members: vec![
                    RelationMember::node(100, "stop"),
                    RelationMember::way(20, ""),
                ],
                meta: Meta {
                    tags: tags_from(&[("type", "route")]),
                    version: 2,
                    author: None,
                },
            }
            .into(),
        ])
    }

    #[test]
    fn create_point() {
        let patch = patch(
            r#"{ "type": "Feature", "id": "cafe",
                 "geometry": { "type": "Point", "coordinates": [174.8, -36.8] },
                 "properties": { "amenity": "cafe" } }"#,
        );
        let compiled = compile(&patch, &source(), None).unwrap();

        let expected: OsmFeature = Node {
            id: -1,
            coordinate: Coordinate::new(-36.8, 174.8),
            meta: Meta {
                tags: tags_from(&[("amenity", "cafe")]),
                version: 0,
                author: None,
            },
        }
        .into();
        assert_eq!(compiled.change.create, vec![expected]);
        assert!(compiled.change.modify.is_empty());
        assert!(compiled.change.delete.is_empty());
        assert_eq!(compiled.created["cafe"], ElementId::node(-1));
    }

    #[test]
    fn edit_node() {
        let patch = patch(
            r#"{ "type": "Feature", "id": "n100", "geometry": null,
                 "properties": { "__action": "edit", "name": "🗑️" } }"#,
        );
        let compiled = compile(&patch, &source(), None).unwrap();

        match &compiled.change.modify[..] {
            [OsmFeature::Node(node)] => {
                assert_eq!(node.id, 100);
                assert_eq!(node.meta.version, 3);
                assert!(node.meta.tags.is_empty());
                assert_eq!(node.coordinate, Coordinate::new(-41.29, 174.78));
            }
            f => panic!("Unexpected change {:?}", f),
        }

        // The fetched original is left as it was.
        let cached = compiled.fetch_cache.get(&ElementId::node(100)).unwrap();
        assert_eq!(cached.tags(), &tags_from(&[("name", "Old")]));
    }

    #[test]
    fn edit_relation_members() {
        let patch = patch(
            r#"{ "type": "Feature", "id": "r5", "geometry": null,
                 "properties": { "__action": "edit", "name": "Route 1",
                                 "__members": [{ "type": "node", "ref": 100, "role": "🗑️" },
                                               { "type": "node", "ref": 101, "role": "stop" }] } }"#,
        );
        let compiled = compile(&patch, &source(), None).unwrap();

        match &compiled.change.modify[..] {
            [OsmFeature::Relation(rel)] => {
                assert_eq!(
                    rel.members,
                    vec![RelationMember::way(20, ""), RelationMember::node(101, "stop")]
                );
                assert_eq!(
                    rel.meta.tags,
                    tags_from(&[("name", "Route 1"), ("type", "route")])
                );
                assert_eq!(rel.meta.version, 2);
            }
            f => panic!("Unexpected change {:?}", f),
        }
    }

    #[test]
    fn members_on_way_are_ignored() {
        let patch = patch(
            r#"{ "type": "Feature", "id": "w20", "geometry": null,
                 "properties": { "__action": "edit",
                                 "__members": [{ "type": "node", "ref": 1 }] } }"#,
        );
        let compiled = compile(&patch, &source(), None).unwrap();
        match &compiled.change.modify[..] {
            [OsmFeature::Way(way)] => assert_eq!(way.refs, vec![100]),
            f => panic!("Unexpected change {:?}", f),
        }
    }

    #[test]
    fn move_node() {
        let patch = patch(
            r#"{ "type": "Feature", "id": "n100",
                 "geometry": { "type": "LineString", "coordinates": [[174.78, -41.29], [174.79, -41.3]] },
                 "properties": { "__action": "move" } }"#,
        );
        let compiled = compile(&patch, &source(), None).unwrap();

        match &compiled.change.modify[..] {
            [OsmFeature::Node(node)] => {
                assert_eq!(node.coordinate, Coordinate::new(-41.3, 174.79));
                assert_eq!(node.meta.tags, tags_from(&[("name", "Old")]));
                assert_eq!(node.meta.version, 3);
            }
            f => panic!("Unexpected change {:?}", f),
        }
    }

    #[test]
    fn move_way_is_invalid() {
        let patch = patch(
            r#"{ "type": "Feature", "id": "w20",
                 "geometry": { "type": "LineString", "coordinates": [[1.0, 2.0], [3.0, 4.0]] },
                 "properties": { "__action": "move" } }"#,
        );
        let err = compile(&patch, &source(), None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Feature 'w20': Invalid move: w20 is not a node"
        );
    }

    #[test]
    fn move_without_line_is_invalid() {
        let patch = patch(
            r#"{ "type": "Feature", "id": "n100",
                 "geometry": { "type": "Point", "coordinates": [1.0, 2.0] },
                 "properties": { "__action": "move" } }"#,
        );
        let err = compile(&patch, &source(), None).unwrap_err();
        match err.kind() {
            ErrorKind::InvalidMove(_) => {}
            e => panic!("Unexpected error {:?}", e),
        }
    }

    #[test]
    fn move_line_with_three_points_is_invalid() {
        let patch = patch(
            r#"{ "type": "Feature", "id": "n100",
                 "geometry": { "type": "LineString",
                               "coordinates": [[174.78, -41.29], [174.79, -41.3], [174.8, -41.31]] },
                 "properties": { "__action": "move" } }"#,
        );
        let err = compile(&patch, &source(), None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Feature 'n100': Invalid move: Geometry must be a LineString from the old to the new position"
        );
    }

    #[test]
    fn move_line_with_one_point_is_invalid() {
        let patch = patch(
            r#"{ "type": "Feature", "id": "n100",
                 "geometry": { "type": "LineString", "coordinates": [[174.79, -41.3]] },
                 "properties": { "__action": "move" } }"#,
        );
        let err = compile(&patch, &source(), None).unwrap_err();
        match err.kind() {
            ErrorKind::InvalidMove(_) => {}
            e => panic!("Unexpected error {:?}", e),
        }
    }

    /// Answers the first request, fails every later one.
    struct FailingLater {
        inner: LocalSource,
        requests: Cell<usize>,
    }

    impl FeatureSource for FailingLater {
        fn get_features(&self, kind: ElementType, ids: &[i64]) -> Result<Vec<OsmFeature>> {
            self.requests.set(self.requests.get() + 1);
            if self.requests.get() > 1 {
                return Err(ErrorKind::Fetch("Server unavailable".to_owned()).into());
            }
            self.inner.get_features(kind, ids)
        }
    }

    #[test]
    fn fetch_failure_fails_compile() {
        let source = FailingLater {
            inner: source(),
            requests: Cell::new(0),
        };
        let patch = patch(
            r#"{ "type": "Feature", "id": "n100", "geometry": null,
                 "properties": { "__action": "edit", "name": "New" } },
               { "type": "Feature", "id": "w20", "geometry": null,
                 "properties": { "__action": "delete" } }"#,
        );
        let options = CompileOptions {
            chunk_size: 1,
            ..CompileOptions::default()
        };

        let err = compile_with_options(&patch, &source, None, &options).unwrap_err();
        match err.kind() {
            ErrorKind::Fetch(message) => assert_eq!(message, "Server unavailable"),
            e => panic!("Unexpected error {:?}", e),
        }
        assert_eq!(source.requests.get(), 2);
    }

    #[test]
    fn create_with_members_on_point() {
        let patch = patch(
            r#"{ "type": "Feature", "id": "stop",
                 "geometry": { "type": "Point", "coordinates": [174.78, -41.29] },
                 "properties": { "highway": "bus_stop",
                                 "__members": [{ "type": "node", "ref": 100, "role": "" }] } }"#,
        );
        let compiled = compile(&patch, &source(), None).unwrap();
        assert_eq!(compiled.change.create.len(), 1);
        assert_eq!(
            compiled.change.create[0].element_id(),
            ElementId::node(-1)
        );
    }

    #[test]
    fn delete_keeps_original() {
        let patch = patch(
            r#"{ "type": "Feature", "id": "w20", "geometry": null,
                 "properties": { "__action": "delete", "name": "ignored" } }"#,
        );
        let source = source();
        let compiled = compile(&patch, &source, None).unwrap();

        let original = compiled.fetch_cache.get(&ElementId::way(20)).unwrap();
        assert_eq!(compiled.change.delete, vec![original.clone()]);
        assert_eq!(original.version(), 7);
    }

    #[test]
    fn referenced_feature_not_found() {
        let patch = patch(
            r#"{ "type": "Feature", "id": "n404", "geometry": null,
                 "properties": { "__action": "delete" } }"#,
        );
        let err = compile(&patch, &source(), None).unwrap_err();
        match err.kind() {
            ErrorKind::FeatureNotFound(id) => assert_eq!(*id, ElementId::node(404)),
            e => panic!("Unexpected error {:?}", e),
        }
        assert_eq!(err.feature(), Some("n404"));
    }

    #[test]
    fn malformed_id() {
        let patch = patch(
            r#"{ "type": "Feature", "id": "x1", "geometry": null,
                 "properties": { "__action": "delete" } }"#,
        );
        let err = compile(&patch, &source(), None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Feature 'x1': Invalid patch: 'x1' does not start with n, w or r."
        );
    }

    #[test]
    fn duplicate_references() {
        let patch = patch(
            r#"{ "type": "Feature", "id": "n100", "geometry": null,
                 "properties": { "__action": "edit", "name": "New" } },
               { "type": "Feature", "id": "n100", "geometry": null,
                 "properties": { "__action": "delete" } }"#,
        );
        let err = compile(&patch, &source(), None).unwrap_err();
        match err.kind() {
            ErrorKind::DuplicateFeature(id) => assert_eq!(*id, ElementId::node(100)),
            e => panic!("Unexpected error {:?}", e),
        }

        let options = CompileOptions {
            reject_duplicates: false,
            ..CompileOptions::default()
        };
        let compiled = compile_with_options(&patch, &source(), None, &options).unwrap();
        assert_eq!(compiled.change.modify.len(), 1);
        assert_eq!(compiled.change.delete.len(), 1);
    }

    #[test]
    fn unsupported_geometry_is_skipped() {
        let patch = patch(
            r#"{ "type": "Feature", "id": "lake",
                 "geometry": { "type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]] },
                 "properties": { "natural": "water" } },
               { "type": "Feature", "id": "peak",
                 "geometry": { "type": "Point", "coordinates": [170.1, -43.6] },
                 "properties": { "natural": "peak" } }"#,
        );
        let compiled = compile(&patch, &source(), None).unwrap();

        assert_eq!(
            compiled.skipped,
            vec![SkippedFeature {
                feature_id: Some("lake".to_owned()),
                geometry: "Polygon".to_owned(),
            }]
        );
        assert_eq!(compiled.change.create.len(), 1);
        assert_eq!(compiled.change.create[0].id(), -1);
        assert!(!compiled.created.contains_key("lake"));
    }

    #[test]
    fn create_without_geometry() {
        let patch = patch(r#"{ "type": "Feature", "id": "a", "geometry": null, "properties": {} }"#);
        let err = compile(&patch, &source(), None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Feature 'a': Invalid patch: Feature to create has no geometry"
        );
    }

    #[test]
    fn ids_are_shared_between_features() {
        let patch = patch(
            r#"{ "type": "Feature", "id": "a",
                 "geometry": { "type": "LineString", "coordinates": [[1.0, 2.0], [3.0, 4.0]] },
                 "properties": { "highway": "path" } },
               { "type": "Feature", "id": "b",
                 "geometry": { "type": "Point", "coordinates": [5.0, 6.0] },
                 "properties": {} }"#,
        );
        let compiled = compile(&patch, &source(), None).unwrap();
        let ids: Vec<_> = compiled
            .change
            .create
            .iter()
            .map(OsmFeature::element_id)
            .collect();
        assert_eq!(
            ids,
            vec![
                ElementId::node(-1),
                ElementId::node(-2),
                ElementId::way(-1),
                ElementId::node(-3),
            ]
        );
        assert_eq!(compiled.created["a"], ElementId::way(-1));
        assert_eq!(compiled.created["b"], ElementId::node(-3));
    }

    #[test]
    fn existing_cache_is_used_and_kept() {
        let existing: FetchCache = vec![OsmFeature::from(Node {
            id: 7,
            ..Node::default()
        })]
        .into_iter()
        .collect();
        let patch = patch(
            r#"{ "type": "Feature", "id": "n100", "geometry": null,
                 "properties": { "__action": "delete" } }"#,
        );
        let compiled = compile(&patch, &source(), Some(&existing)).unwrap();
        assert!(compiled.fetch_cache.contains(&ElementId::node(7)));
        assert!(compiled.fetch_cache.contains(&ElementId::node(100)));
        assert_eq!(existing.len(), 1);
    }

    #[test]
    fn options_from_json() {
        let options: CompileOptions = serde_json::from_str(r#"{ "chunk_size": 50 }"#).unwrap();
        assert_eq!(
            options,
            CompileOptions {
                chunk_size: 50,
                reject_duplicates: true,
            }
        );
    }
}
