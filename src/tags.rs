//! Applying a tag diff from a patch to an existing feature.
use crate::{OsmFeature, Tags};

/// Tag value in a diff meaning "remove this tag", as opposed to setting it to an empty string.
pub const DELETE_SENTINEL: &str = "🗑️";

/// Keys that are removed from every feature we touch, whatever their value.
const DEPRECATED_KEYS: &[&str] = &[
    "source_ref",
    "linz2osm:objectid",
    "LINZ2OSM:dataset",
    "LINZ2OSM:layer",
    "LINZ:layer",
    "LINZ2OSM:source_version",
    "LINZ:source_version",
    "LINZ:dataset",
];

/// Tags that are removed only when they have exactly this value.
const DEPRECATED_VALUES: &[(&str, &str)] = &[
    ("attribution", "http://wiki.osm.org/wiki/Attribution#LINZ"),
    ("attribution", "http://wiki.openstreetmap.org/wiki/Attribution#LINZ"),
    (
        "attribution",
        "http://www.aucklandcouncil.govt.nz/EN/ratesbuildingproperty/propertyinformation/GIS_maps/Pages/opendata.aspx",
    ),
];

/// Returns a copy of `original` with `diff` applied to its tags. `original` is not modified.
///
/// Every `(key, value)` of the diff sets the tag, unless the value is [`DELETE_SENTINEL`] in
/// which case the tag is removed. Deprecated import tags are then stripped the way editors do
/// when a feature is touched anyway. When `source_ref` is stripped and nothing else records
/// where the data came from (no `source`, `ref:linz:*` or `building` tag), `source=LINZ` is
/// added in its place.
///
/// # Examples
/// ```
/// # use nz_osm_patch::{tags_from, update_tags, Node, OsmFeature, Meta};
/// let original: OsmFeature = Node {
///     meta: Meta { tags: tags_from(&[("name", "Old"), ("shop", "bakery")]), ..Meta::default() },
///     ..Node::default()
/// }.into();
///
/// let updated = update_tags(&original, &tags_from(&[("name", "🗑️"), ("opening_hours", "24/7")]));
/// assert_eq!(updated.tags(), &tags_from(&[("shop", "bakery"), ("opening_hours", "24/7")]));
/// ```
///
/// [`DELETE_SENTINEL`]: constant.DELETE_SENTINEL.html
pub fn update_tags(original: &OsmFeature, diff: &Tags) -> OsmFeature {
    let mut updated = original.clone();
    let tags = &mut updated.meta_mut().tags;

    for (key, value) in diff {
        if value == DELETE_SENTINEL {
            tags.remove(key);
        } else {
            tags.insert(key.clone(), value.clone());
        }
    }

    strip_deprecated(tags);
    updated
}

fn is_deprecated(key: &str, value: &str) -> bool {
    DEPRECATED_KEYS.contains(&key) || DEPRECATED_VALUES.contains(&(key, value))
}

fn strip_deprecated(tags: &mut Tags) {
    let stripped_source_ref = tags.contains_key("source_ref");
    tags.retain(|key, value| !is_deprecated(key, value));

    if stripped_source_ref
        && !tags.contains_key("source")
        && !tags.contains_key("building")
        && !tags.keys().any(|key| key.starts_with("ref:linz:"))
    {
        tags.insert("source".to_owned(), "LINZ".to_owned());
    }
}
