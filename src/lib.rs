//! This crate turns osmPatch files into [`osmChange`] documents ready to upload to
//! [`Open Street Maps`].
//!
//! An osmPatch is a GeoJSON feature collection describing edits to OSM data. New features are
//! plain GeoJSON features, changes to existing features name the feature by id (`n123`, `w123`
//! or `r123`) and carry an `__action` property (`edit`, `move` or `delete`).
//!
//! The work is split in a few modules:
//! * [`patch`] reads and merges patches.
//! * [`fetch`] fetches the existing features a patch refers to, through a [`FeatureSource`].
//! * [`tags`], [`members`] and [`expand`] turn single patch features into OSM elements.
//! * [`compile`] puts it all together and produces an [`OsmChange`].
//! * [`geo`] computes the extent of a change, for previewing it.
//! * [`osm_io`] reads and writes OSM XML.
//!
//! # Examples
//! ```
//! use nz_osm_patch::fetch::LocalSource;
//! use nz_osm_patch::osm_io::{write_change, ChangeFile};
//! use nz_osm_patch::patch::OsmPatch;
//! use nz_osm_patch::compile;
//!
//! let patch: OsmPatch = r#"{
//!     "type": "FeatureCollection",
//!     "features": [{
//!         "type": "Feature",
//!         "id": "new-cafe",
//!         "geometry": { "type": "Point", "coordinates": [174.8, -36.8] },
//!         "properties": { "amenity": "cafe" }
//!     }]
//! }"#.parse().unwrap();
//!
//! let compiled = compile(&patch, &LocalSource::default(), None).unwrap();
//! assert_eq!(compiled.change.create.len(), 1);
//!
//! let file = ChangeFile { change: compiled.change, changeset_tags: patch.changeset_tags };
//! let xml = write_change(Vec::new(), &file, -1).unwrap();
//! assert!(String::from_utf8(xml).unwrap().contains(r#"<node id="-1" lat="-36.8" lon="174.8""#));
//! ```
//!
//! [`osmChange`]: https://wiki.openstreetmap.org/wiki/OsmChange
//! [`Open Street Maps`]: https://wiki.openstreetmap.org/wiki/Main_Page
//! [`patch`]: patch/index.html
//! [`fetch`]: fetch/index.html
//! [`FeatureSource`]: fetch/trait.FeatureSource.html
//! [`tags`]: tags/index.html
//! [`members`]: members/index.html
//! [`expand`]: expand/index.html
//! [`compile`]: fn.compile.html
//! [`OsmChange`]: struct.OsmChange.html
//! [`geo`]: geo/index.html
//! [`osm_io`]: osm_io/index.html
mod change;
mod compile;
mod element;
mod error;
pub mod expand;
pub mod fetch;
pub mod geo;
pub mod members;
pub mod osm_io;
pub mod patch;
pub mod tags;

pub use change::OsmChange;
pub use compile::{compile, compile_with_options, CompileOptions, Compiled, SkippedFeature};
pub use element::*;
pub use error::{Error, ErrorKind, Result};
pub use members::update_members;
pub use tags::update_tags;
