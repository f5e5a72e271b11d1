//! IO functionality for OSM XML.
//!
//! Two documents are supported:
//! * [`OSM XML`] (`<osm>`), as returned by the API when fetching features. Read with
//!   [`read_features`].
//! * [`osmChange`] (`<osmChange>`, `.osc` files), the payload of a changeset upload. Read with
//!   [`read_change`] and written with [`write_change`].
//!
//! Error handling is defined in the [`error`] module.
//!
//! # Examples
//! Write a change to a file, then read it back:
//! ```rust,no_run
//! use nz_osm_patch::osm_io::{read_change_file, write_change_file, ChangeFile};
//! # use nz_osm_patch::osm_io::error::Error;
//! # fn main() -> Result<(), Error> {
//! let file = ChangeFile::default();
//! write_change_file("upload.osc", &file, -1)?;
//!
//! let file = read_change_file("upload.osc")?;
//! assert!(file.change.is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! [`OSM XML`]: https://wiki.openstreetmap.org/wiki/OSM_XML
//! [`osmChange`]: https://wiki.openstreetmap.org/wiki/OsmChange
//! [`read_features`]: fn.read_features.html
//! [`read_change`]: fn.read_change.html
//! [`write_change`]: fn.write_change.html
//! [`error`]: error/index.html
pub mod error;
mod xml;

use self::error::Error;
use self::xml::{ChangeWriter, XmlReader};
use crate::{OsmChange, OsmFeature, Tags};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

/// An osmChange document: the change and the changeset tags stored alongside it.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ChangeFile {
    pub change: OsmChange,
    pub changeset_tags: Tags,
}

/// Read all elements of an `<osm>` document, in document order.
pub fn read_features<R: BufRead>(reader: R) -> Result<Vec<OsmFeature>, Error> {
    let document = XmlReader::new(reader).read()?;
    Ok(document.features)
}

/// Convenience function for reading an `.osm` file.
pub fn read_features_file<P: AsRef<Path>>(path: P) -> Result<Vec<OsmFeature>, Error> {
    let file = File::open(path)?;
    read_features(BufReader::new(file))
}

/// Read an `<osmChange>` document.
///
/// # Example
/// ```
/// # use nz_osm_patch::osm_io::read_change;
/// let xml = r#"<osmChange version="0.6">
///     <delete><node id="4" lat="-41.2" lon="174.7" version="3"/></delete>
/// </osmChange>"#;
/// let file = read_change(xml.as_bytes()).unwrap();
/// assert_eq!(file.change.delete.len(), 1);
/// ```
pub fn read_change<R: BufRead>(reader: R) -> Result<ChangeFile, Error> {
    let document = XmlReader::new(reader).read()?;
    Ok(ChangeFile {
        change: document.change,
        changeset_tags: document.changeset_tags,
    })
}

/// Convenience function for reading an `.osc` file.
pub fn read_change_file<P: AsRef<Path>>(path: P) -> Result<ChangeFile, Error> {
    let file = File::open(path)?;
    read_change(BufReader::new(file))
}

/// Write an `<osmChange>` document. Every element is attributed to `changeset`, use `-1` when
/// the changeset is not opened yet.
pub fn write_change<W: Write>(writer: W, file: &ChangeFile, changeset: i64) -> Result<W, Error> {
    let mut writer = ChangeWriter::new(writer, changeset);
    writer.write(file)?;
    Ok(writer.into_inner())
}

/// Convenience function for writing an `.osc` file.
pub fn write_change_file<P: AsRef<Path>>(
    path: P,
    file: &ChangeFile,
    changeset: i64,
) -> Result<(), Error> {
    let output = File::create(path)?;
    write_change(output, file, changeset)?;
    Ok(())
}
