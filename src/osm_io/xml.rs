//! Base module for reading and writing osm xml data.
//! See: https://wiki.openstreetmap.org/wiki/OSM_XML

mod reader;
mod writer;

pub use self::reader::*;
pub use self::writer::*;

#[cfg(test)]
mod test {
    use crate::osm_io::error::ErrorKind;
    use crate::osm_io::{read_change, read_features};

    #[test]
    fn quick_xml_error() {
        let xml = r#"
            <osm>
            </wrong-element>
        "#;
        let error = read_features(xml.as_bytes()).unwrap_err();
        match error.kind() {
            ErrorKind::Xml(_) => {}
            e => panic!("Unexpected kind {:?}", e),
        }
        assert!(error.line().is_some());
    }

    #[test]
    fn sections_are_kept_apart() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <osmChange version="0.6">
                <create><node id="-1" lat="1" lon="2" version="0"/></create>
                <modify><way id="7" version="4"><nd ref="1"/></way></modify>
                <delete><relation id="9" version="2"></relation></delete>
            </osmChange>"#;
        let file = read_change(xml.as_bytes()).unwrap();

        assert_eq!(file.change.create[0].id(), -1);
        assert_eq!(file.change.modify[0].id(), 7);
        assert_eq!(file.change.delete[0].id(), 9);
        assert_eq!(file.change.len(), 3);
    }
}
