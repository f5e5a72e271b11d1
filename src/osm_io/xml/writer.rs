use crate::osm_io::error::{Error, Result};
use crate::osm_io::ChangeFile;
use crate::{Meta, Node, OsmFeature, Relation, RelationMember, Tags, Way};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use std::io::Write;

const OSM_VERSION: &str = "0.6";
const OSM_GENERATOR: &str = concat!("nz_osm_patch ", env!("CARGO_PKG_VERSION"));
const XML_VERSION: &[u8] = b"1.0";
const XML_ENCODING: &[u8] = b"UTF-8";

/// A writer for the osmChange format, indented with tabs.
///
/// Every element is attributed to the changeset given on creation.
pub struct ChangeWriter<W: Write> {
    writer: Writer<W>,
    changeset: i64,
}

impl<W: Write> ChangeWriter<W> {
    pub fn new(inner: W, changeset: i64) -> ChangeWriter<W> {
        ChangeWriter {
            writer: Writer::new(inner),
            changeset,
        }
    }

    pub fn write(&mut self, file: &ChangeFile) -> std::result::Result<(), Error> {
        self.write_document(file).map_err(Error::from)
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn write_document(&mut self, file: &ChangeFile) -> Result<()> {
        self.write_start()?;

        if !file.changeset_tags.is_empty() {
            self.open(1, BytesStart::borrowed_name(b"changeset"))?;
            self.write_tags(&file.changeset_tags, 2)?;
            self.close(1, b"changeset")?;
        }

        self.write_section(b"create", &file.change.create)?;
        self.write_section(b"modify", &file.change.modify)?;
        self.write_section(b"delete", &file.change.delete)?;

        self.writer
            .write_event(Event::End(BytesEnd::borrowed(b"osmChange")))?;
        Ok(())
    }

    /// Xml declaration and the <osmChange> start tag.
    fn write_start(&mut self) -> Result<()> {
        self.writer.write_event(Event::Decl(BytesDecl::new(
            XML_VERSION,
            Some(XML_ENCODING),
            None,
        )))?;
        self.writer.write(b"\n")?;

        let elem = BytesStart::borrowed_name(b"osmChange")
            .with_attributes(vec![("version", OSM_VERSION), ("generator", OSM_GENERATOR)]);
        self.open(0, elem)
    }

    /// One of <create>, <modify> or <delete>. Empty sections are left out.
    fn write_section(&mut self, name: &[u8], features: &[OsmFeature]) -> Result<()> {
        if features.is_empty() {
            return Ok(());
        }

        self.open(1, BytesStart::borrowed_name(name))?;
        for feature in features {
            match feature {
                OsmFeature::Node(node) => self.write_node(node)?,
                OsmFeature::Way(way) => self.write_way(way)?,
                OsmFeature::Relation(rel) => self.write_relation(rel)?,
            }
        }
        self.close(1, name)
    }

    /// Nodes without tags are written as empty elements.
    fn write_node(&mut self, node: &Node) -> Result<()> {
        let mut elem = BytesStart::borrowed_name(b"node").with_attributes(vec![
            ("id", node.id.to_string().as_str()),
            ("lat", node.coordinate.lat.to_string().as_str()),
            ("lon", node.coordinate.lon.to_string().as_str()),
        ]);
        self.add_meta_attributes(&mut elem, &node.meta);

        if node.meta.tags.is_empty() {
            return self.empty(2, elem);
        }

        self.open(2, elem)?;
        self.write_tags(&node.meta.tags, 3)?;
        self.close(2, b"node")
    }

    fn write_way(&mut self, way: &Way) -> Result<()> {
        let mut elem = BytesStart::borrowed_name(b"way");
        elem.push_attribute(("id", way.id.to_string().as_str()));
        self.add_meta_attributes(&mut elem, &way.meta);
        self.open(2, elem)?;

        for node_ref in &way.refs {
            let mut nd = BytesStart::borrowed_name(b"nd");
            nd.push_attribute(("ref", node_ref.to_string().as_str()));
            self.empty(3, nd)?;
        }

        self.write_tags(&way.meta.tags, 3)?;
        self.close(2, b"way")
    }

    fn write_relation(&mut self, rel: &Relation) -> Result<()> {
        let mut elem = BytesStart::borrowed_name(b"relation");
        elem.push_attribute(("id", rel.id.to_string().as_str()));
        self.add_meta_attributes(&mut elem, &rel.meta);
        self.open(2, elem)?;

        for member in &rel.members {
            self.empty(3, member_element(member))?;
        }

        self.write_tags(&rel.meta.tags, 3)?;
        self.close(2, b"relation")
    }

    fn write_tags(&mut self, tags: &Tags, depth: usize) -> Result<()> {
        for (key, value) in tags {
            let tag = BytesStart::borrowed_name(b"tag")
                .with_attributes(vec![("k", key.as_str()), ("v", value.as_str())]);
            self.empty(depth, tag)?;
        }
        Ok(())
    }

    /// Version and changeset, which the server needs to apply the change. Author information is
    /// assigned by the server and not written.
    fn add_meta_attributes(&self, elem: &mut BytesStart, meta: &Meta) {
        elem.extend_attributes(vec![
            ("version", meta.version.to_string().as_str()),
            ("changeset", self.changeset.to_string().as_str()),
        ]);
    }

    fn open(&mut self, depth: usize, elem: BytesStart) -> Result<()> {
        self.line(depth, Event::Start(elem))
    }

    fn empty(&mut self, depth: usize, elem: BytesStart) -> Result<()> {
        self.line(depth, Event::Empty(elem))
    }

    fn close(&mut self, depth: usize, name: &[u8]) -> Result<()> {
        self.line(depth, Event::End(BytesEnd::borrowed(name)))
    }

    /// Write `event` on its own line, indented by `depth` tabs.
    fn line(&mut self, depth: usize, event: Event) -> Result<()> {
        for _ in 0..depth {
            self.writer.write(b"\t")?;
        }
        self.writer.write_event(event)?;
        self.writer.write(b"\n")?;
        Ok(())
    }
}

fn member_element(member: &RelationMember) -> BytesStart<'static> {
    BytesStart::borrowed_name(b"member").with_attributes(vec![
        ("type", member.kind.as_str()),
        ("ref", member.ref_id.to_string().as_str()),
        ("role", member.role.as_str()),
    ])
}
