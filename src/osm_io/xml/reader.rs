use crate::geo::Coordinate;
use crate::osm_io::error::{Error, ErrorKind, Result};
use crate::{
    AuthorInformation, ElementType, Meta, Node, OsmChange, OsmFeature, Relation, RelationMember,
    Tags, Way,
};
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::BufRead;
use std::str::FromStr;

/// A reader for both `<osm>` and `<osmChange>` documents.
pub struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    line: u32,
    section: Option<Section>,
}

/// Everything found in a document. Elements outside of any osmChange section end up in
/// `features`.
#[derive(Debug, Default)]
pub struct Document {
    pub features: Vec<OsmFeature>,
    pub change: OsmChange,
    pub changeset_tags: Tags,
}

/// The osmChange section currently being read.
#[derive(Debug, Copy, Clone, PartialEq)]
enum Section {
    Create,
    Modify,
    Delete,
}

/// Unescaped attributes of one XML element, with the element name for error messages.
struct ElementAttributes {
    element: String,
    values: HashMap<String, String>,
}

impl ElementAttributes {
    fn new(event: &BytesStart) -> Self {
        let values = event
            .attributes()
            .filter_map(|attr| attr.ok())
            .filter_map(|attr| {
                let value = attr.unescaped_value().ok()?;
                Some((
                    String::from_utf8_lossy(attr.key).into_owned(),
                    String::from_utf8_lossy(&value).into_owned(),
                ))
            })
            .collect();

        ElementAttributes {
            element: String::from_utf8_lossy(event.name()).into_owned(),
            values,
        }
    }

    fn get(&self, attribute: &str) -> Option<&str> {
        self.values.get(attribute).map(String::as_str)
    }

    fn required(&self, attribute: &str) -> Result<&str> {
        self.get(attribute)
            .ok_or_else(|| ErrorKind::MissingAttribute {
                element: self.element.clone(),
                attribute: attribute.to_owned(),
            })
    }

    fn parse<F: FromStr>(&self, attribute: &str) -> Result<F> {
        let value = self.required(attribute)?;
        parse_value(attribute, value)
    }

    fn has_all(&self, attributes: &[&str]) -> bool {
        attributes.iter().all(|a| self.values.contains_key(*a))
    }

    /// Version defaults to 0 (not uploaded yet), author information is only set when complete.
    fn meta(&self) -> Result<Meta> {
        let author = if self.has_all(&["timestamp", "uid", "user", "changeset"]) {
            Some(AuthorInformation {
                created: parse_timestamp(self.required("timestamp")?)?,
                change_set: self.parse("changeset")?,
                uid: self.parse("uid")?,
                user: self.required("user")?.to_owned(),
            })
        } else {
            None
        };

        let version = match self.get("version") {
            Some(version) => parse_value("version", version)?,
            None => 0,
        };

        Ok(Meta {
            version,
            author,
            ..Meta::default()
        })
    }

    fn member(&self) -> Result<RelationMember> {
        let kind = self.required("type")?;
        let kind = ElementType::from_name(kind).ok_or_else(|| ErrorKind::InvalidAttribute {
            attribute: "type".to_owned(),
            value: kind.to_owned(),
        })?;
        Ok(RelationMember::new(
            kind,
            self.parse("ref")?,
            self.get("role").unwrap_or(""),
        ))
    }

    fn tag(&self) -> Result<(String, String)> {
        Ok((self.required("k")?.to_owned(), self.required("v")?.to_owned()))
    }
}

fn parse_value<F: FromStr>(attribute: &str, value: &str) -> Result<F> {
    value.parse().map_err(|_| ErrorKind::InvalidAttribute {
        attribute: attribute.to_owned(),
        value: value.to_owned(),
    })
}

fn parse_timestamp(value: &str) -> Result<i64> {
    value
        .parse::<DateTime<Utc>>()
        .map(|time| time.timestamp())
        .map_err(|_| ErrorKind::InvalidTimestamp(value.to_owned()))
}

impl<R: BufRead> XmlReader<R> {
    pub fn new(inner: R) -> XmlReader<R> {
        XmlReader {
            reader: Reader::from_reader(inner),
            line: 0,
            section: None,
        }
    }

    pub fn read(&mut self) -> std::result::Result<Document, Error> {
        let mut document = Document::default();
        loop {
            match self.next_event(&mut document) {
                Ok(true) => {}
                Ok(false) => return Ok(document),
                Err(kind) => return Err(Error::new(kind, Some(self.line))),
            }
        }
    }

    /// Handle the next top level event. Returns false at end of file.
    fn next_event(&mut self, document: &mut Document) -> Result<bool> {
        let mut buf = Vec::new();
        match self.reader.read_event(&mut buf)? {
            Event::Start(ref start) => match start.name() {
                b"osm" | b"osmChange" => {}
                name => {
                    if let Some(section) = section_from_name(name) {
                        self.section = Some(section);
                    } else {
                        let children = self.read_children(name)?;
                        self.element(document, start, &children)?;
                    }
                }
            },
            Event::Empty(ref start) => self.element(document, start, &[])?,
            Event::End(ref end) => {
                if section_from_name(end.name()).is_some() {
                    self.section = None;
                }
            }
            Event::Eof => return Ok(false),
            _ => {}
        }

        self.count_lines(&buf);
        Ok(true)
    }

    /// Read the child elements (`<tag>`, `<nd>`, `<member>`) up to the end of the element
    /// `name`. Children may be self closing or not.
    fn read_children(&mut self, name: &[u8]) -> Result<Vec<BytesStart<'static>>> {
        let mut buf = Vec::new();
        let mut children = Vec::new();
        loop {
            match self.reader.read_event(&mut buf)? {
                Event::Empty(ref e) | Event::Start(ref e) => children.push(e.to_owned()),
                Event::End(ref e) if e.name() == name => break,
                Event::Eof => {
                    return Err(ErrorKind::Xml(quick_xml::Error::UnexpectedEof(format!(
                        "</{}>",
                        String::from_utf8_lossy(name)
                    ))))
                }
                _ => {}
            }
        }
        self.count_lines(&buf);
        Ok(children)
    }

    fn count_lines(&mut self, buf: &[u8]) {
        self.line += buf.iter().filter(|b| **b == b'\n').count() as u32;
    }

    fn element(
        &mut self,
        document: &mut Document,
        start: &BytesStart,
        children: &[BytesStart],
    ) -> Result<()> {
        let feature: OsmFeature = match start.name() {
            b"node" => parse_node(start, children)?.into(),
            b"way" => parse_way(start, children)?.into(),
            b"relation" => parse_relation(start, children)?.into(),
            b"changeset" => {
                document.changeset_tags = parse_tags(children)?;
                return Ok(());
            }
            _ => return Ok(()),
        };

        match self.section {
            None => document.features.push(feature),
            Some(Section::Create) => document.change.create.push(feature),
            Some(Section::Modify) => document.change.modify.push(feature),
            Some(Section::Delete) => document.change.delete.push(feature),
        }
        Ok(())
    }
}

fn section_from_name(name: &[u8]) -> Option<Section> {
    match name {
        b"create" => Some(Section::Create),
        b"modify" => Some(Section::Modify),
        b"delete" => Some(Section::Delete),
        _ => None,
    }
}

fn parse_node(start: &BytesStart, children: &[BytesStart]) -> Result<Node> {
    let attributes = ElementAttributes::new(start);
    let mut meta = attributes.meta()?;
    meta.tags = parse_tags(children)?;
    Ok(Node {
        id: attributes.parse("id")?,
        coordinate: Coordinate::new(attributes.parse("lat")?, attributes.parse("lon")?),
        meta,
    })
}

fn parse_way(start: &BytesStart, children: &[BytesStart]) -> Result<Way> {
    let attributes = ElementAttributes::new(start);
    let mut meta = attributes.meta()?;
    meta.tags = parse_tags(children)?;

    let mut refs = Vec::new();
    for nd in children_named(children, b"nd") {
        refs.push(nd.parse::<i64>("ref")?);
    }

    Ok(Way {
        id: attributes.parse("id")?,
        refs,
        meta,
    })
}

fn parse_relation(start: &BytesStart, children: &[BytesStart]) -> Result<Relation> {
    let attributes = ElementAttributes::new(start);
    let mut meta = attributes.meta()?;
    meta.tags = parse_tags(children)?;

    let mut members = Vec::new();
    for member in children_named(children, b"member") {
        members.push(member.member()?);
    }

    Ok(Relation {
        id: attributes.parse("id")?,
        members,
        meta,
    })
}

fn parse_tags(children: &[BytesStart]) -> Result<Tags> {
    let mut tags = Tags::new();
    for tag in children_named(children, b"tag") {
        let (key, value) = tag.tag()?;
        tags.insert(key, value);
    }
    Ok(tags)
}

fn children_named(children: &[BytesStart], name: &[u8]) -> Vec<ElementAttributes> {
    children
        .iter()
        .filter(|child| child.name() == name)
        .map(ElementAttributes::new)
        .collect()
}
