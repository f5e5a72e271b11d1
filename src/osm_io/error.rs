use std::error;
use std::fmt::{Display, Formatter};
use std::io;

pub type Result<T> = std::result::Result<T, ErrorKind>;

/// Error reading or writing OSM XML. Read errors carry the line they were found on.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    line: Option<u32>,
}

#[derive(Debug)]
pub enum ErrorKind {
    /// Malformed XML.
    Xml(quick_xml::Error),
    Io(io::Error),
    /// An OSM element lacks an attribute it can't do without, e.g. a node without `lat`.
    MissingAttribute {
        element: String,
        attribute: String,
    },
    InvalidAttribute {
        attribute: String,
        value: String,
    },
    InvalidTimestamp(String),
}

impl Error {
    pub fn new(kind: ErrorKind, line: Option<u32>) -> Self {
        Error { kind, line }
    }

    /// Zero based line of the element that could not be read.
    pub fn line(&self) -> Option<u32> {
        self.line
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(f, "Line {}: {}", line, self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Xml(e) => write!(f, "XML error: {}", e),
            ErrorKind::Io(e) => write!(f, "IO error: {}", e),
            ErrorKind::MissingAttribute { element, attribute } => {
                write!(f, "<{}> has no '{}' attribute", element, attribute)
            }
            ErrorKind::InvalidAttribute { attribute, value } => {
                write!(f, "Invalid {} '{}'", attribute, value)
            }
            ErrorKind::InvalidTimestamp(s) => write!(f, "Invalid timestamp '{}'", s),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Xml(e) => Some(e),
            ErrorKind::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind, None)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        ErrorKind::Io(e).into()
    }
}

impl From<io::Error> for ErrorKind {
    fn from(e: io::Error) -> Self {
        ErrorKind::Io(e)
    }
}

impl From<quick_xml::Error> for ErrorKind {
    fn from(e: quick_xml::Error) -> Self {
        ErrorKind::Xml(e)
    }
}
