use crate::ElementId;
use std::error;
use std::fmt::{Display, Formatter};

pub type Result<T> = std::result::Result<T, Error>;

/// Represents errors that may occur when reading a patch or compiling it into a change.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    feature: Option<String>, // Id of the patch feature being processed.
}

#[derive(Debug)]
pub enum ErrorKind {
    /// An edit, move or delete references a feature the server did not return.
    FeatureNotFound(ElementId),
    /// A move on something that is not a node, or without a two point line.
    InvalidMove(String),
    /// Geometry that can not be turned into new features. Only this kind is recoverable, the
    /// compiler skips the feature.
    UnsupportedGeometry(String),
    InvalidPatch(String),
    /// The same existing feature is referenced by more than one action.
    DuplicateFeature(ElementId),
    Fetch(String),
    GeoJson(geojson::Error),
    Json(serde_json::Error),
    Xml(crate::osm_io::error::Error),
}

impl Error {
    pub fn new(kind: ErrorKind, feature: Option<String>) -> Self {
        Error { kind, feature }
    }

    /// Returns the id of the patch feature that caused the error, if known.
    pub fn feature(&self) -> Option<&str> {
        self.feature.as_deref()
    }

    /// Returns reference to error kind.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub(crate) fn with_feature(mut self, feature: Option<&str>) -> Self {
        if self.feature.is_none() {
            self.feature = feature.map(str::to_owned);
        }
        self
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
        if let Some(feature) = &self.feature {
            write!(f, "Feature '{}': ", feature)?;
        }
        Display::fmt(&self.kind, f)
    }
}

impl ErrorKind {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            ErrorKind::GeoJson(e) => Some(e),
            ErrorKind::Json(e) => Some(e),
            ErrorKind::Xml(e) => Some(e),
            _ => None,
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
        match self {
            ErrorKind::FeatureNotFound(id) => write!(f, "Referenced feature {} not found", id),
            ErrorKind::InvalidMove(s) => write!(f, "Invalid move: {}", s),
            ErrorKind::UnsupportedGeometry(s) => write!(f, "Can't create a {}", s),
            ErrorKind::InvalidPatch(s) => write!(f, "Invalid patch: {}", s),
            ErrorKind::DuplicateFeature(id) => {
                write!(f, "Feature {} is referenced more than once", id)
            }
            ErrorKind::Fetch(s) => write!(f, "Failed to fetch features: {}", s),
            ErrorKind::GeoJson(e) => write!(f, "GeoJSON error: {}", e),
            ErrorKind::Json(e) => write!(f, "JSON error: {}", e),
            ErrorKind::Xml(e) => write!(f, "{}", e),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.kind.source()
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind, None)
    }
}

impl From<geojson::Error> for Error {
    fn from(e: geojson::Error) -> Self {
        ErrorKind::GeoJson(e).into()
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        ErrorKind::Json(e).into()
    }
}

impl From<crate::osm_io::error::Error> for Error {
    fn from(e: crate::osm_io::error::Error) -> Self {
        ErrorKind::Xml(e).into()
    }
}
