// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The crate-wide error type (§7).

/// List of all errors produced by the DXF parser, tree transforms and
/// polyline post-processor.
#[derive(Debug)]
pub enum Error {
    /// A non-numeric group-code line, an unterminated text command, or a
    /// missing root `EOF`.
    ParseError(String),

    /// A value that doesn't match the accepted numeric grammar when a
    /// deferred numeric parse is finally attempted (§4.1), or an
    /// unparseable CAMM-GL token (§4.9). Tolerated (logged, not returned)
    /// when the offending CAMM-GL text is whitespace-only.
    BadInput(String),

    /// A duplicate `SECTION` was found while canonicalizing in strict mode.
    DuplicateSection(String),

    /// A boil-down target kind has no conversion path into the acceptable
    /// set.
    UnsupportedEntity(Vec<String>),

    /// A block child type outside `LINE`/`SPLINE`/`POINT`/`LWPOLYLINE`, or a
    /// block with unexpected grandchildren.
    NotImplemented(String),

    /// A bad filter criterion, or an operation called with the wrong arity.
    InvalidArgument(String),

    /// Mismatched `x`/`y` arrays, or an empty point list, on a polyline.
    InvalidPolyline(String),

    /// An I/O failure reading or writing a stream.
    Io(std::io::Error),
}

impl Error {
    pub(crate) fn bad_numeric(value: &str) -> Self {
        Error::BadInput(format!("'{}' is not a valid number", value))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::ParseError(msg) => write!(f, "parse error: {}", msg),
            Error::BadInput(msg) => write!(f, "bad input: {}", msg),
            Error::DuplicateSection(name) => write!(f, "duplicate section: {}", name),
            Error::UnsupportedEntity(kinds) => {
                write!(f, "unable to boil down to the acceptable set: {}", kinds.join(", "))
            }
            Error::NotImplemented(msg) => write!(f, "not implemented: {}", msg),
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Error::InvalidPolyline(msg) => write!(f, "invalid polyline: {}", msg),
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
