//! # Error Types
//!
//! Every fallible operation in the crate returns [`TcdError`]. Packing and
//! unpacking errors are raised at the point of detection; store failures
//! propagate unchanged. Nothing here is retried: all failures come from local
//! data or local file I/O and are not transient.

use std::{io, path::PathBuf};
use thiserror::Error;

use crate::codec::Field;
use crate::record::Slot;
use crate::strings::Category;

/// Errors that can occur while encoding, decoding or storing station records.
#[derive(Error, Debug)]
pub enum TcdError {
    /// Record index or station name lookup missed
    #[error("not found: {0}")]
    NotFound(String),

    /// Value is not a member of a closed string category
    #[error("{value:?} is not a valid {category} value")]
    InvalidEnumValue { category: Category, value: String },

    /// A subordinate station's reference station could not be resolved
    #[error("unresolved reference station: {0}")]
    UnresolvedReference(String),

    /// Coefficient list does not line up with the constituent table
    #[error("coefficient mismatch: {0}")]
    CoefficientMismatch(String),

    /// Packed time offset has a minute component of 60 or more
    #[error("malformed time offset {0}: minutes must be below 60")]
    MalformedOffset(i32),

    /// Constituents share fewer than one common year of node factors
    #[error("constituents share no common years ({start_year}..{end_year})")]
    EmptyYearRange { start_year: i32, end_year: i32 },

    /// Store could not be opened, created, saved or closed
    #[error("store unavailable: {path}: {source}")]
    StoreUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Database file does not have the expected structure
    #[error("invalid database file: {0}")]
    InvalidFile(String),

    /// Text does not fit its fixed-width buffer
    #[error("{slot:?} text is {len} bytes, at most {max} fit")]
    TextTooLong { slot: Slot, len: usize, max: usize },

    /// Text contains characters outside the single-byte encoding
    #[error("{0:?} cannot be encoded as ISO-8859-1")]
    UnencodableText(String),

    /// Text contains a NUL byte, which terminates a stored text field
    #[error("{0:?} contains a NUL character")]
    EmbeddedNul(String),

    /// Direction outside of [0, 360)
    #[error("direction {0} is outside [0, 360)")]
    DirectionOutOfRange(i32),

    /// Level multiplier that is present but not strictly positive
    #[error("level multiplier {0} must be greater than zero")]
    InvalidMultiply(f32),

    /// Annotation key that would not survive folding
    #[error("invalid annotation key {0:?}")]
    InvalidAnnotationKey(String),

    /// Packed YYYYMMDD value that is not a calendar date
    #[error("malformed date {0}")]
    MalformedDate(u32),

    /// Time offset too large for the packed representation
    #[error("time offset out of range")]
    OffsetOutOfRange,

    /// Record kind discriminant is neither reference nor subordinate
    #[error("unknown record kind {0}")]
    UnknownRecordKind(u8),

    /// String category has no room for another entry
    #[error("{category} table is full ({capacity} entries)")]
    TableFull { category: Category, capacity: usize },

    /// Two constituents with the same name were supplied
    #[error("duplicate constituent {0:?}")]
    DuplicateConstituent(String),

    /// More constituents than a coefficient array can address
    #[error("{0} constituents exceed the table capacity")]
    TooManyConstituents(usize),

    /// Reference station still used by a subordinate station
    #[error("record {index} is still referenced by record {by}")]
    StillReferenced { index: i32, by: i32 },

    /// Field map value has the wrong shape for its field
    #[error("field {0:?} has an unexpected value type")]
    FieldType(Field),

    /// Packed value does not fit the width of its slot
    #[error("value {value} does not fit slot {slot:?}")]
    FieldRange { slot: Slot, value: String },

    /// File system or serialization failure
    #[error("IO: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, TcdError>;
