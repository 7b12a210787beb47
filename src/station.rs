//! # Station Domain Model
//!
//! Two record kinds share a common block of fields:
//!
//! - [`ReferenceStation`]: harmonic coefficients measured directly.
//! - [`SubordinateStation`]: time and level offsets applied to a
//!   reference station's predictions.
//!
//! Both embed a [`StationCommon`] by value. [`Station`] is the sum of the
//! two and is what the record assembler produces and consumes.

use chrono::NaiveDate;
use std::sync::Arc;

use crate::constituent::Constituent;
use crate::record::RecordKind;
use crate::scalar::{TimeOffset, Xfields};

/// Station position in decimal degrees.
///
/// A packed position of exactly (0, 0) means "unknown", so a station that
/// really sits at (0, 0) reads back without a position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Coordinates {
            latitude,
            longitude,
        }
    }
}

/// Amplitude and epoch of one constituent at a reference station.
#[derive(Clone, Debug, PartialEq)]
pub struct Coefficient {
    pub amplitude: f32,
    /// Phase lag in degrees
    pub epoch: f32,
    pub constituent: Arc<Constituent>,
}

impl Coefficient {
    pub fn new(amplitude: f32, epoch: f32, constituent: Arc<Constituent>) -> Self {
        Coefficient {
            amplitude,
            epoch,
            constituent,
        }
    }
}

/// Fields shared by both record kinds.
#[derive(Clone, Debug, PartialEq)]
pub struct StationCommon {
    /// Assigned by the store; ignored when packing
    pub record_number: Option<i32>,
    pub name: String,
    pub coordinates: Option<Coordinates>,
    pub tzfile: String,
    pub country: String,
    pub source: Option<String>,
    pub restriction: String,
    pub comments: Option<String>,
    pub notes: String,
    pub legalese: Option<String>,
    pub station_id_context: Option<String>,
    pub station_id: Option<String>,
    pub date_imported: Option<NaiveDate>,
    pub xfields: Xfields,
    pub direction_units: String,
    pub level_units: String,
    /// Degrees in [0, 360)
    pub min_direction: Option<i32>,
    /// Degrees in [0, 360)
    pub max_direction: Option<i32>,
}

/// Entry every open string table starts with.
const UNKNOWN: &str = "Unknown";

impl StationCommon {
    /// Common block with the values a fresh database can always encode.
    pub fn new(name: impl Into<String>) -> Self {
        StationCommon {
            record_number: None,
            name: name.into(),
            coordinates: None,
            tzfile: UNKNOWN.to_string(),
            country: UNKNOWN.to_string(),
            source: None,
            restriction: "Non-commercial use only".to_string(),
            comments: None,
            notes: String::new(),
            legalese: None,
            station_id_context: None,
            station_id: None,
            date_imported: None,
            xfields: Xfields::new(),
            direction_units: UNKNOWN.to_string(),
            level_units: UNKNOWN.to_string(),
            min_direction: None,
            max_direction: None,
        }
    }
}

/// A station with its own harmonic constants.
#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceStation {
    pub common: StationCommon,
    pub datum_offset: f32,
    pub datum: Option<String>,
    pub zone_offset: TimeOffset,
    pub expiration_date: Option<NaiveDate>,
    pub months_on_station: Option<u16>,
    pub last_date_on_station: Option<NaiveDate>,
    pub confidence: u8,
    /// At most one per constituent; a zero amplitude is the same as absent
    pub coefficients: Vec<Coefficient>,
}

impl ReferenceStation {
    pub fn new(name: impl Into<String>, coefficients: Vec<Coefficient>) -> Self {
        ReferenceStation {
            common: StationCommon::new(name),
            datum_offset: 0.0,
            datum: None,
            zone_offset: TimeOffset::ZERO,
            expiration_date: None,
            months_on_station: None,
            last_date_on_station: None,
            // 0-10 scale, 9 is typical
            confidence: 9,
            coefficients,
        }
    }
}

/// A station predicted from a reference station by fixed corrections.
#[derive(Clone, Debug, PartialEq)]
pub struct SubordinateStation {
    pub common: StationCommon,
    pub reference_station: Box<ReferenceStation>,
    pub min_time_add: Option<TimeOffset>,
    pub min_level_add: f32,
    /// Strictly positive when present
    pub min_level_multiply: Option<f32>,
    pub max_time_add: Option<TimeOffset>,
    pub max_level_add: f32,
    /// Strictly positive when present
    pub max_level_multiply: Option<f32>,
    pub flood_begins: Option<TimeOffset>,
    pub ebb_begins: Option<TimeOffset>,
}

impl SubordinateStation {
    pub fn new(name: impl Into<String>, reference_station: ReferenceStation) -> Self {
        SubordinateStation {
            common: StationCommon::new(name),
            reference_station: Box::new(reference_station),
            min_time_add: None,
            min_level_add: 0.0,
            min_level_multiply: None,
            max_time_add: None,
            max_level_add: 0.0,
            max_level_multiply: None,
            flood_begins: None,
            ebb_begins: None,
        }
    }
}

/// A station record of either kind.
#[derive(Clone, Debug, PartialEq)]
pub enum Station {
    Reference(ReferenceStation),
    Subordinate(SubordinateStation),
}

impl Station {
    pub fn kind(&self) -> RecordKind {
        match self {
            Station::Reference(_) => RecordKind::Reference,
            Station::Subordinate(_) => RecordKind::Subordinate,
        }
    }

    pub fn common(&self) -> &StationCommon {
        match self {
            Station::Reference(s) => &s.common,
            Station::Subordinate(s) => &s.common,
        }
    }

    pub fn common_mut(&mut self) -> &mut StationCommon {
        match self {
            Station::Reference(s) => &mut s.common,
            Station::Subordinate(s) => &mut s.common,
        }
    }

    pub fn name(&self) -> &str {
        &self.common().name
    }

    pub fn record_number(&self) -> Option<i32> {
        self.common().record_number
    }

    pub fn as_reference(&self) -> Option<&ReferenceStation> {
        match self {
            Station::Reference(s) => Some(s),
            Station::Subordinate(_) => None,
        }
    }

    pub fn as_subordinate(&self) -> Option<&SubordinateStation> {
        match self {
            Station::Subordinate(s) => Some(s),
            Station::Reference(_) => None,
        }
    }
}

impl From<ReferenceStation> for Station {
    fn from(station: ReferenceStation) -> Self {
        Station::Reference(station)
    }
}

impl From<SubordinateStation> for Station {
    fn from(station: SubordinateStation) -> Self {
        Station::Subordinate(station)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_station_defaults() {
        let reference = ReferenceStation::new("Eastport", Vec::new());
        assert_eq!(reference.confidence, 9);
        assert_eq!(reference.zone_offset, TimeOffset::ZERO);
        assert_eq!(reference.common.restriction, "Non-commercial use only");
        assert_eq!(reference.common.level_units, "Unknown");

        let sub = SubordinateStation::new("Lubec", reference);
        assert_eq!(sub.common.tzfile, "Unknown");
        assert_eq!(sub.common.country, "Unknown");
        assert!(sub.common.notes.is_empty());
        assert_eq!(Station::from(sub).kind(), RecordKind::Subordinate);
    }
}
