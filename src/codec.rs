//! # Field Codecs
//!
//! A [`Descriptor`] pairs one domain [`Field`] with a [`Codec`] that knows how
//! the field is laid out in a [`RawRecord`]. Every codec implements the same
//! two operations:
//!
//! - `unpack(record)` yields zero or one `(field, value)` pair. A packed
//!   value equal to the field's sentinel yields [`Value::Null`].
//! - `pack(station)` yields the `(slot, packed)` pairs to write. A
//!   [`Value::Null`] packs to the sentinel.
//!
//! For every representable value `unpack(pack(v)) == v`, apart from the
//! sentinels that collide with real values: a position of exactly (0, 0),
//! a zero `min_time_add`/`max_time_add`, and the string at index 0 of the
//! datum and legalese tables all read back as absent.
//!
//! | Codec | Sentinel | Unpack | Pack |
//! |-------|----------|--------|------|
//! | `Text` | empty | decode | encode |
//! | `OpenTable` | index 0 (optional) | lookup, fallback "Unknown" | find or add |
//! | `ClosedTable` | none | lookup | find, else `InvalidEnumValue` |
//! | `Date` | 0 | `YYYYMMDD` | `YYYYMMDD` |
//! | `Offset` | per field | `±HHMM` | `±HHMM` |
//! | `Direction` | 361 | lenient | strict |
//! | `Coordinates` | (0, 0) | both or neither | both or neither |
//! | `Coefficients` | none | non-zero slots | 255-slot arrays |
//! | `ReferenceStation` | -1 | nested unpack | resolve or append |

use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

use crate::assembler;
use crate::constituent::MAX_CONSTITUENTS;
use crate::error::{Result, TcdError};
use crate::record::{Packed, RawRecord, RecordKind, Slot};
use crate::scalar::{self, TimeOffset, Xfields, NULL_DIRECTION};
use crate::station::{Coefficient, Coordinates, ReferenceStation, Station};
use crate::store::TideStore;
use crate::strings::Category;
use crate::text;

/// Domain-side name of a station field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    RecordNumber,
    RecordKind,
    Name,
    Coordinates,
    Source,
    Comments,
    Notes,
    StationIdContext,
    StationId,
    Xfields,
    DateImported,
    Tzfile,
    Country,
    Restriction,
    Legalese,
    LevelUnits,
    DirectionUnits,
    MinDirection,
    MaxDirection,
    DatumOffset,
    Datum,
    ZoneOffset,
    ExpirationDate,
    MonthsOnStation,
    LastDateOnStation,
    Confidence,
    Coefficients,
    ReferenceStation,
    MinTimeAdd,
    MinLevelAdd,
    MinLevelMultiply,
    MaxTimeAdd,
    MaxLevelAdd,
    MaxLevelMultiply,
    FloodBegins,
    EbbBegins,
}

/// Domain-side value of one field.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Offset(TimeOffset),
    Position(Coordinates),
    Annotations(Xfields),
    Coefficients(Vec<Coefficient>),
    Reference(Box<ReferenceStation>),
}

/// How a field is represented in a packed record.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Codec {
    /// Store-assigned; unpacked, never packed
    RecordNumber,
    /// Kind discriminant; packed, never unpacked
    RecordKind,
    /// Plain integer, optionally with a sentinel
    Number { slot: Slot, null: Option<i64> },
    /// Plain float
    Real { slot: Slot },
    /// Level multiplier: 0.0 means absent, present values must be positive
    Multiplier { slot: Slot },
    /// Single-byte text; `nullable` makes the empty string mean absent
    Text { slot: Slot, nullable: bool },
    /// Index into a growable string category
    OpenTable {
        slot: Slot,
        category: Category,
        null: Option<i64>,
    },
    /// Index into a fixed string category
    ClosedTable { slot: Slot, category: Category },
    /// `YYYYMMDD`, 0 means absent
    Date { slot: Slot },
    /// `±HHMM`, with a field-specific sentinel
    Offset { slot: Slot, null: Option<i32> },
    /// Degrees in [0, 360), 361 means absent
    Direction { slot: Slot },
    /// Latitude and longitude together
    Coordinates,
    /// Folded `key:value` block
    Annotations { slot: Slot },
    /// Amplitude and epoch arrays aligned to the constituent table
    Coefficients,
    /// Index of another record
    ReferenceStation,
}

/// One entry of a record kind's attribute list.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Descriptor {
    pub field: Field,
    pub codec: Codec,
}

impl Descriptor {
    pub const fn new(field: Field, codec: Codec) -> Self {
        Descriptor { field, codec }
    }

    /// Read this field out of `rec`.
    pub fn unpack<S: TideStore + ?Sized>(
        &self,
        store: &S,
        rec: &RawRecord,
    ) -> Result<Option<(Field, Value)>> {
        let value = match self.codec {
            Codec::RecordNumber => Value::Int(rec.record_number.into()),
            Codec::RecordKind => return Ok(None),
            Codec::Number { slot, null } => match int_slot(rec, slot)? {
                v if Some(v) == null => Value::Null,
                v => Value::Int(v),
            },
            Codec::Real { slot } => Value::Float(float_slot(rec, slot)?),
            Codec::Multiplier { slot } => match float_slot(rec, slot)? {
                v if v == 0.0 => Value::Null,
                v => Value::Float(v),
            },
            Codec::Text { slot, nullable } => {
                let bytes = text_slot(rec, slot)?;
                if nullable && bytes.is_empty() {
                    Value::Null
                } else {
                    Value::Text(text::decode(&bytes))
                }
            }
            Codec::OpenTable {
                slot,
                category,
                null,
            } => match int_slot(rec, slot)? {
                i if Some(i) == null => Value::Null,
                i => Value::Text(store.strings().get(category, i)),
            },
            Codec::ClosedTable { slot, category } => {
                Value::Text(store.strings().get(category, int_slot(rec, slot)?))
            }
            Codec::Date { slot } => match int_slot(rec, slot)? {
                0 => Value::Null,
                packed => {
                    let packed = u32::try_from(packed).map_err(|_| TcdError::MalformedDate(0))?;
                    Value::Date(scalar::date_from_packed(packed)?)
                }
            },
            Codec::Offset { slot, null } => {
                let packed = i32::try_from(int_slot(rec, slot)?)
                    .map_err(|_| TcdError::OffsetOutOfRange)?;
                if Some(packed) == null {
                    Value::Null
                } else {
                    Value::Offset(TimeOffset::from_packed(packed)?)
                }
            }
            Codec::Direction { slot } => {
                let packed = i32::try_from(int_slot(rec, slot)?).unwrap_or(NULL_DIRECTION);
                match scalar::direction_from_packed(packed) {
                    Some(d) => Value::Int(d.into()),
                    None => Value::Null,
                }
            }
            Codec::Coordinates => {
                if rec.latitude == 0.0 && rec.longitude == 0.0 {
                    Value::Null
                } else {
                    Value::Position(Coordinates::new(rec.latitude, rec.longitude))
                }
            }
            Codec::Annotations { slot } => {
                Value::Annotations(scalar::unfold_xfields(&text_slot(rec, slot)?))
            }
            Codec::Coefficients => Value::Coefficients(unpack_coefficients(store, rec)),
            Codec::ReferenceStation => match rec.reference_station {
                -1 => Value::Null,
                index => Value::Reference(Box::new(unpack_reference(store, index)?)),
            },
        };
        Ok(Some((self.field, value)))
    }

    /// Slots to write for this field of `station`.
    ///
    /// Open string categories may grow, and a reference station that is not
    /// in the store yet is appended to it.
    pub fn pack<S: TideStore + ?Sized>(
        &self,
        store: &mut S,
        station: &Station,
    ) -> Result<Vec<(Slot, Packed)>> {
        let field = self.field;
        let mismatch = || TcdError::FieldType(field);
        let slots = match self.codec {
            Codec::RecordNumber => Vec::new(),
            Codec::RecordKind => vec![(Slot::RecordType, Packed::Int(station.kind() as i64))],
            Codec::Number { slot, null } => {
                let v = match (value_of(station, field)?, null) {
                    (Value::Int(v), _) => v,
                    (Value::Null, Some(null)) => null,
                    _ => return Err(mismatch()),
                };
                vec![(slot, Packed::Int(v))]
            }
            Codec::Real { slot } => match value_of(station, field)? {
                Value::Float(v) => vec![(slot, Packed::Float(v))],
                _ => return Err(mismatch()),
            },
            Codec::Multiplier { slot } => {
                let v = match value_of(station, field)? {
                    Value::Null => 0.0,
                    Value::Float(v) if v > 0.0 => v,
                    Value::Float(v) => return Err(TcdError::InvalidMultiply(v as f32)),
                    _ => return Err(mismatch()),
                };
                vec![(slot, Packed::Float(v))]
            }
            Codec::Text { slot, nullable } => {
                let bytes = match value_of(station, field)? {
                    Value::Text(s) => text::encode(&s)?,
                    Value::Null if nullable => Vec::new(),
                    _ => return Err(mismatch()),
                };
                vec![(slot, Packed::Text(bytes))]
            }
            Codec::OpenTable {
                slot,
                category,
                null,
            } => {
                let index = match (value_of(station, field)?, null) {
                    (Value::Text(s), _) => store.strings_mut().find_or_add(category, &s)? as i64,
                    (Value::Null, Some(null)) => null,
                    _ => return Err(mismatch()),
                };
                vec![(slot, Packed::Int(index))]
            }
            Codec::ClosedTable { slot, category } => {
                let Value::Text(s) = value_of(station, field)? else {
                    return Err(mismatch());
                };
                let index = store
                    .strings()
                    .find(category, &s)
                    .ok_or(TcdError::InvalidEnumValue { category, value: s })?;
                vec![(slot, Packed::Int(index as i64))]
            }
            Codec::Date { slot } => {
                let packed = match value_of(station, field)? {
                    Value::Date(d) => scalar::date_to_packed(d)?,
                    Value::Null => 0,
                    _ => return Err(mismatch()),
                };
                vec![(slot, Packed::Int(packed.into()))]
            }
            Codec::Offset { slot, null } => {
                let packed = match (value_of(station, field)?, null) {
                    (Value::Offset(o), _) => o.to_packed()?,
                    (Value::Null, Some(null)) => null,
                    _ => return Err(mismatch()),
                };
                vec![(slot, Packed::Int(packed.into()))]
            }
            Codec::Direction { slot } => {
                let packed = match value_of(station, field)? {
                    Value::Int(d) => {
                        scalar::direction_to_packed(i32::try_from(d).unwrap_or(i32::MAX))?
                    }
                    Value::Null => NULL_DIRECTION,
                    _ => return Err(mismatch()),
                };
                vec![(slot, Packed::Int(packed.into()))]
            }
            Codec::Coordinates => {
                let (latitude, longitude) = match value_of(station, field)? {
                    Value::Position(p) => {
                        if p.latitude == 0.0 && p.longitude == 0.0 {
                            log::warn!(
                                "position (0, 0) of {:?} will read back as unknown",
                                station.name()
                            );
                        }
                        (p.latitude, p.longitude)
                    }
                    Value::Null => (0.0, 0.0),
                    _ => return Err(mismatch()),
                };
                vec![
                    (Slot::Latitude, Packed::Float(latitude)),
                    (Slot::Longitude, Packed::Float(longitude)),
                ]
            }
            Codec::Annotations { slot } => match value_of(station, field)? {
                Value::Annotations(x) => vec![(slot, Packed::Text(scalar::fold_xfields(&x)?))],
                _ => return Err(mismatch()),
            },
            Codec::Coefficients => match value_of(station, field)? {
                Value::Coefficients(coefficients) => {
                    let (amplitude, epoch) = pack_coefficients(store, &coefficients)?;
                    vec![
                        (Slot::Amplitude, Packed::Floats(amplitude)),
                        (Slot::Epoch, Packed::Floats(epoch)),
                    ]
                }
                _ => return Err(mismatch()),
            },
            Codec::ReferenceStation => match value_of(station, field)? {
                Value::Reference(reference) => {
                    let index = assembler::resolve_reference(store, &reference)?.index();
                    vec![(Slot::ReferenceStation, Packed::Int(index.into()))]
                }
                _ => return Err(mismatch()),
            },
        };
        Ok(slots)
    }
}

fn int_slot(rec: &RawRecord, slot: Slot) -> Result<i64> {
    match rec.get(slot) {
        Packed::Int(v) => Ok(v),
        other => Err(TcdError::FieldRange {
            slot,
            value: format!("{:?}", other),
        }),
    }
}

fn float_slot(rec: &RawRecord, slot: Slot) -> Result<f64> {
    match rec.get(slot) {
        Packed::Float(v) => Ok(v),
        other => Err(TcdError::FieldRange {
            slot,
            value: format!("{:?}", other),
        }),
    }
}

fn text_slot(rec: &RawRecord, slot: Slot) -> Result<Vec<u8>> {
    match rec.get(slot) {
        Packed::Text(bytes) => Ok(bytes),
        other => Err(TcdError::FieldRange {
            slot,
            value: format!("{:?}", other),
        }),
    }
}

/// Non-zero coefficients, in constituent table order.
fn unpack_coefficients<S: TideStore + ?Sized>(store: &S, rec: &RawRecord) -> Vec<Coefficient> {
    let table = store.constituents();
    let stray = rec.amplitude[table.len()..]
        .iter()
        .filter(|&&a| a != 0.0)
        .count();
    if stray > 0 {
        log::warn!(
            "record {} has {} amplitudes past the constituent table",
            rec.record_number,
            stray
        );
    }
    table
        .iter()
        .zip(rec.amplitude.iter().zip(rec.epoch.iter()))
        .filter(|(_, (&amplitude, _))| amplitude != 0.0)
        .map(|(constituent, (&amplitude, &epoch))| {
            Coefficient::new(amplitude, epoch, constituent.clone())
        })
        .collect()
}

type Slots = Box<[f32; MAX_CONSTITUENTS]>;

/// Spread coefficients over 255-slot arrays by constituent position.
///
/// Every coefficient must name a constituent of the table, at most once.
fn pack_coefficients<S: TideStore + ?Sized>(
    store: &S,
    coefficients: &[Coefficient],
) -> Result<(Slots, Slots)> {
    let table = store.constituents();
    let mut amplitude = Box::new([0.0f32; MAX_CONSTITUENTS]);
    let mut epoch = Box::new([0.0f32; MAX_CONSTITUENTS]);
    let mut seen = HashSet::with_capacity(coefficients.len());

    for coefficient in coefficients {
        let name = &coefficient.constituent.name;
        let position = table.position(name).ok_or_else(|| {
            TcdError::CoefficientMismatch(format!("constituent {:?} is not in the table", name))
        })?;
        if !seen.insert(position) {
            return Err(TcdError::CoefficientMismatch(format!(
                "constituent {:?} appears more than once",
                name
            )));
        }
        amplitude[position] = coefficient.amplitude;
        epoch[position] = coefficient.epoch;
    }
    Ok((amplitude, epoch))
}

fn unpack_reference<S: TideStore + ?Sized>(store: &S, index: i32) -> Result<ReferenceStation> {
    let unresolved = TcdError::UnresolvedReference;
    let rec = match store.read(index) {
        Ok(rec) => rec,
        Err(TcdError::NotFound(_)) => return Err(unresolved(format!("no record {}", index))),
        Err(e) => return Err(e),
    };
    if rec.record_type != RecordKind::Reference as u8 {
        return Err(unresolved(format!(
            "record {} is not a reference station",
            index
        )));
    }
    match assembler::unpack_record(store, &rec)? {
        Station::Reference(reference) => Ok(reference),
        Station::Subordinate(_) => Err(unresolved(format!("record {}", index))),
    }
}

// -- Domain access --

fn opt_text(v: &Option<String>) -> Value {
    v.clone().map_or(Value::Null, Value::Text)
}

fn opt_date(v: Option<NaiveDate>) -> Value {
    v.map_or(Value::Null, Value::Date)
}

fn opt_offset(v: Option<TimeOffset>) -> Value {
    v.map_or(Value::Null, Value::Offset)
}

fn opt_float(v: Option<f32>) -> Value {
    v.map_or(Value::Null, |v| Value::Float(v.into()))
}

fn opt_int<T: Into<i64>>(v: Option<T>) -> Value {
    v.map_or(Value::Null, |v| Value::Int(v.into()))
}

/// Current value of `field` on `station`.
pub fn value_of(station: &Station, field: Field) -> Result<Value> {
    let c = station.common();
    let value = match field {
        Field::RecordNumber => opt_int(c.record_number),
        Field::RecordKind => Value::Int(station.kind() as i64),
        Field::Name => Value::Text(c.name.clone()),
        Field::Coordinates => c.coordinates.map_or(Value::Null, Value::Position),
        Field::Source => opt_text(&c.source),
        Field::Comments => opt_text(&c.comments),
        Field::Notes => Value::Text(c.notes.clone()),
        Field::StationIdContext => opt_text(&c.station_id_context),
        Field::StationId => opt_text(&c.station_id),
        Field::Xfields => Value::Annotations(c.xfields.clone()),
        Field::DateImported => opt_date(c.date_imported),
        Field::Tzfile => Value::Text(c.tzfile.clone()),
        Field::Country => Value::Text(c.country.clone()),
        Field::Restriction => Value::Text(c.restriction.clone()),
        Field::Legalese => opt_text(&c.legalese),
        Field::LevelUnits => Value::Text(c.level_units.clone()),
        Field::DirectionUnits => Value::Text(c.direction_units.clone()),
        Field::MinDirection => opt_int(c.min_direction),
        Field::MaxDirection => opt_int(c.max_direction),
        _ => match station {
            Station::Reference(r) => match field {
                Field::DatumOffset => Value::Float(r.datum_offset.into()),
                Field::Datum => opt_text(&r.datum),
                Field::ZoneOffset => Value::Offset(r.zone_offset),
                Field::ExpirationDate => opt_date(r.expiration_date),
                Field::MonthsOnStation => opt_int(r.months_on_station),
                Field::LastDateOnStation => opt_date(r.last_date_on_station),
                Field::Confidence => Value::Int(r.confidence.into()),
                Field::Coefficients => Value::Coefficients(r.coefficients.clone()),
                _ => return Err(TcdError::FieldType(field)),
            },
            Station::Subordinate(s) => match field {
                Field::ReferenceStation => Value::Reference(s.reference_station.clone()),
                Field::MinTimeAdd => opt_offset(s.min_time_add),
                Field::MinLevelAdd => Value::Float(s.min_level_add.into()),
                Field::MinLevelMultiply => opt_float(s.min_level_multiply),
                Field::MaxTimeAdd => opt_offset(s.max_time_add),
                Field::MaxLevelAdd => Value::Float(s.max_level_add.into()),
                Field::MaxLevelMultiply => opt_float(s.max_level_multiply),
                Field::FloodBegins => opt_offset(s.flood_begins),
                Field::EbbBegins => opt_offset(s.ebb_begins),
                _ => return Err(TcdError::FieldType(field)),
            },
        },
    };
    Ok(value)
}

/// Unpacked `(field, value)` pairs of one record.
#[derive(Debug, Default)]
pub struct FieldMap {
    values: HashMap<Field, Value>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: Field, value: Value) {
        self.values.insert(field, value);
    }

    /// Remove a value; missing fields read as `Null`.
    pub fn take(&mut self, field: Field) -> Value {
        self.values.remove(&field).unwrap_or(Value::Null)
    }

    pub fn text(&mut self, field: Field) -> Result<String> {
        match self.take(field) {
            Value::Text(s) => Ok(s),
            _ => Err(TcdError::FieldType(field)),
        }
    }

    pub fn opt_text(&mut self, field: Field) -> Result<Option<String>> {
        match self.take(field) {
            Value::Text(s) => Ok(Some(s)),
            Value::Null => Ok(None),
            _ => Err(TcdError::FieldType(field)),
        }
    }

    pub fn opt_date(&mut self, field: Field) -> Result<Option<NaiveDate>> {
        match self.take(field) {
            Value::Date(d) => Ok(Some(d)),
            Value::Null => Ok(None),
            _ => Err(TcdError::FieldType(field)),
        }
    }

    pub fn offset(&mut self, field: Field) -> Result<TimeOffset> {
        match self.take(field) {
            Value::Offset(o) => Ok(o),
            _ => Err(TcdError::FieldType(field)),
        }
    }

    pub fn opt_offset(&mut self, field: Field) -> Result<Option<TimeOffset>> {
        match self.take(field) {
            Value::Offset(o) => Ok(Some(o)),
            Value::Null => Ok(None),
            _ => Err(TcdError::FieldType(field)),
        }
    }

    pub fn real(&mut self, field: Field) -> Result<f32> {
        match self.take(field) {
            Value::Float(v) => Ok(v as f32),
            _ => Err(TcdError::FieldType(field)),
        }
    }

    pub fn opt_real(&mut self, field: Field) -> Result<Option<f32>> {
        match self.take(field) {
            Value::Float(v) => Ok(Some(v as f32)),
            Value::Null => Ok(None),
            _ => Err(TcdError::FieldType(field)),
        }
    }

    pub fn int<T: TryFrom<i64>>(&mut self, field: Field) -> Result<T> {
        match self.take(field) {
            Value::Int(v) => T::try_from(v).map_err(|_| TcdError::FieldType(field)),
            _ => Err(TcdError::FieldType(field)),
        }
    }

    pub fn opt_int<T: TryFrom<i64>>(&mut self, field: Field) -> Result<Option<T>> {
        match self.take(field) {
            Value::Int(v) => T::try_from(v)
                .map(Some)
                .map_err(|_| TcdError::FieldType(field)),
            Value::Null => Ok(None),
            _ => Err(TcdError::FieldType(field)),
        }
    }

    pub fn coordinates(&mut self, field: Field) -> Result<Option<Coordinates>> {
        match self.take(field) {
            Value::Position(p) => Ok(Some(p)),
            Value::Null => Ok(None),
            _ => Err(TcdError::FieldType(field)),
        }
    }

    pub fn xfields(&mut self, field: Field) -> Result<Xfields> {
        match self.take(field) {
            Value::Annotations(x) => Ok(x),
            Value::Null => Ok(Xfields::new()),
            _ => Err(TcdError::FieldType(field)),
        }
    }

    pub fn coefficients(&mut self, field: Field) -> Result<Vec<Coefficient>> {
        match self.take(field) {
            Value::Coefficients(c) => Ok(c),
            Value::Null => Ok(Vec::new()),
            _ => Err(TcdError::FieldType(field)),
        }
    }

    pub fn reference(&mut self, field: Field) -> Result<Box<ReferenceStation>> {
        match self.take(field) {
            Value::Reference(r) => Ok(r),
            Value::Null => Err(TcdError::UnresolvedReference(
                "subordinate station has no reference station".to_string(),
            )),
            _ => Err(TcdError::FieldType(field)),
        }
    }
}
