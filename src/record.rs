//! # Packed Station Records
//!
//! [`RawRecord`] is the fixed-layout record exchanged with the store. Field
//! codecs read and write it slot by slot through [`RawRecord::get`] and
//! [`RawRecord::set`]; the store persists it with [`RawRecord::to_bytes`].
//!
//! ## Byte Layout
//!
//! Little-endian, no padding, text NUL-padded to its buffer width:
//!
//! ```text
//! +--------------------------------------------------------------+
//! | record_number i32 | record_size u32 | record_type u8         |  station
//! | latitude f64 | longitude f64 | reference_station i32         |  header
//! | tzfile i16 | name [90]                                       |
//! +--------------------------------------------------------------+
//! | country i16 | source [90] | restriction u8                   |  common
//! | comments [10000] | notes [10000] | legalese u8               |
//! | station_id_context [90] | station_id [90]                    |
//! | date_imported u32 | xfields [10000] | direction_units u8     |
//! | min_direction i32 | max_direction i32 | level_units u8       |
//! +--------------------------------------------------------------+
//! | datum_offset f32 | datum i16 | zone_offset i32               |  reference
//! | expiration_date u32 | months_on_station u16                  |
//! | last_date_on_station u32 | confidence u8                     |
//! | amplitude [255 × f32] | epoch [255 × f32]                    |
//! +--------------------------------------------------------------+
//! | min_time_add i32 | min_level_add f32 | min_level_multiply f32|  subordinate
//! | max_time_add i32 | max_level_add f32 | max_level_multiply f32|
//! | flood_begins i32 | ebb_begins i32                            |
//! +--------------------------------------------------------------+
//! ```
//!
//! Both record kinds carry every block; the unused one is left at its
//! defaults.

use serde::{Deserialize, Serialize};

use crate::constituent::MAX_CONSTITUENTS;
use crate::error::{Result, TcdError};
use crate::scalar::{NULL_DIRECTION, NULL_SLACK_OFFSET};
use crate::text::{self, MONOLOGUE_LENGTH, ONELINER_LENGTH};

/// Size in bytes of one packed record.
pub const RECORD_SIZE: usize = 121 + 30_288 + 2_061 + 32;

/// Record kind discriminant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RecordKind {
    Reference = 1,
    Subordinate = 2,
}

impl TryFrom<u8> for RecordKind {
    type Error = TcdError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(RecordKind::Reference),
            2 => Ok(RecordKind::Subordinate),
            other => Err(TcdError::UnknownRecordKind(other)),
        }
    }
}

/// Addressable packed fields of a [`RawRecord`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    RecordNumber,
    RecordType,
    Latitude,
    Longitude,
    ReferenceStation,
    Tzfile,
    Name,
    Country,
    Source,
    Restriction,
    Comments,
    Notes,
    Legalese,
    StationIdContext,
    StationId,
    DateImported,
    Xfields,
    DirectionUnits,
    MinDirection,
    MaxDirection,
    LevelUnits,
    DatumOffset,
    Datum,
    ZoneOffset,
    ExpirationDate,
    MonthsOnStation,
    LastDateOnStation,
    Confidence,
    Amplitude,
    Epoch,
    MinTimeAdd,
    MinLevelAdd,
    MinLevelMultiply,
    MaxTimeAdd,
    MaxLevelAdd,
    MaxLevelMultiply,
    FloodBegins,
    EbbBegins,
}

impl Slot {
    /// Buffer width of a text slot.
    pub fn text_width(self) -> Option<usize> {
        match self {
            Slot::Name | Slot::Source | Slot::StationIdContext | Slot::StationId => {
                Some(ONELINER_LENGTH)
            }
            Slot::Comments | Slot::Notes | Slot::Xfields => Some(MONOLOGUE_LENGTH),
            _ => None,
        }
    }

    /// Longest text a slot holds, leaving room for the terminating NUL.
    pub fn max_text_len(self) -> Option<usize> {
        self.text_width().map(|w| w - 1)
    }
}

/// A value as stored in one slot.
#[derive(Clone, Debug, PartialEq)]
pub enum Packed {
    Int(i64),
    Float(f64),
    Text(Vec<u8>),
    Floats(Box<[f32; MAX_CONSTITUENTS]>),
}

/// One station record in packed form.
#[derive(Clone, Debug, PartialEq)]
pub struct RawRecord {
    pub record_number: i32,
    pub record_size: u32,
    pub record_type: u8,
    pub latitude: f64,
    pub longitude: f64,
    pub reference_station: i32,
    pub tzfile: i16,
    pub name: Vec<u8>,

    pub country: i16,
    pub source: Vec<u8>,
    pub restriction: u8,
    pub comments: Vec<u8>,
    pub notes: Vec<u8>,
    pub legalese: u8,
    pub station_id_context: Vec<u8>,
    pub station_id: Vec<u8>,
    pub date_imported: u32,
    pub xfields: Vec<u8>,
    pub direction_units: u8,
    pub min_direction: i32,
    pub max_direction: i32,
    pub level_units: u8,

    pub datum_offset: f32,
    pub datum: i16,
    pub zone_offset: i32,
    pub expiration_date: u32,
    pub months_on_station: u16,
    pub last_date_on_station: u32,
    pub confidence: u8,
    pub amplitude: Box<[f32; MAX_CONSTITUENTS]>,
    pub epoch: Box<[f32; MAX_CONSTITUENTS]>,

    pub min_time_add: i32,
    pub min_level_add: f32,
    pub min_level_multiply: f32,
    pub max_time_add: i32,
    pub max_level_add: f32,
    pub max_level_multiply: f32,
    pub flood_begins: i32,
    pub ebb_begins: i32,
}

impl Default for RawRecord {
    /// All-zero record, as a freshly allocated store record would be.
    fn default() -> Self {
        RawRecord {
            record_number: 0,
            record_size: RECORD_SIZE as u32,
            record_type: 0,
            latitude: 0.0,
            longitude: 0.0,
            reference_station: 0,
            tzfile: 0,
            name: Vec::new(),
            country: 0,
            source: Vec::new(),
            restriction: 0,
            comments: Vec::new(),
            notes: Vec::new(),
            legalese: 0,
            station_id_context: Vec::new(),
            station_id: Vec::new(),
            date_imported: 0,
            xfields: Vec::new(),
            direction_units: 0,
            min_direction: 0,
            max_direction: 0,
            level_units: 0,
            datum_offset: 0.0,
            datum: 0,
            zone_offset: 0,
            expiration_date: 0,
            months_on_station: 0,
            last_date_on_station: 0,
            confidence: 0,
            amplitude: Box::new([0.0; MAX_CONSTITUENTS]),
            epoch: Box::new([0.0; MAX_CONSTITUENTS]),
            min_time_add: 0,
            min_level_add: 0.0,
            min_level_multiply: 0.0,
            max_time_add: 0,
            max_level_add: 0.0,
            max_level_multiply: 0.0,
            flood_begins: 0,
            ebb_begins: 0,
        }
    }
}

fn int<T: TryFrom<i64>>(slot: Slot, value: &Packed) -> Result<T> {
    match value {
        Packed::Int(v) => T::try_from(*v).map_err(|_| TcdError::FieldRange {
            slot,
            value: v.to_string(),
        }),
        other => Err(mismatch(slot, other)),
    }
}

fn float(slot: Slot, value: &Packed) -> Result<f64> {
    match value {
        Packed::Float(v) => Ok(*v),
        Packed::Int(v) => Ok(*v as f64),
        other => Err(mismatch(slot, other)),
    }
}

fn text(slot: Slot, value: Packed) -> Result<Vec<u8>> {
    match value {
        Packed::Text(bytes) => {
            let max = slot.max_text_len().unwrap_or(0);
            if bytes.len() > max {
                return Err(TcdError::TextTooLong {
                    slot,
                    len: bytes.len(),
                    max,
                });
            }
            Ok(bytes)
        }
        other => Err(mismatch(slot, &other)),
    }
}

fn floats(slot: Slot, value: Packed) -> Result<Box<[f32; MAX_CONSTITUENTS]>> {
    match value {
        Packed::Floats(values) => Ok(values),
        other => Err(mismatch(slot, &other)),
    }
}

fn mismatch(slot: Slot, value: &Packed) -> TcdError {
    TcdError::FieldRange {
        slot,
        value: format!("{:?}", value),
    }
}

impl RawRecord {
    /// Blank record with the non-zero "absent" sentinels already in place.
    pub fn with_sentinels() -> Self {
        RawRecord {
            reference_station: -1,
            min_direction: NULL_DIRECTION,
            max_direction: NULL_DIRECTION,
            flood_begins: NULL_SLACK_OFFSET,
            ebb_begins: NULL_SLACK_OFFSET,
            ..RawRecord::default()
        }
    }

    pub fn kind(&self) -> Result<RecordKind> {
        RecordKind::try_from(self.record_type)
    }

    pub fn get(&self, slot: Slot) -> Packed {
        use Packed::{Float, Floats, Int, Text};
        match slot {
            Slot::RecordNumber => Int(self.record_number.into()),
            Slot::RecordType => Int(self.record_type.into()),
            Slot::Latitude => Float(self.latitude),
            Slot::Longitude => Float(self.longitude),
            Slot::ReferenceStation => Int(self.reference_station.into()),
            Slot::Tzfile => Int(self.tzfile.into()),
            Slot::Name => Text(self.name.clone()),
            Slot::Country => Int(self.country.into()),
            Slot::Source => Text(self.source.clone()),
            Slot::Restriction => Int(self.restriction.into()),
            Slot::Comments => Text(self.comments.clone()),
            Slot::Notes => Text(self.notes.clone()),
            Slot::Legalese => Int(self.legalese.into()),
            Slot::StationIdContext => Text(self.station_id_context.clone()),
            Slot::StationId => Text(self.station_id.clone()),
            Slot::DateImported => Int(self.date_imported.into()),
            Slot::Xfields => Text(self.xfields.clone()),
            Slot::DirectionUnits => Int(self.direction_units.into()),
            Slot::MinDirection => Int(self.min_direction.into()),
            Slot::MaxDirection => Int(self.max_direction.into()),
            Slot::LevelUnits => Int(self.level_units.into()),
            Slot::DatumOffset => Float(self.datum_offset.into()),
            Slot::Datum => Int(self.datum.into()),
            Slot::ZoneOffset => Int(self.zone_offset.into()),
            Slot::ExpirationDate => Int(self.expiration_date.into()),
            Slot::MonthsOnStation => Int(self.months_on_station.into()),
            Slot::LastDateOnStation => Int(self.last_date_on_station.into()),
            Slot::Confidence => Int(self.confidence.into()),
            Slot::Amplitude => Floats(self.amplitude.clone()),
            Slot::Epoch => Floats(self.epoch.clone()),
            Slot::MinTimeAdd => Int(self.min_time_add.into()),
            Slot::MinLevelAdd => Float(self.min_level_add.into()),
            Slot::MinLevelMultiply => Float(self.min_level_multiply.into()),
            Slot::MaxTimeAdd => Int(self.max_time_add.into()),
            Slot::MaxLevelAdd => Float(self.max_level_add.into()),
            Slot::MaxLevelMultiply => Float(self.max_level_multiply.into()),
            Slot::FloodBegins => Int(self.flood_begins.into()),
            Slot::EbbBegins => Int(self.ebb_begins.into()),
        }
    }

    /// Store `value` in `slot`, checking it fits the slot's width.
    pub fn set(&mut self, slot: Slot, value: Packed) -> Result<()> {
        match slot {
            Slot::RecordNumber => self.record_number = int(slot, &value)?,
            Slot::RecordType => self.record_type = int(slot, &value)?,
            Slot::Latitude => self.latitude = float(slot, &value)?,
            Slot::Longitude => self.longitude = float(slot, &value)?,
            Slot::ReferenceStation => self.reference_station = int(slot, &value)?,
            Slot::Tzfile => self.tzfile = int(slot, &value)?,
            Slot::Name => self.name = text(slot, value)?,
            Slot::Country => self.country = int(slot, &value)?,
            Slot::Source => self.source = text(slot, value)?,
            Slot::Restriction => self.restriction = int(slot, &value)?,
            Slot::Comments => self.comments = text(slot, value)?,
            Slot::Notes => self.notes = text(slot, value)?,
            Slot::Legalese => self.legalese = int(slot, &value)?,
            Slot::StationIdContext => self.station_id_context = text(slot, value)?,
            Slot::StationId => self.station_id = text(slot, value)?,
            Slot::DateImported => self.date_imported = int(slot, &value)?,
            Slot::Xfields => self.xfields = text(slot, value)?,
            Slot::DirectionUnits => self.direction_units = int(slot, &value)?,
            Slot::MinDirection => self.min_direction = int(slot, &value)?,
            Slot::MaxDirection => self.max_direction = int(slot, &value)?,
            Slot::LevelUnits => self.level_units = int(slot, &value)?,
            Slot::DatumOffset => self.datum_offset = float(slot, &value)? as f32,
            Slot::Datum => self.datum = int(slot, &value)?,
            Slot::ZoneOffset => self.zone_offset = int(slot, &value)?,
            Slot::ExpirationDate => self.expiration_date = int(slot, &value)?,
            Slot::MonthsOnStation => self.months_on_station = int(slot, &value)?,
            Slot::LastDateOnStation => self.last_date_on_station = int(slot, &value)?,
            Slot::Confidence => self.confidence = int(slot, &value)?,
            Slot::Amplitude => self.amplitude = floats(slot, value)?,
            Slot::Epoch => self.epoch = floats(slot, value)?,
            Slot::MinTimeAdd => self.min_time_add = int(slot, &value)?,
            Slot::MinLevelAdd => self.min_level_add = float(slot, &value)? as f32,
            Slot::MinLevelMultiply => self.min_level_multiply = float(slot, &value)? as f32,
            Slot::MaxTimeAdd => self.max_time_add = int(slot, &value)?,
            Slot::MaxLevelAdd => self.max_level_add = float(slot, &value)? as f32,
            Slot::MaxLevelMultiply => self.max_level_multiply = float(slot, &value)? as f32,
            Slot::FloodBegins => self.flood_begins = int(slot, &value)?,
            Slot::EbbBegins => self.ebb_begins = int(slot, &value)?,
        }
        Ok(())
    }

    /// Serialize into the fixed byte image.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut w = Writer {
            bytes: Vec::with_capacity(RECORD_SIZE),
        };
        w.put(&self.record_number.to_le_bytes());
        w.put(&(RECORD_SIZE as u32).to_le_bytes());
        w.put(&[self.record_type]);
        w.put(&self.latitude.to_le_bytes());
        w.put(&self.longitude.to_le_bytes());
        w.put(&self.reference_station.to_le_bytes());
        w.put(&self.tzfile.to_le_bytes());
        w.text(Slot::Name, &self.name)?;

        w.put(&self.country.to_le_bytes());
        w.text(Slot::Source, &self.source)?;
        w.put(&[self.restriction]);
        w.text(Slot::Comments, &self.comments)?;
        w.text(Slot::Notes, &self.notes)?;
        w.put(&[self.legalese]);
        w.text(Slot::StationIdContext, &self.station_id_context)?;
        w.text(Slot::StationId, &self.station_id)?;
        w.put(&self.date_imported.to_le_bytes());
        w.text(Slot::Xfields, &self.xfields)?;
        w.put(&[self.direction_units]);
        w.put(&self.min_direction.to_le_bytes());
        w.put(&self.max_direction.to_le_bytes());
        w.put(&[self.level_units]);

        w.put(&self.datum_offset.to_le_bytes());
        w.put(&self.datum.to_le_bytes());
        w.put(&self.zone_offset.to_le_bytes());
        w.put(&self.expiration_date.to_le_bytes());
        w.put(&self.months_on_station.to_le_bytes());
        w.put(&self.last_date_on_station.to_le_bytes());
        w.put(&[self.confidence]);
        for v in self.amplitude.iter().chain(self.epoch.iter()) {
            w.put(&v.to_le_bytes());
        }

        w.put(&self.min_time_add.to_le_bytes());
        w.put(&self.min_level_add.to_le_bytes());
        w.put(&self.min_level_multiply.to_le_bytes());
        w.put(&self.max_time_add.to_le_bytes());
        w.put(&self.max_level_add.to_le_bytes());
        w.put(&self.max_level_multiply.to_le_bytes());
        w.put(&self.flood_begins.to_le_bytes());
        w.put(&self.ebb_begins.to_le_bytes());

        debug_assert_eq!(w.bytes.len(), RECORD_SIZE);
        Ok(w.bytes)
    }

    /// Parse a fixed byte image.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != RECORD_SIZE {
            return Err(TcdError::InvalidFile(format!(
                "record is {} bytes, expected {}",
                bytes.len(),
                RECORD_SIZE
            )));
        }
        let mut r = Reader { bytes, pos: 0 };
        let mut rec = RawRecord {
            record_number: i32::from_le_bytes(r.take()),
            record_size: u32::from_le_bytes(r.take()),
            record_type: u8::from_le_bytes(r.take()),
            latitude: f64::from_le_bytes(r.take()),
            longitude: f64::from_le_bytes(r.take()),
            reference_station: i32::from_le_bytes(r.take()),
            tzfile: i16::from_le_bytes(r.take()),
            name: r.text(ONELINER_LENGTH),
            country: i16::from_le_bytes(r.take()),
            source: r.text(ONELINER_LENGTH),
            restriction: u8::from_le_bytes(r.take()),
            comments: r.text(MONOLOGUE_LENGTH),
            notes: r.text(MONOLOGUE_LENGTH),
            legalese: u8::from_le_bytes(r.take()),
            station_id_context: r.text(ONELINER_LENGTH),
            station_id: r.text(ONELINER_LENGTH),
            date_imported: u32::from_le_bytes(r.take()),
            xfields: r.text(MONOLOGUE_LENGTH),
            direction_units: u8::from_le_bytes(r.take()),
            min_direction: i32::from_le_bytes(r.take()),
            max_direction: i32::from_le_bytes(r.take()),
            level_units: u8::from_le_bytes(r.take()),
            datum_offset: f32::from_le_bytes(r.take()),
            datum: i16::from_le_bytes(r.take()),
            zone_offset: i32::from_le_bytes(r.take()),
            expiration_date: u32::from_le_bytes(r.take()),
            months_on_station: u16::from_le_bytes(r.take()),
            last_date_on_station: u32::from_le_bytes(r.take()),
            confidence: u8::from_le_bytes(r.take()),
            ..RawRecord::default()
        };
        for slot in rec.amplitude.iter_mut() {
            *slot = f32::from_le_bytes(r.take());
        }
        for slot in rec.epoch.iter_mut() {
            *slot = f32::from_le_bytes(r.take());
        }
        rec.min_time_add = i32::from_le_bytes(r.take());
        rec.min_level_add = f32::from_le_bytes(r.take());
        rec.min_level_multiply = f32::from_le_bytes(r.take());
        rec.max_time_add = i32::from_le_bytes(r.take());
        rec.max_level_add = f32::from_le_bytes(r.take());
        rec.max_level_multiply = f32::from_le_bytes(r.take());
        rec.flood_begins = i32::from_le_bytes(r.take());
        rec.ebb_begins = i32::from_le_bytes(r.take());
        Ok(rec)
    }
}

struct Writer {
    bytes: Vec<u8>,
}

impl Writer {
    fn put(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    fn text(&mut self, slot: Slot, value: &[u8]) -> Result<()> {
        let width = slot.text_width().unwrap_or(0);
        let content = text::until_nul(value);
        if content.len() >= width {
            return Err(TcdError::TextTooLong {
                slot,
                len: content.len(),
                max: width - 1,
            });
        }
        self.bytes.extend_from_slice(content);
        self.bytes
            .resize(self.bytes.len() + width - content.len(), 0);
        Ok(())
    }
}

/// Cursor over a buffer already checked to be `RECORD_SIZE` long.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn text(&mut self, width: usize) -> Vec<u8> {
        let buf = &self.bytes[self.pos..self.pos + width];
        self.pos += width;
        text::until_nul(buf).to_vec()
    }
}

/// Database-wide summary counts, as reported by the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DbHeader {
    pub version: String,
    pub major_rev: u32,
    pub minor_rev: u32,
    pub last_modified: String,
    pub number_of_records: u32,
    pub start_year: i32,
    pub number_of_years: u32,
    pub constituents: u32,
    pub level_unit_types: u32,
    pub dir_unit_types: u32,
    pub restriction_types: u32,
    pub datum_types: u32,
    pub countries: u32,
    pub tzfiles: u32,
    pub legaleses: u32,
}
