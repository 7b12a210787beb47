//! # Scalar Encoders
//!
//! Packed representations for the field-specific scalar conventions of a
//! station record:
//!
//! | Domain | Packed | Example |
//! |--------|--------|---------|
//! | `NaiveDate` | `YYYYMMDD` decimal | 2001-02-03 ⇔ `20010203` |
//! | [`TimeOffset`] | sign × (`HH`×100 + `MM`) | −09:30 ⇔ `-930` |
//! | direction | degrees in [0, 360) | `42` ⇔ `42` |
//! | [`Xfields`] | folded `key:value` lines | `{a: "b\nb2"}` ⇔ `"a:b\n b2\n"` |
//!
//! Sentinels ("absent" values) are not handled here; the field codecs in
//! [`crate::codec`] check for them before calling these functions.

use chrono::{Datelike, Duration, NaiveDate};
use std::fmt;

use crate::error::{Result, TcdError};
use crate::text;

/// Packed value reserved for "no slack offset" in the flood/ebb fields.
///
/// It decodes to 25 hours 60 minutes, which is never a valid offset, so it
/// cannot collide with a real one (zero in particular is a real offset).
pub const NULL_SLACK_OFFSET: i32 = 0xA00;

/// Packed value reserved for "no direction".
pub const NULL_DIRECTION: i32 = 361;

// -- Dates --

/// Decompose a `YYYYMMDD` value into a calendar date.
pub fn date_from_packed(packed: u32) -> Result<NaiveDate> {
    let (yyyy, mmdd) = (packed / 10_000, packed % 10_000);
    let (mm, dd) = (mmdd / 100, mmdd % 100);
    NaiveDate::from_ymd_opt(yyyy as i32, mm, dd).ok_or(TcdError::MalformedDate(packed))
}

/// Compose a calendar date into a `YYYYMMDD` value.
pub fn date_to_packed(date: NaiveDate) -> Result<u32> {
    let year = u32::try_from(date.year()).map_err(|_| TcdError::MalformedDate(0))?;
    Ok(year * 10_000 + date.month() * 100 + date.day())
}

// -- Time offsets --

/// A signed offset with whole-minute resolution.
///
/// Displays as `0:00` when zero, otherwise as `+HH:MM` / `-HH:MM`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOffset {
    minutes: i32,
}

impl TimeOffset {
    pub const ZERO: TimeOffset = TimeOffset { minutes: 0 };

    pub fn from_minutes(minutes: i32) -> Self {
        TimeOffset { minutes }
    }

    /// Offset of `hours` and `minutes`, both taking the sign of the result.
    ///
    /// `TimeOffset::hm(-9, -30)` is nine and a half hours behind.
    pub fn hm(hours: i32, minutes: i32) -> Self {
        TimeOffset {
            minutes: hours * 60 + minutes,
        }
    }

    /// Round a duration to the nearest minute.
    ///
    /// Exactly thirty seconds rounds down; anything above rounds up.
    pub fn from_duration(duration: Duration) -> Result<Self> {
        const MINUTE_US: i64 = 60_000_000;
        let micros = duration
            .num_microseconds()
            .ok_or(TcdError::OffsetOutOfRange)?;
        let mut minutes = micros.div_euclid(MINUTE_US);
        if micros.rem_euclid(MINUTE_US) > MINUTE_US / 2 {
            minutes += 1;
        }
        let minutes = i32::try_from(minutes).map_err(|_| TcdError::OffsetOutOfRange)?;
        Ok(TimeOffset { minutes })
    }

    pub fn minutes(self) -> i32 {
        self.minutes
    }

    pub fn as_duration(self) -> Duration {
        Duration::minutes(i64::from(self.minutes))
    }

    /// Decode `sign × (HH×100 + MM)`.
    pub fn from_packed(packed: i32) -> Result<Self> {
        let sign = if packed >= 0 { 1 } else { -1 };
        let magnitude = packed.unsigned_abs();
        let (hours, minutes) = (magnitude / 100, magnitude % 100);
        if minutes >= 60 {
            return Err(TcdError::MalformedOffset(packed));
        }
        let total = i32::try_from(hours * 60 + minutes).map_err(|_| TcdError::OffsetOutOfRange)?;
        Ok(TimeOffset {
            minutes: sign * total,
        })
    }

    /// Encode as `sign × (HH×100 + MM)`.
    pub fn to_packed(self) -> Result<i32> {
        let sign = if self.minutes > 0 { 1 } else { -1 };
        let magnitude = self.minutes.unsigned_abs();
        let (hh, mm) = (magnitude / 60, magnitude % 60);
        let packed = hh
            .checked_mul(100)
            .and_then(|v| v.checked_add(mm))
            .and_then(|v| i32::try_from(v).ok())
            .ok_or(TcdError::OffsetOutOfRange)?;
        Ok(sign * packed)
    }
}

impl fmt::Display for TimeOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.minutes == 0 {
            return f.write_str("0:00");
        }
        let sign = if self.minutes < 0 { '-' } else { '+' };
        let magnitude = self.minutes.unsigned_abs();
        write!(f, "{}{:02}:{:02}", sign, magnitude / 60, magnitude % 60)
    }
}

// -- Directions --

/// Lenient decode: anything outside [0, 360) is treated as absent.
pub fn direction_from_packed(packed: i32) -> Option<i32> {
    if (0..360).contains(&packed) {
        Some(packed)
    } else {
        if packed != NULL_DIRECTION {
            log::warn!("ignoring out-of-range direction {}", packed);
        }
        None
    }
}

/// Strict encode: the direction must lie in [0, 360).
pub fn direction_to_packed(direction: i32) -> Result<i32> {
    if (0..360).contains(&direction) {
        Ok(direction)
    } else {
        Err(TcdError::DirectionOutOfRange(direction))
    }
}

// -- Annotation block --

/// Ordered `key → text` annotations ("extra fields") of a station.
///
/// Keys are unique; insertion order is kept and is significant.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Xfields {
    entries: Vec<(String, String)>,
}

impl Xfields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. A replaced key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Xfields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut xfields = Xfields::new();
        for (k, v) in iter {
            xfields.insert(k, v);
        }
        xfields
    }
}

/// Parse an annotation block.
///
/// Each entry is `key:value`; a value continues onto following lines that
/// start with one space. Parsing stops at the first line that is neither an
/// entry nor a continuation, and whatever follows is ignored.
pub fn unfold_xfields(packed: &[u8]) -> Xfields {
    let block = text::decode(packed);
    let mut xfields = Xfields::new();
    let mut lines = block.split('\n').peekable();

    while let Some(line) = lines.next() {
        let entry = if line.starts_with(' ') {
            None
        } else {
            line.split_once(':').filter(|(key, _)| !key.is_empty())
        };
        let Some((key, first)) = entry else {
            let rest: Vec<&str> = std::iter::once(line).chain(lines).collect();
            if rest.iter().any(|l| !l.is_empty()) {
                log::warn!("ignoring trailing annotation text: {:?}", rest.join("\n"));
            }
            break;
        };

        let mut value = first.to_string();
        while let Some(continuation) = lines.peek().and_then(|next| next.strip_prefix(' ')) {
            value.push('\n');
            value.push_str(continuation);
            lines.next();
        }
        xfields.insert(key, value);
    }

    xfields
}

/// Emit an annotation block, one newline-terminated entry per key.
///
/// Keys must be non-empty, must not start with a space and must not
/// contain `:` or a newline; otherwise the block would not parse back.
pub fn fold_xfields(xfields: &Xfields) -> Result<Vec<u8>> {
    let mut packed = Vec::new();
    for (key, value) in xfields.iter() {
        if key.is_empty() || key.starts_with(' ') || key.contains([':', '\n']) {
            return Err(TcdError::InvalidAnnotationKey(key.to_string()));
        }
        packed.extend(text::encode(key)?);
        packed.push(b':');
        for (i, line) in text::encode(value)?.split(|&b| b == b'\n').enumerate() {
            if i > 0 {
                packed.extend_from_slice(b"\n ");
            }
            packed.extend_from_slice(line);
        }
        packed.push(b'\n');
    }
    Ok(packed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_xfields() -> Xfields {
        [("a", "b\nb2"), ("c", " d ")].into_iter().collect()
    }

    #[test]
    fn test_date_packing() {
        let date = NaiveDate::from_ymd_opt(2001, 2, 3).unwrap();
        assert_eq!(date_to_packed(date).unwrap(), 20010203);
        assert_eq!(date_from_packed(20010203).unwrap(), date);
    }

    #[test]
    fn test_date_rejects_impossible_day() {
        assert!(matches!(
            date_from_packed(20010230),
            Err(TcdError::MalformedDate(20010230))
        ));
    }

    #[test]
    fn test_offset_packing() {
        let offset = TimeOffset::hm(-9, -30);
        assert_eq!(offset.to_packed().unwrap(), -930);
        assert_eq!(TimeOffset::from_packed(-930).unwrap(), offset);
        assert_eq!(TimeOffset::from_packed(0).unwrap(), TimeOffset::ZERO);
        assert_eq!(TimeOffset::ZERO.to_packed().unwrap(), 0);
        assert_eq!(TimeOffset::hm(26, 5).to_packed().unwrap(), 2605);
    }

    #[test]
    fn test_offset_rejects_bad_minutes() {
        assert!(matches!(
            TimeOffset::from_packed(60),
            Err(TcdError::MalformedOffset(60))
        ));
        assert!(TimeOffset::from_packed(NULL_SLACK_OFFSET).is_err());
    }

    #[test]
    fn test_offset_rounding() {
        let cases = [
            (Duration::seconds(0), "0:00"),
            (Duration::seconds(3600), "+01:00"),
            (Duration::milliseconds(7_229_900), "+02:00"),
            (Duration::milliseconds(7_230_100), "+02:01"),
            (Duration::seconds(7230), "+02:00"),
            (Duration::seconds(-3629), "-01:00"),
        ];
        for (duration, expected) in cases {
            let offset = TimeOffset::from_duration(duration).unwrap();
            assert_eq!(offset.to_string(), expected, "{:?}", duration);
        }
    }

    #[test]
    fn test_direction_strict_pack_lenient_unpack() {
        assert_eq!(direction_to_packed(0).unwrap(), 0);
        assert_eq!(direction_to_packed(359).unwrap(), 359);
        assert!(matches!(
            direction_to_packed(360),
            Err(TcdError::DirectionOutOfRange(360))
        ));
        assert!(direction_to_packed(-1).is_err());

        assert_eq!(direction_from_packed(42), Some(42));
        assert_eq!(direction_from_packed(NULL_DIRECTION), None);
        assert_eq!(direction_from_packed(400), None);
        assert_eq!(direction_from_packed(-5), None);
    }

    #[test]
    fn test_xfields_fold() {
        assert_eq!(fold_xfields(&sample_xfields()).unwrap(), b"a:b\n b2\nc: d \n");
        assert_eq!(fold_xfields(&Xfields::new()).unwrap(), b"");
    }

    #[test]
    fn test_xfields_unfold() {
        assert_eq!(unfold_xfields(b"a:b\n b2\nc: d \n"), sample_xfields());
        assert_eq!(unfold_xfields(b""), Xfields::new());
    }

    #[test]
    fn test_xfields_unfold_ignores_cruft() {
        assert_eq!(
            unfold_xfields(b"a:b\n b2\nc: d \n\nfoo\n"),
            sample_xfields()
        );
    }

    #[test]
    fn test_xfields_value_with_colon_and_trailing_newline() {
        let xfields: Xfields = [("url", "http://x:80/"), ("tail", "line\n"), ("lead", "\n x")]
            .into_iter()
            .collect();
        let packed = fold_xfields(&xfields).unwrap();
        assert_eq!(unfold_xfields(&packed), xfields);
    }

    #[test]
    fn test_xfields_rejects_unparseable_keys() {
        for key in ["", "a:b", " lead", "two\nlines"] {
            let xfields: Xfields = [(key, "v")].into_iter().collect();
            assert!(
                matches!(fold_xfields(&xfields), Err(TcdError::InvalidAnnotationKey(_))),
                "{:?}",
                key
            );
        }
    }

    #[test]
    fn test_xfields_insert_keeps_position() {
        let mut xfields = sample_xfields();
        assert_eq!(xfields.insert("a", "new"), Some("b\nb2".to_string()));
        let keys: Vec<&str> = xfields.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["a", "c"]);
        assert_eq!(xfields.get("a"), Some("new"));
    }
}
