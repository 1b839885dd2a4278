//! EXIF capture date extraction for photos

use crate::error::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime};
use exif::{In, Reader, Tag, Value};
use std::io::Cursor;
use tracing::trace;

/// Tag holding the capture date, stored on IFD0 as `YYYY:MM:DD HH:MM:SS`
const DATE_TAG: Tag = Tag::DateTime;

/// Read the capture date from the EXIF block of an in-memory image
pub fn extract_exif_time(data: &[u8]) -> Result<NaiveDateTime> {
    let exif = Reader::new()
        .read_from_container(&mut Cursor::new(data))
        .map_err(|e| Error::ExifRead {
            message: e.to_string(),
        })?;

    let field = exif
        .get_field(DATE_TAG, In::PRIMARY)
        .ok_or_else(|| Error::ExifRead {
            message: format!("no {} tag", DATE_TAG),
        })?;

    let raw = match &field.value {
        Value::Ascii(values) => values.first().ok_or_else(|| Error::ExifRead {
            message: format!("{} tag is empty", DATE_TAG),
        })?,
        other => {
            return Err(Error::ExifRead {
                message: format!("{} tag is not ASCII: {:?}", DATE_TAG, other),
            });
        }
    };

    let datetime = parse_exif_datetime(raw)?;
    trace!(%datetime, "Found EXIF date");
    Ok(datetime)
}

/// Parse an EXIF ASCII datetime; zero or out-of-range dates are rejected
fn parse_exif_datetime(raw: &[u8]) -> Result<NaiveDateTime> {
    let invalid = |message: String| Error::ExifRead { message };

    let dt = exif::DateTime::from_ascii(raw).map_err(|e| invalid(e.to_string()))?;

    NaiveDate::from_ymd_opt(dt.year.into(), dt.month.into(), dt.day.into())
        .and_then(|date| date.and_hms_opt(dt.hour.into(), dt.minute.into(), dt.second.into()))
        .ok_or_else(|| invalid(format!("invalid date {}", String::from_utf8_lossy(raw))))
}
