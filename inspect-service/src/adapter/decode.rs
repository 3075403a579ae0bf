//! Shared value coercions for the backend adapters.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use common::models::query::CellValue;

pub(crate) fn date(value: NaiveDate) -> CellValue {
    CellValue::Timestamp(value.format("%Y-%m-%d").to_string())
}

pub(crate) fn time(value: NaiveTime) -> CellValue {
    CellValue::Timestamp(value.format("%H:%M:%S%.f").to_string())
}

pub(crate) fn datetime(value: NaiveDateTime) -> CellValue {
    CellValue::Timestamp(value.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
}

pub(crate) fn datetime_utc(value: DateTime<Utc>) -> CellValue {
    CellValue::Timestamp(value.to_rfc3339())
}

/// Renders a PostgreSQL `NUMERIC` from its binary wire form without going
/// through a float: header of four big-endian u16 (ndigits, weight, sign,
/// dscale) followed by base-10000 digit groups.
#[cfg_attr(not(feature = "postgres"), allow(dead_code))]
pub(crate) fn pg_numeric_text(bytes: &[u8]) -> Option<String> {
    if bytes.len() < 8 {
        return None;
    }
    let read = |at: usize| u16::from_be_bytes([bytes[at], bytes[at + 1]]);
    let ndigits = read(0) as usize;
    let weight = read(2) as i16 as i64;
    let sign = read(4);
    let dscale = read(6) as usize;
    if bytes.len() != 8 + ndigits * 2 {
        return None;
    }

    let negative = match sign {
        0x0000 => false,
        0x4000 => true,
        0xC000 => return Some("NaN".to_string()),
        0xD000 => return Some("Infinity".to_string()),
        0xF000 => return Some("-Infinity".to_string()),
        _ => return None,
    };

    let digit = |index: i64| -> u16 {
        if index < 0 {
            0
        } else {
            let index = index as usize;
            if index < ndigits {
                read(8 + index * 2)
            } else {
                0
            }
        }
    };

    let mut text = String::new();
    if negative {
        text.push('-');
    }
    if weight < 0 {
        text.push('0');
    } else {
        for index in 0..=weight {
            if index == 0 {
                text.push_str(&digit(index).to_string());
            } else {
                text.push_str(&format!("{:04}", digit(index)));
            }
        }
    }

    if dscale > 0 {
        let mut fraction = String::with_capacity(dscale + 4);
        let mut index = weight + 1;
        while fraction.len() < dscale {
            fraction.push_str(&format!("{:04}", digit(index)));
            index += 1;
        }
        fraction.truncate(dscale);
        text.push('.');
        text.push_str(&fraction);
    }
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric(weight: i16, sign: u16, dscale: u16, digits: &[u16]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(digits.len() as u16).to_be_bytes());
        bytes.extend_from_slice(&weight.to_be_bytes());
        bytes.extend_from_slice(&sign.to_be_bytes());
        bytes.extend_from_slice(&dscale.to_be_bytes());
        for d in digits {
            bytes.extend_from_slice(&d.to_be_bytes());
        }
        bytes
    }

    #[test]
    fn test_pg_numeric_text() {
        assert_eq!(pg_numeric_text(&numeric(0, 0, 2, &[123, 4500])).as_deref(), Some("123.45"));
        assert_eq!(pg_numeric_text(&numeric(-1, 0x4000, 1, &[5000])).as_deref(), Some("-0.5"));
        assert_eq!(pg_numeric_text(&numeric(1, 0, 0, &[1])).as_deref(), Some("10000"));
        assert_eq!(
            pg_numeric_text(&numeric(-2, 0, 8, &[1234])).as_deref(),
            Some("0.00001234")
        );
        assert_eq!(pg_numeric_text(&numeric(0, 0, 0, &[])).as_deref(), Some("0"));
        assert_eq!(pg_numeric_text(&numeric(0, 0xC000, 0, &[])).as_deref(), Some("NaN"));
        assert_eq!(pg_numeric_text(&[0, 1]), None);
    }

    #[test]
    fn test_temporal_values_are_iso() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let dt = d.and_hms_opt(3, 4, 5).unwrap();
        assert_eq!(date(d), CellValue::Timestamp("2024-01-02".into()));
        assert_eq!(datetime(dt), CellValue::Timestamp("2024-01-02T03:04:05".into()));
        assert_eq!(
            datetime_utc(dt.and_utc()),
            CellValue::Timestamp("2024-01-02T03:04:05+00:00".into())
        );
        assert_eq!(
            time(NaiveTime::from_hms_milli_opt(10, 0, 1, 250).unwrap()),
            CellValue::Timestamp("10:00:01.250".into())
        );
    }
}
