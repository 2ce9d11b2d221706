use chrono::{Datelike, NaiveDate};

use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// Serial day code ↔ calendar date
// ---------------------------------------------------------------------------

/// Serial day of `0001-01-01` in the MATLAB `datenum` convention, where day 1
/// is `0000-01-01` of the proleptic Gregorian calendar.
pub const OFFSET: i64 = 367;

/// chrono counts `0001-01-01` as day 1 of the common era.
const CE_DAY_OF_REFERENCE: i64 = 1;

/// Convert a serial day code to its calendar date.
///
/// `date = 0001-01-01 + (serial_day - 367)` days.
pub fn decode(serial_day: i64) -> Result<NaiveDate> {
    serial_day
        .checked_sub(OFFSET)
        .and_then(|d| d.checked_add(CE_DAY_OF_REFERENCE))
        .and_then(|d| i32::try_from(d).ok())
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .ok_or_else(|| PipelineError::DateRange(serial_day.to_string()))
}

/// Convert a calendar date back to its serial day code. Inverse of [`decode`].
pub fn encode(date: NaiveDate) -> i64 {
    i64::from(date.num_days_from_ce()) - CE_DAY_OF_REFERENCE + OFFSET
}

/// Day codes arrive as doubles from the container; they are whole numbers in
/// practice but are rounded to the nearest day before conversion.
pub fn day_code_from_f64(value: f64) -> Result<i64> {
    // `i64::MAX as f64` is 2^63, one past the largest i64.
    if !value.is_finite() || value.abs() >= i64::MAX as f64 {
        return Err(PipelineError::DateRange(value.to_string()));
    }
    Ok(value.round() as i64)
}

/// Decode a day code stored as a double.
pub fn decode_f64(value: f64) -> Result<NaiveDate> {
    decode(day_code_from_f64(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_known_dates() {
        assert_eq!(decode(736673).unwrap(), NaiveDate::from_ymd_opt(2016, 12, 9).unwrap());
        assert_eq!(decode(736841).unwrap(), NaiveDate::from_ymd_opt(2017, 5, 26).unwrap());
        assert_eq!(decode(737165).unwrap(), NaiveDate::from_ymd_opt(2018, 4, 15).unwrap());
    }

    #[test]
    fn test_reference_day_is_year_one() {
        assert_eq!(decode(OFFSET).unwrap(), NaiveDate::from_ymd_opt(1, 1, 1).unwrap());
        assert_eq!(encode(NaiveDate::from_ymd_opt(1, 1, 1).unwrap()), OFFSET);
    }

    #[test]
    fn test_round_trip_over_data_range() {
        for day in (700_000..760_000).step_by(37) {
            assert_eq!(encode(decode(day).unwrap()), day);
        }
    }

    #[test]
    fn test_out_of_range() {
        assert!(matches!(decode(i64::MAX), Err(PipelineError::DateRange(_))));
        assert!(matches!(decode(i64::MIN), Err(PipelineError::DateRange(_))));
        assert!(decode(3_000_000_000).is_err());
        assert!(matches!(decode(i64::MIN + 1), Err(PipelineError::DateRange(_))));
        assert!(matches!(decode(i64::MAX - 1), Err(PipelineError::DateRange(_))));
    }

    #[test]
    fn test_extreme_doubles_are_rejected() {
        assert!(matches!(decode_f64(-9.223372036854775808e18), Err(PipelineError::DateRange(_))));
        assert!(matches!(decode_f64(9.223372036854775808e18), Err(PipelineError::DateRange(_))));
        assert!(matches!(decode_f64(1e12), Err(PipelineError::DateRange(_))));
        assert!(day_code_from_f64(-9.223372036854775808e18).is_err());
        assert_eq!(day_code_from_f64(-9.2e18).unwrap(), -9_200_000_000_000_000_000);
    }

    #[test]
    fn test_day_code_from_f64() {
        assert_eq!(day_code_from_f64(736673.0).unwrap(), 736673);
        assert_eq!(day_code_from_f64(736672.9999999).unwrap(), 736673);
        assert!(day_code_from_f64(f64::NAN).is_err());
        assert!(day_code_from_f64(f64::INFINITY).is_err());
    }
}
