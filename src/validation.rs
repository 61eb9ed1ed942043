//! Validation helpers for device configuration values.
//!
//! Every check runs before a value is stored, so a rejected write never reaches
//! the transport and never disturbs the connection state.

use std::ops::RangeInclusive;

use crate::error::{AppResult, AutofocusError};

/// Valid motion-control device addresses.
pub const DEVICE_ADDRESS_RANGE: RangeInclusive<i64> = 1..=99;

/// Valid axis numbers within a device.
pub const AXIS_NUMBER_RANGE: RangeInclusive<i64> = 1..=99;

/// Valid objective turret addresses; values `<= 0` mean no turret.
pub const TURRET_ADDRESS_RANGE: RangeInclusive<i64> = -1..=99;

/// Valid TCP ports for the autofocus provider.
pub const TCP_PORT_RANGE: RangeInclusive<i64> = 1..=65535;

/// Validates that `value` lies in `range`, naming `field` in the error.
pub fn is_in_range<T>(field: &str, value: T, range: RangeInclusive<T>) -> AppResult<()>
where
    T: PartialOrd + std::fmt::Display,
{
    if range.contains(&value) {
        Ok(())
    } else {
        Err(AutofocusError::Configuration(format!(
            "{} must be in [{}, {}], got {}",
            field,
            range.start(),
            range.end(),
            value
        )))
    }
}

/// Validates a string value is not blank.
pub fn is_not_empty(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        Err(AutofocusError::Configuration(format!(
            "{} cannot be empty",
            field
        )))
    } else {
        Ok(())
    }
}

/// Validates a floating point value is finite.
pub fn is_finite(field: &str, value: f64) -> AppResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(AutofocusError::Configuration(format!(
            "{} must be a finite number, got {}",
            field, value
        )))
    }
}

/// Checks `value` against `range` and narrows it to the target integer type.
pub fn narrow<T>(field: &str, value: i64, range: RangeInclusive<i64>) -> AppResult<T>
where
    T: TryFrom<i64>,
{
    is_in_range(field, value, range)?;
    T::try_from(value).map_err(|_| {
        AutofocusError::Configuration(format!("{} value {} does not fit", field, value))
    })
}
