//! Setting definition tables.

use crate::coerce::{parse_bool, parse_uint};

/// How a setting's value lands in the record.
pub enum Apply<T> {
    /// Store the value text as-is.
    Str(fn(&mut T, &str)),
    /// Coerce with [`parse_uint`](crate::parse_uint) first.
    UInt(fn(&mut T, u32)),
    /// Coerce with [`parse_bool`](crate::parse_bool) first.
    Bool(fn(&mut T, bool)),
}

impl<T> Clone for Apply<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Apply<T> {}

/// One named setting of a record type `T`.
pub struct SettingDef<T> {
    /// Option name, matched exactly against assignment keys.
    pub name: &'static str,
    /// Typed setter for the record field.
    pub apply: Apply<T>,
}

impl<T> Clone for SettingDef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SettingDef<T> {}

/// Look `key` up in `defs` and store the coerced `value` into `record`.
///
/// Unknown keys and coercion failures come back as the error message the
/// parser will attach file and line context to.
pub fn apply_setting<T>(
    defs: &[SettingDef<T>],
    record: &mut T,
    key: &str,
    value: &str,
) -> Result<(), String> {
    for def in defs {
        if def.name == key {
            return match def.apply {
                Apply::Str(set) => {
                    set(record, value);
                    Ok(())
                }
                Apply::UInt(set) => parse_uint(value).map(|v| set(record, v)),
                Apply::Bool(set) => parse_bool(value).map(|v| set(record, v)),
            };
        }
    }
    Err(format!("Unknown setting: {key}"))
}
