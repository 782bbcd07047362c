//! Definition-driven settings records on top of `stave-parse`.
//!
//! A consumer describes its options once, as a table of [`SettingDef`]s
//! mapping option names to typed setters on its record struct.
//! [`apply_setting`] coerces a single `(key, value)` pair into the record;
//! [`SettingsApplier`] does the same for a whole file by acting as the
//! parser's handler, with every section skipped.

mod coerce;
mod defs;
mod handler;

pub use coerce::{parse_bool, parse_uint};
pub use defs::{Apply, SettingDef, apply_setting};
pub use handler::SettingsApplier;
