//! Parser handler that fills a flat record from a definition table.

use stave_parse::ParseHandler;

use crate::defs::{SettingDef, apply_setting};

/// Applies every dispatched assignment to `record` through a
/// [`SettingDef`] table.
///
/// Sections are skipped (the trait's default), matching consumers whose
/// options all live at the top level. An unknown key or a coercion failure
/// aborts the parse.
pub struct SettingsApplier<'a, T> {
    defs: &'a [SettingDef<T>],
    record: &'a mut T,
}

impl<'a, T> SettingsApplier<'a, T> {
    pub fn new(defs: &'a [SettingDef<T>], record: &'a mut T) -> Self {
        SettingsApplier { defs, record }
    }
}

impl<T> ParseHandler for SettingsApplier<'_, T> {
    fn assignment(&mut self, key: &str, value: &str) -> Result<(), String> {
        apply_setting(self.defs, self.record, key, value)
    }
}
