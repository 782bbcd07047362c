//! Consumer-facing handler trait.

/// What to do with the body of an opened section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionAction {
    /// Dispatch the section body.
    Enter,
    /// Track structure but fire no callbacks until the matching `}`.
    Skip,
}

/// Receiver for dispatched configuration events.
///
/// Returning `Err` from any method aborts the parse; the message comes back
/// to the caller wrapped with file and line context.
///
/// The section methods have defaults that skip every section, so a flat
/// consumer only has to implement [`assignment`](ParseHandler::assignment).
pub trait ParseHandler {
    /// `key = value`. The value has been unquoted or environment-expanded.
    fn assignment(&mut self, key: &str, value: &str) -> Result<(), String>;

    /// `kind [name] {`. Decide whether the body gets dispatched.
    fn section_open(&mut self, kind: &str, name: &str) -> Result<SectionAction, String> {
        let _ = (kind, name);
        Ok(SectionAction::Skip)
    }

    /// `}` of a section whose open returned [`SectionAction::Enter`].
    fn section_close(&mut self) -> Result<(), String> {
        Ok(())
    }
}
