//! Document lifecycle state.

/// Tracks where a document is in its lifecycle.
///
/// A document starts out in the parsing phase, during which structural
/// updates driven by the application (as opposed to the parser itself) are
/// not accepted. Once initial parsing completes, the parser flips the flag
/// and the document starts accepting updates.
#[derive(Debug)]
pub struct DocumentState {
    parsing: bool,
}

impl DocumentState {
    /// A fresh state, in the parsing phase.
    pub fn new() -> Self {
        Self { parsing: true }
    }

    /// Mark the document as being parsed (or not).
    pub fn set_parsing(&mut self, parsing: bool) {
        self.parsing = parsing;
    }

    /// Whether structural updates from the application are accepted.
    pub fn is_accepting_updates(&self) -> bool {
        !self.parsing
    }
}

impl Default for DocumentState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::DocumentState;

    #[test]
    fn updates_are_rejected_while_parsing() {
        let state = DocumentState::new();
        assert!(!state.is_accepting_updates());
    }

    #[test]
    fn updates_are_accepted_after_parsing() {
        let mut state = DocumentState::new();
        state.set_parsing(false);
        assert!(state.is_accepting_updates());

        // An incremental update re-enters the parsing phase.
        state.set_parsing(true);
        assert!(!state.is_accepting_updates());
    }
}
