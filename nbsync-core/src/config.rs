//! Per-invocation engine options.

/// Options for one reconciliation, built once by the caller and passed down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineOptions {
    /// Compute the decision without issuing create/update/delete calls.
    pub check_mode: bool,
    /// Create missing reference targets from their name, for fields that allow it.
    pub create_missing_references: bool,
}

impl EngineOptions {
    pub fn check_mode(mut self, enabled: bool) -> Self {
        self.check_mode = enabled;
        self
    }

    pub fn create_missing_references(mut self, enabled: bool) -> Self {
        self.create_missing_references = enabled;
        self
    }
}
