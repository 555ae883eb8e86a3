//! Single-slot error surface.

#[cfg(test)]
#[path = "notice_test.rs"]
mod notice_test;

/// The current user-facing error, if any. A new error overwrites an unseen
/// one; there is no queue.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorSurface {
    message: Option<String>,
    revision: u64,
}

impl ErrorSurface {
    /// Set the current error and return its revision.
    pub fn raise(&mut self, message: impl Into<String>) -> u64 {
        self.revision += 1;
        self.message = Some(message.into());
        self.revision
    }

    pub fn clear(&mut self) {
        self.message = None;
    }

    /// Clear only if the current error is still the one raised at `revision`.
    pub fn clear_if(&mut self, revision: u64) -> bool {
        if self.revision != revision || self.message.is_none() {
            return false;
        }
        self.message = None;
        true
    }

    #[must_use]
    pub fn current(&self) -> Option<&str> {
        self.message.as_deref()
    }
}
