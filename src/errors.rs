use thiserror::Error; // Import the `Error` derive macro from the `thiserror` crate

// Errors raised when reading request-scoped context values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    // The getter ran before any setter in the current request scope.
    // Carries the diagnostic name the context was created with.
    #[error("accessing unset context value: {name}")]
    Unset { name: String },
}

impl ContextError {
    /// Diagnostic name of the context that failed.
    pub fn context_name(&self) -> &str {
        match self {
            ContextError::Unset { name } => name,
        }
    }
}

// Type alias for results that use `ContextError` as the error type
pub type Result<T> = std::result::Result<T, ContextError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_message_embeds_name() {
        let err = ContextError::Unset { name: "userId".into() };
        assert_eq!(err.to_string(), "accessing unset context value: userId");
        assert_eq!(err.context_name(), "userId");
    }
}
