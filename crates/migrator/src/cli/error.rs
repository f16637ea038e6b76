//! Helpful error types for CLI commands
//!
//! Every error includes:
//! - What went wrong
//! - Context about the situation
//! - Suggestions for how to fix it

use std::fmt;
use std::path::Path;

/// An error with helpful context and suggestions
#[derive(Debug)]
pub struct HelpfulError {
    /// The main error message
    pub message: String,
    /// Additional context about what was happening
    pub context: Option<String>,
    /// Suggestions for how to fix the error
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    /// Create a new helpful error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Add multiple suggestions
    pub fn with_suggestions(mut self, suggestions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.suggestions.extend(suggestions.into_iter().map(|s| s.into()));
        self
    }

    /// Path does not exist
    pub fn path_not_found(path: &Path) -> Self {
        Self::new(format!("Path not found: {}", path.display()))
            .with_context("The specified path does not exist on the filesystem")
            .with_suggestions([
                format!("TRY: Check that the path exists: ls -la {}", path.display()),
                "TRY: Check for typos in the path".to_string(),
            ])
    }

    /// Path exists but is not a directory
    pub fn not_a_directory(path: &Path) -> Self {
        Self::new(format!("Not a directory: {}", path.display()))
            .with_context("Projects and workspaces must be directories")
            .with_suggestions([format!(
                "TRY: Use the containing directory: {}",
                path.parent().unwrap_or(path).display()
            )])
    }

    /// Config file could not be loaded
    pub fn invalid_config(path: Option<&Path>, details: &str) -> Self {
        let location = path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "migrator.toml in the install root".to_string());
        Self::new(format!("Invalid configuration: {details}"))
            .with_context(format!("While loading {location}"))
            .with_suggestions([
                "TRY: Check the TOML syntax and field types".to_string(),
                "TRY: Remove the file to fall back to defaults".to_string(),
            ])
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_suggestions() {
        let err = HelpfulError::path_not_found(Path::new("/work/Missing"));
        let text = err.to_string();
        assert!(text.starts_with("ERROR: Path not found: /work/Missing"));
        assert!(text.contains("CONTEXT:"));
        assert!(text.contains("TRY: Check that the path exists"));
    }

    #[test]
    fn test_not_a_directory_points_to_parent() {
        let err = HelpfulError::not_a_directory(Path::new("/work/notes.txt"));
        assert!(err.suggestions[0].contains("/work"));
    }
}
