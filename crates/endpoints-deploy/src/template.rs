// crates/endpoints-deploy/src/template.rs
// ============================================================================
// Module: Config Templater
// Description: Placeholder substitution for Endpoints configuration documents.
// Purpose: Rewrite checked-in templates with live identity values.
// Dependencies: std, thiserror
// ============================================================================

//! ## Overview
//! The sample's `openapi.yaml` ships with marker tokens for the project, the
//! OAuth client and the service account. [`render`] substitutes every
//! occurrence; tokens missing from a document are a no-op. Writes only ever
//! target the working copy.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Placeholder replaced with the project identifier.
pub const PROJECT_ID_PLACEHOLDER: &str = "YOUR-PROJECT-ID";
/// Placeholder replaced with the OAuth client identifier.
pub const CLIENT_ID_PLACEHOLDER: &str = "YOUR-CLIENT-ID";
/// Placeholder replaced with the service account email.
pub const SERVICE_ACCOUNT_EMAIL_PLACEHOLDER: &str = "YOUR-SERVICE-ACCOUNT-EMAIL";

/// Documents templated when no explicit list is given.
pub const DEFAULT_DOCUMENTS: &[&str] = &["openapi.yaml"];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Templating failures.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Template document could not be read.
    #[error("failed to read template {path}: {source}")]
    Read {
        /// Template path.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// Rendered document could not be written.
    #[error("failed to write templated document {path}: {source}")]
    Write {
        /// Target path.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
}

// ============================================================================
// SECTION: Values
// ============================================================================

/// Live values substituted for the three placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderValues {
    /// Project identifier.
    pub project_id: String,
    /// OAuth client identifier.
    pub client_id: String,
    /// Service account email.
    pub service_account_email: String,
}

impl PlaceholderValues {
    /// Bundles the replacement values.
    #[must_use]
    pub fn new(
        project_id: impl Into<String>,
        client_id: impl Into<String>,
        service_account_email: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            client_id: client_id.into(),
            service_account_email: service_account_email.into(),
        }
    }

    /// Placeholder/value pairs in substitution order.
    fn pairs(&self) -> [(&'static str, &str); 3] {
        [
            (PROJECT_ID_PLACEHOLDER, self.project_id.as_str()),
            (CLIENT_ID_PLACEHOLDER, self.client_id.as_str()),
            (SERVICE_ACCOUNT_EMAIL_PLACEHOLDER, self.service_account_email.as_str()),
        ]
    }
}

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// Substitutes every placeholder occurrence in `template`.
///
/// Substitution is sequential, so a value that itself contains a later
/// placeholder token would be rewritten again.
#[must_use]
pub fn render(template: &str, values: &PlaceholderValues) -> String {
    values
        .pairs()
        .into_iter()
        .fold(template.to_string(), |doc, (placeholder, value)| doc.replace(placeholder, value))
}

/// Reads `source`, renders it, and writes the result to `target`.
///
/// `source` and `target` may be the same path.
///
/// # Errors
///
/// Returns [`TemplateError`] when the source cannot be read or the target
/// cannot be written.
pub fn write_templated(
    source: &Path,
    target: &Path,
    values: &PlaceholderValues,
) -> Result<(), TemplateError> {
    let template = fs::read_to_string(source).map_err(|source_err| TemplateError::Read {
        path: source.to_path_buf(),
        source: source_err,
    })?;
    fs::write(target, render(&template, values)).map_err(|source| TemplateError::Write {
        path: target.to_path_buf(),
        source,
    })
}

// ============================================================================
// SECTION: Templater
// ============================================================================

/// Templates a fixed set of documents inside a working directory.
#[derive(Debug, Clone)]
pub struct ConfigTemplater {
    /// Replacement values.
    values: PlaceholderValues,
    /// Document paths relative to the working directory.
    documents: Vec<PathBuf>,
}

impl ConfigTemplater {
    /// Creates a templater for [`DEFAULT_DOCUMENTS`].
    #[must_use]
    pub fn new(values: PlaceholderValues) -> Self {
        Self {
            values,
            documents: DEFAULT_DOCUMENTS.iter().map(PathBuf::from).collect(),
        }
    }

    /// Replaces the document list.
    #[must_use]
    pub fn with_documents<I, P>(mut self, documents: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.documents = documents.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the configured document paths.
    #[must_use]
    pub fn documents(&self) -> &[PathBuf] {
        &self.documents
    }

    /// Rewrites each document in place under `working_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] on the first document that fails.
    pub fn apply(&self, working_dir: &Path) -> Result<(), TemplateError> {
        for document in &self.documents {
            let path = working_dir.join(document);
            write_templated(&path, &path, &self.values)?;
        }
        Ok(())
    }
}
