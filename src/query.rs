//! Builder for Drive `files.list` query strings.

use crate::models::FOLDER_MIME_TYPE;

/// Default cap on results returned by a search.
pub const DEFAULT_MAX_RESULTS: usize = 100;

/// Escape a value for use inside a single-quoted Drive query literal.
pub fn escape_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Search criteria; every set field narrows the result.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// Raw Drive query, ANDed with the other clauses.
    pub raw: Option<String>,
    pub parent_id: Option<String>,
    pub name_contains: Option<String>,
    pub name_equals: Option<String>,
    pub mime_type: Option<String>,
    pub folders_only: bool,
    pub include_trashed: bool,
    pub max_results: usize,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            raw: None,
            parent_id: None,
            name_contains: None,
            name_equals: None,
            mime_type: None,
            folders_only: false,
            include_trashed: false,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(mut self, query: impl Into<String>) -> Self {
        self.raw = Some(query.into());
        self
    }

    pub fn in_folder(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn name_contains(mut self, fragment: impl Into<String>) -> Self {
        self.name_contains = Some(fragment.into());
        self
    }

    pub fn name_equals(mut self, name: impl Into<String>) -> Self {
        self.name_equals = Some(name.into());
        self
    }

    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn folders_only(mut self) -> Self {
        self.folders_only = true;
        self
    }

    pub fn include_trashed(mut self, include: bool) -> Self {
        self.include_trashed = include;
        self
    }

    pub fn max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    /// Render the `q` parameter. `None` means "match everything".
    pub fn to_query_string(&self) -> Option<String> {
        let mut parts = Vec::new();

        if let Some(raw) = self.raw.as_deref().filter(|r| !r.trim().is_empty()) {
            parts.push(format!("({})", raw.trim()));
        }
        if let Some(parent) = &self.parent_id {
            parts.push(format!("'{}' in parents", escape_literal(parent)));
        }
        if let Some(fragment) = &self.name_contains {
            parts.push(format!("name contains '{}'", escape_literal(fragment)));
        }
        if let Some(name) = &self.name_equals {
            parts.push(format!("name = '{}'", escape_literal(name)));
        }
        if self.folders_only {
            parts.push(format!("mimeType = '{}'", FOLDER_MIME_TYPE));
        } else if let Some(mime) = &self.mime_type {
            parts.push(format!("mimeType = '{}'", escape_literal(mime)));
        }
        if !self.include_trashed {
            parts.push("trashed = false".to_string());
        }

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" and "))
        }
    }
}
