//! Math palette: static templates and symbols, plus best-effort clipboard copy.
//!
//! The catalog is reference data. It is parsed from the embedded
//! `catalog.yaml` on first use and shared read-only for the life of the
//! process. Hosts that ship their own palette build a [`Catalog`] with
//! [`Catalog::from_yaml`].

#[cfg(test)]
#[path = "catalog_test.rs"]
mod catalog_test;

use std::sync::OnceLock;

use serde::Deserialize;
use tracing::debug;

const BUILTIN_YAML: &str = include_str!("catalog.yaml");

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("invalid catalog document: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("catalog entry has an empty {field}: {name:?}")]
    EmptyField { field: &'static str, name: String },
    #[error("built-in catalog failed to load: {0}")]
    Builtin(String),
}

/// A ready-made formula the user can insert.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MathTemplate {
    pub name: String,
    /// TeX markup inserted through the math tool.
    pub formula: String,
    pub category: String,
}

/// A single symbol button.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MathSymbol {
    pub name: String,
    /// TeX markup for the symbol.
    pub symbol: String,
    pub category: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    templates: Vec<MathTemplate>,
    #[serde(default)]
    symbols: Vec<MathSymbol>,
}

impl Catalog {
    /// Parse and validate a catalog document.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Yaml`] for malformed YAML and
    /// [`CatalogError::EmptyField`] when an entry has blank markup or name.
    pub fn from_yaml(text: &str) -> Result<Self, CatalogError> {
        let catalog: Self = serde_yaml::from_str(text)?;
        for t in &catalog.templates {
            check("name", &t.name, &t.name)?;
            check("formula", &t.formula, &t.name)?;
        }
        for s in &catalog.symbols {
            check("name", &s.name, &s.name)?;
            check("symbol", &s.symbol, &s.name)?;
        }
        Ok(catalog)
    }

    /// The catalog embedded in this crate, parsed once.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Builtin`] if the embedded document is invalid.
    pub fn builtin() -> Result<&'static Self, CatalogError> {
        static BUILTIN: OnceLock<Result<Catalog, String>> = OnceLock::new();
        BUILTIN
            .get_or_init(|| Self::from_yaml(BUILTIN_YAML).map_err(|e| e.to_string()))
            .as_ref()
            .map_err(|e| CatalogError::Builtin(e.clone()))
    }

    #[must_use]
    pub fn templates(&self) -> &[MathTemplate] {
        &self.templates
    }

    #[must_use]
    pub fn symbols(&self) -> &[MathSymbol] {
        &self.symbols
    }

    /// Distinct template categories in first-seen order.
    #[must_use]
    pub fn template_categories(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for t in &self.templates {
            if !seen.contains(&t.category.as_str()) {
                seen.push(&t.category);
            }
        }
        seen
    }

    pub fn templates_in<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a MathTemplate> + 'a {
        self.templates.iter().filter(move |t| t.category == category)
    }

    pub fn symbols_in<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a MathSymbol> + 'a {
        self.symbols.iter().filter(move |s| s.category == category)
    }

    /// Case-insensitive lookup by template name.
    #[must_use]
    pub fn template(&self, name: &str) -> Option<&MathTemplate> {
        self.templates.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }
}

fn check(field: &'static str, value: &str, name: &str) -> Result<(), CatalogError> {
    if value.trim().is_empty() {
        return Err(CatalogError::EmptyField { field, name: name.to_owned() });
    }
    Ok(())
}

// =============================================================================
// CLIPBOARD
// =============================================================================

#[derive(Debug, thiserror::Error)]
#[error("clipboard unavailable: {0}")]
pub struct ClipboardError(pub String);

/// Host clipboard.
pub trait Clipboard {
    /// Write plain text to the clipboard.
    ///
    /// # Errors
    ///
    /// Returns [`ClipboardError`] when the host refuses the write.
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}

/// Copy markup to the clipboard. Failures are logged and swallowed; the
/// return value only drives the "copied" hint in the palette.
pub fn copy_markup(clipboard: &mut dyn Clipboard, markup: &str) -> bool {
    match clipboard.write_text(markup) {
        Ok(()) => true,
        Err(e) => {
            debug!(error = %e, "clipboard copy failed");
            false
        }
    }
}
