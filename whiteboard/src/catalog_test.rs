use super::*;

#[test]
fn builtin_catalog_loads() {
    let catalog = Catalog::builtin().unwrap();
    assert!(!catalog.templates().is_empty());
    assert!(!catalog.symbols().is_empty());
}

#[test]
fn builtin_catalog_is_shared() {
    let a = Catalog::builtin().unwrap();
    let b = Catalog::builtin().unwrap();
    assert!(std::ptr::eq(a, b));
}

#[test]
fn template_lookup_ignores_case() {
    let catalog = Catalog::builtin().unwrap();
    let t = catalog.template("quadratic FORMULA").unwrap();
    assert_eq!(t.category, "algebra");
    assert!(t.formula.contains("\\frac"));
}

#[test]
fn categories_keep_document_order() {
    let catalog = Catalog::from_yaml(
        "templates:\n  - {name: a, formula: x, category: geometry}\n  - {name: b, formula: y, category: algebra}\n  - {name: c, formula: z, category: geometry}\n",
    )
    .unwrap();
    assert_eq!(catalog.template_categories(), vec!["geometry", "algebra"]);
    assert_eq!(catalog.templates_in("geometry").count(), 2);
    assert!(catalog.symbols().is_empty());
}

#[test]
fn symbols_filter_by_category() {
    let catalog = Catalog::builtin().unwrap();
    assert!(catalog.symbols_in("greek").all(|s| s.category == "greek"));
    assert!(catalog.symbols_in("greek").any(|s| s.symbol == "\\pi"));
}

#[test]
fn every_builtin_template_renders() {
    use crate::formula::{FormulaRenderer, TexRenderer};
    let catalog = Catalog::builtin().unwrap();
    for t in catalog.templates() {
        assert!(TexRenderer.render(&t.formula).is_ok(), "template {} failed to render", t.name);
    }
    for s in catalog.symbols() {
        assert!(TexRenderer.render(&s.symbol).is_ok(), "symbol {} failed to render", s.name);
    }
}

#[test]
fn blank_formula_is_rejected() {
    let err = Catalog::from_yaml("templates:\n  - {name: broken, formula: '  ', category: algebra}\n").unwrap_err();
    assert!(matches!(err, CatalogError::EmptyField { field: "formula", .. }));
}

#[test]
fn malformed_yaml_is_rejected() {
    assert!(matches!(Catalog::from_yaml("templates: [").unwrap_err(), CatalogError::Yaml(_)));
}

struct Recording(Vec<String>);

impl Clipboard for Recording {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        self.0.push(text.to_owned());
        Ok(())
    }
}

struct Denied;

impl Clipboard for Denied {
    fn write_text(&mut self, _text: &str) -> Result<(), ClipboardError> {
        Err(ClipboardError("permission denied".into()))
    }
}

#[test]
fn copy_markup_writes_text() {
    let mut clip = Recording(Vec::new());
    assert!(copy_markup(&mut clip, "\\pi"));
    assert_eq!(clip.0, vec!["\\pi".to_owned()]);
}

#[test]
fn copy_markup_failure_is_swallowed() {
    assert!(!copy_markup(&mut Denied, "\\pi"));
}
