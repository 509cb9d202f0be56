//! Font Reconciler
//!
//! Maps a template-declared font identifier onto a catalog font name,
//! tolerating file extensions, punctuation and case differences.

use crate::catalog::FontCatalogEntry;
use crate::templates::Template;

/// Font file extensions stripped before comparison.
pub const FONT_EXTENSIONS: &[&str] = &[".woff2", ".woff", ".ttf", ".otf", ".pfb", ".fnt"];

/// Lowercase alphanumerics of `name` without a known font-file extension.
pub fn normalize_font_name(name: &str) -> String {
    let trimmed = name.trim();
    let lower = trimmed.to_lowercase();
    let stem = FONT_EXTENSIONS
        .iter()
        .find_map(|ext| lower.strip_suffix(ext))
        .unwrap_or(&lower);
    stem.chars().filter(|c| c.is_alphanumeric()).collect()
}

/// One font matching strategy.
pub trait FontMatcher {
    fn name(&self) -> &'static str;
    fn reconcile(&self, template: &Template, raw: &str, fonts: &[FontCatalogEntry]) -> Option<String>;
}

// --- Concrete Matchers ---

/// Template-declared upstream id → catalog name table.
pub struct TemplateFontMap;

impl FontMatcher for TemplateFontMap {
    fn name(&self) -> &'static str { "template_font_map" }

    fn reconcile(&self, template: &Template, raw: &str, fonts: &[FontCatalogEntry]) -> Option<String> {
        let map = template.font_map();
        let mapped = map.get(&raw.trim().to_lowercase())?;
        catalog_name(mapped, fonts)
    }
}

pub struct NormalizedExact;

impl FontMatcher for NormalizedExact {
    fn name(&self) -> &'static str { "normalized_exact" }

    fn reconcile(&self, _template: &Template, raw: &str, fonts: &[FontCatalogEntry]) -> Option<String> {
        let wanted = normalize_font_name(raw);
        if wanted.is_empty() {
            return None;
        }
        fonts
            .iter()
            .find(|f| normalize_font_name(&f.font_name) == wanted)
            .map(|f| f.font_name.clone())
    }
}

pub struct CaseInsensitive;

impl FontMatcher for CaseInsensitive {
    fn name(&self) -> &'static str { "case_insensitive" }

    fn reconcile(&self, _template: &Template, raw: &str, fonts: &[FontCatalogEntry]) -> Option<String> {
        let raw = raw.trim();
        fonts
            .iter()
            .find(|f| f.font_name.trim().eq_ignore_ascii_case(raw))
            .map(|f| f.font_name.clone())
    }
}

pub struct PrefixTolerant;

impl FontMatcher for PrefixTolerant {
    fn name(&self) -> &'static str { "prefix_tolerant" }

    fn reconcile(&self, _template: &Template, raw: &str, fonts: &[FontCatalogEntry]) -> Option<String> {
        let wanted = normalize_font_name(raw);
        if wanted.is_empty() {
            return None;
        }
        fonts
            .iter()
            .find(|f| {
                let candidate = normalize_font_name(&f.font_name);
                !candidate.is_empty()
                    && (candidate.starts_with(&wanted) || wanted.starts_with(&candidate))
            })
            .map(|f| f.font_name.clone())
    }
}

/// Catalog spelling of `name` when the catalog carries it.
fn catalog_name(name: &str, fonts: &[FontCatalogEntry]) -> Option<String> {
    let normalized = normalize_font_name(name);
    fonts
        .iter()
        .find(|f| {
            f.font_name == name
                || f.font_name.eq_ignore_ascii_case(name.trim())
                || (!normalized.is_empty() && normalize_font_name(&f.font_name) == normalized)
        })
        .map(|f| f.font_name.clone())
}

/// Runs the matchers in order.
pub struct FontReconciler {
    matchers: Vec<Box<dyn FontMatcher>>,
}

impl FontReconciler {
    pub fn new() -> Self {
        Self {
            matchers: vec![
                Box::new(TemplateFontMap),
                Box::new(NormalizedExact),
                Box::new(CaseInsensitive),
                Box::new(PrefixTolerant),
            ],
        }
    }

    pub fn reconcile(
        &self,
        template: &Template,
        raw: &str,
        fonts: &[FontCatalogEntry],
    ) -> Option<String> {
        if raw.trim().is_empty() {
            return None;
        }
        self.matchers.iter().find_map(|m| {
            let hit = m.reconcile(template, raw, fonts)?;
            tracing::trace!(matcher = m.name(), raw, font = %hit, "font reconciled");
            Some(hit)
        })
    }
}

impl Default for FontReconciler {
    fn default() -> Self {
        Self::new()
    }
}

/// Catalog font name for a raw template font id, or `None`.
pub fn reconcile_font(template: &Template, raw: &str, fonts: &[FontCatalogEntry]) -> Option<String> {
    FontReconciler::new().reconcile(template, raw, fonts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fonts() -> Vec<FontCatalogEntry> {
        vec![
            FontCatalogEntry::new("1", "Block", "Embroidery"),
            FontCatalogEntry::new("2", "Script Bold", "Embroidery"),
            FontCatalogEntry::new("3", "Times New Roman", "Embroidery"),
        ]
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_font_name("Block-Regular.TTF"), "blockregular");
        assert_eq!(normalize_font_name("Script_Bold.woff2"), "scriptbold");
        assert_eq!(normalize_font_name(" - "), "");
    }

    #[test]
    fn test_font_map_wins() {
        let template = Template::new("PZ-1", "t")
            .with_field("fontMap", json!({"PULSE-17": "times new roman"}));
        assert_eq!(
            reconcile_font(&template, "pulse-17", &fonts()).as_deref(),
            Some("Times New Roman")
        );
    }

    #[test]
    fn test_font_map_target_missing_falls_through() {
        let template = Template::new("PZ-1", "t").with_field("fontMap", json!({"block": "Gothic"}));
        assert_eq!(reconcile_font(&template, "block", &fonts()).as_deref(), Some("Block"));
    }

    #[test]
    fn test_file_name_reconciles_to_catalog() {
        let template = Template::new("PZ-1", "t");
        assert_eq!(
            reconcile_font(&template, "block-regular.ttf", &fonts()).as_deref(),
            Some("Block")
        );
        assert_eq!(
            reconcile_font(&template, "script_bold.otf", &fonts()).as_deref(),
            Some("Script Bold")
        );
    }

    #[test]
    fn test_unmatched_is_none() {
        let template = Template::new("PZ-1", "t");
        assert_eq!(reconcile_font(&template, "Comic", &fonts()), None);
        assert_eq!(reconcile_font(&template, "", &fonts()), None);
    }
}
