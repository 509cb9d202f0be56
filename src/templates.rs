//! Template System - Loosely-Typed Upstream Layouts
//!
//! Upstream templates carry the same concept under several field names.
//! Every loose lookup goes through one of the ordered alias tables below;
//! nothing else in the crate reads `Template::extra` directly.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

pub type TemplateCode = String;

/// Explicit text line count, first present alias wins.
pub const LINE_COUNT_FIELDS: &[&str] = &[
    "textLineCount",
    "lineCount",
    "numberOfLines",
    "numLines",
    "textLines",
];

/// Template-level default font.
pub const DEFAULT_FONT_FIELDS: &[&str] = &["defaultFont", "fontName", "font", "fontOverride"];

/// Template-level default text colour.
pub const DEFAULT_COLOUR_FIELDS: &[&str] = &[
    "defaultTextColour",
    "defaultColour",
    "textColour",
    "colour",
    "color",
];

/// Upstream font id to catalog font name table.
pub const FONT_MAP_FIELDS: &[&str] = &["fontMap", "fontMapping", "pulseFontMap"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    #[serde(alias = "templateCode", alias = "Code")]
    pub code: TemplateCode,
    #[serde(default, alias = "Name")]
    pub name: String,
    #[serde(default, alias = "OrderType")]
    pub order_type: Option<String>,
    #[serde(default, alias = "templateElements", alias = "Elements")]
    pub elements: Vec<TemplateElement>,
    /// Remaining upstream metadata, read only through the alias tables.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateElement {
    #[serde(alias = "name", alias = "ElementName")]
    pub element_name: String,
    /// Present as a string on text-bearing elements.
    #[serde(default, alias = "Text")]
    pub text: Option<Value>,
    #[serde(default, alias = "FontOverride")]
    pub font_override: Option<String>,
    #[serde(default, alias = "TextColour", alias = "textColor")]
    pub text_colour: Option<Value>,
}

impl TemplateElement {
    pub fn new(element_name: impl Into<String>) -> Self {
        Self {
            element_name: element_name.into(),
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(Value::String(text.into()));
        self
    }

    pub fn with_font(mut self, font: impl Into<String>) -> Self {
        self.font_override = Some(font.into());
        self
    }

    pub fn with_colour(mut self, colour: impl Into<String>) -> Self {
        self.text_colour = Some(Value::String(colour.into()));
        self
    }

    /// The element's default text when it is a text slot.
    pub fn text(&self) -> Option<&str> {
        self.text.as_ref().and_then(Value::as_str)
    }

    pub fn is_text_bearing(&self) -> bool {
        self.text().is_some()
    }

    pub fn font_override(&self) -> Option<&str> {
        self.font_override
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
    }

    pub fn text_colour(&self) -> Option<String> {
        self.text_colour.as_ref().and_then(loose_text)
    }
}

impl Template {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_element(mut self, element: TemplateElement) -> Self {
        self.elements.push(element);
        self
    }

    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }

    /// First present, non-null field among `aliases`, in table order.
    pub fn field(&self, aliases: &[&str]) -> Option<&Value> {
        aliases
            .iter()
            .filter_map(|key| self.extra.get(*key))
            .find(|v| !v.is_null())
    }

    /// Explicit line count, unclamped. Numeric strings are accepted.
    pub fn explicit_line_count(&self) -> Option<i64> {
        match self.field(LINE_COUNT_FIELDS)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn default_font(&self) -> Option<String> {
        self.field(DEFAULT_FONT_FIELDS).and_then(loose_text)
    }

    pub fn default_colour(&self) -> Option<String> {
        self.field(DEFAULT_COLOUR_FIELDS).and_then(loose_text)
    }

    /// Font mapping table with lower-cased keys. Empty when none is declared.
    pub fn font_map(&self) -> HashMap<String, String> {
        let Some(Value::Object(map)) = self.field(FONT_MAP_FIELDS) else {
            return HashMap::new();
        };
        map.iter()
            .filter_map(|(k, v)| loose_text(v).map(|name| (k.trim().to_lowercase(), name)))
            .collect()
    }
}

/// Strings and numbers both occur for names and codes upstream.
pub fn loose_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Template registry - keeps only customizable templates, in upstream order
pub struct TemplateRegistry {
    prefix: String,
    templates: Vec<Template>,
}

impl TemplateRegistry {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            templates: Vec::new(),
        }
    }

    pub fn from_templates(prefix: impl Into<String>, templates: Vec<Template>) -> Self {
        let mut registry = Self::new(prefix);
        for template in templates {
            registry.register(template);
        }
        registry
    }

    /// Whether a template code carries the customizable naming prefix.
    pub fn accepts(&self, code: &str) -> bool {
        code.to_lowercase().starts_with(&self.prefix.to_lowercase())
    }

    pub fn get(&self, code: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.code == code)
    }

    pub fn list(&self) -> Vec<&Template> {
        self.templates.iter().collect()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Returns false when the template was filtered out by prefix.
    pub fn register(&mut self, template: Template) -> bool {
        if !self.accepts(&template.code) {
            return false;
        }
        match self.templates.iter_mut().find(|t| t.code == template.code) {
            Some(existing) => *existing = template,
            None => self.templates.push(template),
        }
        true
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_aliases_deserialize() {
        let template: Template = serde_json::from_value(json!({
            "templateCode": "PZ-TWO",
            "name": "Two line",
            "OrderType": "Print",
            "templateElements": [
                {"ElementName": "Top", "Text": "Hello", "FontOverride": "Block"},
                {"name": "Design"}
            ],
            "lineCount": "2",
            "defaultTextColour": 1842
        }))
        .unwrap();

        assert_eq!(template.code, "PZ-TWO");
        assert_eq!(template.order_type.as_deref(), Some("Print"));
        assert_eq!(template.elements.len(), 2);
        assert_eq!(template.elements[0].text(), Some("Hello"));
        assert!(!template.elements[1].is_text_bearing());
        assert_eq!(template.explicit_line_count(), Some(2));
        assert_eq!(template.default_colour().as_deref(), Some("1842"));
    }

    #[test]
    fn test_field_prefers_table_order() {
        let template = Template::new("PZ-1", "t")
            .with_field("font", json!("Script"))
            .with_field("defaultFont", json!("Block"));
        assert_eq!(template.default_font().as_deref(), Some("Block"));
    }

    #[test]
    fn test_null_alias_skipped() {
        let template = Template::new("PZ-1", "t")
            .with_field("textLineCount", Value::Null)
            .with_field("numLines", json!(3));
        assert_eq!(template.explicit_line_count(), Some(3));
    }

    #[test]
    fn test_font_map_keys_lowercased() {
        let template = Template::new("PZ-1", "t")
            .with_field("fontMap", json!({"BLOCK-REGULAR.TTF": "Block", "x": 4}));
        let map = template.font_map();
        assert_eq!(map.get("block-regular.ttf").map(String::as_str), Some("Block"));
        assert_eq!(map.get("x").map(String::as_str), Some("4"));
    }

    #[test]
    fn test_registry_filters_prefix() {
        let registry = TemplateRegistry::from_templates(
            "PZ",
            vec![
                Template::new("PZ-ONE", "One"),
                Template::new("STOCK-1", "Stock"),
                Template::new("pz-two", "Two"),
            ],
        );
        assert_eq!(registry.len(), 2);
        assert!(registry.get("STOCK-1").is_none());
        assert!(registry.get("pz-two").is_some());
    }
}
