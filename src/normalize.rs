//! Template Normalizer
//!
//! Turns a loosely-described template into editable controls: how many text
//! lines it has, which elements back them (in display order) and the default
//! font, colour and text values.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::catalog::PaletteEntry;
use crate::palette::resolve_rgb;
use crate::templates::{Template, TemplateElement};
use crate::MAX_LINES;

/// Rank of elements with no recognizable position.
pub const UNRANKED: u32 = 999;

/// Element name of the overlay design slot.
pub const DESIGN_ELEMENT: &str = "Design";

static RANK_FIRST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"top|upper|^text$|(?:line|text)0*1$").expect("valid regex"));
static RANK_SECOND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"bottom|lower|(?:line|text)0*2$").expect("valid regex"));
static RANK_THIRD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:line|text)0*3$").expect("valid regex"));

static DESIGN_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"design[\s_-]*only").expect("valid regex"));
static THREE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bthree\b|\b3\b").expect("valid regex"));
static TWO: Lazy<Regex> = Lazy::new(|| Regex::new(r"\btwo\b|\b2\b").expect("valid regex"));
static ONE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bone\b|\b1\b").expect("valid regex"));
static TRAILING_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)$").expect("valid regex"));

/// Defaults a template seeds into a fresh edit state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialControls {
    pub lines: Vec<String>,
    /// Raw font id as declared upstream; reconcile before use.
    pub font: Option<String>,
    /// Canonical RGB string, or the raw reference when it did not resolve.
    pub colour: Option<String>,
}

fn clamp_lines(count: i64) -> usize {
    count.clamp(0, MAX_LINES as i64) as usize
}

/// Number of editable text lines, always within `0..=MAX_LINES`.
pub fn resolve_line_count(template: &Template) -> usize {
    if let Some(explicit) = template.explicit_line_count() {
        return clamp_lines(explicit);
    }

    if !template.elements.is_empty() {
        let with_text = template
            .elements
            .iter()
            .filter(|e| e.text().is_some_and(|t| !t.is_empty()))
            .count();
        return with_text.min(MAX_LINES);
    }

    line_count_from_name(&format!("{} {}", template.name, template.code))
}

/// Keyword heuristic for templates that describe nothing but a name.
pub fn line_count_from_name(label: &str) -> usize {
    let label = label.to_lowercase();
    if DESIGN_ONLY.is_match(&label) {
        0
    } else if THREE.is_match(&label) {
        3
    } else if TWO.is_match(&label) {
        2
    } else if ONE.is_match(&label) {
        1
    } else {
        1
    }
}

/// Display rank of an element name: 1 top, 2 bottom, 3 third line.
pub fn element_rank(name: &str) -> u32 {
    let key: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect();
    if RANK_FIRST.is_match(&key) {
        1
    } else if RANK_SECOND.is_match(&key) {
        2
    } else if RANK_THIRD.is_match(&key) {
        3
    } else {
        UNRANKED
    }
}

fn numeric_suffix(name: &str) -> Option<u64> {
    TRAILING_DIGITS
        .captures(name.trim())
        .and_then(|caps| caps[1].parse().ok())
}

fn compare_names(a: &str, b: &str) -> Ordering {
    element_rank(a)
        .cmp(&element_rank(b))
        .then_with(|| numeric_suffix(a).cmp(&numeric_suffix(b)))
        .then_with(|| a.cmp(b))
}

/// Text-bearing elements in display order.
pub fn ranked_text_elements(template: &Template) -> Vec<&TemplateElement> {
    let mut elements: Vec<_> = template
        .elements
        .iter()
        .filter(|e| e.is_text_bearing())
        .collect();
    elements.sort_by(|a, b| compare_names(&a.element_name, &b.element_name));
    elements
}

/// Element names backing each text line, exactly `count` long.
pub fn ordered_element_names(template: &Template, count: usize) -> Vec<String> {
    if template.elements.is_empty() {
        return (1..=count).map(|n| format!("Line{}", n)).collect();
    }

    let mut names: Vec<String> = ranked_text_elements(template)
        .into_iter()
        .map(|e| e.element_name.clone())
        .collect();

    let mut n = names.len();
    while names.len() < count {
        n += 1;
        let placeholder = format!("Line{}", n);
        if !names.iter().any(|existing| existing.eq_ignore_ascii_case(&placeholder)) {
            names.push(placeholder);
        }
    }

    names.truncate(count);
    names
}

/// Initial line text, font and colour declared by the template.
pub fn derive_initial_controls(template: &Template, palette: &[PaletteEntry]) -> InitialControls {
    let ranked = ranked_text_elements(template);

    let lines = if ranked.is_empty() {
        vec![String::new(); resolve_line_count(template)]
    } else {
        ranked
            .iter()
            .take(MAX_LINES)
            .map(|e| e.text().unwrap_or_default().to_string())
            .collect()
    };

    let font = ranked
        .iter()
        .copied()
        .find_map(TemplateElement::font_override)
        .or_else(|| template.elements.iter().find_map(TemplateElement::font_override))
        .map(str::to_string)
        .or_else(|| template.default_font());

    let colour = ranked
        .iter()
        .find_map(|e| e.text_colour())
        .or_else(|| template.elements.iter().find_map(TemplateElement::text_colour))
        .or_else(|| template.default_colour())
        .map(|raw| resolve_rgb(&raw, palette).unwrap_or(raw));

    InitialControls { lines, font, colour }
}

/// Whether the template has a `Design` element.
pub fn supports_design_slot(template: &Template) -> bool {
    template
        .elements
        .iter()
        .any(|e| e.element_name.trim().eq_ignore_ascii_case(DESIGN_ELEMENT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::Rgb;
    use serde_json::json;

    #[test]
    fn test_explicit_count_clamped() {
        let t = Template::new("PZ-1", "x").with_field("textLineCount", json!(7));
        assert_eq!(resolve_line_count(&t), 3);
        let t = Template::new("PZ-1", "x").with_field("lineCount", json!(-2));
        assert_eq!(resolve_line_count(&t), 0);
    }

    #[test]
    fn test_count_from_elements() {
        let t = Template::new("PZ-1", "Three line")
            .with_element(TemplateElement::new("Top").with_text("A"))
            .with_element(TemplateElement::new("Bottom").with_text(""))
            .with_element(TemplateElement::new("Design"));
        assert_eq!(resolve_line_count(&t), 1);
    }

    #[test]
    fn test_elements_without_text_are_design_only() {
        let t = Template::new("PZ-3", "Three line monogram")
            .with_element(TemplateElement::new("Design"));
        assert_eq!(resolve_line_count(&t), 0);
    }

    #[test]
    fn test_name_heuristic() {
        assert_eq!(line_count_from_name("Design Only Patch"), 0);
        assert_eq!(line_count_from_name("PZ three line"), 3);
        assert_eq!(line_count_from_name("PZ-2 LINE"), 2);
        assert_eq!(line_count_from_name("one line"), 1);
        assert_eq!(line_count_from_name("phone case"), 1);
        assert_eq!(line_count_from_name("PZ-12"), 1);
    }

    #[test]
    fn test_rank() {
        assert_eq!(element_rank("Top"), 1);
        assert_eq!(element_rank("Line1"), 1);
        assert_eq!(element_rank("Text"), 1);
        assert_eq!(element_rank("UpperArc"), 1);
        assert_eq!(element_rank("Bottom"), 2);
        assert_eq!(element_rank("Line 2"), 2);
        assert_eq!(element_rank("line_3"), 3);
        assert_eq!(element_rank("Monogram"), UNRANKED);
    }

    #[test]
    fn test_ordered_names_ranked() {
        let t = Template::new("PZ-1", "x")
            .with_element(TemplateElement::new("Bottom").with_text("b"))
            .with_element(TemplateElement::new("Design"))
            .with_element(TemplateElement::new("Top").with_text("a"));
        assert_eq!(ordered_element_names(&t, 2), vec!["Top", "Bottom"]);
        assert_eq!(ordered_element_names(&t, 1), vec!["Top"]);
    }

    #[test]
    fn test_ordered_names_padded() {
        let t = Template::new("PZ-1", "x")
            .with_element(TemplateElement::new("Line2").with_text("b"));
        assert_eq!(ordered_element_names(&t, 3), vec!["Line2", "Line3", "Line4"]);
    }

    #[test]
    fn test_ordered_names_no_elements() {
        let t = Template::new("PZ-1", "two line");
        assert_eq!(ordered_element_names(&t, 2), vec!["Line1", "Line2"]);
        assert!(ordered_element_names(&t, 0).is_empty());
    }

    #[test]
    fn test_tie_break_numeric_then_lexical() {
        let t = Template::new("PZ-1", "x")
            .with_element(TemplateElement::new("Name10").with_text(""))
            .with_element(TemplateElement::new("Name9").with_text(""))
            .with_element(TemplateElement::new("Alpha").with_text(""));
        assert_eq!(ordered_element_names(&t, 3), vec!["Alpha", "Name9", "Name10"]);
    }

    #[test]
    fn test_initial_controls() {
        let palette = vec![PaletteEntry::new("1842", "1842 - Royal Blue", Rgb::new(0, 35, 149))];
        let t = Template::new("PZ-1", "x")
            .with_element(TemplateElement::new("Design").with_font("ignored"))
            .with_element(TemplateElement::new("Bottom").with_text("World"))
            .with_element(
                TemplateElement::new("Top")
                    .with_text("Hello")
                    .with_font("block.ttf")
                    .with_colour("1842"),
            );
        let controls = derive_initial_controls(&t, &palette);
        assert_eq!(controls.lines, vec!["Hello", "World"]);
        assert_eq!(controls.font.as_deref(), Some("block.ttf"));
        assert_eq!(controls.colour.as_deref(), Some("rgb(0, 35, 149)"));
    }

    #[test]
    fn test_initial_controls_fallbacks() {
        let t = Template::new("PZ-1", "two line")
            .with_field("defaultFont", json!("Script"))
            .with_field("colour", json!("Chartreuse"));
        let controls = derive_initial_controls(&t, &[]);
        assert_eq!(controls.lines, vec!["", ""]);
        assert_eq!(controls.font.as_deref(), Some("Script"));
        assert_eq!(controls.colour.as_deref(), Some("Chartreuse"));

        let bare = Template::new("PZ-1", "one line");
        let controls = derive_initial_controls(&bare, &[]);
        assert_eq!(controls.font, None);
        assert_eq!(controls.colour, None);
    }

    #[test]
    fn test_any_element_font_beats_template_default() {
        let t = Template::new("PZ-1", "x")
            .with_field("defaultFont", json!("Script"))
            .with_element(TemplateElement::new("Top").with_text("a"))
            .with_element(TemplateElement::new("Design").with_font("Block"));
        assert_eq!(derive_initial_controls(&t, &[]).font.as_deref(), Some("Block"));
    }

    #[test]
    fn test_any_element_colour_beats_template_default() {
        let palette = vec![PaletteEntry::new("1842", "1842 - Royal Blue", Rgb::new(0, 35, 149))];
        let t = Template::new("PZ-1", "x")
            .with_field("defaultTextColour", json!("#FF0000"))
            .with_element(TemplateElement::new("Top").with_text("a"))
            .with_element(TemplateElement::new("Design").with_colour("1842"));
        assert_eq!(
            derive_initial_controls(&t, &palette).colour.as_deref(),
            Some("rgb(0, 35, 149)")
        );
    }

    #[test]
    fn test_design_slot() {
        let t = Template::new("PZ-1", "x").with_element(TemplateElement::new("design"));
        assert!(supports_design_slot(&t));
        assert!(!supports_design_slot(&Template::new("PZ-1", "x")));
    }
}
