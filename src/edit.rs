//! Edit state owned by the UI layer.
//!
//! `text_lines` always has exactly as many entries as the selected
//! template's resolved line count.

use serde::{Deserialize, Serialize};

use crate::catalog::{Design, FontCatalogEntry, PaletteEntry};
use crate::fonts::reconcile_font;
use crate::normalize::{derive_initial_controls, resolve_line_count, supports_design_slot};
use crate::palette::resolve_rgb;
use crate::templates::Template;

/// Catalogs consulted when accepting fonts and colours into the state.
#[derive(Debug, Clone, Copy)]
pub struct Catalogs<'a> {
    pub fonts: &'a [FontCatalogEntry],
    pub palette: &'a [PaletteEntry],
    /// Palette code used when a template declares no colour.
    pub fallback_colour_code: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditState {
    pub template_code: String,
    pub text_lines: Vec<String>,
    pub font: Option<String>,
    /// Canonical RGB string when resolved, otherwise the raw reference.
    pub colour: Option<String>,
    pub design: Option<Design>,
}

impl EditState {
    /// Fresh state seeded from the template's declared defaults.
    pub fn for_template(template: &Template, catalogs: &Catalogs<'_>) -> Self {
        let mut state = Self::default();
        state.apply_template(template, catalogs);
        state
    }

    /// Switch to another template, reseeding lines and defaults.
    ///
    /// A font or colour the new template does not declare keeps its current
    /// value; a selected design is dropped if the new template has no slot.
    pub fn switch_template(&mut self, template: &Template, catalogs: &Catalogs<'_>) {
        self.apply_template(template, catalogs);
    }

    fn apply_template(&mut self, template: &Template, catalogs: &Catalogs<'_>) {
        let count = resolve_line_count(template);
        let controls = derive_initial_controls(template, catalogs.palette);

        self.template_code = template.code.clone();
        self.text_lines = controls.lines;
        self.text_lines.resize(count, String::new());

        if let Some(raw) = controls.font {
            self.font = Some(reconcile_font(template, &raw, catalogs.fonts).unwrap_or(raw));
        }

        match controls.colour {
            Some(colour) => self.colour = Some(colour),
            None if self.colour.is_none() => {
                self.colour = resolve_rgb(catalogs.fallback_colour_code, catalogs.palette);
            }
            None => {}
        }

        if !supports_design_slot(template) {
            self.design = None;
        }
    }

    pub fn line_count(&self) -> usize {
        self.text_lines.len()
    }

    /// Returns false when `index` is outside the template's lines.
    pub fn set_line(&mut self, index: usize, text: impl Into<String>) -> bool {
        match self.text_lines.get_mut(index) {
            Some(line) => {
                *line = text.into();
                true
            }
            None => false,
        }
    }

    /// Catalog spelling when the font reconciles, otherwise `raw` verbatim.
    pub fn set_font(&mut self, template: &Template, raw: &str, catalogs: &Catalogs<'_>) {
        let raw = raw.trim();
        self.font = if raw.is_empty() {
            None
        } else {
            Some(reconcile_font(template, raw, catalogs.fonts).unwrap_or_else(|| raw.to_string()))
        };
    }

    /// Canonical RGB when the colour resolves, otherwise `raw` verbatim.
    pub fn set_colour(&mut self, raw: &str, catalogs: &Catalogs<'_>) {
        let raw = raw.trim();
        self.colour = if raw.is_empty() {
            None
        } else {
            Some(resolve_rgb(raw, catalogs.palette).unwrap_or_else(|| raw.to_string()))
        };
    }

    pub fn set_design(&mut self, design: Option<Design>) {
        self.design = design;
    }
}
