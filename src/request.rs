//! Render Request Builder
//!
//! `build_render_request` is pure: structurally equal edit states always
//! produce identical requests, and identical requests always serialize to the
//! same render URL.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::catalog::PaletteEntry;
use crate::edit::EditState;
use crate::hashing::compute_request_fingerprint;
use crate::normalize::{ordered_element_names, supports_design_slot, DESIGN_ELEMENT};
use crate::palette::resolve_code;
use crate::templates::Template;

/// Fully transparent ARGB background.
pub const TRANSPARENT_BACKGROUND: &str = "#00FFFFFF";
pub const DEFAULT_DPI: u32 = 72;
pub const DEFAULT_ORDER_TYPE: &str = "Embroidery";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalizationEntry {
    pub element_name: String,
    #[serde(flatten)]
    pub content: EntryContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryContent {
    #[serde(rename_all = "camelCase")]
    Text {
        text: String,
        is_text: bool,
        text_colour_code: String,
        font_override: String,
    },
    Design { design: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    pub product_code: String,
    pub template_code: String,
    pub order_type: String,
    pub background_colour: String,
    pub render_on_product: bool,
    pub dpi: u32,
    /// Indexed contiguously from 0 by position.
    pub personalizations: Vec<PersonalizationEntry>,
}

/// Everything besides the edit state that a request depends on.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub product_code: &'a str,
    pub template: &'a Template,
    pub palette: &'a [PaletteEntry],
    pub default_order_type: &'a str,
    pub dpi: u32,
}

/// Serialize the current edit state into a render request.
pub fn build_render_request(state: &EditState, ctx: &RenderContext<'_>) -> RenderRequest {
    let template = ctx.template;
    let names = ordered_element_names(template, state.text_lines.len());
    let colour_code = state
        .colour
        .as_deref()
        .map(|c| resolve_code(c, ctx.palette))
        .unwrap_or_default();
    let font = state.font.clone().unwrap_or_default();

    let mut personalizations: Vec<PersonalizationEntry> = names
        .iter()
        .zip(&state.text_lines)
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(name, text)| PersonalizationEntry {
            element_name: name.clone(),
            content: EntryContent::Text {
                text: text.clone(),
                is_text: true,
                text_colour_code: colour_code.clone(),
                font_override: font.clone(),
            },
        })
        .collect();

    if let Some(design) = &state.design {
        if supports_design_slot(template) {
            personalizations.push(PersonalizationEntry {
                element_name: DESIGN_ELEMENT.to_string(),
                content: EntryContent::Design {
                    design: design.name.clone(),
                },
            });
        }
    }

    let order_type = template
        .order_type
        .as_deref()
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .unwrap_or(ctx.default_order_type)
        .to_string();

    RenderRequest {
        product_code: ctx.product_code.to_string(),
        template_code: template.code.clone(),
        order_type,
        background_colour: TRANSPARENT_BACKGROUND.to_string(),
        render_on_product: true,
        dpi: ctx.dpi,
        personalizations,
    }
}

impl RenderRequest {
    /// Ordered query parameters: globals first, then entries by index.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("productCode".to_string(), self.product_code.clone()),
            ("templateCode".to_string(), self.template_code.clone()),
            ("orderType".to_string(), self.order_type.clone()),
            ("backgroundColour".to_string(), self.background_colour.clone()),
            ("renderOnProduct".to_string(), self.render_on_product.to_string()),
            ("dpi".to_string(), self.dpi.to_string()),
        ];

        for (index, entry) in self.personalizations.iter().enumerate() {
            let key = |field: &str| format!("personalizations[{}].{}", index, field);
            pairs.push((key("elementName"), entry.element_name.clone()));
            match &entry.content {
                EntryContent::Text { text, is_text, text_colour_code, font_override } => {
                    pairs.push((key("text"), text.clone()));
                    pairs.push((key("isText"), is_text.to_string()));
                    pairs.push((key("textColourCode"), text_colour_code.clone()));
                    pairs.push((key("fontOverride"), font_override.clone()));
                }
                EntryContent::Design { design } => {
                    pairs.push((key("design"), design.clone()));
                }
            }
        }

        pairs
    }

    /// Render URL for `endpoint`; any query already on it is replaced.
    pub fn to_url(&self, endpoint: &Url) -> Url {
        let mut url = endpoint.clone();
        url.set_query(None);
        url.query_pairs_mut().extend_pairs(self.to_query_pairs());
        url
    }

    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        compute_request_fingerprint(self)
    }

    pub fn text_entries(&self) -> usize {
        self.personalizations
            .iter()
            .filter(|e| matches!(e.content, EntryContent::Text { .. }))
            .count()
    }
}
