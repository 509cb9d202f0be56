//! Reference catalogs and session caches.
//!
//! Catalog data is fetched once per session and never invalidated. A catalog
//! whose fetch failed stays unpopulated so a later load can fill it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::gateway::{substitute_asset_host, Gateway, GatewayError};
use crate::palette::Rgb;
use crate::templates::TemplateRegistry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaletteEntry {
    #[serde(alias = "Code", deserialize_with = "loose_id")]
    pub code: String,
    /// Usually formatted as `"<code> - <display name>"`.
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "RGB")]
    pub rgb: Rgb,
}

impl PaletteEntry {
    pub fn new(code: impl Into<String>, name: impl Into<String>, rgb: Rgb) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            rgb,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontCatalogEntry {
    #[serde(alias = "Id", deserialize_with = "loose_id")]
    pub id: String,
    #[serde(alias = "FontName")]
    pub font_name: String,
    #[serde(default, alias = "PreviewAssetRef", alias = "previewImage")]
    pub preview_asset_ref: String,
    /// Comma-delimited capability tags.
    #[serde(default, alias = "Tags")]
    pub tags: String,
}

impl FontCatalogEntry {
    pub fn new(id: impl Into<String>, font_name: impl Into<String>, tags: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            font_name: font_name.into(),
            preview_asset_ref: String::new(),
            tags: tags.into(),
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags
            .split(',')
            .any(|t| t.trim().eq_ignore_ascii_case(tag))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Design {
    #[serde(alias = "Id", deserialize_with = "loose_id")]
    pub id: String,
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(default, alias = "PreviewAssetRef", alias = "previewImage")]
    pub preview_asset_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(alias = "Code", deserialize_with = "loose_id")]
    pub code: String,
    #[serde(default, alias = "PreviewImageRef", alias = "previewImage")]
    pub preview_image_ref: String,
}

/// Ids and codes arrive as strings or numbers upstream.
fn loose_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

/// Read-only reference data for one session.
pub struct ReferenceData {
    pub product: Option<Product>,
    pub fonts: Option<Vec<FontCatalogEntry>>,
    pub palette: Option<Vec<PaletteEntry>>,
    pub templates: Option<TemplateRegistry>,
    pub designs: Option<Vec<Design>>,
    pub loaded_at: Option<DateTime<Utc>>,
}

/// Filters applied while populating [`ReferenceData`].
#[derive(Debug, Clone)]
pub struct CatalogFilters<'a> {
    pub variant_id: &'a str,
    pub font_tag: &'a str,
    pub template_prefix: &'a str,
    pub asset_host: &'a str,
}

impl ReferenceData {
    pub fn empty() -> Self {
        Self {
            product: None,
            fonts: None,
            palette: None,
            templates: None,
            designs: None,
            loaded_at: None,
        }
    }

    /// Fetch every catalog that is not populated yet.
    ///
    /// Failures are logged and leave the catalog unpopulated; populated
    /// catalogs are never fetched again.
    pub fn ensure_loaded(&mut self, gateway: &dyn Gateway, filters: &CatalogFilters<'_>) {
        let host = filters.asset_host;

        if self.product.is_none() {
            self.product = keep("product", gateway.get_product(filters.variant_id)).map(|mut p| {
                p.preview_image_ref = substitute_asset_host(&p.preview_image_ref, host);
                p
            });
        }
        if self.fonts.is_none() {
            self.fonts = keep("fonts", gateway.get_fonts()).map(|fonts| {
                fonts
                    .into_iter()
                    .filter(|f| f.has_tag(filters.font_tag))
                    .map(|mut f| {
                        f.preview_asset_ref = substitute_asset_host(&f.preview_asset_ref, host);
                        f
                    })
                    .collect()
            });
        }
        if self.palette.is_none() {
            self.palette = keep("colours", gateway.get_colours());
        }
        if self.templates.is_none() {
            self.templates = keep("templates", gateway.list_templates())
                .map(|t| TemplateRegistry::from_templates(filters.template_prefix, t));
        }
        if self.designs.is_none() {
            self.designs = keep("designs", gateway.get_designs()).map(|designs| {
                designs
                    .into_iter()
                    .map(|mut d| {
                        d.preview_asset_ref = substitute_asset_host(&d.preview_asset_ref, host);
                        d
                    })
                    .collect()
            });
        }

        if self.loaded_at.is_none() && self.is_complete() {
            self.loaded_at = Some(Utc::now());
        }
    }

    pub fn is_complete(&self) -> bool {
        self.product.is_some()
            && self.fonts.is_some()
            && self.palette.is_some()
            && self.templates.is_some()
            && self.designs.is_some()
    }

    pub fn fonts(&self) -> &[FontCatalogEntry] {
        self.fonts.as_deref().unwrap_or_default()
    }

    pub fn palette(&self) -> &[PaletteEntry] {
        self.palette.as_deref().unwrap_or_default()
    }

    pub fn designs(&self) -> &[Design] {
        self.designs.as_deref().unwrap_or_default()
    }

    pub fn product_code(&self) -> &str {
        self.product.as_ref().map_or("", |p| p.code.as_str())
    }

    pub fn design(&self, id_or_name: &str) -> Option<&Design> {
        self.designs()
            .iter()
            .find(|d| d.id == id_or_name || d.name.eq_ignore_ascii_case(id_or_name))
    }
}

impl Default for ReferenceData {
    fn default() -> Self {
        Self::empty()
    }
}

fn keep<T>(what: &str, result: Result<T, GatewayError>) -> Option<T> {
    match result {
        Ok(value) => {
            debug!(catalog = what, "catalog loaded");
            Some(value)
        }
        Err(e) => {
            warn!(catalog = what, error = %e, "catalog fetch failed");
            None
        }
    }
}

/// Per-code template thumbnail cache, populated at most once per code.
#[derive(Debug, Default)]
pub struct ThumbnailCache {
    entries: HashMap<String, String>,
}

impl ThumbnailCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, code: &str) -> Option<&str> {
        self.entries.get(code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached thumbnail for `code`, fetching it on first use.
    pub fn get_or_fetch(
        &mut self,
        code: &str,
        gateway: &dyn Gateway,
        asset_host: &str,
    ) -> Result<&str, GatewayError> {
        if !self.entries.contains_key(code) {
            let asset = gateway.get_template_thumbnail(code)?;
            self.entries
                .insert(code.to_string(), substitute_asset_host(&asset, asset_host));
        }
        Ok(self.entries.get(code).map(String::as_str).unwrap_or_default())
    }
}
