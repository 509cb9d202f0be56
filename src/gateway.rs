//! Upstream Gateway - catalog and render operations
//!
//! The HTTP relay that normally sits behind this trait is out of scope;
//! [`DirectoryGateway`] serves the same operations from JSON files.

use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::catalog::{Design, FontCatalogEntry, PaletteEntry, Product};
use crate::request::RenderRequest;
use crate::templates::Template;

/// Placeholder host token in upstream asset references.
pub const ASSET_HOST_TOKEN: &str = "{{assetHost}}";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// What the render operation hands back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RenderOutput {
    Url { url: String },
    Image { content_type: String, bytes: Vec<u8> },
}

impl RenderOutput {
    /// Something an image element can load: the URL, or a `data:` URL.
    pub fn into_image_ref(self) -> String {
        match self {
            RenderOutput::Url { url } => url,
            RenderOutput::Image { content_type, bytes } => format!(
                "data:{};base64,{}",
                content_type,
                base64::engine::general_purpose::STANDARD.encode(bytes)
            ),
        }
    }
}

/// Logical upstream operations. All of them may fail.
pub trait Gateway {
    fn get_product(&self, variant_id: &str) -> Result<Product, GatewayError>;
    fn get_fonts(&self) -> Result<Vec<FontCatalogEntry>, GatewayError>;
    fn get_colours(&self) -> Result<Vec<PaletteEntry>, GatewayError>;
    fn list_templates(&self) -> Result<Vec<Template>, GatewayError>;
    fn get_template_thumbnail(&self, code: &str) -> Result<String, GatewayError>;
    fn get_designs(&self) -> Result<Vec<Design>, GatewayError>;
    fn render(&self, request: &RenderRequest) -> Result<RenderOutput, GatewayError>;
}

/// Replace the placeholder host token with the real asset host.
pub fn substitute_asset_host(asset_ref: &str, asset_host: &str) -> String {
    if asset_ref.contains(ASSET_HOST_TOKEN) {
        asset_ref.replace(ASSET_HOST_TOKEN, asset_host.trim_end_matches('/'))
    } else {
        asset_ref.to_string()
    }
}

/// Serves catalogs from `product.json`, `fonts.json`, `colours.json`,
/// `templates.json`, `designs.json` and `thumbnails.json` in one directory.
///
/// `product.json` is either one product or an object keyed by variant id.
pub struct DirectoryGateway {
    dir: PathBuf,
    render_endpoint: Url,
}

impl DirectoryGateway {
    pub fn new(dir: impl Into<PathBuf>, render_endpoint: Url) -> Self {
        Self {
            dir: dir.into(),
            render_endpoint,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read<T: DeserializeOwned>(&self, file: &str) -> Result<T, GatewayError> {
        let path = self.dir.join(file);
        debug!(path = %path.display(), "reading catalog file");
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProductFile {
    Single(Product),
    ByVariant(HashMap<String, Product>),
}

impl Gateway for DirectoryGateway {
    fn get_product(&self, variant_id: &str) -> Result<Product, GatewayError> {
        match self.read::<ProductFile>("product.json")? {
            ProductFile::Single(product) => Ok(product),
            ProductFile::ByVariant(mut products) => products
                .remove(variant_id)
                .ok_or_else(|| GatewayError::NotFound(format!("product variant {}", variant_id))),
        }
    }

    fn get_fonts(&self) -> Result<Vec<FontCatalogEntry>, GatewayError> {
        self.read("fonts.json")
    }

    fn get_colours(&self) -> Result<Vec<PaletteEntry>, GatewayError> {
        self.read("colours.json")
    }

    fn list_templates(&self) -> Result<Vec<Template>, GatewayError> {
        self.read("templates.json")
    }

    fn get_template_thumbnail(&self, code: &str) -> Result<String, GatewayError> {
        let mut thumbnails: HashMap<String, String> = self.read("thumbnails.json")?;
        thumbnails
            .remove(code)
            .ok_or_else(|| GatewayError::NotFound(format!("thumbnail for {}", code)))
    }

    fn get_designs(&self) -> Result<Vec<Design>, GatewayError> {
        self.read("designs.json")
    }

    fn render(&self, request: &RenderRequest) -> Result<RenderOutput, GatewayError> {
        Ok(RenderOutput::Url {
            url: request.to_url(&self.render_endpoint).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write(dir: &Path, file: &str, body: &str) {
        let mut f = fs::File::create(dir.join(file)).unwrap();
        f.write_all(body.as_bytes()).unwrap();
    }

    fn gateway(dir: &TempDir) -> DirectoryGateway {
        DirectoryGateway::new(dir.path(), Url::parse("https://render.test/render").unwrap())
    }

    #[test]
    fn test_substitute_asset_host() {
        assert_eq!(
            substitute_asset_host("{{assetHost}}/img/a.png", "https://cdn.test/"),
            "https://cdn.test/img/a.png"
        );
        assert_eq!(substitute_asset_host("https://x/a.png", "h"), "https://x/a.png");
    }

    #[test]
    fn test_image_output_to_data_url() {
        let out = RenderOutput::Image {
            content_type: "image/png".into(),
            bytes: vec![1, 2, 3],
        };
        assert_eq!(out.into_image_ref(), "data:image/png;base64,AQID");
    }

    #[test]
    fn test_product_by_variant() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "product.json",
            r#"{"v1": {"code": "MUG-11", "previewImageRef": "a.png"}}"#,
        );
        let gw = gateway(&dir);
        assert_eq!(gw.get_product("v1").unwrap().code, "MUG-11");
        assert!(matches!(gw.get_product("v2"), Err(GatewayError::NotFound(_))));
    }

    #[test]
    fn test_missing_and_malformed_files() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "fonts.json", "{not json");
        let gw = gateway(&dir);
        assert!(matches!(gw.get_fonts(), Err(GatewayError::Parse(_))));
        assert!(matches!(gw.get_designs(), Err(GatewayError::Io(_))));
    }
}
