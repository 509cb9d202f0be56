//! Personalize Core - live preview engine for personalized products
//!
//! # Responsibilities
//! 1. Normalize loosely-typed upstream templates into editable controls
//! 2. Resolve free-form colour and font references against catalogs
//! 3. Serialize edit state into deterministic render requests
//! 4. Drive a debounced, race-safe preview pipeline

pub mod templates;
pub mod catalog;
pub mod palette;
pub mod fonts;
pub mod normalize;
pub mod edit;
pub mod request;
pub mod hashing;
pub mod preview;
pub mod gateway;
pub mod config;
pub mod session;

pub use templates::{Template, TemplateElement, TemplateRegistry};
pub use catalog::{Design, FontCatalogEntry, PaletteEntry, Product, ReferenceData, ThumbnailCache};
pub use palette::{resolve_code, resolve_rgb, PaletteResolver, Rgb};
pub use fonts::{reconcile_font, FontReconciler};
pub use normalize::{
    derive_initial_controls, ordered_element_names, resolve_line_count, supports_design_slot,
    InitialControls,
};
pub use edit::{Catalogs, EditState};
pub use request::{build_render_request, EntryContent, PersonalizationEntry, RenderContext, RenderRequest};
pub use hashing::{canonical_json, compute_request_fingerprint};
pub use preview::{Generation, PreviewEffect, PreviewPipeline, PreviewState, PreviewTiming};
pub use gateway::{DirectoryGateway, Gateway, GatewayError, RenderOutput};
pub use config::{ConfigError, SessionConfig};
pub use session::{Session, SessionError};

pub const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Upper bound on editable text lines per template.
pub const MAX_LINES: usize = 3;
