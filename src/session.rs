//! Customization Session - single entry point for the UI layer
//!
//! Owns the session's reference data, caches, edit state and preview
//! pipeline. Every edit goes through here so the preview is always notified.
//! Failures degrade to the last known-good state; none of them are fatal.

use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::catalog::{CatalogFilters, ReferenceData, ThumbnailCache};
use crate::config::{ConfigError, SessionConfig};
use crate::edit::{Catalogs, EditState};
use crate::gateway::{Gateway, GatewayError};
use crate::hashing::short_fingerprint;
use crate::preview::{Generation, PreviewEffect, PreviewPipeline};
use crate::request::{build_render_request, RenderContext, RenderRequest};
use crate::templates::Template;

#[cfg(feature = "test-hooks")]
use std::cell::Cell;

// Per thread, so parallel tests do not see each other's builds.
#[cfg(feature = "test-hooks")]
thread_local! {
    static RENDER_REQUEST_BUILD_COUNT: Cell<u32> = const { Cell::new(0) };
}

#[cfg(feature = "test-hooks")]
pub fn get_render_request_build_count() -> u32 {
    RENDER_REQUEST_BUILD_COUNT.with(Cell::get)
}

#[cfg(feature = "test-hooks")]
pub fn reset_render_request_build_count() {
    RENDER_REQUEST_BUILD_COUNT.with(|c| c.set(0));
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("No template selected")]
    NoTemplateSelected,

    #[error("Design not found: {0}")]
    DesignNotFound(String),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub struct Session<G: Gateway> {
    id: Uuid,
    config: SessionConfig,
    render_endpoint: Url,
    gateway: G,
    reference: ReferenceData,
    thumbnails: ThumbnailCache,
    edit: Option<EditState>,
    preview: PreviewPipeline,
}

impl<G: Gateway> Session<G> {
    pub fn new(gateway: G, config: SessionConfig) -> Result<Self, SessionError> {
        let render_endpoint = config.render_url()?;
        let preview = PreviewPipeline::new(config.timing());
        let id = Uuid::new_v4();
        info!(session = %id, variant = %config.variant_id, "session started");
        Ok(Self {
            id,
            config,
            render_endpoint,
            gateway,
            reference: ReferenceData::empty(),
            thumbnails: ThumbnailCache::new(),
            edit: None,
            preview,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Fetch any reference catalog not loaded yet.
    pub fn load_reference_data(&mut self) -> &ReferenceData {
        let filters = CatalogFilters {
            variant_id: &self.config.variant_id,
            font_tag: &self.config.font_tag,
            template_prefix: &self.config.template_prefix,
            asset_host: &self.config.asset_host,
        };
        self.reference.ensure_loaded(&self.gateway, &filters);
        if !self.reference.is_complete() {
            warn!(session = %self.id, "reference data incomplete, continuing with what loaded");
        }
        &self.reference
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    pub fn templates(&self) -> Vec<&Template> {
        self.reference
            .templates
            .as_ref()
            .map(|r| r.list())
            .unwrap_or_default()
    }

    pub fn template(&self, code: &str) -> Option<&Template> {
        self.reference.templates.as_ref()?.get(code)
    }

    /// Thumbnail for a template code, cached for the session.
    pub fn thumbnail(&mut self, code: &str) -> Option<String> {
        match self
            .thumbnails
            .get_or_fetch(code, &self.gateway, &self.config.asset_host)
        {
            Ok(asset) => Some(asset.to_string()),
            Err(e) => {
                warn!(template = code, error = %e, "thumbnail fetch failed");
                None
            }
        }
    }

    pub fn edit_state(&self) -> Option<&EditState> {
        self.edit.as_ref()
    }

    pub fn preview(&self) -> &PreviewPipeline {
        &self.preview
    }

    fn selected_template(&self) -> Result<&Template, SessionError> {
        let code = &self
            .edit
            .as_ref()
            .ok_or(SessionError::NoTemplateSelected)?
            .template_code;
        self.template(code)
            .ok_or_else(|| SessionError::TemplateNotFound(code.clone()))
    }

    /// Select a template: creates the edit state on first use, switches it
    /// in place afterwards.
    pub fn select_template(&mut self, code: &str, now: Instant) -> Result<&EditState, SessionError> {
        let template = self
            .reference
            .templates
            .as_ref()
            .and_then(|r| r.get(code))
            .ok_or_else(|| SessionError::TemplateNotFound(code.to_string()))?;
        let catalogs = catalogs(&self.reference, &self.config);

        let state = match self.edit.take() {
            Some(mut state) => {
                state.switch_template(template, &catalogs);
                state
            }
            None => EditState::for_template(template, &catalogs),
        };
        debug!(template = code, lines = state.line_count(), "template selected");

        self.edit = Some(state);
        self.preview.edit(now);
        self.edit.as_ref().ok_or(SessionError::NoTemplateSelected)
    }

    /// Returns false when `index` is not one of the template's lines.
    pub fn set_line(&mut self, index: usize, text: &str, now: Instant) -> Result<bool, SessionError> {
        let state = self.edit.as_mut().ok_or(SessionError::NoTemplateSelected)?;
        let changed = state.set_line(index, text);
        if changed {
            self.preview.edit(now);
        }
        Ok(changed)
    }

    pub fn set_font(&mut self, raw: &str, now: Instant) -> Result<(), SessionError> {
        let state = self.edit.as_mut().ok_or(SessionError::NoTemplateSelected)?;
        let template = self
            .reference
            .templates
            .as_ref()
            .and_then(|r| r.get(&state.template_code))
            .ok_or_else(|| SessionError::TemplateNotFound(state.template_code.clone()))?;
        state.set_font(template, raw, &catalogs(&self.reference, &self.config));
        self.preview.edit(now);
        Ok(())
    }

    pub fn set_colour(&mut self, raw: &str, now: Instant) -> Result<(), SessionError> {
        let state = self.edit.as_mut().ok_or(SessionError::NoTemplateSelected)?;
        state.set_colour(raw, &catalogs(&self.reference, &self.config));
        self.preview.edit(now);
        Ok(())
    }

    /// Select a design by id or name, or clear it with `None`.
    pub fn set_design(&mut self, design: Option<&str>, now: Instant) -> Result<(), SessionError> {
        let design = match design {
            Some(key) => Some(
                self.reference
                    .design(key)
                    .cloned()
                    .ok_or_else(|| SessionError::DesignNotFound(key.to_string()))?,
            ),
            None => None,
        };
        let state = self.edit.as_mut().ok_or(SessionError::NoTemplateSelected)?;
        state.set_design(design);
        self.preview.edit(now);
        Ok(())
    }

    /// Render request for the current edit state.
    pub fn render_request(&self) -> Result<RenderRequest, SessionError> {
        let state = self.edit.as_ref().ok_or(SessionError::NoTemplateSelected)?;
        let template = self.selected_template()?;
        Ok(request_for(state, template, &self.reference, &self.config))
    }

    pub fn render_url(&self) -> Result<Url, SessionError> {
        Ok(self.render_request()?.to_url(&self.render_endpoint))
    }

    /// Ask the gateway to render the current state; returns a loadable
    /// image reference.
    pub fn render_now(&self) -> Result<String, SessionError> {
        let request = self.render_request()?;
        Ok(self.gateway.render(&request)?.into_image_ref())
    }

    /// Advance the preview timers.
    pub fn tick(&mut self, now: Instant) -> Vec<PreviewEffect> {
        let (edit, reference, config, endpoint) =
            (&self.edit, &self.reference, &self.config, &self.render_endpoint);
        self.preview.tick(now, || {
            let state = edit.as_ref()?;
            let template = reference.templates.as_ref()?.get(&state.template_code)?;
            let request = request_for(state, template, reference, config);
            if let Ok(fingerprint) = request.fingerprint() {
                debug!(request = short_fingerprint(&fingerprint), "render request built");
            }
            Some(request.to_url(endpoint).to_string())
        })
    }

    pub fn preload_succeeded(&mut self, generation: Generation) -> Vec<PreviewEffect> {
        self.preview.preload_succeeded(generation)
    }

    pub fn preload_failed(&mut self, generation: Generation) -> Vec<PreviewEffect> {
        self.preview.preload_failed(generation)
    }

    pub fn teardown(&mut self) {
        self.preview.teardown();
        info!(session = %self.id, "session ended");
    }
}

fn catalogs<'a>(reference: &'a ReferenceData, config: &'a SessionConfig) -> Catalogs<'a> {
    Catalogs {
        fonts: reference.fonts(),
        palette: reference.palette(),
        fallback_colour_code: &config.fallback_colour_code,
    }
}

fn request_for(
    state: &EditState,
    template: &Template,
    reference: &ReferenceData,
    config: &SessionConfig,
) -> RenderRequest {
    #[cfg(feature = "test-hooks")]
    RENDER_REQUEST_BUILD_COUNT.with(|c| c.set(c.get() + 1));

    build_render_request(
        state,
        &RenderContext {
            product_code: reference.product_code(),
            template,
            palette: reference.palette(),
            default_order_type: &config.default_order_type,
            dpi: config.dpi,
        },
    )
}
