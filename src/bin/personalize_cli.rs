//! Personalize CLI - JSON bridge over a catalog directory
//!
//! Commands: templates, controls, render
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 when the requested template is unknown

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use personalize_core::{
    normalize::{derive_initial_controls, ordered_element_names, resolve_line_count, supports_design_slot},
    DirectoryGateway, Session, SessionConfig, SessionError,
};

#[derive(Parser)]
#[command(name = "personalize-cli")]
#[command(about = "Personalize CLI - template controls and render requests")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding product/fonts/colours/templates/designs JSON
    #[arg(short, long, default_value = "catalog")]
    catalog: PathBuf,

    /// Session configuration (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List customizable templates
    Templates,

    /// Show the editable controls a template resolves to
    Controls {
        /// Template code
        #[arg(short, long)]
        template: String,
    },

    /// Build the render request for an edit
    Render {
        /// Template code
        #[arg(short, long)]
        template: String,

        /// Text line, repeatable, in display order
        #[arg(short, long = "line")]
        lines: Vec<String>,

        /// Font name or upstream font id
        #[arg(short, long)]
        font: Option<String>,

        /// Colour reference (hex, code, or name)
        #[arg(long)]
        colour: Option<String>,

        /// Design id or name
        #[arg(short, long)]
        design: Option<String>,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap());
}

fn fail(code: u8, error: impl std::fmt::Display) -> ExitCode {
    print_json(&serde_json::json!({ "success": false, "error": error.to_string() }));
    ExitCode::from(code)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => match SessionConfig::load(path) {
            Ok(c) => c,
            Err(e) => return fail(1, e),
        },
        None => SessionConfig::default(),
    };

    let endpoint = match config.render_url() {
        Ok(u) => u,
        Err(e) => return fail(1, e),
    };

    let gateway = DirectoryGateway::new(&cli.catalog, endpoint);
    let mut session = match Session::new(gateway, config) {
        Ok(s) => s,
        Err(e) => return fail(1, e),
    };
    session.load_reference_data();

    match cli.command {
        Commands::Templates => {
            let templates: Vec<_> = session
                .templates()
                .iter()
                .map(|t| serde_json::json!({
                    "code": t.code,
                    "name": t.name,
                    "lines": resolve_line_count(t),
                    "design_slot": supports_design_slot(t),
                }))
                .collect();

            print_json(&serde_json::Value::Array(templates));
            ExitCode::SUCCESS
        }

        Commands::Controls { template } => {
            let Some(t) = session.template(&template) else {
                return fail(2, SessionError::TemplateNotFound(template));
            };
            let count = resolve_line_count(t);
            let output = serde_json::json!({
                "success": true,
                "template": t.code,
                "lines": count,
                "elements": ordered_element_names(t, count),
                "design_slot": supports_design_slot(t),
                "defaults": derive_initial_controls(t, session.reference().palette()),
            });
            print_json(&output);
            ExitCode::SUCCESS
        }

        Commands::Render { template, lines, font, colour, design } => {
            let now = Instant::now();
            if let Err(e) = session.select_template(&template, now) {
                let code = if matches!(e, SessionError::TemplateNotFound(_)) { 2 } else { 1 };
                return fail(code, e);
            }

            let applied = (|| -> Result<(), SessionError> {
                for (index, text) in lines.iter().enumerate() {
                    session.set_line(index, text, now)?;
                }
                if let Some(font) = &font {
                    session.set_font(font, now)?;
                }
                if let Some(colour) = &colour {
                    session.set_colour(colour, now)?;
                }
                if design.is_some() {
                    session.set_design(design.as_deref(), now)?;
                }
                Ok(())
            })();
            if let Err(e) = applied {
                return fail(1, e);
            }

            let request = match session.render_request() {
                Ok(r) => r,
                Err(e) => return fail(1, e),
            };
            let image = match session.render_now() {
                Ok(i) => i,
                Err(e) => return fail(1, e),
            };

            let output = serde_json::json!({
                "success": true,
                "session": session.id(),
                "edit": session.edit_state(),
                "request": request,
                "fingerprint": request.fingerprint().ok(),
                "image": image,
            });
            print_json(&output);
            ExitCode::SUCCESS
        }
    }
}
