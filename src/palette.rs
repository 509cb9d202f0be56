//! Palette Resolver
//!
//! Maps loose colour references (hex, `rgb(...)`, catalog code, name,
//! `"code - name"` composites) onto a canonical RGB string, and back from
//! an RGB string to the catalog name used on render requests.
//!
//! Matching is an ordered list of independent [`ColourMatcher`]s; the first
//! one that returns a value wins.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::catalog::PaletteEntry;

/// An RGB triple as stored on palette entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RgbRepr", into = "[u8; 3]")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// `rgb(r, g, b)` form used for catalog hits.
    pub fn to_css(self) -> String {
        format!("rgb({}, {}, {})", self.r, self.g, self.b)
    }

    /// `#RRGGBB`, uppercase.
    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Parse `#RRGGBB`, `RRGGBB` or `rgb(r, g, b)`.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Some(caps) = RGB_FUNCTION.captures(value) {
            let channel = |i: usize| caps.get(i)?.as_str().parse::<u8>().ok();
            return Some(Self::new(channel(1)?, channel(2)?, channel(3)?));
        }
        let hex = normalize_hex(value)?;
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self::new(channel(1)?, channel(3)?, channel(5)?))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_css())
    }
}

impl From<Rgb> for [u8; 3] {
    fn from(rgb: Rgb) -> Self {
        [rgb.r, rgb.g, rgb.b]
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RgbRepr {
    Triple([u8; 3]),
    Channels { r: u8, g: u8, b: u8 },
    Text(String),
}

impl TryFrom<RgbRepr> for Rgb {
    type Error = String;

    fn try_from(repr: RgbRepr) -> Result<Self, Self::Error> {
        match repr {
            RgbRepr::Triple([r, g, b]) | RgbRepr::Channels { r, g, b } => Ok(Rgb::new(r, g, b)),
            RgbRepr::Text(s) => {
                let parts: Vec<_> = s.split(',').map(|p| p.trim().parse::<u8>()).collect();
                match parts.as_slice() {
                    [Ok(r), Ok(g), Ok(b)] => Ok(Rgb::new(*r, *g, *b)),
                    _ => Rgb::parse(&s).ok_or_else(|| format!("invalid RGB value '{}'", s)),
                }
            }
        }
    }
}

static RGB_FUNCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^rgba?\(\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})\s*(?:,[^)]*)?\)$")
        .expect("valid regex")
});

static HEX6: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#?([0-9A-Fa-f]{6})$").expect("valid regex"));

/// `#RRGGBB` (uppercase) when `value` is six hex digits with optional `#`.
fn normalize_hex(value: &str) -> Option<String> {
    HEX6.captures(value.trim())
        .map(|caps| format!("#{}", caps[1].to_uppercase()))
}

/// Leading 3-4 digit code of a value such as `"1842 - Royal Blue"`.
fn leading_code(value: &str) -> Option<&str> {
    let digits = value.chars().take_while(char::is_ascii_digit).count();
    (3..=4).contains(&digits).then(|| &value[..digits])
}

/// One colour matching strategy.
pub trait ColourMatcher {
    fn name(&self) -> &'static str;
    fn resolve(&self, raw: &str, palette: &[PaletteEntry]) -> Option<String>;
}

// --- Concrete Matchers ---

pub struct RgbPassthrough;

impl ColourMatcher for RgbPassthrough {
    fn name(&self) -> &'static str { "rgb_passthrough" }

    fn resolve(&self, raw: &str, _palette: &[PaletteEntry]) -> Option<String> {
        raw.to_ascii_lowercase()
            .starts_with("rgb(")
            .then(|| raw.to_string())
    }
}

pub struct HexLiteral;

impl ColourMatcher for HexLiteral {
    fn name(&self) -> &'static str { "hex_literal" }

    fn resolve(&self, raw: &str, _palette: &[PaletteEntry]) -> Option<String> {
        normalize_hex(raw)
    }
}

pub struct CatalogCode;

impl ColourMatcher for CatalogCode {
    fn name(&self) -> &'static str { "catalog_code" }

    fn resolve(&self, raw: &str, palette: &[PaletteEntry]) -> Option<String> {
        let code = leading_code(raw)?;
        palette
            .iter()
            .find(|e| e.code.trim() == code)
            .map(|e| e.rgb.to_css())
    }
}

pub struct ExactName;

impl ColourMatcher for ExactName {
    fn name(&self) -> &'static str { "exact_name" }

    fn resolve(&self, raw: &str, palette: &[PaletteEntry]) -> Option<String> {
        palette
            .iter()
            .find(|e| e.name.trim().eq_ignore_ascii_case(raw))
            .map(|e| e.rgb.to_css())
    }
}

pub struct NameContains;

impl ColourMatcher for NameContains {
    fn name(&self) -> &'static str { "name_contains" }

    fn resolve(&self, raw: &str, palette: &[PaletteEntry]) -> Option<String> {
        let needle = raw.to_lowercase();
        palette
            .iter()
            .find(|e| {
                let name = e.name.trim().to_lowercase();
                !name.is_empty() && (name.contains(&needle) || needle.contains(&name))
            })
            .map(|e| e.rgb.to_css())
    }
}

pub struct DashSuffix;

impl ColourMatcher for DashSuffix {
    fn name(&self) -> &'static str { "dash_suffix" }

    fn resolve(&self, raw: &str, palette: &[PaletteEntry]) -> Option<String> {
        let (_, suffix) = raw.split_once('-')?;
        let suffix = suffix.trim().to_lowercase();
        if suffix.is_empty() {
            return None;
        }
        palette
            .iter()
            .find(|e| e.name.to_lowercase().contains(&suffix))
            .map(|e| e.rgb.to_css())
    }
}

/// Runs the matchers in order.
pub struct PaletteResolver {
    matchers: Vec<Box<dyn ColourMatcher>>,
}

impl PaletteResolver {
    pub fn new() -> Self {
        Self {
            matchers: vec![
                Box::new(RgbPassthrough),
                Box::new(HexLiteral),
                Box::new(CatalogCode),
                Box::new(ExactName),
                Box::new(NameContains),
                Box::new(DashSuffix),
            ],
        }
    }

    pub fn resolve_rgb(&self, raw: &str, palette: &[PaletteEntry]) -> Option<String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        self.matchers.iter().find_map(|m| {
            let hit = m.resolve(raw, palette)?;
            tracing::trace!(matcher = m.name(), raw, resolved = %hit, "colour resolved");
            Some(hit)
        })
    }
}

impl Default for PaletteResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Canonical RGB string for a loose colour reference, or `None`.
pub fn resolve_rgb(raw: &str, palette: &[PaletteEntry]) -> Option<String> {
    PaletteResolver::new().resolve_rgb(raw, palette)
}

/// Catalog name of the entry whose triple equals `rgb`, or `""`.
pub fn resolve_code(rgb: &str, palette: &[PaletteEntry]) -> String {
    let Some(wanted) = Rgb::parse(rgb) else {
        return String::new();
    };
    palette
        .iter()
        .find(|e| e.rgb == wanted)
        .map(|e| e.name.clone())
        .unwrap_or_default()
}
