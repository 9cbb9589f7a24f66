use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use v_htmlescape::escape;

use crate::images::ImageGenerator;

const DEFAULT_BRAND: &str = "My Brand";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogoRequest {
    pub brand: String,
    pub slogan: String,
    pub industry: String,
    pub style: String,
    pub colors: String,
}

impl LogoRequest {
    pub fn brand_or_default(&self) -> &str {
        let brand = self.brand.trim();
        if brand.is_empty() {
            DEFAULT_BRAND
        } else {
            brand
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoSource {
    Remote,
    Procedural,
}

#[derive(Clone, Debug, Serialize)]
pub struct LogoSet {
    pub images: Vec<String>,
    pub source: LogoSource,
}

/// Asks the remote generator first and falls back to procedural variants on any failure.
pub async fn generate_logos(
    generator: Option<&dyn ImageGenerator>,
    request: &LogoRequest,
) -> LogoSet {
    if let Some(generator) = generator {
        match generator.generate(request).await {
            Ok(images) if !images.is_empty() => {
                info!(count = images.len(), "generated remote logo variants");
                return LogoSet {
                    images,
                    source: LogoSource::Remote,
                };
            }
            Ok(_) => warn!("image api returned no images, using procedural logos"),
            Err(err) => warn!(?err, "image api unavailable, using procedural logos"),
        }
    }

    LogoSet {
        images: procedural_variants(request)
            .iter()
            .map(LogoVariant::data_uri)
            .collect(),
        source: LogoSource::Procedural,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layout {
    IconLeft,
    Stacked,
    Badge,
}

impl Layout {
    pub const ALL: [Layout; 3] = [Layout::IconLeft, Layout::Stacked, Layout::Badge];

    pub fn slug(&self) -> &'static str {
        match self {
            Layout::IconLeft => "icon-left",
            Layout::Stacked => "stacked",
            Layout::Badge => "badge",
        }
    }
}

#[derive(Clone, Debug)]
pub struct LogoVariant {
    pub layout: Layout,
    pub svg: String,
}

impl LogoVariant {
    pub fn data_uri(&self) -> String {
        format!(
            "data:image/svg+xml;base64,{}",
            STANDARD.encode(self.svg.as_bytes())
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Palette {
    pub primary: &'static str,
    pub accent: &'static str,
    pub background: &'static str,
    pub text: &'static str,
    pub font: &'static str,
}

const MINIMAL: Palette = Palette {
    primary: "#111827",
    accent: "#6b7280",
    background: "#ffffff",
    text: "#111827",
    font: "Helvetica, Arial, sans-serif",
};

const PALETTES: &[(&str, Palette)] = &[
    ("minimal", MINIMAL),
    (
        "bold",
        Palette {
            primary: "#dc2626",
            accent: "#f59e0b",
            background: "#111827",
            text: "#ffffff",
            font: "Impact, 'Arial Black', sans-serif",
        },
    ),
    (
        "playful",
        Palette {
            primary: "#8b5cf6",
            accent: "#f472b6",
            background: "#fef3c7",
            text: "#4c1d95",
            font: "'Trebuchet MS', sans-serif",
        },
    ),
    (
        "elegant",
        Palette {
            primary: "#1f2937",
            accent: "#b08d57",
            background: "#faf7f2",
            text: "#1f2937",
            font: "Georgia, 'Times New Roman', serif",
        },
    ),
    (
        "modern",
        Palette {
            primary: "#2563eb",
            accent: "#14b8a6",
            background: "#f8fafc",
            text: "#0f172a",
            font: "Helvetica, Arial, sans-serif",
        },
    ),
];

pub fn palette_for(style: &str) -> Palette {
    let style = style.trim().to_ascii_lowercase();
    PALETTES
        .iter()
        .find(|(name, _)| *name == style)
        .map(|(_, palette)| *palette)
        .unwrap_or(MINIMAL)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Symbol {
    Cup,
    Leaf,
    Bolt,
    Brackets,
    House,
    Cutlery,
    Aperture,
    Scissors,
    Paw,
    Monogram,
}

const SYMBOL_KEYWORDS: &[(Symbol, &[&str])] = &[
    (Symbol::Cup, &["coffee", "cafe", "café", "tea", "bakery", "espresso"]),
    (Symbol::Cutlery, &["restaurant", "food", "catering", "kitchen", "bistro", "diner"]),
    (Symbol::Scissors, &["salon", "barber", "hair", "tailor"]),
    (Symbol::Leaf, &["garden", "landscaping", "florist", "flower", "organic", "spa", "wellness", "beauty", "yoga"]),
    (Symbol::Bolt, &["fitness", "gym", "energy", "electric", "electrician", "sport", "training"]),
    (Symbol::Brackets, &["tech", "software", "it", "app", "digital", "web", "developer", "saas"]),
    (Symbol::House, &["construction", "realty", "real", "home", "roofing", "plumbing", "cleaning", "builder"]),
    (Symbol::Aperture, &["photo", "photography", "camera", "studio", "video", "film"]),
    (Symbol::Paw, &["pet", "pets", "vet", "veterinary", "dog", "cat", "grooming"]),
];

/// First table entry whose keyword matches a word of `industry`; monogram otherwise.
pub fn symbol_for(industry: &str) -> Symbol {
    let lowered = industry.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect();

    SYMBOL_KEYWORDS
        .iter()
        .find(|(_, keywords)| {
            keywords.iter().any(|keyword| {
                words.iter().any(|word| {
                    *word == *keyword || (keyword.chars().count() >= 4 && word.starts_with(*keyword))
                })
            })
        })
        .map(|(symbol, _)| *symbol)
        .unwrap_or(Symbol::Monogram)
}

pub fn initials(brand: &str) -> String {
    let letters: String = brand
        .split_whitespace()
        .filter_map(|word| word.chars().find(|c| c.is_alphanumeric()))
        .take(2)
        .flat_map(char::to_uppercase)
        .collect();
    if letters.is_empty() {
        "B".to_string()
    } else {
        letters
    }
}

/// Up to two `#rgb`/`#rrggbb` colors from free text, in order.
fn parse_colors(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|token| {
            token.strip_prefix('#').is_some_and(|hex| {
                (hex.len() == 3 || hex.len() == 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
            })
        })
        .take(2)
        .map(str::to_ascii_lowercase)
        .collect()
}

struct Resolved {
    primary: String,
    accent: String,
    background: &'static str,
    text: &'static str,
    font: &'static str,
}

fn resolve_palette(request: &LogoRequest) -> Resolved {
    let base = palette_for(&request.style);
    let overrides = parse_colors(&request.colors);
    Resolved {
        primary: overrides
            .first()
            .cloned()
            .unwrap_or_else(|| base.primary.to_string()),
        accent: overrides
            .get(1)
            .cloned()
            .unwrap_or_else(|| base.accent.to_string()),
        background: base.background,
        text: base.text,
        font: base.font,
    }
}

/// Deterministic SVG variants, one per layout.
pub fn procedural_variants(request: &LogoRequest) -> Vec<LogoVariant> {
    let palette = resolve_palette(request);
    let symbol = symbol_for(&request.industry);
    let brand = request.brand_or_default();
    let monogram = initials(brand);

    Layout::ALL
        .iter()
        .map(|layout| LogoVariant {
            layout: *layout,
            svg: render_variant(*layout, symbol, &monogram, brand, request.slogan.trim(), &palette),
        })
        .collect()
}

fn render_variant(
    layout: Layout,
    symbol: Symbol,
    monogram: &str,
    brand: &str,
    slogan: &str,
    palette: &Resolved,
) -> String {
    let brand = escape(brand);
    match layout {
        Layout::IconLeft => {
            let slogan_text = escape(slogan);
            let mark = symbol_markup(symbol, monogram, &palette.primary, palette.background, palette.font);
            let slogan_line = if slogan.is_empty() {
                String::new()
            } else {
                format!(
                    r#"<text x="112" y="84" font-family="{font}" font-size="14" fill="{accent}">{slogan_text}</text>"#,
                    font = palette.font,
                    accent = palette.accent,
                )
            };
            format!(
                r#"<svg xmlns="http://www.w3.org/2000/svg" width="360" height="120" viewBox="0 0 360 120"><rect width="360" height="120" rx="16" fill="{bg}"/><g transform="translate(24 20) scale(1.6667)">{mark}</g><text x="112" y="62" font-family="{font}" font-size="30" font-weight="700" fill="{text}">{brand}</text>{slogan_line}</svg>"#,
                bg = palette.background,
                font = palette.font,
                text = palette.text,
            )
        }
        Layout::Stacked => {
            let mark = symbol_markup(symbol, monogram, &palette.primary, palette.background, palette.font);
            format!(
                r#"<svg xmlns="http://www.w3.org/2000/svg" width="240" height="240" viewBox="0 0 240 240"><rect width="240" height="240" rx="24" fill="{bg}"/><g transform="translate(80 36) scale(1.6667)">{mark}</g><text x="120" y="160" text-anchor="middle" font-family="{font}" font-size="26" font-weight="700" fill="{text}">{brand}</text><rect x="90" y="176" width="60" height="4" rx="2" fill="{accent}"/></svg>"#,
                bg = palette.background,
                font = palette.font,
                text = palette.text,
                accent = palette.accent,
            )
        }
        Layout::Badge => {
            let mark = symbol_markup(symbol, monogram, "#ffffff", &palette.primary, palette.font);
            format!(
                r##"<svg xmlns="http://www.w3.org/2000/svg" width="240" height="240" viewBox="0 0 240 240"><circle cx="120" cy="120" r="112" fill="{primary}"/><circle cx="120" cy="120" r="100" fill="none" stroke="{accent}" stroke-width="4"/><g transform="translate(84 48) scale(1.5)">{mark}</g><text x="120" y="168" text-anchor="middle" font-family="{font}" font-size="20" font-weight="700" fill="#ffffff">{brand}</text></svg>"##,
                primary = palette.primary,
                accent = palette.accent,
                font = palette.font,
            )
        }
    }
}

/// Symbol drawn in a 48x48 box.
fn symbol_markup(symbol: Symbol, monogram: &str, fg: &str, bg: &str, font: &str) -> String {
    match symbol {
        Symbol::Cup => format!(
            r#"<path d="M8 18h26v10a11 11 0 0 1-11 11h-4A11 11 0 0 1 8 28z" fill="{fg}"/><path d="M34 21h3a5 5 0 0 1 0 10h-3" fill="none" stroke="{fg}" stroke-width="3"/><path d="M15 6c-2 3 2 5 0 8M22 6c-2 3 2 5 0 8M29 6c-2 3 2 5 0 8" fill="none" stroke="{fg}" stroke-width="2" stroke-linecap="round"/>"#
        ),
        Symbol::Leaf => format!(
            r#"<path d="M40 8C20 8 8 18 8 32c0 4 1 7 3 9 14 0 29-8 29-33z" fill="{fg}"/><path d="M11 41L30 20" stroke="{bg}" stroke-width="2" stroke-linecap="round"/>"#
        ),
        Symbol::Bolt => format!(r#"<path d="M27 4L10 27h11l-4 17 19-25H25z" fill="{fg}"/>"#),
        Symbol::Brackets => format!(
            r#"<path d="M17 12L6 24l11 12M31 12l11 12-11 12" fill="none" stroke="{fg}" stroke-width="4" stroke-linecap="round" stroke-linejoin="round"/><path d="M27 8l-6 32" stroke="{fg}" stroke-width="3" stroke-linecap="round"/>"#
        ),
        Symbol::House => format!(
            r#"<path d="M6 24L24 8l18 16" fill="none" stroke="{fg}" stroke-width="4" stroke-linejoin="round"/><path d="M12 22v18h24V22z" fill="{fg}"/><rect x="20" y="29" width="8" height="11" fill="{bg}"/>"#
        ),
        Symbol::Cutlery => format!(
            r#"<path d="M14 6v12a4 4 0 0 0 8 0V6M18 6v36" fill="none" stroke="{fg}" stroke-width="3" stroke-linecap="round"/><path d="M32 6c5 3 6 12 2 17v19" fill="none" stroke="{fg}" stroke-width="3" stroke-linecap="round"/>"#
        ),
        Symbol::Aperture => format!(
            r#"<circle cx="24" cy="24" r="18" fill="none" stroke="{fg}" stroke-width="4"/><circle cx="24" cy="24" r="7" fill="{fg}"/><path d="M24 6l7 12M42 24H28M24 42l-7-12M6 24h14" stroke="{fg}" stroke-width="3"/>"#
        ),
        Symbol::Scissors => format!(
            r#"<circle cx="12" cy="36" r="6" fill="none" stroke="{fg}" stroke-width="3"/><circle cx="36" cy="36" r="6" fill="none" stroke="{fg}" stroke-width="3"/><path d="M16 31L36 6M32 31L12 6" stroke="{fg}" stroke-width="3" stroke-linecap="round"/>"#
        ),
        Symbol::Paw => format!(
            r#"<ellipse cx="24" cy="32" rx="10" ry="8" fill="{fg}"/><circle cx="12" cy="20" r="4" fill="{fg}"/><circle cx="20" cy="12" r="4" fill="{fg}"/><circle cx="28" cy="12" r="4" fill="{fg}"/><circle cx="36" cy="20" r="4" fill="{fg}"/>"#
        ),
        Symbol::Monogram => format!(
            r#"<text x="24" y="32" text-anchor="middle" font-family="{font}" font-size="22" font-weight="700" fill="{fg}">{}</text>"#,
            escape(monogram)
        ),
    }
}
