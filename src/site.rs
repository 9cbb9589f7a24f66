use serde::{Deserialize, Serialize};

use crate::plan::Plan;

pub const DEFAULT_BRAND_COLOR: &str = "#0ea5e9";
pub const DEFAULT_CTA_TEXT: &str = "Contact Us";

/// Everything the assembler needs to render one generated site.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteData {
    pub business_name: String,
    pub description: String,
    pub brand_color: String,
    pub theme: Theme,
    pub font: Font,
    pub cta_text: String,
    pub logo: Option<String>,
    pub gallery: Vec<String>,
    pub services: Vec<String>,
    pub testimonials: Vec<Testimonial>,
    pub hours: Vec<String>,
    pub address: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub instagram: Option<String>,
    pub seo: Seo,
    #[serde(deserialize_with = "Plan::deserialize_or_basic")]
    pub plan: Plan,
}

impl Default for SiteData {
    fn default() -> Self {
        Self {
            business_name: String::new(),
            description: String::new(),
            brand_color: DEFAULT_BRAND_COLOR.to_string(),
            theme: Theme::default(),
            font: Font::default(),
            cta_text: DEFAULT_CTA_TEXT.to_string(),
            logo: None,
            gallery: Vec::new(),
            services: Vec::new(),
            testimonials: Vec::new(),
            hours: Vec::new(),
            address: None,
            email: None,
            phone: None,
            instagram: None,
            seo: Seo::default(),
            plan: Plan::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Testimonial {
    pub name: String,
    pub quote: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Seo {
    pub title: Option<String>,
    pub description: Option<String>,
    pub canonical_url: Option<String>,
    pub analytics_id: Option<String>,
    pub allow_indexing: bool,
    pub search_console_token: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn from_name(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dark" => Theme::Dark,
            _ => Theme::Light,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Font {
    #[default]
    #[serde(rename = "system-ui")]
    SystemUi,
    Inter,
    Poppins,
    #[serde(rename = "Playfair Display")]
    PlayfairDisplay,
}

impl Font {
    pub fn from_name(raw: &str) -> Self {
        match raw.trim() {
            "Inter" => Font::Inter,
            "Poppins" => Font::Poppins,
            "Playfair Display" => Font::PlayfairDisplay,
            _ => Font::SystemUi,
        }
    }

    pub fn family(&self) -> &'static str {
        match self {
            Font::SystemUi => "system-ui",
            Font::Inter => "Inter",
            Font::Poppins => "Poppins",
            Font::PlayfairDisplay => "Playfair Display",
        }
    }

    /// Google Fonts stylesheet for the web fonts; `None` for the system stack.
    pub fn stylesheet_href(&self) -> Option<&'static str> {
        match self {
            Font::SystemUi => None,
            Font::Inter => {
                Some("https://fonts.googleapis.com/css2?family=Inter:wght@400;600;700&display=swap")
            }
            Font::Poppins => Some(
                "https://fonts.googleapis.com/css2?family=Poppins:wght@400;600;700&display=swap",
            ),
            Font::PlayfairDisplay => Some(
                "https://fonts.googleapis.com/css2?family=Playfair+Display:wght@400;600;700&display=swap",
            ),
        }
    }

    pub fn stack(&self) -> String {
        const FALLBACK: &str = "system-ui, -apple-system, Segoe UI, Roboto, Arial, sans-serif";
        match self {
            Font::SystemUi => FALLBACK.to_string(),
            other => format!("'{}', {}", other.family(), FALLBACK),
        }
    }
}

/// Splits free text into trimmed, non-empty lines.
pub fn parse_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses `name|quote` lines. Lines without both parts are dropped.
pub fn parse_testimonials(text: &str) -> Vec<Testimonial> {
    parse_lines(text)
        .into_iter()
        .filter_map(|line| {
            let (name, quote) = line.split_once('|')?;
            let name = name.trim();
            let quote = quote.trim();
            if name.is_empty() || quote.is_empty() {
                return None;
            }
            Some(Testimonial {
                name: name.to_string(),
                quote: quote.to_string(),
            })
        })
        .collect()
}

/// Accepts `#rgb` / `#rrggbb`; anything else becomes the default brand color.
pub fn normalize_brand_color(raw: &str) -> String {
    let trimmed = raw.trim();
    let valid = trimmed
        .strip_prefix('#')
        .map(|hex| (hex.len() == 3 || hex.len() == 6) && hex.chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false);
    if valid {
        trimmed.to_ascii_lowercase()
    } else {
        DEFAULT_BRAND_COLOR.to_string()
    }
}

/// Trims and turns blank strings into `None`.
pub fn non_empty(raw: impl AsRef<str>) -> Option<String> {
    let trimmed = raw.as_ref().trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
