use std::collections::HashMap;

use axum::extract::Multipart;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

use crate::plan::Plan;
use crate::site::{
    non_empty, normalize_brand_color, parse_lines, parse_testimonials, Font, Seo, SiteData, Theme,
    DEFAULT_CTA_TEXT,
};

/// Per-file upload cap (1.5 MiB) for logo and gallery images.
pub const MAX_IMAGE_BYTES: usize = 1536 * 1024;

#[derive(Debug, Error)]
pub enum FormError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("logo must be an image file")]
    LogoNotImage,
    #[error("logo exceeds the {} KiB upload limit", MAX_IMAGE_BYTES / 1024)]
    LogoTooLarge,
    #[error("failed to read form upload: {0}")]
    Multipart(String),
}

#[derive(Clone, Debug)]
pub struct UploadedFile {
    pub field: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    fn image_mime(&self) -> Option<&str> {
        self.content_type
            .as_deref()
            .filter(|mime| mime.starts_with("image/"))
    }
}

/// Raw builder form state: text controls plus uploaded files.
#[derive(Clone, Debug, Default)]
pub struct FormSubmission {
    text: HashMap<String, String>,
    files: Vec<UploadedFile>,
}

impl FormSubmission {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, name: &str, value: &str) -> Self {
        self.insert_text(name, value);
        self
    }

    pub fn with_file(mut self, field: &str, content_type: &str, bytes: Vec<u8>) -> Self {
        self.files.push(UploadedFile {
            field: field.to_string(),
            content_type: Some(content_type.to_string()),
            bytes,
        });
        self
    }

    pub fn insert_text(&mut self, name: &str, value: &str) {
        self.text.insert(name.to_string(), value.to_string());
    }

    pub fn text(&self, name: &str) -> &str {
        self.text.get(name).map(String::as_str).unwrap_or("")
    }

    fn optional(&self, name: &str) -> Option<String> {
        non_empty(self.text(name))
    }

    fn checked(&self, name: &str) -> bool {
        matches!(
            self.text(name).trim().to_ascii_lowercase().as_str(),
            "on" | "true" | "1" | "yes"
        )
    }

    fn files_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a UploadedFile> + 'a {
        self.files
            .iter()
            .filter(move |file| file.field == name && !file.bytes.is_empty())
    }

    /// Drains an axum multipart body. Parts carrying a file name are treated as uploads.
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, FormError> {
        let mut form = Self::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|err| FormError::Multipart(err.to_string()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let is_file = field.file_name().is_some();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|err| FormError::Multipart(err.to_string()))?;

            if is_file {
                form.files.push(UploadedFile {
                    field: name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            } else {
                form.insert_text(&name, &String::from_utf8_lossy(&bytes));
            }
        }
        Ok(form)
    }
}

pub fn to_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Builds a fresh `SiteData` from one form submission.
pub fn read_site_data(form: &FormSubmission) -> Result<SiteData, FormError> {
    let business_name = form
        .optional("businessName")
        .ok_or(FormError::MissingField("businessName"))?;
    let plan = Plan::parse_or_basic(form.text("plan"));

    let logo = match form.files_named("logo").next() {
        Some(file) => {
            let mime = file.image_mime().ok_or(FormError::LogoNotImage)?;
            if file.bytes.len() > MAX_IMAGE_BYTES {
                return Err(FormError::LogoTooLarge);
            }
            Some(to_data_uri(mime, &file.bytes))
        }
        None => form
            .optional("logoDataUrl")
            .filter(|uri| uri.starts_with("data:image/")),
    };

    // Oversized or non-image gallery files are skipped rather than failing the whole form.
    let gallery = form
        .files_named("gallery")
        .filter(|file| file.bytes.len() <= MAX_IMAGE_BYTES)
        .filter_map(|file| file.image_mime().map(|mime| to_data_uri(mime, &file.bytes)))
        .take(plan.features().gallery_limit)
        .collect();

    Ok(SiteData {
        business_name,
        description: form.text("description").trim().to_string(),
        brand_color: normalize_brand_color(form.text("brandColor")),
        theme: Theme::from_name(form.text("theme")),
        font: Font::from_name(form.text("font")),
        cta_text: form
            .optional("ctaText")
            .unwrap_or_else(|| DEFAULT_CTA_TEXT.to_string()),
        logo,
        gallery,
        services: parse_lines(form.text("services")),
        testimonials: parse_testimonials(form.text("testimonials")),
        hours: parse_lines(form.text("hours")),
        address: form.optional("address"),
        email: form.optional("email"),
        phone: form.optional("phone"),
        instagram: form.optional("instagram"),
        seo: Seo {
            title: form.optional("seoTitle"),
            description: form.optional("seoDescription"),
            canonical_url: form.optional("canonicalUrl"),
            analytics_id: form.optional("analyticsId"),
            allow_indexing: form.checked("allowIndexing"),
            search_console_token: form.optional("searchConsoleToken"),
        },
        plan,
    })
}
