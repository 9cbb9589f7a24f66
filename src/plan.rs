use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Pricing tier selected in the builder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Basic,
    Pro,
    Business,
}

impl Plan {
    pub const ALL: [Plan; 3] = [Plan::Basic, Plan::Pro, Plan::Business];

    /// Parses a plan id. Anything unrecognised maps to the most restrictive tier.
    pub fn parse_or_basic(raw: &str) -> Self {
        Self::from_id(raw).unwrap_or(Plan::Basic)
    }

    /// `deserialize_with` hook that applies [`Plan::parse_or_basic`] to JSON plan ids.
    pub fn deserialize_or_basic<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(Self::parse_or_basic).unwrap_or_default())
    }

    pub fn from_id(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "basic" => Some(Plan::Basic),
            "pro" => Some(Plan::Pro),
            "business" => Some(Plan::Business),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Basic => "basic",
            Plan::Pro => "pro",
            Plan::Business => "business",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Plan::Basic => "Basic",
            Plan::Pro => "Pro",
            Plan::Business => "Business",
        }
    }

    pub fn features(&self) -> PlanFeatures {
        match self {
            Plan::Basic => PlanFeatures {
                services: false,
                testimonials: false,
                branding: false,
                seo: false,
                gallery_limit: 3,
            },
            Plan::Pro => PlanFeatures {
                services: true,
                testimonials: true,
                branding: true,
                seo: false,
                gallery_limit: 6,
            },
            Plan::Business => PlanFeatures {
                services: true,
                testimonials: true,
                branding: true,
                seo: true,
                gallery_limit: 12,
            },
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Feature matrix row for one tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PlanFeatures {
    pub services: bool,
    pub testimonials: bool,
    pub branding: bool,
    pub seo: bool,
    pub gallery_limit: usize,
}

impl PlanFeatures {
    pub fn allows(&self, field: FormField) -> bool {
        match field.group() {
            FieldGroup::Services => self.services,
            FieldGroup::Testimonials => self.testimonials,
            FieldGroup::Branding => self.branding,
            FieldGroup::Seo => self.seo,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FieldGroup {
    Services,
    Testimonials,
    Branding,
    Seo,
}

/// Builder form controls that a plan can disable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FormField {
    Services,
    Testimonials,
    Logo,
    BrandColor,
    Theme,
    Font,
    SeoTitle,
    SeoDescription,
    CanonicalUrl,
    AnalyticsId,
    AllowIndexing,
    SearchConsoleToken,
}

impl FormField {
    pub const ALL: [FormField; 12] = [
        FormField::Services,
        FormField::Testimonials,
        FormField::Logo,
        FormField::BrandColor,
        FormField::Theme,
        FormField::Font,
        FormField::SeoTitle,
        FormField::SeoDescription,
        FormField::CanonicalUrl,
        FormField::AnalyticsId,
        FormField::AllowIndexing,
        FormField::SearchConsoleToken,
    ];

    /// Name of the form control this field is bound to.
    pub fn id(&self) -> &'static str {
        match self {
            FormField::Services => "services",
            FormField::Testimonials => "testimonials",
            FormField::Logo => "logo",
            FormField::BrandColor => "brandColor",
            FormField::Theme => "theme",
            FormField::Font => "font",
            FormField::SeoTitle => "seoTitle",
            FormField::SeoDescription => "seoDescription",
            FormField::CanonicalUrl => "canonicalUrl",
            FormField::AnalyticsId => "analyticsId",
            FormField::AllowIndexing => "allowIndexing",
            FormField::SearchConsoleToken => "searchConsoleToken",
        }
    }

    fn group(&self) -> FieldGroup {
        match self {
            FormField::Services => FieldGroup::Services,
            FormField::Testimonials => FieldGroup::Testimonials,
            FormField::Logo | FormField::BrandColor | FormField::Theme | FormField::Font => {
                FieldGroup::Branding
            }
            FormField::SeoTitle
            | FormField::SeoDescription
            | FormField::CanonicalUrl
            | FormField::AnalyticsId
            | FormField::AllowIndexing
            | FormField::SearchConsoleToken => FieldGroup::Seo,
        }
    }
}

/// Controls to disable for `plan`. Values behind them are left untouched.
pub fn locked_fields(plan: Plan) -> BTreeSet<FormField> {
    let features = plan.features();
    FormField::ALL
        .into_iter()
        .filter(|field| !features.allows(*field))
        .collect()
}
