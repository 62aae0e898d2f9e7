//! Per-type config schemas for home sections.
//!
//! A schema lists the keys a section type understands and the JSON kind each
//! must have. Keys outside the schema are kept as-is.

use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::section::SectionType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKind {
    Bool,
    Integer,
    String,
    Array,
    Object,
}

impl ConfigKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Integer => "integer",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Bool => value.is_boolean(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::String => value.is_string(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SectionConfigError {
    #[error("section config must be a JSON object")]
    NotAnObject,

    #[error("invalid section config: {}", .0.join("; "))]
    InvalidKeys(Vec<String>),
}

const COLLECTION: &[(&str, ConfigKind)] = &[
    ("data_source", ConfigKind::String),
    ("manual_product_ids", ConfigKind::Array),
    ("query", ConfigKind::Object),
    ("limit", ConfigKind::Integer),
    ("layout", ConfigKind::String),
    ("show_price_badges", ConfigKind::Bool),
];

pub fn schema(section_type: SectionType) -> &'static [(&'static str, ConfigKind)] {
    use ConfigKind::*;
    match section_type {
        SectionType::HeroSlider => &[
            ("show_arrows", Bool),
            ("show_dots", Bool),
            ("autoplay_enabled", Bool),
            ("autoplay_interval_ms", Integer),
            ("transition", String),
            ("transition_ms", Integer),
        ],
        SectionType::TrustBadges => &[("items", Array)],
        SectionType::CategoryTiles => &[
            ("tiles", Array),
            ("columns_mobile", Integer),
            ("columns_desktop", Integer),
        ],
        SectionType::FeaturedCollection | SectionType::NewArrivals | SectionType::Bestsellers => COLLECTION,
        SectionType::StaffPicks => &[("items", Array)],
        SectionType::DealsOfDay => &[("items", Array)],
        SectionType::AuthorSpotlight => &[("author", String), ("portrait_url", String), ("blurb", String)],
        SectionType::PublisherSpotlight => &[("publisher", String), ("logo_url", String), ("blurb", String)],
        SectionType::LanguageShelf => &[("languages", Array), ("limit", Integer), ("layout", String)],
        SectionType::KidsCorner => &[("limit", Integer), ("layout", String), ("banner_url", String)],
        SectionType::QuickOrderIsbn => &[("enable_scanner", Bool), ("note_text", String)],
        SectionType::TrendingSearches => &[("terms", Array), ("view_all_link", String)],
        SectionType::BlogSnippets => &[("posts", Array)],
        SectionType::Testimonials => &[("items", Array)],
        SectionType::NewsletterBar => &[
            ("title", String),
            ("subtitle", String),
            ("placeholder_text", String),
            ("submit_label", String),
        ],
        SectionType::InfoStrip => &[("items", Array)],
    }
}

/// Check `config` against the schema for `section_type`, reporting every bad key.
pub fn validate_section_config(
    section_type: SectionType,
    config: &Value,
) -> Result<Map<String, Value>, SectionConfigError> {
    let object = config.as_object().ok_or(SectionConfigError::NotAnObject)?;

    let errors: Vec<String> = schema(section_type)
        .iter()
        .filter_map(|(key, kind)| match object.get(*key) {
            Some(value) if !kind.accepts(value) => Some(format!("{key} must be of type {}", kind.name())),
            _ => None,
        })
        .collect();

    if errors.is_empty() {
        Ok(object.clone())
    } else {
        Err(SectionConfigError::InvalidKeys(errors))
    }
}

/// Starting config for a new section of `section_type`.
pub fn default_config(section_type: SectionType) -> Map<String, Value> {
    let value = match section_type {
        SectionType::HeroSlider => json!({
            "show_arrows": true,
            "show_dots": true,
            "autoplay_enabled": true,
            "autoplay_interval_ms": 5000,
            "transition": "fade",
            "transition_ms": 600,
        }),
        SectionType::CategoryTiles => json!({
            "tiles": [],
            "columns_mobile": 2,
            "columns_desktop": 4,
        }),
        SectionType::FeaturedCollection | SectionType::NewArrivals | SectionType::Bestsellers => json!({
            "data_source": "query",
            "limit": 8,
            "layout": "grid",
            "show_price_badges": false,
            "query": { "category_slug": "", "sort": "newest" },
        }),
        SectionType::NewsletterBar => json!({
            "title": "Stay Updated",
            "subtitle": "Subscribe to our newsletter",
            "placeholder_text": "Enter your email",
            "submit_label": "Subscribe",
        }),
        SectionType::QuickOrderIsbn => json!({
            "enable_scanner": false,
            "note_text": "",
        }),
        _ => json!({}),
    };
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_their_own_schema() {
        for t in SectionType::ALL {
            let config = Value::Object(default_config(t));
            assert!(validate_section_config(t, &config).is_ok(), "{t}");
        }
    }

    #[test]
    fn unknown_keys_are_allowed() {
        let config = json!({ "limit": 4, "headline_colour": "teal" });
        let ok = validate_section_config(SectionType::NewArrivals, &config).unwrap();
        assert_eq!(ok.get("headline_colour"), Some(&json!("teal")));
    }

    #[test]
    fn every_bad_key_is_reported() {
        let config = json!({
            "show_arrows": "yes",
            "autoplay_interval_ms": 2.5,
            "transition": "fade",
        });
        let err = validate_section_config(SectionType::HeroSlider, &config).unwrap_err();
        assert_eq!(
            err,
            SectionConfigError::InvalidKeys(vec![
                "show_arrows must be of type bool".into(),
                "autoplay_interval_ms must be of type integer".into(),
            ])
        );
    }

    #[test]
    fn config_must_be_an_object() {
        assert_eq!(
            validate_section_config(SectionType::InfoStrip, &json!([1, 2])),
            Err(SectionConfigError::NotAnObject)
        );
    }
}
