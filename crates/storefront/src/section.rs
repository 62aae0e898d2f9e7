use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use inkwell_core::Entity;

pub type SectionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    HeroSlider,
    TrustBadges,
    CategoryTiles,
    FeaturedCollection,
    NewArrivals,
    Bestsellers,
    StaffPicks,
    DealsOfDay,
    AuthorSpotlight,
    PublisherSpotlight,
    LanguageShelf,
    KidsCorner,
    QuickOrderIsbn,
    TrendingSearches,
    BlogSnippets,
    Testimonials,
    NewsletterBar,
    InfoStrip,
}

impl SectionType {
    pub const ALL: [SectionType; 18] = [
        Self::HeroSlider,
        Self::TrustBadges,
        Self::CategoryTiles,
        Self::FeaturedCollection,
        Self::NewArrivals,
        Self::Bestsellers,
        Self::StaffPicks,
        Self::DealsOfDay,
        Self::AuthorSpotlight,
        Self::PublisherSpotlight,
        Self::LanguageShelf,
        Self::KidsCorner,
        Self::QuickOrderIsbn,
        Self::TrendingSearches,
        Self::BlogSnippets,
        Self::Testimonials,
        Self::NewsletterBar,
        Self::InfoStrip,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::HeroSlider => "hero_slider",
            Self::TrustBadges => "trust_badges",
            Self::CategoryTiles => "category_tiles",
            Self::FeaturedCollection => "featured_collection",
            Self::NewArrivals => "new_arrivals",
            Self::Bestsellers => "bestsellers",
            Self::StaffPicks => "staff_picks",
            Self::DealsOfDay => "deals_of_day",
            Self::AuthorSpotlight => "author_spotlight",
            Self::PublisherSpotlight => "publisher_spotlight",
            Self::LanguageShelf => "language_shelf",
            Self::KidsCorner => "kids_corner",
            Self::QuickOrderIsbn => "quick_order_isbn",
            Self::TrendingSearches => "trending_searches",
            Self::BlogSnippets => "blog_snippets",
            Self::Testimonials => "testimonials",
            Self::NewsletterBar => "newsletter_bar",
            Self::InfoStrip => "info_strip",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl core::fmt::Display for SectionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One block on the home page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeSection {
    pub id: SectionId,
    pub section_type: SectionType,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub config: Map<String, Value>,
    pub position: i32,
    pub active: bool,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for HomeSection {
    type Id = SectionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl HomeSection {
    /// Active and inside its optional schedule window.
    pub fn is_scheduled_active(&self, now: DateTime<Utc>) -> bool {
        if !self.active {
            return false;
        }
        if self.start_at.is_some_and(|s| now < s) {
            return false;
        }
        if self.end_at.is_some_and(|e| now > e) {
            return false;
        }
        true
    }

    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }

    pub(crate) fn config_u64(&self, key: &str) -> Option<u64> {
        self.config_value(key).and_then(Value::as_u64)
    }

    pub(crate) fn config_str(&self, key: &str) -> Option<&str> {
        self.config_value(key).and_then(Value::as_str)
    }

    pub(crate) fn config_array(&self, key: &str) -> &[Value] {
        self.config_value(key)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
