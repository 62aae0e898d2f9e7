//! Turn a section's config into the products it shows.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use inkwell_catalog::{Language, ProductId, ProductListing};
use inkwell_core::{AggregateId, Money};

use crate::section::{HomeSection, SectionType};

pub const DEFAULT_SECTION_LIMIT: usize = 8;

/// Read access to listing rows for section resolution.
pub trait ProductSource {
    fn find(&self, id: ProductId) -> Option<ProductListing>;

    /// Every listing, any status.
    fn all(&self) -> Vec<ProductListing>;
}

impl ProductSource for [ProductListing] {
    fn find(&self, id: ProductId) -> Option<ProductListing> {
        self.iter().find(|p| p.id == id).cloned()
    }

    fn all(&self) -> Vec<ProductListing> {
        self.to_vec()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffPick {
    pub product: ProductListing,
    pub editor_note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deal {
    pub product: ProductListing,
    pub deal_price: Money,
    pub ends_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SectionData {
    Products { products: Vec<ProductListing> },
    StaffPicks { picks: Vec<StaffPick> },
    Deals { deals: Vec<Deal> },
    Author { author: String, products: Vec<ProductListing> },
    /// Rendered straight from config.
    Static,
}

fn parse_product_id(value: &Value) -> Option<ProductId> {
    value
        .as_str()
        .and_then(|s| AggregateId::from_str(s).ok())
        .map(ProductId::new)
}

fn active<S: ProductSource + ?Sized>(source: &S) -> Vec<ProductListing> {
    source.all().into_iter().filter(ProductListing::is_active).collect()
}

fn newest_first(products: &mut [ProductListing]) {
    products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

fn limit_of(section: &HomeSection) -> usize {
    section
        .config_u64("limit")
        .and_then(|l| usize::try_from(l).ok())
        .filter(|l| *l > 0)
        .unwrap_or(DEFAULT_SECTION_LIMIT)
}

fn collection<S: ProductSource + ?Sized>(section: &HomeSection, source: &S) -> Vec<ProductListing> {
    let limit = limit_of(section);

    if section.config_str("data_source") == Some("manual") {
        return section
            .config_array("manual_product_ids")
            .iter()
            .filter_map(parse_product_id)
            .filter_map(|id| source.find(id))
            .filter(ProductListing::is_active)
            .take(limit)
            .collect();
    }

    let query = section.config_value("query");
    let category = query
        .and_then(|q| q.get("category_slug"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty());
    let sort = query
        .and_then(|q| q.get("sort"))
        .and_then(Value::as_str)
        .unwrap_or("newest");

    let mut products: Vec<ProductListing> = active(source)
        .into_iter()
        .filter(|p| category.is_none_or(|c| p.categories.iter().any(|pc| pc == c)))
        .filter(|p| match section.section_type {
            SectionType::NewArrivals => p.new_arrival,
            SectionType::Bestsellers => p.bestseller,
            _ => true,
        })
        .collect();

    match sort {
        "price_low" => products.sort_by_key(|p| p.effective_price().unwrap_or(Money::ZERO)),
        "price_high" => products.sort_by_key(|p| std::cmp::Reverse(p.effective_price().unwrap_or(Money::ZERO))),
        _ => newest_first(&mut products),
    }
    products.truncate(limit);
    products
}

fn language_shelf<S: ProductSource + ?Sized>(section: &HomeSection, source: &S) -> Vec<ProductListing> {
    let languages: Vec<Language> = section
        .config_array("languages")
        .iter()
        .filter_map(Value::as_str)
        .filter_map(Language::parse)
        .collect();

    let mut products: Vec<ProductListing> = active(source)
        .into_iter()
        .filter(|p| languages.is_empty() || languages.contains(&p.language))
        .collect();
    newest_first(&mut products);
    products.truncate(limit_of(section));
    products
}

/// The active product an item's `product_id` points at.
fn active_item<S: ProductSource + ?Sized>(item: &Value, source: &S) -> Option<ProductListing> {
    item.get("product_id")
        .and_then(parse_product_id)
        .and_then(|id| source.find(id))
        .filter(ProductListing::is_active)
}

fn staff_picks<S: ProductSource + ?Sized>(section: &HomeSection, source: &S) -> Vec<StaffPick> {
    section
        .config_array("items")
        .iter()
        .filter_map(|item| {
            let product = active_item(item, source)?;
            Some(StaffPick {
                product,
                editor_note: item
                    .get("editor_note")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })
        })
        .collect()
}

fn deals<S: ProductSource + ?Sized>(section: &HomeSection, source: &S, now: DateTime<Utc>) -> Vec<Deal> {
    section
        .config_array("items")
        .iter()
        .filter_map(|item| {
            let product = active_item(item, source)?;
            let deal_price = Money::from_paise(item.get("deal_price").and_then(Value::as_u64)?);
            let ends_at = item
                .get("ends_at")
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|d| d.with_timezone(&Utc));
            if ends_at.is_some_and(|e| e <= now) {
                return None;
            }
            Some(Deal {
                product,
                deal_price,
                ends_at,
            })
        })
        .collect()
}

/// Data a section needs to render at `now`.
pub fn resolve_section<S: ProductSource + ?Sized>(
    section: &HomeSection,
    source: &S,
    now: DateTime<Utc>,
) -> SectionData {
    match section.section_type {
        SectionType::FeaturedCollection | SectionType::NewArrivals | SectionType::Bestsellers => {
            SectionData::Products {
                products: collection(section, source),
            }
        }
        SectionType::LanguageShelf => SectionData::Products {
            products: language_shelf(section, source),
        },
        SectionType::StaffPicks => SectionData::StaffPicks {
            picks: staff_picks(section, source),
        },
        SectionType::DealsOfDay => SectionData::Deals {
            deals: deals(section, source, now),
        },
        SectionType::AuthorSpotlight => match section.config_str("author").filter(|a| !a.trim().is_empty()) {
            Some(author) => {
                let mut products: Vec<ProductListing> = active(source)
                    .into_iter()
                    .filter(|p| p.authors.iter().any(|a| a.eq_ignore_ascii_case(author)))
                    .collect();
                newest_first(&mut products);
                products.truncate(limit_of(section));
                SectionData::Author {
                    author: author.to_string(),
                    products,
                }
            }
            None => SectionData::Static,
        },
        _ => SectionData::Static,
    }
}
