//! Catalog browsing over denormalised listing rows.
//!
//! Everything here is a pure function over a slice of [`ProductListing`]s; the
//! infra crate keeps those rows up to date from product and stock events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use inkwell_core::Money;

use crate::product::{BookFormat, Language, Price, PriceDisplay, ProductId, ProductStatus};

pub const DEFAULT_PER_PAGE: u32 = 20;

/// A product as shown in the storefront, joined with its stock level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductListing {
    pub id: ProductId,
    pub title: String,
    pub slug: String,
    pub sku: String,
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub language: Language,
    pub format: BookFormat,
    pub pages: Option<u32>,
    pub authors: Vec<String>,
    pub categories: Vec<String>,
    pub publisher: Option<String>,
    pub price: Option<Price>,
    pub bestseller: bool,
    pub new_arrival: bool,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub on_hand: i64,
    pub low_stock_threshold: i64,
}

impl ProductListing {
    pub fn is_active(&self) -> bool {
        self.status == ProductStatus::Active
    }

    pub fn in_stock(&self) -> bool {
        self.on_hand > 0
    }

    pub fn effective_price(&self) -> Option<Money> {
        self.price.map(|p| p.effective())
    }

    pub fn price_display(&self) -> Option<PriceDisplay> {
        self.price.map(|p| p.display())
    }

    fn matches_text(&self, needle: &str) -> bool {
        let contains = |s: &str| s.to_lowercase().contains(needle);
        contains(&self.title)
            || self.isbn.as_deref().is_some_and(contains)
            || self.description.as_deref().is_some_and(contains)
            || self.authors.iter().any(|a| contains(a))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    TitleAsc,
    TitleDesc,
}

impl SortOrder {
    /// Unknown values (including `relevance`) fall back to newest first.
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "price_asc" => Self::PriceAsc,
            "price_desc" => Self::PriceDesc,
            "title_asc" => Self::TitleAsc,
            "title_desc" => Self::TitleDesc,
            _ => Self::Newest,
        }
    }
}

/// Storefront catalog filters. Only active products are ever returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub language: Option<Language>,
    pub format: Option<BookFormat>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
    pub in_stock: bool,
    pub sort: SortOrder,
    pub page: u32,
    pub per_page: u32,
}

impl Default for CatalogQuery {
    fn default() -> Self {
        Self {
            q: None,
            category: None,
            author: None,
            publisher: None,
            language: None,
            format: None,
            min_price: None,
            max_price: None,
            in_stock: false,
            sort: SortOrder::Newest,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl CatalogQuery {
    fn accepts(&self, p: &ProductListing) -> bool {
        if !p.is_active() {
            return false;
        }
        if let Some(q) = self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            if !p.matches_text(&q.to_lowercase()) {
                return false;
            }
        }
        if let Some(cat) = self.category.as_deref() {
            if !p.categories.iter().any(|c| c == cat) {
                return false;
            }
        }
        if let Some(author) = self.author.as_deref() {
            if !p.authors.iter().any(|a| a.eq_ignore_ascii_case(author)) {
                return false;
            }
        }
        if let Some(publisher) = self.publisher.as_deref() {
            if !p
                .publisher
                .as_deref()
                .is_some_and(|x| x.eq_ignore_ascii_case(publisher))
            {
                return false;
            }
        }
        if self.language.is_some_and(|l| l != p.language) {
            return false;
        }
        if self.format.is_some_and(|f| f != p.format) {
            return false;
        }
        let price = p.effective_price().unwrap_or(Money::ZERO);
        if self.min_price.is_some_and(|min| price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| price > max) {
            return false;
        }
        if self.in_stock && !p.in_stock() {
            return false;
        }
        true
    }
}

/// One page of results. Pages start at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: usize,
    pub pages: u32,
}

impl<T> Page<T> {
    pub fn paginate(all: Vec<T>, page: u32, per_page: u32) -> Self {
        let page = page.max(1);
        let per_page = if per_page == 0 { DEFAULT_PER_PAGE } else { per_page };
        let total = all.len();
        let pages = total.div_ceil(per_page as usize) as u32;
        let start = (page as usize - 1).saturating_mul(per_page as usize);
        let items = all.into_iter().skip(start).take(per_page as usize).collect();

        Self {
            items,
            page,
            per_page,
            total,
            pages,
        }
    }
}

fn newest_first(a: &ProductListing, b: &ProductListing) -> std::cmp::Ordering {
    b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id))
}

fn sort_listings(items: &mut [ProductListing], sort: SortOrder) {
    let price = |p: &ProductListing| p.effective_price().unwrap_or(Money::ZERO);
    match sort {
        SortOrder::Newest => items.sort_by(newest_first),
        SortOrder::PriceAsc => items.sort_by(|a, b| price(a).cmp(&price(b)).then_with(|| newest_first(a, b))),
        SortOrder::PriceDesc => items.sort_by(|a, b| price(b).cmp(&price(a)).then_with(|| newest_first(a, b))),
        SortOrder::TitleAsc => items.sort_by_key(|p| p.title.to_lowercase()),
        SortOrder::TitleDesc => {
            items.sort_by_key(|p| p.title.to_lowercase());
            items.reverse();
        }
    }
}

/// Filter, sort and paginate the catalog.
pub fn query(all: &[ProductListing], q: &CatalogQuery) -> Page<ProductListing> {
    let mut hits: Vec<ProductListing> = all.iter().filter(|p| q.accepts(p)).cloned().collect();
    sort_listings(&mut hits, q.sort);
    Page::paginate(hits, q.page, q.per_page)
}

/// Active, in-stock books sharing a category with `product`.
pub fn related(product: &ProductListing, all: &[ProductListing], limit: usize) -> Vec<ProductListing> {
    if product.categories.is_empty() {
        return Vec::new();
    }
    let mut hits: Vec<ProductListing> = all
        .iter()
        .filter(|p| p.id != product.id && p.is_active() && p.in_stock())
        .filter(|p| p.categories.iter().any(|c| product.categories.contains(c)))
        .cloned()
        .collect();
    hits.sort_by(newest_first);
    hits.truncate(limit);
    hits
}

/// Newest active, in-stock books.
pub fn featured(all: &[ProductListing], limit: usize) -> Vec<ProductListing> {
    let mut hits: Vec<ProductListing> = all
        .iter()
        .filter(|p| p.is_active() && p.in_stock())
        .cloned()
        .collect();
    hits.sort_by(newest_first);
    hits.truncate(limit);
    hits
}

/// A navigation category. Categories are referenced by slug from products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub slug: String,
    pub name: String,
    pub parent: Option<String>,
}

impl Category {
    /// A root category whose display name is derived from its slug.
    pub fn from_slug(slug: &str) -> Self {
        let name = slug
            .split('-')
            .filter(|w| !w.is_empty())
            .map(|w| {
                let mut chars = w.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            slug: slug.to_string(),
            name,
            parent: None,
        }
    }

    /// `slug` and its ancestors, root first. Stops on unknown parents and cycles.
    pub fn chain(slug: &str, all: &[Category]) -> Vec<Category> {
        let mut chain: Vec<Category> = Vec::new();
        let mut current = all.iter().find(|c| c.slug == slug);
        while let Some(cat) = current {
            if chain.iter().any(|c| c.slug == cat.slug) {
                break;
            }
            chain.push(cat.clone());
            current = cat
                .parent
                .as_deref()
                .and_then(|p| all.iter().find(|c| c.slug == p));
        }
        chain.reverse();
        chain
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    pub name: String,
    pub url: String,
}

/// Home, then the category chain (root first), then the product.
pub fn breadcrumbs(chain: &[Category], product: Option<&ProductListing>) -> Vec<Breadcrumb> {
    let mut crumbs = vec![Breadcrumb {
        name: "Home".to_string(),
        url: "/".to_string(),
    }];
    crumbs.extend(chain.iter().map(|c| Breadcrumb {
        name: c.name.clone(),
        url: format!("/catalog/{}", c.slug),
    }));
    if let Some(p) = product {
        crumbs.push(Breadcrumb {
            name: p.title.clone(),
            url: format!("/products/{}", p.slug),
        });
    }
    crumbs
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use inkwell_core::AggregateId;

    fn listing(title: &str, paise: u64, on_hand: i64, age_days: i64) -> ProductListing {
        ProductListing {
            id: ProductId::new(AggregateId::new()),
            title: title.to_string(),
            slug: crate::generate_slug(title),
            sku: format!("SKU-{title}"),
            isbn: None,
            description: None,
            language: Language::English,
            format: BookFormat::Paperback,
            pages: None,
            authors: vec!["Rumi".to_string()],
            categories: vec!["poetry".to_string()],
            publisher: Some("Gulshan Books".to_string()),
            price: Some(Price::new(Money::from_paise(paise), None)),
            bestseller: false,
            new_arrival: false,
            status: ProductStatus::Active,
            created_at: Utc::now() - Duration::days(age_days),
            on_hand,
            low_stock_threshold: 5,
        }
    }

    fn titles(items: &[ProductListing]) -> Vec<&str> {
        items.iter().map(|p| p.title.as_str()).collect()
    }

    #[test]
    fn default_sort_is_newest_and_excludes_inactive() {
        let mut draft = listing("Draft", 100, 1, 0);
        draft.status = ProductStatus::Draft;
        let all = vec![listing("Old", 100, 1, 5), listing("New", 100, 1, 1), draft];

        let page = query(&all, &CatalogQuery::default());
        assert_eq!(titles(&page.items), vec!["New", "Old"]);
        assert_eq!(page.total, 2);
        assert_eq!(page.pages, 1);
    }

    #[test]
    fn price_sorts_use_effective_price() {
        let mut sale = listing("Sale", 900, 1, 0);
        sale.price = Some(Price::new(Money::from_paise(900), Some(Money::from_paise(100))));
        let all = vec![listing("Mid", 500, 1, 0), sale, listing("Top", 800, 1, 0)];

        let q = CatalogQuery {
            sort: SortOrder::PriceAsc,
            ..CatalogQuery::default()
        };
        assert_eq!(titles(&query(&all, &q).items), vec!["Sale", "Mid", "Top"]);

        let q = CatalogQuery {
            sort: SortOrder::PriceDesc,
            max_price: Some(Money::from_paise(600)),
            ..CatalogQuery::default()
        };
        assert_eq!(titles(&query(&all, &q).items), vec!["Mid", "Sale"]);
    }

    #[test]
    fn text_search_covers_authors_and_is_case_insensitive() {
        let mut a = listing("Masnavi", 100, 1, 0);
        a.authors = vec!["Jalaluddin Rumi".to_string()];
        let mut b = listing("Other", 100, 1, 0);
        b.authors = vec!["Someone".to_string()];

        let q = CatalogQuery {
            q: Some("RUMI".to_string()),
            ..CatalogQuery::default()
        };
        assert_eq!(titles(&query(&[a, b], &q).items), vec!["Masnavi"]);
    }

    #[test]
    fn pagination_treats_page_zero_as_first() {
        let all: Vec<_> = (0..5).map(|i| listing(&format!("B{i}"), 100, 1, i)).collect();
        let q = CatalogQuery {
            page: 0,
            per_page: 2,
            sort: SortOrder::TitleAsc,
            ..CatalogQuery::default()
        };
        let page = query(&all, &q);
        assert_eq!(page.page, 1);
        assert_eq!(page.pages, 3);
        assert_eq!(titles(&page.items), vec!["B0", "B1"]);

        let last = query(&all, &CatalogQuery { page: 3, ..q });
        assert_eq!(titles(&last.items), vec!["B4"]);
    }

    #[test]
    fn unknown_sort_is_newest() {
        assert_eq!(SortOrder::parse("relevance"), SortOrder::Newest);
        assert_eq!(SortOrder::parse("title_desc"), SortOrder::TitleDesc);
    }

    #[test]
    fn related_requires_shared_category_and_stock() {
        let me = listing("Me", 100, 1, 0);
        let sibling = listing("Sibling", 100, 3, 1);
        let empty = listing("Empty", 100, 0, 1);
        let mut elsewhere = listing("Elsewhere", 100, 3, 1);
        elsewhere.categories = vec!["history".to_string()];

        let all = vec![me.clone(), sibling, empty, elsewhere];
        assert_eq!(titles(&related(&me, &all, 4)), vec!["Sibling"]);
    }

    #[test]
    fn featured_is_newest_in_stock() {
        let all = vec![
            listing("A", 100, 1, 3),
            listing("B", 100, 0, 0),
            listing("C", 100, 2, 1),
        ];
        assert_eq!(titles(&featured(&all, 8)), vec!["C", "A"]);
        assert_eq!(featured(&all, 1).len(), 1);
    }

    #[test]
    fn breadcrumbs_walk_root_first() {
        let cats = vec![
            Category {
                slug: "books".into(),
                name: "Books".into(),
                parent: None,
            },
            Category {
                slug: "poetry".into(),
                name: "Poetry".into(),
                parent: Some("books".into()),
            },
        ];
        let p = listing("Ghazals", 100, 1, 0);
        let crumbs = breadcrumbs(&Category::chain("poetry", &cats), Some(&p));
        let names: Vec<_> = crumbs.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Home", "Books", "Poetry", "Ghazals"]);
        assert_eq!(crumbs[2].url, "/catalog/poetry");
        assert_eq!(crumbs[3].url, "/products/ghazals");
    }

    #[test]
    fn category_name_from_slug() {
        assert_eq!(Category::from_slug("kids-corner").name, "Kids Corner");
    }
}
