use serde::Deserialize;
use serde_json::{Value, json};

use inkwell_catalog::{
    BookDetails, BookFormat, CatalogQuery, Language, Page, Price, ProductId, ProductListing, SortOrder,
};
use inkwell_core::{AggregateId, Money};
use inkwell_infra::checkout::Quote;
use inkwell_infra::projections::OrderSummary;
use inkwell_inventory::{StockItem, StockStatus};
use inkwell_orders::{Cart, Order, OrderId, PaymentMethod};
use inkwell_storefront::{HomeSection, SectionData, SectionId};

// -------------------------
// Request DTOs
// -------------------------

/// Query string for catalog pages. Prices are in paise.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogParams {
    pub q: Option<String>,
    pub category: Option<String>,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub language: Option<String>,
    pub format: Option<String>,
    pub min_price: Option<u64>,
    pub max_price: Option<u64>,
    #[serde(default)]
    pub in_stock: bool,
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl CatalogParams {
    /// Unknown language or format codes are ignored rather than rejected.
    pub fn into_query(self, default_per_page: u32) -> CatalogQuery {
        let blank_to_none = |s: Option<String>| s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        CatalogQuery {
            q: blank_to_none(self.q),
            category: blank_to_none(self.category),
            author: blank_to_none(self.author),
            publisher: blank_to_none(self.publisher),
            language: self.language.as_deref().and_then(Language::parse),
            format: self.format.as_deref().and_then(BookFormat::parse),
            min_price: self.min_price.map(Money::from_paise),
            max_price: self.max_price.map(Money::from_paise),
            in_stock: self.in_stock,
            sort: self.sort.as_deref().map(SortOrder::parse).unwrap_or_default(),
            page: self.page.unwrap_or(1),
            per_page: self.per_page.filter(|n| (1..=100).contains(n)).unwrap_or(default_per_page),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddCartItemRequest {
    pub product_id: String,
    #[serde(default = "one")]
    pub quantity: u32,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct MergeCartRequest {
    /// Guest session to fold in; defaults to the `x-cart-session` header.
    #[serde(default)]
    pub session: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApplyCouponRequest {
    pub code: String,
    /// Destination state, for the shipping estimate.
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub method: Option<PaymentMethod>,
}

/// Hosted-checkout callback. Accepts the gateway's own field names too.
#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    pub order_id: String,
    #[serde(alias = "razorpay_order_id")]
    pub gateway_order_id: String,
    #[serde(alias = "razorpay_payment_id")]
    pub payment_id: String,
    #[serde(alias = "razorpay_signature")]
    pub signature: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderLookup {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewsletterRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    #[serde(flatten)]
    pub details: BookDetails,
    #[serde(default)]
    pub price: Option<Price>,
    /// Opening stock; the product is untracked when absent.
    #[serde(default)]
    pub stock: Option<i64>,
    #[serde(default)]
    pub low_stock_threshold: Option<i64>,
    #[serde(default)]
    pub activate: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetStockRequest {
    #[serde(default)]
    pub on_hand: Option<i64>,
    #[serde(default)]
    pub low_stock_threshold: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminOrdersQuery {
    pub status: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewQueueQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct SectionPosition {
    pub id: SectionId,
    pub position: i32,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub positions: Vec<SectionPosition>,
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn parse_product_id(s: &str) -> Option<ProductId> {
    s.trim().parse::<AggregateId>().ok().map(ProductId::new)
}

pub fn parse_order_id(s: &str) -> Option<OrderId> {
    s.trim().parse::<AggregateId>().ok().map(OrderId::new)
}

pub fn listing_to_json(p: ProductListing) -> Value {
    let stock = StockStatus::from_levels(p.on_hand, p.low_stock_threshold);
    let display = p.price_display();
    let mut body = json!(p);
    if let Some(obj) = body.as_object_mut() {
        obj.insert("price_display".into(), json!(display));
        obj.insert("stock_status".into(), json!(stock));
        obj.insert("stock_message".into(), json!(stock.message()));
    }
    body
}

pub fn page_to_json(page: Page<ProductListing>) -> Value {
    json!({
        "items": page.items.into_iter().map(listing_to_json).collect::<Vec<_>>(),
        "page": page.page,
        "per_page": page.per_page,
        "total": page.total,
        "pages": page.pages,
    })
}

/// Cart lines joined with listing rows; lines whose product has vanished are
/// shown without a price.
pub fn cart_to_json(cart: &Cart, find: impl Fn(ProductId) -> Option<ProductListing>) -> Value {
    let mut subtotal = Money::ZERO;
    let lines: Vec<Value> = cart
        .lines
        .iter()
        .map(|line| {
            let listing = find(line.product_id);
            let unit_price = listing.as_ref().and_then(ProductListing::effective_price);
            let line_total = unit_price.map(|p| p.times(line.quantity));
            if let Some(t) = line_total {
                subtotal = subtotal.saturating_add(t);
            }
            json!({
                "product_id": line.product_id,
                "title": listing.as_ref().map(|l| l.title.clone()),
                "slug": listing.as_ref().map(|l| l.slug.clone()),
                "quantity": line.quantity,
                "unit_price": unit_price,
                "line_total": line_total,
            })
        })
        .collect();

    json!({
        "lines": lines,
        "item_count": cart.item_count(),
        "total_quantity": cart.total_quantity(),
        "subtotal": subtotal,
        "updated_at": cart.updated_at,
    })
}

pub fn quote_to_json(quote: &Quote) -> Value {
    json!({
        "lines": quote.lines,
        "coupon_code": quote.coupon_code,
        "totals": quote.totals,
    })
}

pub fn order_to_json(order: &Order) -> Value {
    json!({
        "id": order.id_typed(),
        "status": order.status(),
        "payment_status": order.payment_status(),
        "method": order.method(),
        "contact": order.contact(),
        "shipping_address": order.shipping_address(),
        "lines": order.lines(),
        "totals": order.totals(),
        "coupon_code": order.coupon_code(),
        "notes": order.notes(),
        "gateway_order_id": order.gateway_order_id(),
        "failure_reason": order.failure_reason(),
        "placed_at": order.placed_at(),
    })
}

pub fn order_summary_to_json(o: &OrderSummary) -> Value {
    json!(o)
}

pub fn stock_to_json(item: &StockItem) -> Value {
    json!({
        "id": item.id_typed(),
        "sku": item.sku(),
        "on_hand": item.on_hand(),
        "low_stock_threshold": item.low_stock_threshold(),
        "status": item.status(),
        "message": item.status().message(),
    })
}

pub fn section_to_json(section: &HomeSection, data: Option<SectionData>) -> Value {
    let mut body = json!(section);
    if let (Some(obj), Some(data)) = (body.as_object_mut(), data) {
        obj.insert("data".into(), json!(data));
    }
    body
}
