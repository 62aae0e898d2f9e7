//! Back-office dashboard figures, computed from read models.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;

use inkwell_catalog::{ProductId, ProductListing};
use inkwell_core::Money;

use super::orders::OrderSummary;
use super::stock::StockLevel;

const TOP_CATEGORIES: usize = 5;
const LOW_STOCK_ROWS: usize = 10;
const RECENT_ORDERS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySales {
    pub category: String,
    pub sales: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LowStockRow {
    pub product_id: ProductId,
    pub title: String,
    pub sku: String,
    pub on_hand: i64,
    pub low_stock_threshold: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub today_orders: usize,
    pub today_sales: Money,
    pub month_orders: usize,
    pub month_sales: Money,
    pub average_order_value: Money,
    pub top_categories: Vec<CategorySales>,
    pub low_stock: Vec<LowStockRow>,
    pub recent_orders: Vec<OrderSummary>,
}

fn month_start(now: DateTime<Utc>) -> NaiveDate {
    NaiveDate::from_ymd_opt(now.year(), now.month(), 1).unwrap_or_else(|| now.date_naive())
}

/// Order counts include every placed order; sales only count paid ones.
/// Low stock only lists active products whose stock is tracked.
pub fn dashboard(
    now: DateTime<Utc>,
    orders: &[OrderSummary],
    listings: &[ProductListing],
    stock: &[StockLevel],
) -> Dashboard {
    let today = now.date_naive();
    let month = month_start(now);

    let mut today_orders = 0;
    let mut today_sales = Money::ZERO;
    let mut month_orders = 0;
    let mut month_sales = Money::ZERO;
    for order in orders {
        let placed = order.placed_at.date_naive();
        if placed == today {
            today_orders += 1;
            if order.is_paid() {
                today_sales = today_sales.saturating_add(order.totals.grand_total);
            }
        }
        if placed >= month && placed <= today {
            month_orders += 1;
            if order.is_paid() {
                month_sales = month_sales.saturating_add(order.totals.grand_total);
            }
        }
    }

    let paid: Vec<&OrderSummary> = orders.iter().filter(|o| o.is_paid()).collect();
    let paid_total: Money = paid.iter().map(|o| o.totals.grand_total).sum();
    let average_order_value = match paid.len() as u64 {
        0 => Money::ZERO,
        n => Money::from_paise(paid_total.paise() / n),
    };

    let categories_of: HashMap<ProductId, &[String]> =
        listings.iter().map(|l| (l.id, l.categories.as_slice())).collect();
    let mut by_category: HashMap<&str, Money> = HashMap::new();
    for line in paid.iter().flat_map(|o| o.lines.iter()) {
        for category in categories_of.get(&line.product_id).copied().unwrap_or_default() {
            let entry = by_category.entry(category.as_str()).or_insert(Money::ZERO);
            *entry = entry.saturating_add(line.line_total);
        }
    }
    let mut top_categories: Vec<CategorySales> = by_category
        .into_iter()
        .map(|(category, sales)| CategorySales {
            category: category.to_string(),
            sales,
        })
        .collect();
    top_categories.sort_by(|a, b| b.sales.cmp(&a.sales).then_with(|| a.category.cmp(&b.category)));
    top_categories.truncate(TOP_CATEGORIES);

    let by_id: HashMap<ProductId, &ProductListing> = listings.iter().map(|l| (l.id, l)).collect();
    let mut low_stock: Vec<LowStockRow> = stock
        .iter()
        .filter(|level| level.is_low())
        .filter_map(|level| {
            let listing = by_id.get(&ProductId::new(level.item_id.0))?;
            listing.is_active().then(|| LowStockRow {
                product_id: listing.id,
                title: listing.title.clone(),
                sku: level.sku.clone(),
                on_hand: level.on_hand,
                low_stock_threshold: level.low_stock_threshold,
            })
        })
        .collect();
    low_stock.sort_by(|a, b| a.on_hand.cmp(&b.on_hand).then_with(|| a.sku.cmp(&b.sku)));
    low_stock.truncate(LOW_STOCK_ROWS);

    let mut recent_orders = orders.to_vec();
    recent_orders.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
    recent_orders.truncate(RECENT_ORDERS);

    Dashboard {
        today_orders,
        today_sales,
        month_orders,
        month_sales,
        average_order_value,
        top_categories,
        low_stock,
        recent_orders,
    }
}
