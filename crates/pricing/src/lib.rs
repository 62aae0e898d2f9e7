//! Money rules for checkout: coupons, shipping, tax, cash on delivery, and the
//! order totals that combine them. Pure functions over paise.

pub mod cod;
pub mod coupon;
pub mod shipping;
pub mod totals;

pub use cod::{CodUnavailable, MAX_COD_AMOUNT, cod_available, cod_charge};
pub use coupon::{Coupon, CouponKind, CouponRejection, CouponUsage, validate_coupon};
pub use shipping::ShippingPolicy;
pub use totals::{OrderTotals, PaymentMethod, PricedLine, PricingPolicy, compute_totals, tax_for};
