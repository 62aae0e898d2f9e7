//! Order total computation.
//!
//! ```text
//! subtotal    = Σ unit_price × qty
//! discount    = coupon on subtotal (≤ subtotal)
//! shipping    = policy on pre-discount subtotal and destination
//! tax         = Σ floor(line_total × rate_bp / 10000)
//! cod_fee     = cod_charge(...) when enabled and paying COD
//! grand_total = subtotal − discount + shipping + tax + cod_fee
//! ```

use serde::{Deserialize, Serialize};

use inkwell_core::{DomainError, Money};

use crate::cod::cod_charge;
use crate::coupon::Coupon;
use crate::shipping::ShippingPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    Razorpay,
    #[serde(rename = "COD")]
    Cod,
    #[serde(rename = "UPI")]
    Upi,
}

impl PaymentMethod {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "razorpay" => Some(Self::Razorpay),
            "cod" => Some(Self::Cod),
            "upi" => Some(Self::Upi),
            _ => None,
        }
    }

    /// Paid through the gateway before fulfilment.
    pub fn is_online(self) -> bool {
        !matches!(self, Self::Cod)
    }
}

/// A cart line with its current price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub unit_price: Money,
    pub quantity: u32,
    pub tax_rate_bp: u32,
}

impl PricedLine {
    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PricingPolicy {
    pub shipping: ShippingPolicy,
    /// Add the COD handling fee to COD orders.
    pub charge_cod_fee: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub shipping: Money,
    pub tax: Money,
    pub cod_fee: Money,
    pub grand_total: Money,
}

pub fn tax_for(lines: &[PricedLine]) -> Money {
    lines
        .iter()
        .map(|l| l.line_total().percent_of(l.tax_rate_bp))
        .sum()
}

/// Totals for a set of priced lines. The coupon must already be validated.
pub fn compute_totals(
    lines: &[PricedLine],
    coupon: Option<&Coupon>,
    destination_state: Option<&str>,
    method: PaymentMethod,
    policy: &PricingPolicy,
) -> Result<OrderTotals, DomainError> {
    if lines.is_empty() {
        return Err(DomainError::validation("cannot price an empty order"));
    }
    if lines.iter().any(|l| l.quantity == 0) {
        return Err(DomainError::validation("line quantities must be positive"));
    }

    let subtotal: Money = lines.iter().map(PricedLine::line_total).sum();
    let discount = coupon.map(|c| c.discount_for(subtotal)).unwrap_or(Money::ZERO);
    let shipping = policy.shipping.charge(subtotal, destination_state);
    let tax = tax_for(lines);

    let before_fee = subtotal
        .saturating_sub(discount)
        .saturating_add(shipping)
        .saturating_add(tax);

    let cod_fee = if policy.charge_cod_fee && method == PaymentMethod::Cod {
        cod_charge(before_fee)
    } else {
        Money::ZERO
    };

    Ok(OrderTotals {
        subtotal,
        discount,
        shipping,
        tax,
        cod_fee,
        grand_total: before_fee.saturating_add(cod_fee),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coupon::CouponKind;
    use proptest::prelude::*;

    fn line(paise: u64, qty: u32) -> PricedLine {
        PricedLine {
            unit_price: Money::from_paise(paise),
            quantity: qty,
            tax_rate_bp: 0,
        }
    }

    fn coupon(kind: CouponKind) -> Coupon {
        Coupon {
            code: "SAVE".into(),
            kind,
            min_subtotal: None,
            starts_at: None,
            ends_at: None,
            max_redemptions: None,
            per_user_limit: 1,
            active: true,
        }
    }

    #[test]
    fn local_order_with_percent_coupon() {
        let lines = [line(39_900, 2), line(25_000, 1)];
        let c = coupon(CouponKind::Percent { basis_points: 1_000 });
        let t = compute_totals(&lines, Some(&c), Some("Jammu and Kashmir"), PaymentMethod::Razorpay, &PricingPolicy::default()).unwrap();

        assert_eq!(t.subtotal, Money::from_paise(104_800));
        assert_eq!(t.discount, Money::from_paise(10_480));
        assert_eq!(t.shipping, Money::from_paise(5_000));
        assert_eq!(t.tax, Money::ZERO);
        assert_eq!(t.grand_total, Money::from_paise(99_320));
    }

    #[test]
    fn free_shipping_uses_pre_discount_subtotal() {
        let lines = [line(150_000, 1)];
        let c = coupon(CouponKind::Amount {
            amount: Money::from_rupees(500),
        });
        let t = compute_totals(&lines, Some(&c), Some("Goa"), PaymentMethod::Upi, &PricingPolicy::default()).unwrap();
        assert_eq!(t.shipping, Money::ZERO);
        assert_eq!(t.grand_total, Money::from_paise(100_000));
    }

    #[test]
    fn tax_is_per_line_and_rounds_down() {
        let lines = [
            PricedLine {
                unit_price: Money::from_paise(999),
                quantity: 1,
                tax_rate_bp: 500,
            },
            PricedLine {
                unit_price: Money::from_paise(999),
                quantity: 1,
                tax_rate_bp: 500,
            },
        ];
        // 49.95 floors to 49 on each line.
        assert_eq!(tax_for(&lines), Money::from_paise(98));
    }

    #[test]
    fn cod_fee_only_when_enabled() {
        let lines = [line(100_000, 1)];
        let off = compute_totals(&lines, None, Some("Delhi"), PaymentMethod::Cod, &PricingPolicy::default()).unwrap();
        assert_eq!(off.cod_fee, Money::ZERO);

        let policy = PricingPolicy {
            charge_cod_fee: true,
            ..PricingPolicy::default()
        };
        let on = compute_totals(&lines, None, Some("Delhi"), PaymentMethod::Cod, &policy).unwrap();
        // 2% of 1,100.00 = 22.00
        assert_eq!(on.cod_fee, Money::from_paise(2_200));
        assert_eq!(on.grand_total, Money::from_paise(112_200));

        let online = compute_totals(&lines, None, Some("Delhi"), PaymentMethod::Razorpay, &policy).unwrap();
        assert_eq!(online.cod_fee, Money::ZERO);
    }

    #[test]
    fn empty_order_is_rejected() {
        let err = compute_totals(&[], None, None, PaymentMethod::Razorpay, &PricingPolicy::default()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn payment_method_parse() {
        assert_eq!(PaymentMethod::parse("COD"), Some(PaymentMethod::Cod));
        assert_eq!(PaymentMethod::parse("razorpay"), Some(PaymentMethod::Razorpay));
        assert_eq!(PaymentMethod::parse("cheque"), None);
    }

    proptest! {
        #[test]
        fn grand_total_is_sum_of_parts(
            prices in proptest::collection::vec((1u64..500_000, 1u32..5, 0u32..2_000), 1..6),
            bp in 0u32..=10_000,
            local in any::<bool>(),
            cod in any::<bool>(),
        ) {
            let lines: Vec<PricedLine> = prices
                .into_iter()
                .map(|(p, q, t)| PricedLine { unit_price: Money::from_paise(p), quantity: q, tax_rate_bp: t })
                .collect();
            let c = coupon(CouponKind::Percent { basis_points: bp.max(1) });
            let state = if local { "Kashmir" } else { "Punjab" };
            let method = if cod { PaymentMethod::Cod } else { PaymentMethod::Razorpay };
            let policy = PricingPolicy { charge_cod_fee: true, ..PricingPolicy::default() };

            let t = compute_totals(&lines, Some(&c), Some(state), method, &policy).unwrap();
            prop_assert!(t.discount <= t.subtotal);
            prop_assert_eq!(
                t.grand_total.paise(),
                t.subtotal.paise() - t.discount.paise() + t.shipping.paise() + t.tax.paise() + t.cod_fee.paise()
            );
        }
    }
}
