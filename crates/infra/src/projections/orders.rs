use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use inkwell_core::UserId;
use inkwell_events::EventEnvelope;
use inkwell_orders::{
    ContactDetails, OrderEvent, OrderId, OrderLine, OrderStatus, PaymentMethod, PaymentStatus,
    ShippingAddress,
};
use inkwell_pricing::OrderTotals;

use super::cursor::{CursorCheck, StreamCursors};
use super::{Projection, ProjectionError, decode};
use crate::read_model::{ReadStore, ReadStoreError};

/// Order row for account pages and the back office.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub id: OrderId,
    pub customer: Option<UserId>,
    pub contact: ContactDetails,
    pub shipping_address: ShippingAddress,
    pub lines: Vec<OrderLine>,
    pub totals: OrderTotals,
    pub method: PaymentMethod,
    pub coupon_code: Option<String>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub refund_id: Option<String>,
    pub failure_reason: Option<String>,
    pub placed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderSummary {
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }
}

#[derive(Debug)]
pub struct OrdersProjection<S>
where
    S: ReadStore<OrderId, OrderSummary>,
{
    store: S,
    by_gateway_order: RwLock<HashMap<String, OrderId>>,
    cursors: StreamCursors,
}

impl<S> OrdersProjection<S>
where
    S: ReadStore<OrderId, OrderSummary>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            by_gateway_order: RwLock::new(HashMap::new()),
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, id: OrderId) -> Option<OrderSummary> {
        self.store.get(&id)
    }

    /// Newest first.
    pub fn list(&self) -> Vec<OrderSummary> {
        let mut all = self.store.list();
        all.sort_by(|a, b| b.placed_at.cmp(&a.placed_at).then_with(|| b.id.cmp(&a.id)));
        all
    }

    pub fn recent(&self, limit: usize) -> Vec<OrderSummary> {
        let mut all = self.list();
        all.truncate(limit);
        all
    }

    pub fn for_customer(&self, customer: UserId) -> Vec<OrderSummary> {
        self.list()
            .into_iter()
            .filter(|o| o.customer == Some(customer))
            .collect()
    }

    pub fn by_status(&self, status: OrderStatus) -> Vec<OrderSummary> {
        self.list().into_iter().filter(|o| o.status == status).collect()
    }

    /// The order a gateway (e.g. Razorpay) order id was created for.
    pub fn by_gateway_order(&self, gateway_order_id: &str) -> Option<OrderId> {
        self.by_gateway_order
            .read()
            .ok()
            .and_then(|m| m.get(gateway_order_id).copied())
    }

    fn update(&self, id: OrderId, at: DateTime<Utc>, f: impl FnOnce(&mut OrderSummary)) -> Result<(), ReadStoreError> {
        match self.store.get(&id) {
            Some(mut row) => {
                f(&mut row);
                row.updated_at = at;
                self.store.upsert(id, row)
            }
            None => Ok(()),
        }
    }
}

impl<S> Projection for OrdersProjection<S>
where
    S: ReadStore<OrderId, OrderSummary>,
{
    fn name(&self) -> &'static str {
        "orders.summary"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != inkwell_orders::AGGREGATE_TYPE {
            return Ok(());
        }
        if self.cursors.check(envelope)? == CursorCheck::Skip {
            return Ok(());
        }

        let event: OrderEvent = decode(envelope)?;
        let id = OrderId::new(envelope.aggregate_id());

        match event {
            OrderEvent::OrderPlaced(e) => {
                if e.order_id != id {
                    return Err(ProjectionError::StreamMismatch(
                        "order_id does not match envelope aggregate_id".to_string(),
                    ));
                }
                self.store.upsert(
                    id,
                    OrderSummary {
                        id,
                        customer: e.customer,
                        contact: e.contact,
                        shipping_address: e.shipping_address,
                        lines: e.lines,
                        totals: e.totals,
                        method: e.method,
                        coupon_code: e.coupon_code,
                        status: OrderStatus::Pending,
                        payment_status: PaymentStatus::Unpaid,
                        gateway_order_id: None,
                        gateway_payment_id: None,
                        refund_id: None,
                        failure_reason: None,
                        placed_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                )
            }
            OrderEvent::GatewayOrderAttached(e) => {
                if let Ok(mut m) = self.by_gateway_order.write() {
                    m.insert(e.gateway_order_id.clone(), id);
                }
                self.update(id, e.occurred_at, |r| r.gateway_order_id = Some(e.gateway_order_id))
            }
            OrderEvent::PaymentCaptured(e) => self.update(id, e.occurred_at, |r| {
                r.payment_status = PaymentStatus::Paid;
                r.gateway_payment_id = Some(e.gateway_payment_id);
                r.failure_reason = None;
                if r.status == OrderStatus::Pending {
                    r.status = OrderStatus::Paid;
                }
            }),
            OrderEvent::PaymentFailed(e) => self.update(id, e.occurred_at, |r| {
                r.payment_status = PaymentStatus::Failed;
                r.failure_reason = Some(e.reason);
            }),
            OrderEvent::OrderStatusChanged(e) => self.update(id, e.occurred_at, |r| r.status = e.to),
            OrderEvent::OrderRefunded(e) => self.update(id, e.occurred_at, |r| {
                r.status = OrderStatus::Refunded;
                r.payment_status = PaymentStatus::Refunded;
                r.refund_id = e.refund_id;
            }),
        }?;

        self.cursors.advance(envelope);
        Ok(())
    }

    fn reset(&self) {
        self.cursors.clear();
        if let Ok(mut m) = self.by_gateway_order.write() {
            m.clear();
        }
        self.store.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read_model::InMemoryReadStore;
    use inkwell_catalog::ProductId;
    use inkwell_core::{AggregateId, Money};
    use inkwell_orders::{GatewayOrderAttached, OrderPlaced, PaymentCaptured};
    use uuid::Uuid;

    fn env(id: AggregateId, seq: u64, event: OrderEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            id,
            inkwell_orders::AGGREGATE_TYPE,
            seq,
            serde_json::to_value(event).unwrap(),
        )
    }

    fn placed(id: AggregateId, at: DateTime<Utc>) -> OrderEvent {
        let price = Money::from_rupees(250);
        OrderEvent::OrderPlaced(OrderPlaced {
            order_id: OrderId::new(id),
            customer: None,
            contact: ContactDetails {
                email: "reader@inkwell.in".into(),
                phone: "9876543210".into(),
            },
            shipping_address: ShippingAddress {
                name: "Asha".into(),
                line1: "12 MG Road".into(),
                line2: None,
                city: "Pune".into(),
                district: None,
                state: "Maharashtra".into(),
                pincode: "411001".into(),
                country: "India".into(),
            },
            lines: vec![OrderLine {
                product_id: ProductId::new(AggregateId::new()),
                title: "Gitanjali".into(),
                sku: "BK-1".into(),
                unit_price: price,
                quantity: 1,
                line_total: price,
            }],
            totals: OrderTotals {
                subtotal: price,
                grand_total: price,
                ..OrderTotals::default()
            },
            method: PaymentMethod::Razorpay,
            coupon_code: None,
            notes: None,
            occurred_at: at,
        })
    }

    #[test]
    fn payment_flow_updates_row_and_gateway_index() {
        let p = OrdersProjection::new(InMemoryReadStore::new());
        let id = AggregateId::new();
        let now = Utc::now();

        p.apply_envelope(&env(id, 1, placed(id, now))).unwrap();
        p.apply_envelope(&env(
            id,
            2,
            OrderEvent::GatewayOrderAttached(GatewayOrderAttached {
                order_id: OrderId::new(id),
                gateway_order_id: "order_abc".into(),
                occurred_at: now,
            }),
        ))
        .unwrap();
        p.apply_envelope(&env(
            id,
            3,
            OrderEvent::PaymentCaptured(PaymentCaptured {
                order_id: OrderId::new(id),
                gateway_payment_id: "pay_xyz".into(),
                amount: Money::from_rupees(250),
                occurred_at: now,
            }),
        ))
        .unwrap();

        assert_eq!(p.by_gateway_order("order_abc"), Some(OrderId::new(id)));
        let row = p.get(OrderId::new(id)).unwrap();
        assert_eq!(row.status, OrderStatus::Paid);
        assert!(row.is_paid());
        assert_eq!(row.gateway_payment_id.as_deref(), Some("pay_xyz"));

        p.reset();
        assert_eq!(p.by_gateway_order("order_abc"), None);
        assert!(p.list().is_empty());
    }

    #[test]
    fn list_is_newest_first() {
        let p = OrdersProjection::new(InMemoryReadStore::new());
        let (a, b) = (AggregateId::new(), AggregateId::new());
        let now = Utc::now();
        p.apply_envelope(&env(a, 1, placed(a, now - chrono::Duration::hours(2)))).unwrap();
        p.apply_envelope(&env(b, 1, placed(b, now))).unwrap();

        let ids: Vec<_> = p.recent(1).into_iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![OrderId::new(b)]);
        assert_eq!(p.list().len(), 2);
    }
}
