//! Checkout orchestration: carts, order placement and payment capture.
//!
//! ```text
//! cart ──place_order──▶ Order(Pending) ──capture──▶ Order(Paid) ──▶ CommitSale per line
//!                        │  online: gateway order attached, cart kept until capture
//!                        └─ COD: stock committed and cart cleared at placement
//! ```
//!
//! Prices and stock are read from the aggregates themselves (not from
//! projections) so a checkout never sees a stale price. Stock leaves the shelf
//! at most once per order: `CommitSale` and `Restock` are idempotent per order.
//!
//! Carts, coupons and redemption counts are plain documents. Every
//! read-modify-write of them happens under one lock so concurrent requests
//! cannot lose each other's updates.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use inkwell_catalog::{Product, ProductId};
use inkwell_core::{AggregateId, DomainError, Money, UserId};
use inkwell_events::{EventBus, EventEnvelope};
use inkwell_inventory::{CommitSale, InventoryCommand, InventoryEvent, Restock, StockItem, StockItemId};
use inkwell_orders::{
    AttachGatewayOrder, CapturePayment, Cart, CartOwner, ChangeStatus, ContactDetails, FailPayment,
    Order, OrderCommand, OrderId, OrderLine, OrderStatus, PaymentMethod, PaymentStatus, PlaceOrder, RefundPayment,
    ShippingAddress,
};
use inkwell_payments::{
    GatewayError, PaymentGateway, SignatureError, WebhookError, WebhookEvent, parse_webhook,
    upi_intent_url, verify_checkout_signature, verify_webhook_signature,
};
use inkwell_pricing::{
    CodUnavailable, Coupon, CouponRejection, CouponUsage, OrderTotals, PricedLine, PricingPolicy,
    cod_available, compute_totals, validate_coupon,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;
use crate::read_model::{InMemoryReadStore, ReadStore, ReadStoreError};

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("your cart is empty")]
    EmptyCart,

    #[error("{0}")]
    Unavailable(String),

    #[error(transparent)]
    Coupon(#[from] CouponRejection),

    #[error(transparent)]
    Cod(#[from] CodUnavailable),

    #[error("payment verification failed: {0}")]
    Signature(#[from] SignatureError),

    #[error(transparent)]
    Webhook(#[from] WebhookError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("paid amount {received} does not match order total {expected}")]
    AmountMismatch { expected: Money, received: Money },

    #[error("no order for gateway order {0}")]
    UnknownGatewayOrder(String),

    #[error(transparent)]
    Store(#[from] ReadStoreError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl From<DomainError> for CheckoutError {
    fn from(value: DomainError) -> Self {
        CheckoutError::Dispatch(value.into())
    }
}

/// Settings checkout needs from the server configuration.
#[derive(Debug, Clone, Default)]
pub struct CheckoutSettings {
    pub pricing: PricingPolicy,
    /// Gateway key secret, used to verify checkout signatures.
    pub key_secret: String,
    /// Webhooks are rejected while this is unset.
    pub webhook_secret: Option<String>,
    pub store_name: String,
    /// Payee address for UPI intent links.
    pub upi_vpa: Option<String>,
}

/// Redemptions of one coupon code, keyed by the orders that used it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponRedemptions {
    pub code: String,
    pub orders: BTreeSet<OrderId>,
    /// Redemptions per customer key (user id, or contact email for guests).
    pub by_customer: BTreeMap<String, u32>,
}

impl CouponRedemptions {
    pub fn usage_for(&self, customer_key: Option<&str>) -> CouponUsage {
        CouponUsage {
            redemptions: u32::try_from(self.orders.len()).unwrap_or(u32::MAX),
            by_customer: customer_key
                .and_then(|k| self.by_customer.get(k).copied())
                .unwrap_or(0),
        }
    }
}

/// The order a gateway order was created for, and the cart it was paid from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrderLink {
    pub order_id: OrderId,
    pub cart_owner: CartOwner,
}

/// Mutable documents checkout reads and writes.
#[derive(Clone)]
pub struct CheckoutStores {
    pub carts: Arc<dyn ReadStore<CartOwner, Cart>>,
    pub coupons: Arc<dyn ReadStore<String, Coupon>>,
    pub redemptions: Arc<dyn ReadStore<String, CouponRedemptions>>,
    /// Keyed by gateway order id, written when the gateway order is attached.
    pub gateway_orders: Arc<dyn ReadStore<String, GatewayOrderLink>>,
}

impl CheckoutStores {
    pub fn in_memory() -> Self {
        Self {
            carts: Arc::new(InMemoryReadStore::new()),
            coupons: Arc::new(InMemoryReadStore::new()),
            redemptions: Arc::new(InMemoryReadStore::new()),
            gateway_orders: Arc::new(InMemoryReadStore::new()),
        }
    }
}

/// A cart line priced against the current catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuoteLine {
    pub product_id: ProductId,
    pub title: String,
    pub sku: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub line_total: Money,
    /// `None` when the product's stock is not tracked.
    pub available: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub lines: Vec<QuoteLine>,
    pub coupon_code: Option<String>,
    pub totals: OrderTotals,
}

/// What the shopper is asked to do after placing an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaymentInstructions {
    /// Open the hosted checkout for `gateway_order_id`.
    Gateway {
        key_id: String,
        gateway_order_id: String,
        amount: Money,
        #[serde(skip_serializing_if = "Option::is_none")]
        upi_url: Option<String>,
    },
    CashOnDelivery,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlacedOrder {
    pub order_id: OrderId,
    pub totals: OrderTotals,
    pub method: PaymentMethod,
    pub payment: PaymentInstructions,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutRequest {
    #[serde(skip)]
    pub customer: Option<UserId>,
    pub contact: ContactDetails,
    pub shipping_address: ShippingAddress,
    pub method: PaymentMethod,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Captured { order_id: OrderId },
    Failed { order_id: OrderId },
    Ignored { event: String },
}

pub struct CheckoutService<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    stores: CheckoutStores,
    gateway: Arc<dyn PaymentGateway>,
    settings: CheckoutSettings,
    documents: Mutex<()>,
}

impl<S, B> CheckoutService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S, B>>,
        stores: CheckoutStores,
        gateway: Arc<dyn PaymentGateway>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            dispatcher,
            stores,
            gateway,
            settings,
            documents: Mutex::new(()),
        }
    }

    /// Held across every read-modify-write of the checkout documents. Never
    /// held across an await.
    fn lock_documents(&self) -> MutexGuard<'_, ()> {
        self.documents.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn settings(&self) -> &CheckoutSettings {
        &self.settings
    }

    pub fn gateway_key_id(&self) -> &str {
        self.gateway.key_id()
    }

    // ---- aggregates ----

    pub fn load_product(&self, product_id: ProductId) -> Result<Product, DispatchError> {
        self.dispatcher
            .load(product_id.aggregate_id(), inkwell_catalog::AGGREGATE_TYPE, |id| {
                Product::empty(ProductId::new(id))
            })
    }

    pub fn load_stock(&self, product_id: ProductId) -> Result<StockItem, DispatchError> {
        self.dispatcher
            .load(product_id.aggregate_id(), inkwell_inventory::AGGREGATE_TYPE, |id| {
                StockItem::empty(StockItemId::new(id))
            })
    }

    pub fn load_order(&self, order_id: OrderId) -> Result<Order, DispatchError> {
        let order: Order = self
            .dispatcher
            .load(order_id.aggregate_id(), inkwell_orders::AGGREGATE_TYPE, |id| {
                Order::empty(OrderId::new(id))
            })?;
        if !order.exists() {
            return Err(DispatchError::NotFound);
        }
        Ok(order)
    }

    fn dispatch_order(&self, order_id: OrderId, command: OrderCommand) -> Result<(), DispatchError> {
        self.dispatcher
            .dispatch(order_id.aggregate_id(), inkwell_orders::AGGREGATE_TYPE, command, |id| {
                Order::empty(OrderId::new(id))
            })
            .map(|_| ())
    }

    /// Stock available for `product_id`, or `None` when it is not tracked.
    fn available(&self, product_id: ProductId) -> Result<Option<u32>, DispatchError> {
        let stock = self.load_stock(product_id)?;
        Ok(stock.exists().then(|| stock.available()))
    }

    fn sellable(&self, product_id: ProductId) -> Result<Product, CheckoutError> {
        let product = self.load_product(product_id)?;
        if !product.exists() {
            return Err(DispatchError::NotFound.into());
        }
        if !product.can_be_sold() {
            return Err(CheckoutError::Unavailable(format!(
                "{} is not available for purchase",
                product.title()
            )));
        }
        Ok(product)
    }

    // ---- cart ----

    pub fn cart(&self, owner: &CartOwner) -> Cart {
        self.stores
            .carts
            .get(owner)
            .unwrap_or_else(|| Cart::new(owner.clone(), Utc::now()))
    }

    pub fn add_to_cart(&self, owner: &CartOwner, product_id: ProductId, quantity: u32) -> Result<Cart, CheckoutError> {
        self.sellable(product_id)?;
        let available = self.available(product_id)?;
        if available == Some(0) {
            return Err(CheckoutError::Unavailable("this book is out of stock".to_string()));
        }

        let _guard = self.lock_documents();
        let mut cart = self.cart(owner);
        cart.add_item(product_id, quantity, available, Utc::now())?;
        self.stores.carts.upsert(owner.clone(), cart.clone())?;
        Ok(cart)
    }

    pub fn set_cart_quantity(&self, owner: &CartOwner, product_id: ProductId, quantity: i64) -> Result<Cart, CheckoutError> {
        let available = if quantity > 0 { self.available(product_id)? } else { None };
        let _guard = self.lock_documents();
        let mut cart = self.cart(owner);
        cart.set_quantity(product_id, quantity, available, Utc::now())?;
        self.stores.carts.upsert(owner.clone(), cart.clone())?;
        Ok(cart)
    }

    pub fn remove_from_cart(&self, owner: &CartOwner, product_id: ProductId) -> Result<Cart, CheckoutError> {
        let _guard = self.lock_documents();
        let mut cart = self.cart(owner);
        if cart.remove_item(product_id, Utc::now()) {
            self.stores.carts.upsert(owner.clone(), cart.clone())?;
        }
        Ok(cart)
    }

    pub fn clear_cart(&self, owner: &CartOwner) -> Result<(), CheckoutError> {
        let _guard = self.lock_documents();
        self.stores.carts.remove(owner)?;
        Ok(())
    }

    /// Fold a guest session's cart into the signed-in customer's cart.
    pub fn merge_carts(&self, session: &str, customer: UserId) -> Result<Cart, CheckoutError> {
        let guest_owner = CartOwner::Guest(session.to_string());
        let owner = CartOwner::Customer(customer);
        let _guard = self.lock_documents();
        let mut cart = self.cart(&owner);
        if let Some(guest) = self.stores.carts.get(&guest_owner) {
            cart.merge_from(guest, Utc::now());
            self.stores.carts.upsert(owner, cart.clone())?;
            self.stores.carts.remove(&guest_owner)?;
        }
        Ok(cart)
    }

    /// Drop the lines an order paid for. Anything added to the cart after
    /// the order was placed stays.
    fn release_cart(&self, owner: &CartOwner, order: &Order) -> Result<(), CheckoutError> {
        let _guard = self.lock_documents();
        let Some(mut cart) = self.stores.carts.get(owner) else {
            return Ok(());
        };
        let now = Utc::now();
        for line in order.lines() {
            let in_cart = cart.quantity_of(line.product_id);
            if in_cart > 0 {
                let left = i64::from(in_cart) - i64::from(line.quantity);
                cart.set_quantity(line.product_id, left, None, now)?;
            }
        }
        if cart.is_empty() {
            self.stores.carts.remove(owner)?;
        } else {
            self.stores.carts.upsert(owner.clone(), cart)?;
        }
        Ok(())
    }

    fn price_cart(&self, cart: &Cart) -> Result<Vec<QuoteLine>, CheckoutError> {
        let mut lines = Vec::with_capacity(cart.lines.len());
        for line in &cart.lines {
            let product = self.sellable(line.product_id)?;
            let Some(price) = product.price() else {
                return Err(CheckoutError::Unavailable(format!("{} has no price", product.title())));
            };
            let available = self.available(line.product_id)?;
            if available.is_some_and(|a| line.quantity > a) {
                return Err(CheckoutError::Unavailable(format!(
                    "only {} of {} left in stock",
                    available.unwrap_or(0),
                    product.title()
                )));
            }
            let unit_price = price.effective();
            lines.push(QuoteLine {
                product_id: line.product_id,
                title: product.title().to_string(),
                sku: product.sku().to_string(),
                unit_price,
                quantity: line.quantity,
                line_total: unit_price.times(line.quantity),
                available,
            });
        }
        Ok(lines)
    }

    fn tax_rates(&self, lines: &[QuoteLine]) -> Result<Vec<PricedLine>, CheckoutError> {
        lines
            .iter()
            .map(|l| {
                let product = self.load_product(l.product_id)?;
                Ok(PricedLine {
                    unit_price: l.unit_price,
                    quantity: l.quantity,
                    tax_rate_bp: product.price().map(|p| p.tax_rate_bp).unwrap_or(0),
                })
            })
            .collect()
    }

    fn coupon_usage(&self, coupon: &Coupon, customer_key: Option<&str>) -> CouponUsage {
        self.stores
            .redemptions
            .get(&coupon.code)
            .map(|r| r.usage_for(customer_key))
            .unwrap_or_default()
    }

    fn totals_for(
        &self,
        lines: &[QuoteLine],
        coupon_code: Option<&str>,
        customer_key: Option<&str>,
        destination_state: Option<&str>,
        method: PaymentMethod,
    ) -> Result<(OrderTotals, Option<String>), CheckoutError> {
        let priced = self.tax_rates(lines)?;
        let subtotal: Money = lines.iter().map(|l| l.line_total).sum();
        let coupons = self.stores.coupons.list();
        let coupon = validate_coupon(&coupons, coupon_code, subtotal, Utc::now(), |c| {
            self.coupon_usage(c, customer_key)
        })?;
        let totals = compute_totals(&priced, coupon, destination_state, method, &self.settings.pricing)?;
        Ok((totals, coupon.map(|c| c.code.clone())))
    }

    /// Price the cart with an optional coupon, without placing anything.
    pub fn quote(
        &self,
        owner: &CartOwner,
        coupon_code: Option<&str>,
        destination_state: Option<&str>,
        method: PaymentMethod,
    ) -> Result<Quote, CheckoutError> {
        let cart = self.cart(owner);
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let lines = self.price_cart(&cart)?;
        let customer_key = match owner {
            CartOwner::Customer(id) => Some(id.to_string()),
            CartOwner::Guest(_) => None,
        };
        let (totals, coupon_code) =
            self.totals_for(&lines, coupon_code, customer_key.as_deref(), destination_state, method)?;
        Ok(Quote {
            lines,
            coupon_code,
            totals,
        })
    }

    // ---- orders ----

    #[tracing::instrument(skip(self, owner, request), fields(owner = %owner, method = ?request.method))]
    pub async fn place_order(&self, owner: &CartOwner, request: CheckoutRequest) -> Result<PlacedOrder, CheckoutError> {
        let cart = self.cart(owner);
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let lines = self.price_cart(&cart)?;
        let customer_key = customer_key(request.customer, &request.contact.email);
        let (totals, coupon_code) = self.totals_for(
            &lines,
            request.coupon_code.as_deref(),
            Some(&customer_key),
            Some(&request.shipping_address.state),
            request.method,
        )?;
        if request.method == PaymentMethod::Cod {
            cod_available(&request.shipping_address.pincode, totals.grand_total)?;
        }

        let now = Utc::now();
        let order_id = OrderId::new(AggregateId::new());
        let order_lines: Vec<OrderLine> = lines
            .iter()
            .map(|l| OrderLine {
                product_id: l.product_id,
                title: l.title.clone(),
                sku: l.sku.clone(),
                unit_price: l.unit_price,
                quantity: l.quantity,
                line_total: l.line_total,
            })
            .collect();

        self.dispatch_order(
            order_id,
            OrderCommand::PlaceOrder(PlaceOrder {
                order_id,
                customer: request.customer,
                contact: request.contact,
                shipping_address: request.shipping_address,
                lines: order_lines,
                totals,
                method: request.method,
                coupon_code,
                notes: request.notes,
                occurred_at: now,
            }),
        )?;

        // Online orders keep the cart until the payment is captured.
        let payment = if request.method.is_online() {
            self.start_gateway_payment(order_id, owner, totals.grand_total, request.method).await?
        } else {
            let order = self.load_order(order_id)?;
            self.commit_stock(&order)?;
            self.redeem_coupon(&order)?;
            self.clear_cart(owner)?;
            PaymentInstructions::CashOnDelivery
        };

        tracing::info!(
            order_id = %order_id,
            grand_total = %totals.grand_total,
            discount = %totals.discount,
            lines = lines.len(),
            "order placed"
        );

        Ok(PlacedOrder {
            order_id,
            totals,
            method: request.method,
            payment,
        })
    }

    async fn start_gateway_payment(
        &self,
        order_id: OrderId,
        owner: &CartOwner,
        amount: Money,
        method: PaymentMethod,
    ) -> Result<PaymentInstructions, CheckoutError> {
        let receipt = order_id.to_string();
        let gateway_order = match self.gateway.create_order(amount, &receipt).await {
            Ok(o) => o,
            Err(err) => {
                tracing::warn!(order_id = %order_id, error = %err, "gateway order creation failed");
                self.dispatch_order(
                    order_id,
                    OrderCommand::FailPayment(FailPayment {
                        order_id,
                        reason: "payment gateway unavailable".to_string(),
                        occurred_at: Utc::now(),
                    }),
                )?;
                return Err(err.into());
            }
        };

        self.dispatch_order(
            order_id,
            OrderCommand::AttachGatewayOrder(AttachGatewayOrder {
                order_id,
                gateway_order_id: gateway_order.id.clone(),
                occurred_at: Utc::now(),
            }),
        )?;
        self.stores.gateway_orders.upsert(
            gateway_order.id.clone(),
            GatewayOrderLink {
                order_id,
                cart_owner: owner.clone(),
            },
        )?;

        let upi_url = match (method, self.settings.upi_vpa.as_deref()) {
            (PaymentMethod::Upi, Some(vpa)) => Some(upi_intent_url(
                amount,
                vpa,
                &self.settings.store_name,
                &receipt,
                Some(&format!("Order {receipt}")),
            )),
            _ => None,
        };

        Ok(PaymentInstructions::Gateway {
            key_id: self.gateway.key_id().to_string(),
            gateway_order_id: gateway_order.id,
            amount,
            upi_url,
        })
    }

    /// Browser callback after the hosted checkout: verify and capture.
    #[tracing::instrument(skip(self, signature))]
    pub fn verify_payment(
        &self,
        order_id: OrderId,
        gateway_order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<Order, CheckoutError> {
        let order = self.load_order(order_id)?;
        if order.gateway_order_id() != Some(gateway_order_id) {
            return Err(CheckoutError::UnknownGatewayOrder(gateway_order_id.to_string()));
        }
        if let Err(err) = verify_checkout_signature(gateway_order_id, payment_id, signature, &self.settings.key_secret) {
            tracing::warn!(order_id = %order_id, error = %err, "checkout signature rejected");
            return Err(err.into());
        }
        self.capture(order_id, payment_id, order.totals().grand_total)
    }

    /// Gateway webhook. The signature is checked over the raw body first.
    #[tracing::instrument(skip(self, raw_body, signature_header))]
    pub fn handle_webhook(&self, raw_body: &[u8], signature_header: Option<&str>) -> Result<WebhookOutcome, CheckoutError> {
        if let Err(err) = verify_webhook_signature(raw_body, signature_header, self.settings.webhook_secret.as_deref()) {
            tracing::warn!(error = %err, "webhook rejected");
            return Err(err.into());
        }

        match parse_webhook(raw_body)? {
            WebhookEvent::PaymentCaptured {
                payment_id,
                gateway_order_id,
                amount,
            } => {
                let order_id = self.order_for_gateway(&gateway_order_id)?;
                self.capture(order_id, &payment_id, amount)?;
                Ok(WebhookOutcome::Captured { order_id })
            }
            WebhookEvent::PaymentFailed {
                gateway_order_id,
                error,
                ..
            } => {
                let order_id = self.order_for_gateway(&gateway_order_id)?;
                self.fail_payment(order_id, error.as_deref().unwrap_or("payment failed"))?;
                Ok(WebhookOutcome::Failed { order_id })
            }
            WebhookEvent::Ignored(event) => {
                tracing::debug!(event = %event, "webhook ignored");
                Ok(WebhookOutcome::Ignored { event })
            }
        }
    }

    fn order_for_gateway(&self, gateway_order_id: &str) -> Result<OrderId, CheckoutError> {
        self.stores
            .gateway_orders
            .get(&gateway_order_id.to_string())
            .map(|link| link.order_id)
            .ok_or_else(|| CheckoutError::UnknownGatewayOrder(gateway_order_id.to_string()))
    }

    /// Mark the order paid, take its stock off the shelf and empty the
    /// lines it paid for from the shopper's cart.
    ///
    /// Safe to repeat: a second capture emits nothing, and stock commits are
    /// keyed by order, so a retry after a partial failure finishes the job.
    pub fn capture(&self, order_id: OrderId, payment_id: &str, amount: Money) -> Result<Order, CheckoutError> {
        let before = self.load_order(order_id)?;
        let expected = before.totals().grand_total;
        if amount != expected {
            tracing::warn!(
                order_id = %order_id,
                expected = %expected,
                received = %amount,
                "payment amount mismatch"
            );
            return Err(CheckoutError::AmountMismatch {
                expected,
                received: amount,
            });
        }

        self.dispatch_order(
            order_id,
            OrderCommand::CapturePayment(CapturePayment {
                order_id,
                gateway_payment_id: payment_id.to_string(),
                amount,
                occurred_at: Utc::now(),
            }),
        )?;

        let order = self.load_order(order_id)?;
        self.commit_stock(&order)?;
        self.redeem_coupon(&order)?;
        if before.payment_status() != PaymentStatus::Paid {
            let link = order
                .gateway_order_id()
                .and_then(|gid| self.stores.gateway_orders.get(&gid.to_string()));
            if let Some(link) = link {
                self.release_cart(&link.cart_owner, &order)?;
            }
        }
        tracing::info!(order_id = %order_id, payment_id, amount = %amount, "payment captured");
        Ok(order)
    }

    pub fn fail_payment(&self, order_id: OrderId, reason: &str) -> Result<Order, CheckoutError> {
        self.dispatch_order(
            order_id,
            OrderCommand::FailPayment(FailPayment {
                order_id,
                reason: reason.to_string(),
                occurred_at: Utc::now(),
            }),
        )?;
        tracing::info!(order_id = %order_id, reason, "payment failed");
        Ok(self.load_order(order_id)?)
    }

    /// Staff status change. Stock held by the order returns to the shelf when
    /// it is cancelled or refunded. Refunds of online payments go through
    /// [`Self::refund`] so the gateway returns the money.
    #[tracing::instrument(skip(self))]
    pub async fn change_status(&self, order_id: OrderId, to: OrderStatus) -> Result<Order, CheckoutError> {
        let before = self.load_order(order_id)?;
        if to == OrderStatus::Refunded && before.method().is_online() {
            return self.refund(order_id).await;
        }
        self.dispatch_order(
            order_id,
            OrderCommand::ChangeStatus(ChangeStatus {
                order_id,
                to,
                occurred_at: Utc::now(),
            }),
        )?;
        let after = self.load_order(order_id)?;
        if before.holds_stock() && !after.holds_stock() {
            self.restock(&after)?;
        }
        Ok(after)
    }

    /// Refund the captured payment in full through the gateway.
    #[tracing::instrument(skip(self))]
    pub async fn refund(&self, order_id: OrderId) -> Result<Order, CheckoutError> {
        let before = self.load_order(order_id)?;
        if before.status() == OrderStatus::Refunded {
            return Ok(before);
        }
        if !before.status().can_transition(OrderStatus::Refunded, before.method()) {
            return Err(DomainError::invariant(format!("cannot refund a {} order", before.status())).into());
        }

        let refund_id = match before.gateway_payment_id() {
            Some(payment_id) if before.method().is_online() => Some(self.gateway.refund(payment_id, None).await?.id),
            _ => None,
        };

        self.dispatch_order(
            order_id,
            OrderCommand::RefundPayment(RefundPayment {
                order_id,
                refund_id: refund_id.clone(),
                occurred_at: Utc::now(),
            }),
        )?;
        let after = self.load_order(order_id)?;
        if before.holds_stock() {
            self.restock(&after)?;
        }
        tracing::info!(order_id = %order_id, refund_id = ?refund_id, "order refunded");
        Ok(after)
    }

    fn commit_stock(&self, order: &Order) -> Result<(), CheckoutError> {
        let order_id = order.id_typed().aggregate_id();
        for line in order.lines() {
            if !self.load_stock(line.product_id)?.exists() {
                continue;
            }
            let item_id = StockItemId::new(line.product_id.aggregate_id());
            let committed = self.dispatcher.dispatch(
                item_id.0,
                inkwell_inventory::AGGREGATE_TYPE,
                InventoryCommand::CommitSale(CommitSale {
                    item_id,
                    order_id,
                    quantity: line.quantity,
                    occurred_at: Utc::now(),
                }),
                |id| StockItem::empty(StockItemId::new(id)),
            )?;
            for stored in committed {
                if let Ok(InventoryEvent::SaleCommitted(e)) = serde_json::from_value(stored.payload) {
                    if e.oversold > 0 {
                        tracing::warn!(
                            order_id = %order_id,
                            sku = %line.sku,
                            oversold = e.oversold,
                            on_hand = e.on_hand_after,
                            "stock oversold"
                        );
                    }
                }
            }
        }
        Ok(())
    }

    fn restock(&self, order: &Order) -> Result<(), CheckoutError> {
        let order_id = order.id_typed().aggregate_id();
        for line in order.lines() {
            if !self.load_stock(line.product_id)?.exists() {
                continue;
            }
            let item_id = StockItemId::new(line.product_id.aggregate_id());
            self.dispatcher.dispatch(
                item_id.0,
                inkwell_inventory::AGGREGATE_TYPE,
                InventoryCommand::Restock(Restock {
                    item_id,
                    order_id,
                    quantity: line.quantity,
                    occurred_at: Utc::now(),
                }),
                |id| StockItem::empty(StockItemId::new(id)),
            )?;
        }
        tracing::info!(order_id = %order_id, "stock returned");
        Ok(())
    }

    fn redeem_coupon(&self, order: &Order) -> Result<(), CheckoutError> {
        let Some(code) = order.coupon_code() else {
            return Ok(());
        };
        let _guard = self.lock_documents();
        let mut redemptions = self.stores.redemptions.get(&code.to_string()).unwrap_or_else(|| CouponRedemptions {
            code: code.to_string(),
            ..CouponRedemptions::default()
        });
        if !redemptions.orders.insert(order.id_typed()) {
            return Ok(());
        }
        let email = order.contact().map(|c| c.email.as_str()).unwrap_or_default();
        *redemptions
            .by_customer
            .entry(customer_key(order.customer(), email))
            .or_insert(0) += 1;
        self.stores.redemptions.upsert(code.to_string(), redemptions)?;
        Ok(())
    }

    // ---- coupons ----

    pub fn coupons(&self) -> Vec<Coupon> {
        let mut all = self.stores.coupons.list();
        all.sort_by(|a, b| a.code.cmp(&b.code));
        all
    }

    pub fn create_coupon(&self, coupon: Coupon) -> Result<Coupon, CheckoutError> {
        let coupon = coupon.validated()?;
        let _guard = self.lock_documents();
        if self.stores.coupons.get(&coupon.code).is_some() {
            return Err(DomainError::conflict(format!("coupon {} already exists", coupon.code)).into());
        }
        self.stores.coupons.upsert(coupon.code.clone(), coupon.clone())?;
        Ok(coupon)
    }

    pub fn deactivate_coupon(&self, code: &str) -> Result<Coupon, CheckoutError> {
        let code = Coupon::normalize_code(code);
        let _guard = self.lock_documents();
        let mut coupon = self.stores.coupons.get(&code).ok_or(DispatchError::NotFound)?;
        coupon.active = false;
        self.stores.coupons.upsert(code, coupon.clone())?;
        Ok(coupon)
    }

    pub fn redemptions(&self, code: &str) -> Option<CouponRedemptions> {
        self.stores.redemptions.get(&Coupon::normalize_code(code))
    }
}

fn customer_key(customer: Option<UserId>, email: &str) -> String {
    match customer {
        Some(id) => id.to_string(),
        None => email.trim().to_lowercase(),
    }
}

