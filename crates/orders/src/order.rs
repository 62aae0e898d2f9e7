use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use inkwell_catalog::ProductId;
use inkwell_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money, UserId, ValueObject};
use inkwell_events::Event;
use inkwell_pricing::{OrderTotals, PaymentMethod};

/// Order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub AggregateId);

impl OrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.0
    }
}

impl core::fmt::Display for OrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Packed,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "packed" => Some(Self::Packed),
            "shipped" => Some(Self::Shipped),
            "delivered" => Some(Self::Delivered),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            "refunded" => Some(Self::Refunded),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Packed => "packed",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Refunded)
    }

    /// Whether staff may move an order from `self` to `to`.
    ///
    /// Pending → Paid only happens through payment capture, and Pending →
    /// Packed only for cash-on-delivery orders.
    pub fn can_transition(self, to: OrderStatus, method: PaymentMethod) -> bool {
        use OrderStatus::*;
        match (self, to) {
            (Pending, Cancelled) => true,
            (Pending, Packed) => method == PaymentMethod::Cod,
            (Paid, Packed | Cancelled | Refunded) => true,
            (Packed, Shipped | Cancelled) => true,
            (Shipped, Delivered) => true,
            (Delivered, Refunded) => true,
            _ => false,
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Failed,
    Refunded,
}

/// Snapshot of a product line at the time the order was placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub title: String,
    pub sku: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub line_total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub district: Option<String>,
    pub state: String,
    pub pincode: String,
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    "India".to_string()
}

impl ValueObject for ShippingAddress {}

impl ShippingAddress {
    fn validate(&self) -> Result<(), DomainError> {
        let required = [
            ("name", &self.name),
            ("line1", &self.line1),
            ("city", &self.city),
            ("state", &self.state),
            ("pincode", &self.pincode),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, v)| v.trim().is_empty())
            .map(|(k, _)| *k)
            .collect();
        if !missing.is_empty() {
            return Err(DomainError::validation(format!(
                "shipping address is missing: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub email: String,
    pub phone: String,
}

impl ValueObject for ContactDetails {}

impl ContactDetails {
    fn validate(&self) -> Result<(), DomainError> {
        let email = self.email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
            _ => return Err(DomainError::validation("a valid contact email is required")),
        }
        if self.phone.trim().is_empty() {
            return Err(DomainError::validation("a contact phone number is required"));
        }
        Ok(())
    }
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    customer: Option<UserId>,
    contact: Option<ContactDetails>,
    shipping_address: Option<ShippingAddress>,
    lines: Vec<OrderLine>,
    totals: OrderTotals,
    method: PaymentMethod,
    coupon_code: Option<String>,
    notes: Option<String>,
    status: OrderStatus,
    payment_status: PaymentStatus,
    gateway_order_id: Option<String>,
    gateway_payment_id: Option<String>,
    failure_reason: Option<String>,
    placed_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Order {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            customer: None,
            contact: None,
            shipping_address: None,
            lines: Vec::new(),
            totals: OrderTotals::default(),
            method: PaymentMethod::Razorpay,
            coupon_code: None,
            notes: None,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            gateway_order_id: None,
            gateway_payment_id: None,
            failure_reason: None,
            placed_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn customer(&self) -> Option<UserId> {
        self.customer
    }

    pub fn contact(&self) -> Option<&ContactDetails> {
        self.contact.as_ref()
    }

    pub fn shipping_address(&self) -> Option<&ShippingAddress> {
        self.shipping_address.as_ref()
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn totals(&self) -> &OrderTotals {
        &self.totals
    }

    pub fn method(&self) -> PaymentMethod {
        self.method
    }

    pub fn coupon_code(&self) -> Option<&str> {
        self.coupon_code.as_deref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn gateway_order_id(&self) -> Option<&str> {
        self.gateway_order_id.as_deref()
    }

    pub fn gateway_payment_id(&self) -> Option<&str> {
        self.gateway_payment_id.as_deref()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn placed_at(&self) -> Option<DateTime<Utc>> {
        self.placed_at
    }

    /// Whether the order's units are currently off the shelf.
    pub fn holds_stock(&self) -> bool {
        if !self.created || self.status.is_terminal() {
            return false;
        }
        self.payment_status == PaymentStatus::Paid || self.method == PaymentMethod::Cod
    }

    /// A signed-in owner, or a guest who knows the contact email.
    pub fn visible_to(&self, customer: Option<UserId>, email: Option<&str>) -> bool {
        if customer.is_some() && self.customer == customer {
            return true;
        }
        match (email, &self.contact) {
            (Some(email), Some(contact)) => contact.email.trim().eq_ignore_ascii_case(email.trim()),
            _ => false,
        }
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub order_id: OrderId,
    pub customer: Option<UserId>,
    pub contact: ContactDetails,
    pub shipping_address: ShippingAddress,
    pub lines: Vec<OrderLine>,
    pub totals: OrderTotals,
    pub method: PaymentMethod,
    pub coupon_code: Option<String>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Record the gateway-side order created for an online payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachGatewayOrder {
    pub order_id: OrderId,
    pub gateway_order_id: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturePayment {
    pub order_id: OrderId,
    pub gateway_payment_id: String,
    pub amount: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailPayment {
    pub order_id: OrderId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStatus {
    pub order_id: OrderId,
    pub to: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundPayment {
    pub order_id: OrderId,
    /// Gateway refund reference, when the refund went through the gateway.
    pub refund_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    PlaceOrder(PlaceOrder),
    AttachGatewayOrder(AttachGatewayOrder),
    CapturePayment(CapturePayment),
    FailPayment(FailPayment),
    ChangeStatus(ChangeStatus),
    RefundPayment(RefundPayment),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: OrderId,
    pub customer: Option<UserId>,
    pub contact: ContactDetails,
    pub shipping_address: ShippingAddress,
    pub lines: Vec<OrderLine>,
    pub totals: OrderTotals,
    pub method: PaymentMethod,
    pub coupon_code: Option<String>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrderAttached {
    pub order_id: OrderId,
    pub gateway_order_id: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCaptured {
    pub order_id: OrderId,
    pub gateway_payment_id: String,
    pub amount: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFailed {
    pub order_id: OrderId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChanged {
    pub order_id: OrderId,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRefunded {
    pub order_id: OrderId,
    pub refund_id: Option<String>,
    pub amount: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderPlaced(OrderPlaced),
    GatewayOrderAttached(GatewayOrderAttached),
    PaymentCaptured(PaymentCaptured),
    PaymentFailed(PaymentFailed),
    OrderStatusChanged(OrderStatusChanged),
    OrderRefunded(OrderRefunded),
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "orders.order.placed",
            OrderEvent::GatewayOrderAttached(_) => "orders.order.gateway_order_attached",
            OrderEvent::PaymentCaptured(_) => "orders.order.payment_captured",
            OrderEvent::PaymentFailed(_) => "orders.order.payment_failed",
            OrderEvent::OrderStatusChanged(_) => "orders.order.status_changed",
            OrderEvent::OrderRefunded(_) => "orders.order.refunded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderPlaced(e) => e.occurred_at,
            OrderEvent::GatewayOrderAttached(e) => e.occurred_at,
            OrderEvent::PaymentCaptured(e) => e.occurred_at,
            OrderEvent::PaymentFailed(e) => e.occurred_at,
            OrderEvent::OrderStatusChanged(e) => e.occurred_at,
            OrderEvent::OrderRefunded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderPlaced(e) => {
                self.id = e.order_id;
                self.customer = e.customer;
                self.contact = Some(e.contact.clone());
                self.shipping_address = Some(e.shipping_address.clone());
                self.lines = e.lines.clone();
                self.totals = e.totals;
                self.method = e.method;
                self.coupon_code = e.coupon_code.clone();
                self.notes = e.notes.clone();
                self.status = OrderStatus::Pending;
                self.payment_status = PaymentStatus::Unpaid;
                self.placed_at = Some(e.occurred_at);
                self.created = true;
            }
            OrderEvent::GatewayOrderAttached(e) => {
                self.gateway_order_id = Some(e.gateway_order_id.clone());
            }
            OrderEvent::PaymentCaptured(e) => {
                self.payment_status = PaymentStatus::Paid;
                self.gateway_payment_id = Some(e.gateway_payment_id.clone());
                self.failure_reason = None;
                if self.status == OrderStatus::Pending {
                    self.status = OrderStatus::Paid;
                }
            }
            OrderEvent::PaymentFailed(e) => {
                self.payment_status = PaymentStatus::Failed;
                self.failure_reason = Some(e.reason.clone());
            }
            OrderEvent::OrderStatusChanged(e) => {
                self.status = e.to;
            }
            OrderEvent::OrderRefunded(_) => {
                self.status = OrderStatus::Refunded;
                self.payment_status = PaymentStatus::Refunded;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::PlaceOrder(cmd) => self.handle_place(cmd),
            OrderCommand::AttachGatewayOrder(cmd) => self.handle_attach(cmd),
            OrderCommand::CapturePayment(cmd) => self.handle_capture(cmd),
            OrderCommand::FailPayment(cmd) => self.handle_fail(cmd),
            OrderCommand::ChangeStatus(cmd) => self.handle_change_status(cmd),
            OrderCommand::RefundPayment(cmd) => self.handle_refund(cmd),
        }
    }
}

impl Order {
    fn ensure_exists(&self, order_id: OrderId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn handle_place(&self, cmd: &PlaceOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("order already exists"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("an order needs at least one line"));
        }
        for line in &cmd.lines {
            if line.quantity == 0 {
                return Err(DomainError::validation("line quantities must be positive"));
            }
            if line.unit_price.times(line.quantity) != line.line_total {
                return Err(DomainError::validation(format!(
                    "line total for {} does not match its price",
                    line.sku
                )));
            }
        }
        let subtotal: Money = cmd.lines.iter().map(|l| l.line_total).sum();
        if subtotal != cmd.totals.subtotal {
            return Err(DomainError::validation("order subtotal does not match its lines"));
        }
        cmd.contact.validate()?;
        cmd.shipping_address.validate()?;

        Ok(vec![OrderEvent::OrderPlaced(OrderPlaced {
            order_id: cmd.order_id,
            customer: cmd.customer,
            contact: ContactDetails {
                email: cmd.contact.email.trim().to_lowercase(),
                phone: cmd.contact.phone.trim().to_string(),
            },
            shipping_address: cmd.shipping_address.clone(),
            lines: cmd.lines.clone(),
            totals: cmd.totals,
            method: cmd.method,
            coupon_code: cmd.coupon_code.clone(),
            notes: cmd.notes.clone().filter(|n| !n.trim().is_empty()),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_attach(&self, cmd: &AttachGatewayOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;
        if !self.method.is_online() {
            return Err(DomainError::invariant("cash on delivery orders have no gateway order"));
        }
        if cmd.gateway_order_id.trim().is_empty() {
            return Err(DomainError::validation("gateway order id cannot be empty"));
        }
        match self.gateway_order_id.as_deref() {
            Some(existing) if existing == cmd.gateway_order_id => return Ok(vec![]),
            Some(_) => return Err(DomainError::conflict("order already has a gateway order")),
            None => {}
        }
        if self.status != OrderStatus::Pending {
            return Err(DomainError::invariant("only pending orders can start a payment"));
        }

        Ok(vec![OrderEvent::GatewayOrderAttached(GatewayOrderAttached {
            order_id: self.id,
            gateway_order_id: cmd.gateway_order_id.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_capture(&self, cmd: &CapturePayment) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;
        if self.payment_status == PaymentStatus::Paid {
            return Ok(vec![]);
        }
        if self.status.is_terminal() {
            return Err(DomainError::invariant(format!(
                "cannot capture payment on a {} order",
                self.status
            )));
        }
        if cmd.amount != self.totals.grand_total {
            return Err(DomainError::validation(format!(
                "captured amount {} does not match order total {}",
                cmd.amount, self.totals.grand_total
            )));
        }

        Ok(vec![OrderEvent::PaymentCaptured(PaymentCaptured {
            order_id: self.id,
            gateway_payment_id: cmd.gateway_payment_id.clone(),
            amount: cmd.amount,
            occurred_at: cmd.occurred_at,
        })])
    }

    /// A failed attempt leaves the order pending so the shopper can retry.
    /// Failures reported after a capture, or for a closed order, are ignored.
    fn handle_fail(&self, cmd: &FailPayment) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;
        if self.status != OrderStatus::Pending || self.payment_status == PaymentStatus::Paid {
            return Ok(vec![]);
        }
        if self.payment_status == PaymentStatus::Failed && self.failure_reason.as_deref() == Some(cmd.reason.as_str()) {
            return Ok(vec![]);
        }
        Ok(vec![OrderEvent::PaymentFailed(PaymentFailed {
            order_id: self.id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_status(&self, cmd: &ChangeStatus) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;
        if cmd.to == self.status {
            return Ok(vec![]);
        }
        if !self.status.can_transition(cmd.to, self.method) {
            return Err(DomainError::invariant(format!(
                "cannot move order from {} to {}",
                self.status, cmd.to
            )));
        }
        if cmd.to == OrderStatus::Refunded {
            if self.method.is_online() {
                return Err(DomainError::invariant(
                    "online payments are refunded through the payment gateway",
                ));
            }
            return self.refund(None, cmd.occurred_at);
        }

        Ok(vec![OrderEvent::OrderStatusChanged(OrderStatusChanged {
            order_id: self.id,
            from: self.status,
            to: cmd.to,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_refund(&self, cmd: &RefundPayment) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;
        if self.status == OrderStatus::Refunded {
            return Ok(vec![]);
        }
        if !self.status.can_transition(OrderStatus::Refunded, self.method) {
            return Err(DomainError::invariant(format!(
                "cannot refund a {} order",
                self.status
            )));
        }
        self.refund(cmd.refund_id.clone(), cmd.occurred_at)
    }

    fn refund(&self, refund_id: Option<String>, occurred_at: DateTime<Utc>) -> Result<Vec<OrderEvent>, DomainError> {
        if self.payment_status != PaymentStatus::Paid {
            return Err(DomainError::invariant("nothing has been paid on this order"));
        }
        Ok(vec![OrderEvent::OrderRefunded(OrderRefunded {
            order_id: self.id,
            refund_id,
            amount: self.totals.grand_total,
            occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn line(paise: u64, qty: u32) -> OrderLine {
        let unit_price = Money::from_paise(paise);
        OrderLine {
            product_id: ProductId::new(AggregateId::new()),
            title: "The Dark Room".into(),
            sku: "BK-001".into(),
            unit_price,
            quantity: qty,
            line_total: unit_price.times(qty),
        }
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            name: "Asha Rao".into(),
            line1: "12 Residency Road".into(),
            line2: None,
            city: "Srinagar".into(),
            district: None,
            state: "Jammu and Kashmir".into(),
            pincode: "190001".into(),
            country: "India".into(),
        }
    }

    fn place_cmd(id: OrderId, method: PaymentMethod) -> OrderCommand {
        let lines = vec![line(39_900, 2), line(25_000, 1)];
        let subtotal: Money = lines.iter().map(|l| l.line_total).sum();
        OrderCommand::PlaceOrder(PlaceOrder {
            order_id: id,
            customer: None,
            contact: ContactDetails {
                email: " Asha@Example.com ".into(),
                phone: "9000000000".into(),
            },
            shipping_address: address(),
            lines,
            totals: OrderTotals {
                subtotal,
                grand_total: subtotal,
                ..OrderTotals::default()
            },
            method,
            coupon_code: None,
            notes: Some("  ".into()),
            occurred_at: Utc::now(),
        })
    }

    fn exec(order: &mut Order, cmd: OrderCommand) -> Result<Vec<OrderEvent>, DomainError> {
        let events = order.handle(&cmd)?;
        for e in &events {
            order.apply(e);
        }
        Ok(events)
    }

    fn placed(method: PaymentMethod) -> Order {
        let id = OrderId::new(AggregateId::new());
        let mut order = Order::empty(id);
        exec(&mut order, place_cmd(id, method)).unwrap();
        order
    }

    fn capture(id: OrderId, amount: Money) -> OrderCommand {
        OrderCommand::CapturePayment(CapturePayment {
            order_id: id,
            gateway_payment_id: "pay_1".into(),
            amount,
            occurred_at: Utc::now(),
        })
    }

    fn change(id: OrderId, to: OrderStatus) -> OrderCommand {
        OrderCommand::ChangeStatus(ChangeStatus {
            order_id: id,
            to,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn place_normalises_contact_and_drops_blank_notes() {
        let order = placed(PaymentMethod::Razorpay);
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.payment_status(), PaymentStatus::Unpaid);
        assert_eq!(order.contact().map(|c| c.email.as_str()), Some("asha@example.com"));
        assert_eq!(order.notes(), None);
        assert_eq!(order.version(), 1);
        assert!(!order.holds_stock());
    }

    #[test]
    fn place_twice_conflicts() {
        let mut order = placed(PaymentMethod::Upi);
        let id = order.id_typed();
        let err = exec(&mut order, place_cmd(id, PaymentMethod::Upi)).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn place_rejects_bad_contact_and_address() {
        let id = OrderId::new(AggregateId::new());
        let order = Order::empty(id);

        let OrderCommand::PlaceOrder(mut cmd) = place_cmd(id, PaymentMethod::Cod) else {
            unreachable!()
        };
        cmd.contact.email = "not-an-email".into();
        assert!(order.handle(&OrderCommand::PlaceOrder(cmd.clone())).is_err());

        cmd.contact.email = "a@b.in".into();
        cmd.shipping_address.pincode = " ".into();
        let err = order.handle(&OrderCommand::PlaceOrder(cmd)).unwrap_err();
        assert_eq!(err, DomainError::validation("shipping address is missing: pincode"));
    }

    #[test]
    fn place_rejects_inconsistent_lines() {
        let id = OrderId::new(AggregateId::new());
        let OrderCommand::PlaceOrder(mut cmd) = place_cmd(id, PaymentMethod::Razorpay) else {
            unreachable!()
        };
        cmd.lines[0].line_total = Money::from_paise(1);
        assert!(Order::empty(id).handle(&OrderCommand::PlaceOrder(cmd)).is_err());
    }

    #[test]
    fn capture_is_idempotent_and_checks_amount() {
        let mut order = placed(PaymentMethod::Razorpay);
        let id = order.id_typed();
        let total = order.totals().grand_total;

        let err = exec(&mut order, capture(id, Money::from_paise(1))).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        assert_eq!(exec(&mut order, capture(id, total)).unwrap().len(), 1);
        assert_eq!(order.status(), OrderStatus::Paid);
        assert_eq!(order.payment_status(), PaymentStatus::Paid);
        assert!(order.holds_stock());

        assert!(exec(&mut order, capture(id, total)).unwrap().is_empty());
    }

    #[test]
    fn capture_on_cancelled_order_is_rejected() {
        let mut order = placed(PaymentMethod::Razorpay);
        let id = order.id_typed();
        exec(&mut order, change(id, OrderStatus::Cancelled)).unwrap();
        let total = order.totals().grand_total;
        let err = exec(&mut order, capture(id, total)).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    fn fail(id: OrderId, reason: &str) -> OrderCommand {
        OrderCommand::FailPayment(FailPayment {
            order_id: id,
            reason: reason.into(),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn failed_payment_keeps_order_open_for_retry() {
        let mut order = placed(PaymentMethod::Upi);
        let id = order.id_typed();
        exec(&mut order, fail(id, "card declined")).unwrap();
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.payment_status(), PaymentStatus::Failed);
        assert_eq!(order.failure_reason(), Some("card declined"));
        assert!(!order.holds_stock());

        // Redelivered failure is a no-op; a different one is recorded.
        assert!(exec(&mut order, fail(id, "card declined")).unwrap().is_empty());
        assert_eq!(exec(&mut order, fail(id, "bank timeout")).unwrap().len(), 1);

        let total = order.totals().grand_total;
        assert_eq!(exec(&mut order, capture(id, total)).unwrap().len(), 1);
        assert_eq!(order.status(), OrderStatus::Paid);
        assert_eq!(order.payment_status(), PaymentStatus::Paid);
        assert_eq!(order.failure_reason(), None);
        assert!(order.holds_stock());
    }

    #[test]
    fn failure_after_capture_is_ignored() {
        let mut order = placed(PaymentMethod::Razorpay);
        let id = order.id_typed();
        let total = order.totals().grand_total;
        exec(&mut order, capture(id, total)).unwrap();

        assert!(exec(&mut order, fail(id, "late failure")).unwrap().is_empty());
        assert_eq!(order.status(), OrderStatus::Paid);
        assert_eq!(order.payment_status(), PaymentStatus::Paid);
    }

    #[test]
    fn online_refund_cannot_skip_the_gateway() {
        let mut order = placed(PaymentMethod::Razorpay);
        let id = order.id_typed();
        let total = order.totals().grand_total;
        exec(&mut order, capture(id, total)).unwrap();

        let err = exec(&mut order, change(id, OrderStatus::Refunded)).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(order.status(), OrderStatus::Paid);

        let refund = OrderCommand::RefundPayment(RefundPayment {
            order_id: id,
            refund_id: Some("rfnd_1".into()),
            occurred_at: Utc::now(),
        });
        exec(&mut order, refund).unwrap();
        assert_eq!(order.status(), OrderStatus::Refunded);
    }

    #[test]
    fn status_transitions_follow_the_table() {
        let mut order = placed(PaymentMethod::Razorpay);
        let id = order.id_typed();

        // Paid only through capture; Packed only for COD.
        assert!(exec(&mut order, change(id, OrderStatus::Paid)).is_err());
        assert!(exec(&mut order, change(id, OrderStatus::Packed)).is_err());

        let total = order.totals().grand_total;
        exec(&mut order, capture(id, total)).unwrap();
        for to in [OrderStatus::Packed, OrderStatus::Shipped, OrderStatus::Delivered] {
            exec(&mut order, change(id, to)).unwrap();
        }
        assert!(exec(&mut order, change(id, OrderStatus::Cancelled)).is_err());
        assert!(exec(&mut order, change(id, OrderStatus::Pending)).is_err());
    }

    #[test]
    fn cod_refund_by_status_change() {
        let mut order = placed(PaymentMethod::Cod);
        let id = order.id_typed();
        for to in [OrderStatus::Packed, OrderStatus::Shipped, OrderStatus::Delivered] {
            exec(&mut order, change(id, to)).unwrap();
        }
        let total = order.totals().grand_total;
        exec(&mut order, capture(id, total)).unwrap();

        exec(&mut order, change(id, OrderStatus::Refunded)).unwrap();
        assert_eq!(order.payment_status(), PaymentStatus::Refunded);
        assert!(!order.holds_stock());
        assert!(exec(&mut order, change(id, OrderStatus::Pending)).is_err());
    }

    #[test]
    fn cod_orders_hold_stock_from_placement() {
        let mut order = placed(PaymentMethod::Cod);
        let id = order.id_typed();
        assert!(order.holds_stock());

        exec(&mut order, change(id, OrderStatus::Packed)).unwrap();
        exec(&mut order, change(id, OrderStatus::Cancelled)).unwrap();
        assert!(!order.holds_stock());
        assert!(order.status().is_terminal());
    }

    #[test]
    fn refund_requires_payment() {
        let order = placed(PaymentMethod::Cod);
        let id = order.id_typed();
        let mut order = order;
        for to in [OrderStatus::Packed, OrderStatus::Shipped, OrderStatus::Delivered] {
            exec(&mut order, change(id, to)).unwrap();
        }
        let refund = OrderCommand::RefundPayment(RefundPayment {
            order_id: id,
            refund_id: Some("rfnd_1".into()),
            occurred_at: Utc::now(),
        });
        assert!(order.handle(&refund).is_err());

        let total = order.totals().grand_total;
        exec(&mut order, capture(id, total)).unwrap();
        assert_eq!(order.status(), OrderStatus::Delivered);
        exec(&mut order, refund).unwrap();
        assert_eq!(order.status(), OrderStatus::Refunded);
    }

    #[test]
    fn gateway_order_attaches_once() {
        let mut order = placed(PaymentMethod::Razorpay);
        let id = order.id_typed();
        let attach = |gid: &str| {
            OrderCommand::AttachGatewayOrder(AttachGatewayOrder {
                order_id: id,
                gateway_order_id: gid.into(),
                occurred_at: Utc::now(),
            })
        };
        exec(&mut order, attach("order_A")).unwrap();
        assert!(exec(&mut order, attach("order_A")).unwrap().is_empty());
        assert!(matches!(
            exec(&mut order, attach("order_B")),
            Err(DomainError::Conflict(_))
        ));
        assert_eq!(order.gateway_order_id(), Some("order_A"));

        let cod = placed(PaymentMethod::Cod);
        let cod_id = cod.id_typed();
        assert!(cod
            .handle(&OrderCommand::AttachGatewayOrder(AttachGatewayOrder {
                order_id: cod_id,
                gateway_order_id: "order_C".into(),
                occurred_at: Utc::now(),
            }))
            .is_err());
    }

    #[test]
    fn guest_lookup_needs_matching_email() {
        let order = placed(PaymentMethod::Upi);
        assert!(order.visible_to(None, Some("ASHA@example.com")));
        assert!(!order.visible_to(None, Some("other@example.com")));
        assert!(!order.visible_to(Some(UserId::new()), None));
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let order = placed(PaymentMethod::Razorpay);
        let before = order.clone();
        let _ = order.handle(&capture(order.id_typed(), order.totals().grand_total)).unwrap();
        assert_eq!(order, before);
    }

    #[test]
    fn missing_order_is_not_found() {
        let id = OrderId::new(AggregateId::new());
        let err = Order::empty(id).handle(&change(id, OrderStatus::Cancelled)).unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    proptest! {
        #[test]
        fn apply_is_deterministic(steps in proptest::collection::vec(0usize..6, 0..12), cod in any::<bool>()) {
            let method = if cod { PaymentMethod::Cod } else { PaymentMethod::Razorpay };
            let id = OrderId::new(AggregateId::new());
            let mut live = Order::empty(id);
            let mut history = live.handle(&place_cmd(id, method)).unwrap();
            for e in &history { live.apply(e); }
            let total = live.totals().grand_total;

            let targets = [
                OrderStatus::Packed,
                OrderStatus::Shipped,
                OrderStatus::Delivered,
                OrderStatus::Cancelled,
                OrderStatus::Refunded,
            ];
            for s in steps {
                let cmd = if s == 5 { capture(id, total) } else { change(id, targets[s]) };
                if let Ok(evs) = live.handle(&cmd) {
                    for e in &evs { live.apply(e); }
                    history.extend(evs);
                }
            }

            let mut replayed = Order::empty(id);
            for e in &history { replayed.apply(e); }
            prop_assert_eq!(&replayed, &live);
            prop_assert_eq!(replayed.version(), history.len() as u64);
        }
    }
}
