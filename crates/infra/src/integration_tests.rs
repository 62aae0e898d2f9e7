//! Integration tests for the full event-sourced pipeline.
//!
//! Tests: Command → EventStore → EventBus → Projection → ReadModel, and the
//! checkout flows that sit on top of it.
//!
//! Verifies:
//! - Product and stock commands join into one storefront listing
//! - Payment capture moves stock exactly once, on either capture path
//! - COD orders hold stock from placement and return it on cancel
//! - A failed online payment can be retried; the cart survives until capture
//! - Refunds of online orders always go through the gateway
//! - Coupon redemptions count against their limits, for guests too
//! - Concurrent cart writes are not lost

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;
    use serde_json::{Value as JsonValue, json};

    use inkwell_catalog::{ActivateProduct, BookDetails, CreateProduct, Price, Product, ProductCommand, ProductId};
    use inkwell_core::{AggregateId, Money, UserId};
    use inkwell_events::{EventEnvelope, InMemoryEventBus};
    use inkwell_inventory::{CreateStockItem, InventoryCommand, StockItem, StockItemId};
    use inkwell_orders::{
        CartOwner, ContactDetails, OrderEvent, OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress,
    };
    use inkwell_payments::{SimulatedGateway, checkout_signature, sign};
    use inkwell_pricing::{Coupon, CouponKind, CouponRejection};

    use crate::checkout::{
        CheckoutError, CheckoutRequest, CheckoutService, CheckoutSettings, CheckoutStores, PaymentInstructions,
        WebhookOutcome,
    };
    use crate::command_dispatcher::{CommandDispatcher, DispatchError};
    use crate::event_store::{EventStore, InMemoryEventStore};
    use crate::projections::{CatalogProjection, Projection};
    use crate::read_model::InMemoryReadStore;
    use crate::workers::ProjectionWorker;

    type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
    type Dispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Bus>;

    const KEY_SECRET: &str = "key-secret";
    const WEBHOOK_SECRET: &str = "hook-secret";

    fn settings() -> CheckoutSettings {
        CheckoutSettings {
            key_secret: KEY_SECRET.to_string(),
            webhook_secret: Some(WEBHOOK_SECRET.to_string()),
            store_name: "Inkwell".to_string(),
            upi_vpa: Some("inkwell@upi".to_string()),
            ..CheckoutSettings::default()
        }
    }

    fn setup() -> (Arc<Dispatcher>, CheckoutService<Arc<InMemoryEventStore>, Bus>) {
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let dispatcher = Arc::new(CommandDispatcher::new(Arc::new(InMemoryEventStore::new()), bus));
        let checkout = CheckoutService::new(
            Arc::clone(&dispatcher),
            CheckoutStores::in_memory(),
            Arc::new(SimulatedGateway::new()),
            settings(),
        );
        (dispatcher, checkout)
    }

    /// Create and activate a book priced at `rupees`, with `on_hand` units when given.
    fn stock_book(dispatcher: &Dispatcher, title: &str, rupees: u64, on_hand: Option<i64>) -> ProductId {
        let product_id = ProductId::new(AggregateId::new());
        let id = product_id.aggregate_id();
        let sku = format!("BK-{}", &id.to_string()[28..]);

        for command in [
            ProductCommand::CreateProduct(CreateProduct {
                product_id,
                details: BookDetails {
                    title: title.to_string(),
                    sku: sku.clone(),
                    categories: vec!["poetry".to_string()],
                    ..BookDetails::default()
                },
                price: Some(Price::new(Money::from_rupees(rupees), None)),
                occurred_at: Utc::now(),
            }),
            ProductCommand::ActivateProduct(ActivateProduct {
                product_id,
                occurred_at: Utc::now(),
            }),
        ] {
            dispatcher
                .dispatch(id, inkwell_catalog::AGGREGATE_TYPE, command, |id| Product::empty(ProductId::new(id)))
                .unwrap();
        }

        if let Some(on_hand) = on_hand {
            dispatcher
                .dispatch(
                    id,
                    inkwell_inventory::AGGREGATE_TYPE,
                    InventoryCommand::CreateStockItem(CreateStockItem {
                        item_id: StockItemId::new(id),
                        sku,
                        on_hand,
                        low_stock_threshold: None,
                        occurred_at: Utc::now(),
                    }),
                    |id| StockItem::empty(StockItemId::new(id)),
                )
                .unwrap();
        }
        product_id
    }

    fn request(method: PaymentMethod, coupon_code: Option<&str>) -> CheckoutRequest {
        CheckoutRequest {
            customer: None,
            contact: ContactDetails {
                email: "reader@inkwell.in".into(),
                phone: "9876543210".into(),
            },
            shipping_address: ShippingAddress {
                name: "Asha Rao".into(),
                line1: "12 Residency Road".into(),
                line2: None,
                city: "Srinagar".into(),
                district: None,
                state: "Jammu and Kashmir".into(),
                pincode: "190001".into(),
                country: "India".into(),
            },
            method,
            coupon_code: coupon_code.map(str::to_string),
            notes: None,
        }
    }

    fn guest(session: &str) -> CartOwner {
        CartOwner::Guest(session.to_string())
    }

    fn gateway_order_id(payment: &PaymentInstructions) -> String {
        match payment {
            PaymentInstructions::Gateway { gateway_order_id, .. } => gateway_order_id.clone(),
            PaymentInstructions::CashOnDelivery => panic!("expected a gateway payment"),
        }
    }

    #[test]
    fn commands_flow_through_bus_into_catalog_listing() {
        let (dispatcher, _) = setup();
        let projection = Arc::new(CatalogProjection::new(InMemoryReadStore::new()));

        let sink = Arc::clone(&projection);
        let worker = ProjectionWorker::spawn("catalog", dispatcher.bus(), move |env: EventEnvelope<JsonValue>| {
            sink.apply_envelope(&env)
        })
        .unwrap();

        let book = stock_book(&dispatcher, "Gitanjali", 250, Some(7));

        let mut listing = None;
        for _ in 0..100 {
            listing = projection.get(book).filter(|l| l.on_hand == 7);
            if listing.is_some() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        worker.shutdown();

        let listing = listing.expect("listing should appear");
        assert_eq!(listing.title, "Gitanjali");
        assert!(listing.is_active());
        assert_eq!(listing.effective_price(), Some(Money::from_rupees(250)));

        let replayed = CatalogProjection::new(InMemoryReadStore::new());
        let history: Vec<_> = dispatcher.store().load_all().unwrap().iter().map(|e| e.to_envelope()).collect();
        replayed.rebuild_from_scratch(&history).unwrap();
        assert_eq!(replayed.get(book), Some(listing));
    }

    #[test]
    fn cart_is_bounded_by_stock() {
        let (dispatcher, checkout) = setup();
        let book = stock_book(&dispatcher, "Gitanjali", 250, Some(2));
        let owner = guest("s1");

        checkout.add_to_cart(&owner, book, 2).unwrap();
        let err = checkout.add_to_cart(&owner, book, 1).unwrap_err();
        assert!(matches!(err, CheckoutError::Dispatch(DispatchError::Validation(_))));
        assert_eq!(checkout.cart(&owner).quantity_of(book), 2);

        let sold_out = stock_book(&dispatcher, "Godan", 300, Some(0));
        assert!(matches!(
            checkout.add_to_cart(&owner, sold_out, 1),
            Err(CheckoutError::Unavailable(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn verified_payment_commits_stock_once() {
        let (dispatcher, checkout) = setup();
        let book = stock_book(&dispatcher, "Gitanjali", 250, Some(3));
        let owner = guest("s1");
        checkout.add_to_cart(&owner, book, 2).unwrap();

        let placed = checkout.place_order(&owner, request(PaymentMethod::Razorpay, None)).await.unwrap();
        // 500 subtotal + 50 local shipping.
        assert_eq!(placed.totals.grand_total, Money::from_rupees(550));
        assert_eq!(checkout.cart(&owner).quantity_of(book), 2);
        assert_eq!(checkout.load_stock(book).unwrap().on_hand(), 3);

        let gw_order = gateway_order_id(&placed.payment);
        let signature = checkout_signature(&gw_order, "pay_1", KEY_SECRET).unwrap();

        let bad = checkout.verify_payment(placed.order_id, &gw_order, "pay_1", "00ff");
        assert!(matches!(bad, Err(CheckoutError::Signature(_))));

        let order = checkout.verify_payment(placed.order_id, &gw_order, "pay_1", &signature).unwrap();
        assert_eq!(order.status(), OrderStatus::Paid);
        assert_eq!(checkout.load_stock(book).unwrap().on_hand(), 1);
        assert!(checkout.cart(&owner).is_empty());

        checkout.verify_payment(placed.order_id, &gw_order, "pay_1", &signature).unwrap();
        assert_eq!(checkout.load_stock(book).unwrap().on_hand(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn webhook_capture_finds_order_by_gateway_id() {
        let (dispatcher, checkout) = setup();
        let book = stock_book(&dispatcher, "Gitanjali", 2000, Some(1));
        let owner = guest("s1");
        checkout.add_to_cart(&owner, book, 1).unwrap();

        let placed = checkout.place_order(&owner, request(PaymentMethod::Upi, None)).await.unwrap();
        let PaymentInstructions::Gateway {
            gateway_order_id,
            upi_url,
            ..
        } = placed.payment.clone()
        else {
            panic!("expected a gateway payment");
        };
        assert!(upi_url.is_some_and(|u| u.starts_with("upi://pay?pa=inkwell%40upi")));

        let body = |paise: u64| {
            json!({
                "event": "payment.captured",
                "payload": { "payment": { "entity": {
                    "id": "pay_hook", "order_id": gateway_order_id, "amount": paise
                }}}
            })
            .to_string()
        };

        let wrong = body(100);
        let sig = sign(WEBHOOK_SECRET, wrong.as_bytes()).unwrap();
        assert!(matches!(
            checkout.handle_webhook(wrong.as_bytes(), Some(&sig)),
            Err(CheckoutError::AmountMismatch { .. })
        ));

        let right = body(placed.totals.grand_total.paise());
        assert!(checkout.handle_webhook(right.as_bytes(), Some("deadbeef")).is_err());

        let sig = sign(WEBHOOK_SECRET, right.as_bytes()).unwrap();
        checkout.handle_webhook(right.as_bytes(), Some(&sig)).unwrap();
        let order = checkout.load_order(placed.order_id).unwrap();
        assert_eq!(order.payment_status(), PaymentStatus::Paid);
        assert_eq!(checkout.load_stock(book).unwrap().on_hand(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cod_holds_stock_until_cancelled() {
        let (dispatcher, checkout) = setup();
        let book = stock_book(&dispatcher, "Godan", 300, Some(5));
        let owner = guest("s1");
        checkout.add_to_cart(&owner, book, 2).unwrap();

        let placed = checkout.place_order(&owner, request(PaymentMethod::Cod, None)).await.unwrap();
        assert_eq!(placed.payment, PaymentInstructions::CashOnDelivery);
        assert_eq!(checkout.load_stock(book).unwrap().on_hand(), 3);

        assert!(checkout.cart(&owner).is_empty());

        let order = checkout.change_status(placed.order_id, OrderStatus::Cancelled).await.unwrap();
        assert_eq!(order.status(), OrderStatus::Cancelled);
        assert_eq!(checkout.load_stock(book).unwrap().on_hand(), 5);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn refund_returns_stock_and_records_gateway_refund() {
        let (dispatcher, checkout) = setup();
        let book = stock_book(&dispatcher, "Gitanjali", 250, Some(4));
        let owner = guest("s1");
        checkout.add_to_cart(&owner, book, 1).unwrap();

        let placed = checkout.place_order(&owner, request(PaymentMethod::Razorpay, None)).await.unwrap();
        checkout.capture(placed.order_id, "pay_9", placed.totals.grand_total).unwrap();
        assert_eq!(checkout.load_stock(book).unwrap().on_hand(), 3);

        let order = checkout.refund(placed.order_id).await.unwrap();
        assert_eq!(order.status(), OrderStatus::Refunded);
        assert_eq!(order.payment_status(), PaymentStatus::Refunded);
        assert_eq!(checkout.load_stock(book).unwrap().on_hand(), 4);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn coupon_counts_against_per_user_limit() {
        let (dispatcher, checkout) = setup();
        let book = stock_book(&dispatcher, "Gitanjali", 1000, None);
        checkout
            .create_coupon(Coupon {
                code: "welcome10".into(),
                kind: CouponKind::Percent { basis_points: 1_000 },
                min_subtotal: None,
                starts_at: None,
                ends_at: None,
                max_redemptions: None,
                per_user_limit: 1,
                active: true,
            })
            .unwrap();

        let customer = UserId::new();
        let owner = CartOwner::Customer(customer);
        checkout.add_to_cart(&owner, book, 1).unwrap();
        let quote = checkout
            .quote(&owner, Some("WELCOME10"), Some("Kerala"), PaymentMethod::Cod)
            .unwrap();
        assert_eq!(quote.totals.discount, Money::from_rupees(100));

        let mut req = request(PaymentMethod::Cod, Some("welcome10"));
        req.customer = Some(customer);
        checkout.place_order(&owner, req.clone()).await.unwrap();
        assert_eq!(checkout.redemptions("WELCOME10").map(|r| r.orders.len()), Some(1));

        checkout.add_to_cart(&owner, book, 1).unwrap();
        let again = checkout.place_order(&owner, req).await;
        assert!(matches!(
            again,
            Err(CheckoutError::Coupon(CouponRejection::PerUserLimitReached))
        ));
    }

    fn signed_webhook(event: &str, gateway_order_id: &str, extra: JsonValue) -> (String, String) {
        let mut entity = json!({ "id": "pay_hook", "order_id": gateway_order_id });
        if let (Some(entity), Some(extra)) = (entity.as_object_mut(), extra.as_object()) {
            entity.extend(extra.clone());
        }
        let body = json!({ "event": event, "payload": { "payment": { "entity": entity } } }).to_string();
        let sig = sign(WEBHOOK_SECRET, body.as_bytes()).unwrap();
        (body, sig)
    }

    fn percent_coupon(code: &str, max_redemptions: Option<u32>, per_user_limit: u32) -> Coupon {
        Coupon {
            code: code.into(),
            kind: CouponKind::Percent { basis_points: 1_000 },
            min_subtotal: None,
            starts_at: None,
            ends_at: None,
            max_redemptions,
            per_user_limit,
            active: true,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_payment_webhook_leaves_order_open_for_retry() {
        let (dispatcher, checkout) = setup();
        let book = stock_book(&dispatcher, "Gitanjali", 250, Some(3));
        let owner = guest("s1");
        checkout.add_to_cart(&owner, book, 1).unwrap();

        let placed = checkout.place_order(&owner, request(PaymentMethod::Upi, None)).await.unwrap();
        let gw_order = gateway_order_id(&placed.payment);

        let (failed, failed_sig) = signed_webhook(
            "payment.failed",
            &gw_order,
            json!({ "error_description": "Payment was unsuccessful" }),
        );
        let outcome = checkout.handle_webhook(failed.as_bytes(), Some(&failed_sig)).unwrap();
        assert_eq!(outcome, WebhookOutcome::Failed { order_id: placed.order_id });

        let order = checkout.load_order(placed.order_id).unwrap();
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.payment_status(), PaymentStatus::Failed);
        assert_eq!(order.failure_reason(), Some("Payment was unsuccessful"));
        assert_eq!(checkout.load_stock(book).unwrap().on_hand(), 3);
        assert_eq!(checkout.cart(&owner).quantity_of(book), 1);

        // The shopper retries and the second attempt succeeds.
        let (captured, sig) = signed_webhook(
            "payment.captured",
            &gw_order,
            json!({ "amount": placed.totals.grand_total.paise() }),
        );
        checkout.handle_webhook(captured.as_bytes(), Some(&sig)).unwrap();
        let order = checkout.load_order(placed.order_id).unwrap();
        assert_eq!(order.status(), OrderStatus::Paid);
        assert_eq!(checkout.load_stock(book).unwrap().on_hand(), 2);
        assert!(checkout.cart(&owner).is_empty());

        // A late failure report cannot undo the capture.
        checkout.handle_webhook(failed.as_bytes(), Some(&failed_sig)).unwrap();
        assert_eq!(checkout.load_order(placed.order_id).unwrap().payment_status(), PaymentStatus::Paid);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn capture_keeps_items_added_after_placement() {
        let (dispatcher, checkout) = setup();
        let book = stock_book(&dispatcher, "Gitanjali", 250, Some(10));
        let other = stock_book(&dispatcher, "Godan", 300, Some(10));
        let owner = guest("s1");
        checkout.add_to_cart(&owner, book, 2).unwrap();

        let placed = checkout.place_order(&owner, request(PaymentMethod::Razorpay, None)).await.unwrap();
        checkout.add_to_cart(&owner, book, 1).unwrap();
        checkout.add_to_cart(&owner, other, 1).unwrap();

        checkout.capture(placed.order_id, "pay_1", placed.totals.grand_total).unwrap();
        let cart = checkout.cart(&owner);
        assert_eq!(cart.quantity_of(book), 1);
        assert_eq!(cart.quantity_of(other), 1);

        // Repeated capture leaves the cart alone.
        checkout.capture(placed.order_id, "pay_1", placed.totals.grand_total).unwrap();
        assert_eq!(checkout.cart(&owner).quantity_of(book), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn refund_by_status_change_calls_the_gateway() {
        let (dispatcher, checkout) = setup();
        let book = stock_book(&dispatcher, "Gitanjali", 250, Some(4));
        let owner = guest("s1");
        checkout.add_to_cart(&owner, book, 1).unwrap();

        let placed = checkout.place_order(&owner, request(PaymentMethod::Razorpay, None)).await.unwrap();
        checkout.capture(placed.order_id, "pay_7", placed.totals.grand_total).unwrap();
        assert_eq!(checkout.load_stock(book).unwrap().on_hand(), 3);

        let order = checkout.change_status(placed.order_id, OrderStatus::Refunded).await.unwrap();
        assert_eq!(order.status(), OrderStatus::Refunded);
        assert_eq!(order.payment_status(), PaymentStatus::Refunded);
        assert_eq!(checkout.load_stock(book).unwrap().on_hand(), 4);

        let refund_ids: Vec<Option<String>> = dispatcher
            .store()
            .load_all()
            .unwrap()
            .into_iter()
            .filter_map(|e| match serde_json::from_value::<OrderEvent>(e.payload) {
                Ok(OrderEvent::OrderRefunded(r)) => Some(r.refund_id),
                _ => None,
            })
            .collect();
        assert_eq!(refund_ids.len(), 1);
        assert!(refund_ids[0].as_deref().is_some_and(|id| id.starts_with("rfnd_sim_")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cod_refund_by_status_change_returns_stock() {
        let (dispatcher, checkout) = setup();
        let book = stock_book(&dispatcher, "Godan", 300, Some(2));
        let owner = guest("s1");
        checkout.add_to_cart(&owner, book, 1).unwrap();

        let placed = checkout.place_order(&owner, request(PaymentMethod::Cod, None)).await.unwrap();
        for to in [OrderStatus::Packed, OrderStatus::Shipped, OrderStatus::Delivered] {
            checkout.change_status(placed.order_id, to).await.unwrap();
        }
        checkout.capture(placed.order_id, "cash", placed.totals.grand_total).unwrap();
        assert_eq!(checkout.load_stock(book).unwrap().on_hand(), 1);

        let order = checkout.change_status(placed.order_id, OrderStatus::Refunded).await.unwrap();
        assert_eq!(order.status(), OrderStatus::Refunded);
        assert_eq!(checkout.load_stock(book).unwrap().on_hand(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn coupon_redemption_limit_spans_orders() {
        let (dispatcher, checkout) = setup();
        let book = stock_book(&dispatcher, "Gitanjali", 1000, None);
        checkout.create_coupon(percent_coupon("launch", Some(2), 1)).unwrap();

        for n in 0..2 {
            let customer = UserId::new();
            let owner = CartOwner::Customer(customer);
            checkout.add_to_cart(&owner, book, 1).unwrap();
            let mut req = request(PaymentMethod::Cod, Some("LAUNCH"));
            req.customer = Some(customer);
            checkout.place_order(&owner, req).await.unwrap();
            assert_eq!(checkout.redemptions("launch").map(|r| r.orders.len()), Some(n + 1));
        }

        let late = CartOwner::Customer(UserId::new());
        checkout.add_to_cart(&late, book, 1).unwrap();
        assert!(matches!(
            checkout.quote(&late, Some("LAUNCH"), Some("Kerala"), PaymentMethod::Cod),
            Err(CheckoutError::Coupon(CouponRejection::RedemptionLimitReached))
        ));

        // An online order only counts once its payment is captured.
        checkout.create_coupon(percent_coupon("online", Some(1), 1)).unwrap();
        let first = guest("a");
        checkout.add_to_cart(&first, book, 1).unwrap();
        let placed = checkout
            .place_order(&first, request(PaymentMethod::Razorpay, Some("ONLINE")))
            .await
            .unwrap();
        assert_eq!(checkout.redemptions("online"), None);
        checkout.capture(placed.order_id, "pay_1", placed.totals.grand_total).unwrap();
        assert_eq!(checkout.redemptions("online").map(|r| r.orders.len()), Some(1));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn guest_coupon_limit_follows_contact_email() {
        let (dispatcher, checkout) = setup();
        let book = stock_book(&dispatcher, "Gitanjali", 1000, None);
        checkout.create_coupon(percent_coupon("welcome10", None, 1)).unwrap();

        let owner = guest("s1");
        checkout.add_to_cart(&owner, book, 1).unwrap();
        let placed = checkout
            .place_order(&owner, request(PaymentMethod::Cod, Some("welcome10")))
            .await
            .unwrap();
        assert_eq!(placed.totals.discount, Money::from_rupees(100));
        let redemptions = checkout.redemptions("WELCOME10").unwrap();
        assert_eq!(redemptions.by_customer.get("reader@inkwell.in"), Some(&1));

        // Same email from a fresh session, typed differently.
        let again = guest("s2");
        checkout.add_to_cart(&again, book, 1).unwrap();
        let mut req = request(PaymentMethod::Cod, Some("welcome10"));
        req.contact.email = " Reader@Inkwell.in".into();
        assert!(matches!(
            checkout.place_order(&again, req).await,
            Err(CheckoutError::Coupon(CouponRejection::PerUserLimitReached))
        ));
        assert_eq!(checkout.cart(&again).quantity_of(book), 1);

        let mut req = request(PaymentMethod::Cod, Some("welcome10"));
        req.contact.email = "friend@inkwell.in".into();
        checkout.place_order(&again, req).await.unwrap();
        assert_eq!(checkout.redemptions("welcome10").map(|r| r.orders.len()), Some(2));
    }

    #[test]
    fn concurrent_cart_adds_are_not_lost() {
        let (dispatcher, checkout) = setup();
        let books: Vec<ProductId> = (0..8)
            .map(|n| stock_book(&dispatcher, &format!("Volume {n}"), 100, None))
            .collect();
        let owner = guest("shared");

        std::thread::scope(|scope| {
            for book in &books {
                let checkout = &checkout;
                let owner = &owner;
                scope.spawn(move || {
                    for _ in 0..5 {
                        checkout.add_to_cart(owner, *book, 1).unwrap();
                    }
                });
            }
        });

        let cart = checkout.cart(&owner);
        assert_eq!(cart.item_count(), books.len());
        for book in &books {
            assert_eq!(cart.quantity_of(*book), 5);
        }
    }

    #[test]
    fn merged_guest_cart_is_removed() {
        let (dispatcher, checkout) = setup();
        let book = stock_book(&dispatcher, "Gitanjali", 100, None);
        let customer = UserId::new();
        checkout.add_to_cart(&guest("s1"), book, 2).unwrap();
        checkout.add_to_cart(&CartOwner::Customer(customer), book, 1).unwrap();

        let cart = checkout.merge_carts("s1", customer).unwrap();
        assert_eq!(cart.quantity_of(book), 3);
        assert!(checkout.cart(&guest("s1")).is_empty());
    }
}
