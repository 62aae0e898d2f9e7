use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde_json::Value as JsonValue;
use thiserror::Error;

use inkwell_catalog::{Product, ProductId, ProductListing};
use inkwell_core::{Aggregate, AggregateId, DomainError};
use inkwell_events::{EventEnvelope, InMemoryEventBus};
use inkwell_infra::{
    checkout::{CheckoutService, CheckoutStores},
    command_dispatcher::{CommandDispatcher, DispatchError},
    event_store::{EventStore, EventStoreError, InMemoryEventStore, StoredEvent},
    projections::{
        CatalogProjection, Dashboard, OrderSummary, OrdersProjection, Projection, StockLevel,
        StockProjection, dashboard,
    },
    read_model::{InMemoryReadStore, ReadStore, ReadStoreError},
    workers::{ProjectionWorker, WorkerHandle},
};
use inkwell_inventory::{StockItem, StockItemId};
use inkwell_orders::OrderId;
use inkwell_payments::{PaymentGateway, RazorpayGateway, SimulatedGateway};
use inkwell_storefront::{HomeLayout, NewsletterList, ReviewBook};

use crate::config::{AppConfig, GatewayConfig};

pub type Store = Arc<dyn EventStore>;
pub type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
pub type Dispatcher = CommandDispatcher<Store, Bus>;

type Document<K, V> = Arc<dyn ReadStore<K, V>>;

const HOME_KEY: &str = "home";
const SUBSCRIBERS_KEY: &str = "subscribers";
const REVIEWS_KEY: &str = "reviews";

#[derive(Debug, Error)]
pub enum ServicesError {
    #[error("event store unavailable: {0}")]
    Store(#[from] EventStoreError),

    #[cfg(feature = "postgres")]
    #[error("database connection failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("persistent stores requested but the server was built without the postgres feature")]
    PostgresDisabled,

    #[error("failed to start projection worker: {0}")]
    Worker(#[from] std::io::Error),

    #[error("projection rebuild failed: {0}")]
    Rebuild(String),
}

/// Failure while changing a stored storefront document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] ReadStoreError),
}

/// Everything a handler needs: the write path, the read models and the
/// mutable storefront documents.
///
/// Projections are rebuilt from the full event log at startup and then kept
/// current by one worker thread each.
pub struct AppServices {
    dispatcher: Arc<Dispatcher>,
    pub checkout: CheckoutService<Store, Bus>,
    pub catalog: Arc<CatalogProjection<InMemoryReadStore<ProductId, ProductListing>>>,
    pub orders: Arc<OrdersProjection<InMemoryReadStore<OrderId, OrderSummary>>>,
    pub stock: Arc<StockProjection<InMemoryReadStore<StockItemId, StockLevel>>>,
    home: Document<String, HomeLayout>,
    newsletter: Document<String, NewsletterList>,
    reviews: Document<String, ReviewBook>,
    /// Serialises read-modify-write of the singleton documents.
    documents: Mutex<()>,
    pub products_per_page: u32,
    workers: Vec<WorkerHandle>,
}

struct Documents {
    checkout: CheckoutStores,
    home: Document<String, HomeLayout>,
    newsletter: Document<String, NewsletterList>,
    reviews: Document<String, ReviewBook>,
}

impl Documents {
    fn in_memory() -> Self {
        Self {
            checkout: CheckoutStores::in_memory(),
            home: Arc::new(InMemoryReadStore::new()),
            newsletter: Arc::new(InMemoryReadStore::new()),
            reviews: Arc::new(InMemoryReadStore::new()),
        }
    }
}

pub async fn build_services(config: &AppConfig) -> Result<AppServices, ServicesError> {
    let (store, documents): (Store, Documents) = match &config.database_url {
        Some(url) => persistent_stores(url).await?,
        None => (Arc::new(InMemoryEventStore::new()), Documents::in_memory()),
    };
    let bus: Bus = Arc::new(InMemoryEventBus::new());
    let dispatcher = Arc::new(CommandDispatcher::new(store, bus));

    let gateway: Arc<dyn PaymentGateway> = match &config.gateway {
        GatewayConfig::Simulated => Arc::new(SimulatedGateway::new()),
        GatewayConfig::Razorpay { key_id, key_secret } => {
            Arc::new(RazorpayGateway::new(key_id.clone(), key_secret.clone()))
        }
    };

    AppServices::start(dispatcher, documents, gateway, config)
}

#[cfg(feature = "postgres")]
async fn persistent_stores(url: &str) -> Result<(Store, Documents), ServicesError> {
    use inkwell_infra::event_store::PostgresEventStore;
    use inkwell_infra::read_model::PostgresDocumentStore;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await?;
    let store = PostgresEventStore::new(pool.clone());
    store.migrate().await?;
    tracing::info!("using postgres event and document stores");

    let documents = Documents {
        checkout: CheckoutStores {
            carts: Arc::new(PostgresDocumentStore::new(pool.clone(), "carts")),
            coupons: Arc::new(PostgresDocumentStore::new(pool.clone(), "coupons")),
            redemptions: Arc::new(PostgresDocumentStore::new(pool.clone(), "coupon_redemptions")),
            gateway_orders: Arc::new(PostgresDocumentStore::new(pool.clone(), "gateway_orders")),
        },
        home: Arc::new(PostgresDocumentStore::new(pool.clone(), "home_layout")),
        newsletter: Arc::new(PostgresDocumentStore::new(pool.clone(), "newsletter")),
        reviews: Arc::new(PostgresDocumentStore::new(pool, "reviews")),
    };
    Ok((Arc::new(store), documents))
}

#[cfg(not(feature = "postgres"))]
async fn persistent_stores(_url: &str) -> Result<(Store, Documents), ServicesError> {
    Err(ServicesError::PostgresDisabled)
}

impl AppServices {
    fn start(
        dispatcher: Arc<Dispatcher>,
        documents: Documents,
        gateway: Arc<dyn PaymentGateway>,
        config: &AppConfig,
    ) -> Result<Self, ServicesError> {
        let catalog = Arc::new(CatalogProjection::new(InMemoryReadStore::new()));
        let orders = Arc::new(OrdersProjection::new(InMemoryReadStore::new()));
        let stock = Arc::new(StockProjection::new(InMemoryReadStore::new()));

        let history: Vec<EventEnvelope<JsonValue>> = dispatcher
            .store()
            .load_all()?
            .iter()
            .map(StoredEvent::to_envelope)
            .collect();
        let projections: [Arc<dyn Projection>; 3] = [catalog.clone(), orders.clone(), stock.clone()];
        let mut workers = Vec::with_capacity(projections.len());
        for projection in projections {
            projection
                .rebuild_from_scratch(&history)
                .map_err(|e| ServicesError::Rebuild(format!("{}: {e}", projection.name())))?;
            let name = projection.name();
            workers.push(ProjectionWorker::spawn(name, dispatcher.bus(), move |env: EventEnvelope<JsonValue>| {
                projection.apply_envelope(&env)
            })?);
        }

        let checkout = CheckoutService::new(dispatcher.clone(), documents.checkout, gateway, config.checkout_settings());

        Ok(Self {
            dispatcher,
            checkout,
            catalog,
            orders,
            stock,
            home: documents.home,
            newsletter: documents.newsletter,
            reviews: documents.reviews,
            documents: Mutex::new(()),
            products_per_page: config.products_per_page,
            workers,
        })
    }

    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &'static str,
        command: A::Command,
        make: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: inkwell_events::Event + serde::Serialize + serde::de::DeserializeOwned,
    {
        self.dispatcher.dispatch(aggregate_id, aggregate_type, command, make)
    }

    pub fn load_product(&self, id: ProductId) -> Result<Product, DispatchError> {
        let product = self.checkout.load_product(id)?;
        if !product.exists() {
            return Err(DispatchError::NotFound);
        }
        Ok(product)
    }

    pub fn load_stock(&self, id: ProductId) -> Result<StockItem, DispatchError> {
        self.checkout.load_stock(id)
    }

    pub fn dashboard(&self) -> Dashboard {
        dashboard(Utc::now(), &self.orders.list(), &self.catalog.list(), &self.stock.list())
    }

    fn lock_documents(&self) -> MutexGuard<'_, ()> {
        self.documents.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn home_layout(&self) -> HomeLayout {
        self.home.get(&HOME_KEY.to_string()).unwrap_or_default()
    }

    /// Run `f` against the stored layout and persist the result on success.
    pub fn update_home<T>(
        &self,
        f: impl FnOnce(&mut HomeLayout) -> Result<T, DomainError>,
    ) -> Result<T, DocumentError> {
        let _guard = self.lock_documents();
        let mut layout = self.home_layout();
        let out = f(&mut layout)?;
        self.home.upsert(HOME_KEY.to_string(), layout)?;
        Ok(out)
    }

    pub fn update_newsletter<T>(
        &self,
        f: impl FnOnce(&mut NewsletterList) -> Result<T, DomainError>,
    ) -> Result<T, DocumentError> {
        let _guard = self.lock_documents();
        let key = SUBSCRIBERS_KEY.to_string();
        let mut list = self.newsletter.get(&key).unwrap_or_default();
        let out = f(&mut list)?;
        self.newsletter.upsert(key, list)?;
        Ok(out)
    }

    pub fn reviews(&self) -> ReviewBook {
        self.reviews.get(&REVIEWS_KEY.to_string()).unwrap_or_default()
    }

    pub fn update_reviews<T>(
        &self,
        f: impl FnOnce(&mut ReviewBook) -> Result<T, DomainError>,
    ) -> Result<T, DocumentError> {
        let _guard = self.lock_documents();
        let mut book = self.reviews();
        let out = f(&mut book)?;
        self.reviews.upsert(REVIEWS_KEY.to_string(), book)?;
        Ok(out)
    }
}

impl Drop for AppServices {
    fn drop(&mut self) {
        for worker in self.workers.drain(..) {
            worker.shutdown();
        }
    }
}
