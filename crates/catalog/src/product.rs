use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use inkwell_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money};
use inkwell_events::Event;

use crate::slug::{generate_slug, normalize_isbn};

/// Product identifier. The matching stock item uses the same id.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.0
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Draft,
    Active,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "EN")]
    English,
    #[serde(rename = "UR")]
    Urdu,
    #[serde(rename = "HI")]
    Hindi,
    #[serde(rename = "AR")]
    Arabic,
    #[serde(rename = "OTHER")]
    Other,
}

impl Language {
    pub fn parse(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "EN" => Some(Self::English),
            "UR" => Some(Self::Urdu),
            "HI" => Some(Self::Hindi),
            "AR" => Some(Self::Arabic),
            "OTHER" => Some(Self::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BookFormat {
    Paperback,
    #[default]
    Hardcover,
    Other,
}

impl BookFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "paperback" => Some(Self::Paperback),
            "hardcover" => Some(Self::Hardcover),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Selling price of a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub mrp: Money,
    #[serde(default)]
    pub sale: Option<Money>,
    /// GST-style tax in basis points; books are usually zero-rated.
    #[serde(default)]
    pub tax_rate_bp: u32,
}

/// How a price is shown on a product card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceDisplay {
    pub price: Money,
    /// Struck-through MRP, present only when discounted.
    pub mrp: Option<Money>,
    pub discount_pct: u32,
    pub has_discount: bool,
}

impl Price {
    pub fn new(mrp: Money, sale: Option<Money>) -> Self {
        Self {
            mrp,
            sale,
            tax_rate_bp: 0,
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.mrp.is_zero() {
            return Err(DomainError::validation("mrp must be greater than zero"));
        }
        if let Some(sale) = self.sale {
            if sale.is_zero() {
                return Err(DomainError::validation("sale price must be greater than zero"));
            }
            if sale > self.mrp {
                return Err(DomainError::validation("sale price cannot exceed mrp"));
            }
        }
        if self.tax_rate_bp > 10_000 {
            return Err(DomainError::validation("tax rate cannot exceed 100%"));
        }
        Ok(())
    }

    /// What the customer pays per unit.
    pub fn effective(&self) -> Money {
        self.sale.unwrap_or(self.mrp)
    }

    pub fn display(&self) -> PriceDisplay {
        match self.sale {
            Some(sale) if sale < self.mrp => {
                let off = self.mrp.paise() - sale.paise();
                let discount_pct = (off * 100 / self.mrp.paise()) as u32;
                PriceDisplay {
                    price: sale,
                    mrp: Some(self.mrp),
                    discount_pct,
                    has_discount: true,
                }
            }
            _ => PriceDisplay {
                price: self.mrp,
                mrp: None,
                discount_pct: 0,
                has_discount: false,
            },
        }
    }
}

/// Editable descriptive fields of a book.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BookDetails {
    pub title: String,
    /// Left blank to derive from the title.
    #[serde(default)]
    pub slug: String,
    pub sku: String,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub format: BookFormat,
    #[serde(default)]
    pub pages: Option<u32>,
    #[serde(default)]
    pub authors: Vec<String>,
    /// Category slugs.
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub bestseller: bool,
    #[serde(default)]
    pub new_arrival: bool,
}

impl BookDetails {
    /// Trim, derive the slug, normalise the ISBN and reject blanks.
    pub fn normalized(&self) -> Result<BookDetails, DomainError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(DomainError::validation("title cannot be empty"));
        }
        let sku = self.sku.trim().to_string();
        if sku.is_empty() {
            return Err(DomainError::validation("SKU cannot be empty"));
        }

        let slug = if self.slug.trim().is_empty() {
            generate_slug(&title)
        } else {
            generate_slug(&self.slug)
        };
        if slug.is_empty() {
            return Err(DomainError::validation("slug cannot be empty"));
        }

        let isbn = self
            .isbn
            .as_deref()
            .map(normalize_isbn)
            .filter(|s| !s.is_empty());

        let categories = self
            .categories
            .iter()
            .map(|c| generate_slug(c))
            .filter(|c| !c.is_empty())
            .collect();

        Ok(BookDetails {
            title,
            slug,
            sku,
            isbn,
            description: self.description.clone().filter(|d| !d.trim().is_empty()),
            language: self.language,
            format: self.format,
            pages: self.pages,
            authors: self
                .authors
                .iter()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
            categories,
            publisher: self.publisher.clone().filter(|p| !p.trim().is_empty()),
            bestseller: self.bestseller,
            new_arrival: self.new_arrival,
        })
    }
}

/// Aggregate root: Product (a book).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    details: BookDetails,
    price: Option<Price>,
    status: ProductStatus,
    created_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Product {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            details: BookDetails::default(),
            price: None,
            status: ProductStatus::Draft,
            created_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn details(&self) -> &BookDetails {
        &self.details
    }

    pub fn title(&self) -> &str {
        &self.details.title
    }

    pub fn sku(&self) -> &str {
        &self.details.sku
    }

    pub fn slug(&self) -> &str {
        &self.details.slug
    }

    pub fn price(&self) -> Option<&Price> {
        self.price.as_ref()
    }

    pub fn status(&self) -> ProductStatus {
        self.status
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Only active, priced products can be put in a cart.
    pub fn can_be_sold(&self) -> bool {
        self.created && self.status == ProductStatus::Active && self.price.is_some()
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub product_id: ProductId,
    pub details: BookDetails,
    pub price: Option<Price>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDetails {
    pub product_id: ProductId,
    pub details: BookDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetPrice {
    pub product_id: ProductId,
    pub price: Price,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivateProduct {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveProduct {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Active becomes archived; anything else becomes active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleStatus {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    CreateProduct(CreateProduct),
    UpdateDetails(UpdateDetails),
    SetPrice(SetPrice),
    ActivateProduct(ActivateProduct),
    ArchiveProduct(ArchiveProduct),
    ToggleStatus(ToggleStatus),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub product_id: ProductId,
    pub details: BookDetails,
    pub price: Option<Price>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetailsUpdated {
    pub product_id: ProductId,
    pub details: BookDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPriceSet {
    pub product_id: ProductId,
    pub price: Price,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductActivated {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductArchived {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    ProductDetailsUpdated(ProductDetailsUpdated),
    ProductPriceSet(ProductPriceSet),
    ProductActivated(ProductActivated),
    ProductArchived(ProductArchived),
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "catalog.product.created",
            ProductEvent::ProductDetailsUpdated(_) => "catalog.product.details_updated",
            ProductEvent::ProductPriceSet(_) => "catalog.product.price_set",
            ProductEvent::ProductActivated(_) => "catalog.product.activated",
            ProductEvent::ProductArchived(_) => "catalog.product.archived",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::ProductDetailsUpdated(e) => e.occurred_at,
            ProductEvent::ProductPriceSet(e) => e.occurred_at,
            ProductEvent::ProductActivated(e) => e.occurred_at,
            ProductEvent::ProductArchived(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.details = e.details.clone();
                self.price = e.price;
                self.status = ProductStatus::Draft;
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            ProductEvent::ProductDetailsUpdated(e) => {
                self.details = e.details.clone();
            }
            ProductEvent::ProductPriceSet(e) => {
                self.price = Some(e.price);
            }
            ProductEvent::ProductActivated(_) => {
                self.status = ProductStatus::Active;
            }
            ProductEvent::ProductArchived(_) => {
                self.status = ProductStatus::Archived;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::CreateProduct(cmd) => self.handle_create(cmd),
            ProductCommand::UpdateDetails(cmd) => self.handle_update(cmd),
            ProductCommand::SetPrice(cmd) => self.handle_set_price(cmd),
            ProductCommand::ActivateProduct(cmd) => {
                self.handle_activate(cmd.product_id, cmd.occurred_at)
            }
            ProductCommand::ArchiveProduct(cmd) => {
                self.handle_archive(cmd.product_id, cmd.occurred_at)
            }
            ProductCommand::ToggleStatus(cmd) => {
                if self.status == ProductStatus::Active {
                    self.handle_archive(cmd.product_id, cmd.occurred_at)
                } else {
                    self.handle_activate(cmd.product_id, cmd.occurred_at)
                }
            }
        }
    }
}

impl Product {
    fn ensure_exists(&self, product_id: ProductId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn ensure_not_archived(&self) -> Result<(), DomainError> {
        if self.status == ProductStatus::Archived {
            return Err(DomainError::invariant(
                "archived products cannot be modified; activate it first",
            ));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }

        let details = cmd.details.normalized()?;
        if let Some(price) = &cmd.price {
            price.validate()?;
        }

        // Slug and SKU uniqueness are checked against the catalog read model
        // before dispatch; a single stream cannot see its siblings.

        Ok(vec![ProductEvent::ProductCreated(ProductCreated {
            product_id: cmd.product_id,
            details,
            price: cmd.price,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateDetails) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.product_id)?;
        self.ensure_not_archived()?;

        let details = cmd.details.normalized()?;
        if details == self.details {
            return Ok(vec![]);
        }

        Ok(vec![ProductEvent::ProductDetailsUpdated(ProductDetailsUpdated {
            product_id: cmd.product_id,
            details,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_price(&self, cmd: &SetPrice) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.product_id)?;
        self.ensure_not_archived()?;
        cmd.price.validate()?;

        Ok(vec![ProductEvent::ProductPriceSet(ProductPriceSet {
            product_id: cmd.product_id,
            price: cmd.price,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_activate(
        &self,
        product_id: ProductId,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(product_id)?;

        if self.status == ProductStatus::Active {
            return Err(DomainError::conflict("product is already active"));
        }
        if self.price.is_none() {
            return Err(DomainError::invariant("a product needs a price before it can be activated"));
        }

        Ok(vec![ProductEvent::ProductActivated(ProductActivated {
            product_id,
            occurred_at,
        })])
    }

    fn handle_archive(
        &self,
        product_id: ProductId,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(product_id)?;

        if self.status == ProductStatus::Archived {
            return Err(DomainError::conflict("product is already archived"));
        }

        Ok(vec![ProductEvent::ProductArchived(ProductArchived {
            product_id,
            occurred_at,
        })])
    }
}
