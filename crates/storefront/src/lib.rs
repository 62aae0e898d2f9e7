//! Home page composition, newsletter sign-ups and reader reviews.
//!
//! The home page is an ordered list of configurable sections. Each section
//! type has a small config schema; resolving a section pulls the products it
//! shows from the catalog listing rows.

pub mod layout;
pub mod newsletter;
pub mod resolve;
pub mod reviews;
pub mod schema;
pub mod section;

pub use layout::{HomeLayout, NewSection, SectionUpdate};
pub use newsletter::{normalize_email, validate_email, NewsletterList, Subscriber, SubscribeOutcome};
pub use resolve::{resolve_section, Deal, ProductSource, SectionData, StaffPick};
pub use reviews::{display_name, NewReview, RatingSummary, Review, ReviewBook, ReviewId};
pub use schema::{default_config, validate_section_config, ConfigKind, SectionConfigError};
pub use section::{HomeSection, SectionId, SectionType};
