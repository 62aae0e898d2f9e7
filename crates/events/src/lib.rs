//! Event mechanics shared by every bookstore aggregate.
//!
//! - [`Event`]: what a domain event must expose (type name, schema version, time)
//! - [`EventEnvelope`]: stream metadata wrapped around a payload
//! - [`EventBus`] / [`InMemoryEventBus`]: fan-out of committed envelopes to projections

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
