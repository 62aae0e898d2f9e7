//! Infrastructure layer: event storage, command dispatch, read models,
//! projections and checkout orchestration.

pub mod checkout;
pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod workers;

#[cfg(test)]
mod integration_tests;
