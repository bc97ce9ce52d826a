//! Repository traits for data access.
//!
//! Abstractions over storage implementations, allowing business logic
//! to remain independent of database and counter backends.

pub mod counter_store;
pub mod link_repository;

pub use counter_store::CounterStore;
pub use link_repository::LinkRepository;

#[cfg(test)]
pub use counter_store::MockCounterStore;
#[cfg(test)]
pub use link_repository::MockLinkRepository;
