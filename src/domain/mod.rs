//! Domain layer: entities, repository contracts and click accounting.
//!
//! - [`entities`] - Link data model
//! - [`repositories`] - Persistence contracts implemented by infrastructure
//! - [`click_event`] - Click event passed from the redirect path
//! - [`click_worker`] - Background click counter
//!
//! # Click Processing Flow
//!
//! 1. The redirect handler resolves a code
//! 2. A [`click_event::ClickEvent`] is offered to a bounded channel (dropped if full)
//! 3. [`click_worker::run_click_worker`] increments the counter with retries
//! 4. Failures are logged and discarded

pub mod click_event;
pub mod click_worker;
pub mod entities;
pub mod repositories;
