//! # grpsync Testkit
//!
//! Testing utilities for grpsync.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: A seeded in-memory store pair with a fixed sync window,
//!   plus builders for records on both sides
//! - **Generators**: Proptest strategies for property-based testing
//!
//! ## Test Fixtures
//!
//! Quickly set up a sync scenario:
//!
//! ```rust
//! use grpsync_testkit::fixtures::{remote_contact, SyncFixture};
//!
//! let fixture = SyncFixture::new();
//! let item = remote_contact("Ada", "Lovelace");
//! ```
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use grpsync_testkit::generators::{contact_from_params, ContactParams};
//!
//! proptest! {
//!     #[test]
//!     fn imports_every_contact(params: ContactParams) {
//!         let item = contact_from_params(&params);
//!         // drive a pass against the fixture stores...
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{
    local_appointment, local_contact, local_message, recurring_master, remote_appointment,
    remote_contact, remote_message, window_start, SyncFixture,
};
pub use generators::{
    appointment_from_params, contact_from_params, AppointmentParams, ContactParams,
};
