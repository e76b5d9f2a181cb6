// SPDX-License-Identifier: MIT

//! Data models for the application.

pub mod owner;
pub mod record;

pub use owner::{Owner, OwnerRole};
pub use record::{BrandCounts, Record, RecordKind, RecordStatus};
