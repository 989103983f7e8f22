//! API Routes
//!
//! Route handlers organized by entity family.

pub mod campaigns;
pub mod experiments;
pub mod health;
pub mod metrics;
pub mod segments;
