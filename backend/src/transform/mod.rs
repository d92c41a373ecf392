//! Transformation module.
//!
//! This module turns intake rows into run outputs:
//! - Normalize: Column renaming and accept/reject partitioning
//! - Reconcile: Insert / alteration / duplicate classification
//! - Pipeline: Main orchestration over sources and sinks

pub mod normalize;
pub mod pipeline;
pub mod reconcile;

pub use normalize::{normalize, partition, Partition};
pub use pipeline::*;
pub use reconcile::{reconcile, same_common_fields, Reconciliation};
