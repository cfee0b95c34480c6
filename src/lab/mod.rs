//! Labs, providers and lab metadata.
//!
//! These records are fetched elsewhere and only replaced whole here; the
//! enrichment helpers turn them into display-ready views.

mod cache;
mod model;

pub use cache::{LabCacheExt, LabCacheUpdates};
pub use model::{enrich_lab, Lab, LabAttributes, LabMetadata, LabView, MetadataAttribute, Provider};
