//! Booking cache synchronization and composed mutations for a remote-lab
//! marketplace.
//!
//! The crate keeps a keyed query cache coherent with on-chain and off-chain
//! state, and runs multi-step marketplace workflows (booking, cancelling,
//! rescheduling, listing labs, registering providers) as composed mutations
//! that unwind their compensations in reverse when a step fails.

pub mod booking;
pub mod cache;
pub mod config;
pub mod keys;
pub mod lab;
pub mod mutation;
pub mod ports;
pub mod workflows;

pub use booking::{Booking, BookingCacheExt, BookingPatch, BookingStatus};
pub use cache::{CacheError, InMemoryQueryCache, QueryCache, QueryCacheExt};
pub use config::{ConfigError, SyncConfig};
pub use keys::QueryKey;
pub use lab::{Lab, LabCacheExt, LabMetadata, Provider};
pub use mutation::{
    Compensation, ComposedMutation, ComposedMutationError, MutationOutcome, Step, StepError,
};
pub use ports::{ApiClient, ContractWriter, Notification, Notifier, Ports, TxReceipt};
pub use workflows::Channel;
