#![doc = include_str!("../README.md")]

mod error;
mod identity;
mod model;
mod range;
mod reconcile;
mod service;
pub mod store;
pub mod validate;

pub use crate::error::*;
pub use crate::identity::*;
pub use crate::model::*;
pub use crate::range::*;
pub use crate::reconcile::*;
pub use crate::service::*;
pub use crate::store::{InsertOutcome, MemoryStore, StoreHealth, SubscriberStore};
#[cfg(feature = "sqlite")]
pub use crate::store::SqliteStore;
