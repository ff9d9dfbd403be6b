//! Chain state: versioned collections, ledger elements, and the aggregate
//! that commits them atomically per block.

pub mod account;
pub mod aggregate;
pub mod asset;
pub mod collection;
pub mod element;
pub mod error;
pub mod registration;

pub use account::Account;
pub use aggregate::StateAggregate;
pub use asset::{Asset, AssetId, NATIVE_ASSET_ID};
pub use collection::VersionedCollection;
pub use element::CollectionElement;
pub use error::StateError;
pub use registration::Registration;
