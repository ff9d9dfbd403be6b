use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StateError;

/// A value stored in a [`VersionedCollection`](crate::VersionedCollection).
///
/// Elements carry a dense index assigned when they are first committed and a
/// version tag checked by [`validate`](CollectionElement::validate). Whether a
/// collection permits deletion at all is a property of the element type, not
/// of individual values.
pub trait CollectionElement: Serialize + DeserializeOwned + Clone {
    /// Whether user-facing deletion is permitted for this element type.
    /// Transition-log rollback bypasses this flag.
    const DELETABLE: bool;

    fn index(&self) -> u64;

    fn set_index(&mut self, index: u64);

    /// Structural validation, run when the element is committed.
    fn validate(&self) -> Result<(), StateError>;
}
