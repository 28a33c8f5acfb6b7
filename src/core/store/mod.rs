//! Policy and condition storage
//!
//! - [`ConditionStore`]: arena of condition records keyed by condition id
//! - [`PolicyStore`]: policy records, owner index and the locked view over both

mod conditions;
mod policies;

pub use conditions::ConditionStore;
pub use policies::{PolicySnapshot, PolicyStore};
