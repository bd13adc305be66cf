//! Structural invariant checks for ownership maps, registries and exchange plans.

use crate::grid_error::GridError;

/// Types whose internal consistency can be validated on demand.
pub trait DebugInvariants {
    /// Validate invariants and return the first violation found.
    fn validate_invariants(&self) -> Result<(), GridError>;

    /// Panic on the first violation when invariant checking is compiled in.
    fn debug_assert_invariants(&self) {
        if cfg!(any(
            debug_assertions,
            feature = "strict-invariants",
            feature = "check-invariants"
        )) {
            if let Err(e) = self.validate_invariants() {
                panic!("[invariants] {}: {e}", std::any::type_name::<Self>());
            }
        }
    }
}

/// Run `validate_invariants` on a value and panic with context when checking
/// is enabled. Compiles to nothing in release builds without the features.
#[macro_export]
macro_rules! grid_invariants {
    ($value:expr, $($ctx:tt)*) => {
        #[cfg(any(debug_assertions, feature = "strict-invariants", feature = "check-invariants"))]
        if let Err(e) = $crate::debug_invariants::DebugInvariants::validate_invariants(&$value) {
            panic!(concat!("[invariants] ", $($ctx)*, ": {}"), e);
        }
    };
}
