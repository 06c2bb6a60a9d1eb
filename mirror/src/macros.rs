//! Macros for mirror error handling.
//!
//! Provides convenience macros for creating and returning
//! [`crate::error::MirrorError`] instances with reduced boilerplate.

/// Creates a [`crate::error::MirrorError`] from error kind and description.
#[macro_export]
macro_rules! mirror_error {
    ($kind:expr, $desc:expr) => {
        MirrorError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        MirrorError::from(($kind, $desc, $detail.to_string()))
    };
}

/// Creates and returns a [`crate::error::MirrorError`] from the current
/// function.
#[macro_export]
macro_rules! bail {
    ($kind:expr, $desc:expr) => {
        return Err($crate::mirror_error!($kind, $desc))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        return Err($crate::mirror_error!($kind, $desc, $detail))
    };
}
