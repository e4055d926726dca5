//! Error types for the filter manager

use thiserror::Error;

/// Lifecycle errors raised by [`crate::FilterManager`].
///
/// Registry misuse (unknown ids) is never an error; see
/// [`crate::FilterManager::uninstall`] and [`crate::FilterManager::get`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FilterManagerError {
    #[error("Filter manager is already running")]
    AlreadyStarted,

    #[error("Filter manager was stopped and cannot be restarted")]
    Stopped,
}
