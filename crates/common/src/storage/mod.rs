pub mod accounts;
pub mod backends;

pub use accounts::{AccountDirectory, AccountDirectoryError, AccountDirectoryStorage};
pub use backends::{UserBackend, UserBackendError, UserBackendStorage};
