mod error;
mod manager_config;
mod user;
mod user_manager;

pub mod testing;

pub use error::UserManagerError;
pub use manager_config::ManagerConfig;
pub use user::User;
pub use user_manager::{ManagerInternals, UserManager};
