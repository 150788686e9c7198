mod account;
pub mod config;
pub mod storage;

pub use account::{Account, AccountId};
