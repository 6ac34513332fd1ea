//! Account management: snapshots, repository, credential hashing

pub mod credential;
pub mod models;
pub mod repository;

pub use credential::{hash_credential, verify_credential};
pub use models::Account;
pub use repository::AccountRepository;
