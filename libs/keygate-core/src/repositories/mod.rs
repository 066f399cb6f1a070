pub mod key_repo;

pub use key_repo::{KeyRepository, KeySnapshot};
