pub mod key_record;
pub mod timestamp;

pub use key_record::{ExpiryOverflow, KeyDuration, KeyRecord};
