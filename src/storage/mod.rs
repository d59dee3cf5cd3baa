mod atomic;
mod lock;

pub use atomic::{write_atomic, write_json};
pub use lock::with_lock;
