pub mod backends;
pub mod format;
pub mod sync;
