pub mod backend;
pub mod files;

pub use backend::{CurseForgeBackend, CurseForgeConfig};
pub use files::{FilesResponse, ModFile};
