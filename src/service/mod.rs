//! Service layer module

pub mod interact_service;
pub mod types;

pub use interact_service::InteractService;
pub use types::*;
