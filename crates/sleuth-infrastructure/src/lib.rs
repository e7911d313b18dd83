//! Infrastructure layer: storage, HTTP transport, paths and configuration.

pub mod config_service;
pub mod http_backend;
pub mod paths;
pub mod storage;

pub use crate::config_service::ConfigService;
pub use crate::http_backend::HttpAnalysisBackend;
pub use crate::paths::SleuthPaths;
pub use crate::storage::{FileKeyValueStore, MemoryKeyValueStore};
