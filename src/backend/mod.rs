pub mod client;
pub mod local;
pub mod types;

pub use client::{BackendApi, HttpBackend, INIT_DATA_HEADER};
pub use local::LocalBackend;
