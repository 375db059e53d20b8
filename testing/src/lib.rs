pub mod manifest;
#[cfg(feature = "mock")]
pub mod mock;
#[cfg(feature = "repo")]
pub mod repo;
