pub mod config;
pub mod manifest;
pub mod pipeline;

pub use pipeline::Pipeline;
