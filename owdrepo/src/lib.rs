pub mod cleanup;
pub mod fetcher;

#[macro_use]
extern crate log;
