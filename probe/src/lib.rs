#[macro_use]
extern crate log;

pub mod plan;
pub mod runner;
