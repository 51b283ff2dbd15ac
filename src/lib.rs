pub mod cli;
pub mod config;
pub mod engine;
pub mod normalize;
pub mod pipeline;
pub mod report;
pub mod schedule;
pub mod util;
