pub mod batch;
pub mod classify;
pub mod cli;
pub mod config;
pub mod engine;
pub mod pipeline;
pub mod report;
pub mod s3;
pub mod storage;
pub mod util;
