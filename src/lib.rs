pub mod batch;
pub mod cli;
pub mod config;
pub mod convert;
pub mod discover;
pub mod engine;
pub mod error;
pub mod ocr;
pub mod report;
pub mod scan;
pub mod script;
pub mod staging;
pub mod util;
pub mod validate;
