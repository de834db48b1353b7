// pdfgate - HTML to PDF conversion service library

pub mod cache;
pub mod config;
pub mod constants;
pub mod convert;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod rate_limit;
pub mod resources;
pub mod server;
pub mod sweeper;
