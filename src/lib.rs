pub mod analyzers;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod ingest;
pub mod join;
pub mod loader;
pub mod model;
pub mod normalize;
pub mod output;
pub mod parser;
pub mod personnel;
pub mod pipeline;
pub mod report;
pub mod schema;
pub mod source;
pub mod stats;
pub mod table;
