pub mod analyzers;
pub mod config;
pub mod error;
pub mod fallback;
pub mod fields;
pub mod model;
pub mod numeric;
pub mod output;
pub mod pipeline;
pub mod store;
