pub mod config;
pub mod encoding;
pub mod error;
pub mod evaluate;
pub mod features;
pub mod forest;
pub mod pipeline;
pub mod record;
pub mod record_store;
pub mod rolling;
pub mod split;
