//! cafesync core library: incremental café extraction from social media posts.
//!
//! Posts are fetched from the source ([`source`]), new ones are enriched
//! with a store name and address by an LLM ([`extract`]) and coordinates
//! by a geocoder ([`geocode`]), then appended to a flat JSON store
//! ([`store`]). The main entry points live in [`pipeline`]; the
//! incremental diff and enrichment loop is [`sync::Synchronizer`].

pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod geocode;
pub mod http;
pub mod llm;
pub mod pipeline;
pub mod progress;
pub mod refresh;
pub mod source;
pub mod store;
pub mod sync;
pub mod throttle;
pub mod types;
