pub mod aggregator;
pub mod ashby;
pub mod atlas;
pub mod bespoke;
pub mod companies;
pub mod diagnostics;
pub mod enrichment;
pub mod freshness;
pub mod greenhouse;
pub mod lever;
pub mod resolver;
pub mod rippling;
pub mod snapshot;
pub mod types;
pub mod workable;
