pub mod builder;
pub mod engine;
pub mod extract;
pub mod snapshot;
