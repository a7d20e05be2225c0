//! Alias management: node id ↔ alias directory and the frames of the alias
//! resolution exchange.
pub mod alias_cache;
pub mod alias_resolution;
