//! Publication streamer library
//!
//! Parses heterogeneous publication packages (EPUB containers, zipped
//! audiobooks, standalone files) into a canonical Web Publication model and
//! serves manifests plus byte-ranged resources over HTTP.
//!
//! # Modules
//!
//! - `model`: format-agnostic publication model (manifest, links, encryption)
//! - `parser`: format detection and the ordered parser chain
//! - `fetcher`: resource access over archives, files and memory
//! - `server`: prefix → publication registry
//! - `routes`: the HTTP surface

pub mod config;
pub mod drm;
pub mod error;
pub mod fetcher;
pub mod model;
pub mod parser;
pub mod routes;
pub mod server;
pub mod state;
