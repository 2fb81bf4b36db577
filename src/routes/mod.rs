//! Route modules for the publication streamer

pub mod health;
pub mod publications;
