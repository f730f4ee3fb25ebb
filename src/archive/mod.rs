pub mod artifacts;
pub mod catalog;
pub mod config;
pub mod event;
pub mod export;
pub mod lock;
pub mod metadata;
pub mod paths;
pub mod pipeline;
pub mod plans;
pub mod relationships;
pub mod render;
pub mod stats;
pub mod store;
pub mod title;
pub mod util;
pub mod warn;
