pub mod record;
pub mod template;
pub mod document;
pub mod level;
pub mod config;
pub mod env;
pub mod sink;
pub mod backend;
pub mod refresh;
pub mod logger;
pub mod layer;

#[cfg(feature = "elasticsearch")]
pub mod elasticsearch;

pub mod init;
pub mod noop_sink;
