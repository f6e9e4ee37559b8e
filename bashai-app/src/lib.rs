pub mod config;
pub mod render;
pub mod repl;
pub mod session;

pub use config::AppConfig;
pub use session::Session;
