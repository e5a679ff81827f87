pub mod audio;
pub mod auth;
pub mod config;
pub mod registry;
pub mod server;
pub mod store;
mod stream;

pub use callguard_analysis as analysis;
pub use callguard_types as types;

pub use config::Config;
pub use registry::{MessageSink, SessionRegistry};
pub use server::{router, AppState};
