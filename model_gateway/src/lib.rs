pub mod config;
pub mod llm;
pub mod observability;
pub mod routers;
pub mod server;
