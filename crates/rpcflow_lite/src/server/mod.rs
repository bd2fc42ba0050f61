mod callmap;
mod config;
pub(crate) mod handler;
mod router;

pub use config::RpcRouterConfig;
pub use handler::RequestStream;
pub use router::RpcRouter;
