//! API layer - HTTP and WebSocket endpoints

pub mod health;
pub mod middleware;
pub mod router;
pub mod state;
pub mod types;
pub mod v1;
pub mod ws;

pub use router::{create_router, create_router_with_state};
pub use state::AppState;
