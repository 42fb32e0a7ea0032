pub mod handlers;

pub use handlers::{create_router, health_check, import, lookup, AppState};
