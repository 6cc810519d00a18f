pub mod middleware;

pub use middleware::require_auth;
