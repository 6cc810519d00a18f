pub mod auth_handlers;

pub use auth_handlers::{
    current_session_handler, request_login_handler, signout_handler, verify_handler,
};
