pub mod auth_service;
pub mod email_service;
pub mod session_manager;
pub mod token_codec;

pub use auth_service::AuthService;
pub use email_service::{create_email_service, EmailMessage, EmailService};
pub use session_manager::SessionManager;
pub use token_codec::{decode_token, encode_token, TokenCodec, TokenError};
