pub mod session;
pub mod used_token;
pub mod user;

pub use session::Session;
pub use used_token::UsedToken;
pub use user::{normalize_email, User};
