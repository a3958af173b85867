pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod identity;
pub mod state;
pub mod users;

pub use error::{IdentityError, Result};
pub use identity::{IdentityService, Session};
