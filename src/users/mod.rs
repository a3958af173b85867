mod dto;
pub mod handlers;
pub mod memory;
pub mod model;
pub mod pg;
pub mod store;

pub use memory::MemoryUserStore;
pub use model::{NewUser, User, UserPatch};
pub use pg::PgUserStore;
pub use store::{OpContext, UserStore};

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::user_routes()
}
