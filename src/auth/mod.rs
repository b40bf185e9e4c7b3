pub mod cookies;
pub mod gate;
pub mod handlers;
pub mod password;
pub mod session;
pub mod users;

pub use gate::{auth_required, not_auth_required, SessionUser};
pub use session::{IssuedSession, SessionManager};
