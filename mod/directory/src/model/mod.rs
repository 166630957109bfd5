mod session;
mod user;

pub use session::{LoginRequest, LoginResponse, Session};
pub use user::{CreateUser, UpdateAuthority, UpdatePermissions, User};
