//! Hearth User Records
//!
//! Create/read/update/delete for the `users` table over a connection that
//! is already open and bootstrapped. This layer never opens or closes the
//! connection.

mod manager;
mod user;

pub use manager::UserManager;
pub use user::{User, UserId};

pub use hearth_storage::{Result, StoreError};
