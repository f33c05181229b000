mod password;
mod sqlite_user_store;
mod user_store;

pub use password::PasswordDigest;
pub use sqlite_user_store::SqliteUserStore;
pub use user_store::{NewUser, UserStore};
