use anyhow::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub email: &'a str,
    pub favorite_animal: &'a str,
}

/// Credential persistence used by the signup and signin commands.
pub trait UserStore: Send + Sync {
    /// Inserts the user if the username is free.
    ///
    /// Returns `Ok(false)` when the username is already taken. Any other storage
    /// failure is an error.
    fn insert_user(&self, user: &NewUser<'_>) -> Result<bool>;

    /// True only if a user with exactly this username and password exists.
    fn validate_user(&self, username: &str, password: &str) -> Result<bool>;
}
