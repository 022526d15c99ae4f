use std::fmt;

use rand::Rng;

/// Characters secrets are drawn from. No quotes, backslashes or whitespace,
/// so values survive SQL literals and ini files without extra escaping.
pub const ALPHABET: &str =
    "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ!-_:;.,^&";

pub const DB_PASSWORD_LEN: usize = 16;
pub const SECRET_KEY_LEN: usize = 64;

/// A fresh random string of `len` characters from [`ALPHABET`].
pub fn random_string(len: usize) -> String {
    let alphabet = ALPHABET.as_bytes();
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())] as char)
        .collect()
}

/// Credentials minted for one initialise run. Held in memory only; the
/// workflow writes them to the host and prints them once.
#[derive(Clone, PartialEq, Eq)]
pub struct Secrets {
    pub db_password: String,
    pub secret_key: String,
}

impl Secrets {
    pub fn generate() -> Self {
        Self {
            db_password: random_string(DB_PASSWORD_LEN),
            secret_key: random_string(SECRET_KEY_LEN),
        }
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("db_password", &mask(&self.db_password))
            .field("secret_key", &mask(&self.secret_key))
            .finish()
    }
}

/// Show the first 4 characters and hide the rest.
pub fn mask(value: &str) -> String {
    if value.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{}****", value.chars().take(4).collect::<String>())
    }
}
