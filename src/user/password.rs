use sha2::{Digest, Sha256};

/// Fixed, unsalted digest applied to passwords before they are stored or compared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PasswordDigest {
    #[default]
    Sha256,
}

impl PasswordDigest {
    /// Lowercase hex digest of the UTF-8 password.
    pub fn hash(&self, password: &str) -> String {
        match self {
            PasswordDigest::Sha256 => format!("{:x}", Sha256::digest(password.as_bytes())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_matches_known_vector() {
        assert_eq!(
            PasswordDigest::Sha256.hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn digest_is_fixed_width_hex() {
        let digest = PasswordDigest::default();
        for password in ["", "pw1", "a much longer password with spaces and ünïcödé"] {
            let hashed = digest.hash(password);
            assert_eq!(hashed.len(), 64);
            assert!(hashed.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
        }
    }
}
