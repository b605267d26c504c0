use std::collections::HashSet;

/// Allow-list of caller credentials.
#[derive(Debug, Clone, Default)]
pub struct CredentialValidator {
    allowed: HashSet<String>,
}

impl CredentialValidator {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { allowed: keys.into_iter().map(Into::into).collect() }
    }

    /// Exact, case-sensitive membership. Empty keys are never valid.
    pub fn is_valid(&self, key: &str) -> bool {
        !key.is_empty() && self.allowed.contains(key)
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_listed_keys_only() {
        let v = CredentialValidator::new(["K1", "K2"]);
        assert!(v.is_valid("K1"));
        assert!(v.is_valid("K2"));
        assert!(!v.is_valid("K3"));
    }

    #[test]
    fn match_is_case_sensitive() {
        let v = CredentialValidator::new(["abc"]);
        assert!(!v.is_valid("ABC"));
        assert!(!v.is_valid("abc "));
    }

    #[test]
    fn empty_key_rejected_even_if_listed() {
        let v = CredentialValidator::new([""]);
        assert!(!v.is_valid(""));
    }
}
