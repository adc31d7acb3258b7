//! Institutional email policy.

use regex::Regex;

use campusid_core::DomainError;

use crate::user::MIN_DISPLAY_NAME_LEN;

pub const DEFAULT_DOMAIN: &str = "auca.kg";

/// Accepts `surname_abbr@domain` and `surname_abbr@alumni.domain`.
///
/// The local part is lowercase letters, one underscore, then one to four
/// lowercase letters.
#[derive(Debug, Clone)]
pub struct EmailPolicy {
    domain: String,
    pattern: Regex,
}

impl EmailPolicy {
    pub fn new(domain: &str) -> Result<Self, DomainError> {
        let domain = domain.trim().trim_start_matches('@').to_ascii_lowercase();
        if domain.is_empty() {
            return Err(DomainError::validation("institutional domain must not be empty"));
        }
        let pattern = Regex::new(&format!(
            r"^[a-z]+_[a-z]{{1,4}}@(?:alumni\.)?{}$",
            regex::escape(&domain)
        ))
        .map_err(|e| DomainError::validation(format!("invalid institutional domain: {e}")))?;

        Ok(Self { domain, pattern })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Canonical form used for storage and lookups.
    pub fn normalize(&self, email: &str) -> String {
        email.trim().to_lowercase()
    }

    pub fn is_institutional(&self, email: &str) -> bool {
        self.pattern.is_match(&self.normalize(email))
    }

    /// Default display name: the part before the underscore, widened to the
    /// whole local part and then the whole address while it is shorter than
    /// [`MIN_DISPLAY_NAME_LEN`].
    pub fn display_name_for(&self, email: &str) -> String {
        let email = self.normalize(email);
        let local = email.split('@').next().unwrap_or_default();
        let surname = local.split('_').next().unwrap_or_default();
        [surname, local, email.as_str()]
            .into_iter()
            .find(|candidate| candidate.chars().count() >= MIN_DISPLAY_NAME_LEN)
            .unwrap_or(email.as_str())
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> EmailPolicy {
        EmailPolicy::new(DEFAULT_DOMAIN).unwrap()
    }

    #[test]
    fn accepts_institutional_addresses() {
        let p = policy();
        for email in [
            "ivanov_a@auca.kg",
            "petrova_ab@auca.kg",
            "smith_abcd@alumni.auca.kg",
            "  Ivanov_A@AUCA.kg ",
        ] {
            assert!(p.is_institutional(email), "{email}");
        }
    }

    #[test]
    fn rejects_everything_else() {
        let p = policy();
        for email in [
            "ivanov@auca.kg",
            "ivanov_abcde@auca.kg",
            "ivanov_a1@auca.kg",
            "_a@auca.kg",
            "ivanov_a@gmail.com",
            "ivanov_a@aucaxkg",
            "ivanov_a@staff.auca.kg",
            "ivanov_a@auca.kg.evil.com",
            "",
        ] {
            assert!(!p.is_institutional(email), "{email}");
        }
    }

    #[test]
    fn domain_is_configurable() {
        let p = EmailPolicy::new("@Example.EDU").unwrap();
        assert_eq!(p.domain(), "example.edu");
        assert!(p.is_institutional("doe_j@example.edu"));
        assert!(p.is_institutional("doe_j@alumni.example.edu"));
        assert!(!p.is_institutional("doe_j@auca.kg"));
    }

    #[test]
    fn empty_domain_is_rejected() {
        assert!(EmailPolicy::new("  ").is_err());
    }

    #[test]
    fn display_name_is_the_surname() {
        assert_eq!(policy().display_name_for("Ivanov_A@auca.kg"), "ivanov");
    }

    #[test]
    fn short_surnames_widen_to_a_valid_display_name() {
        let p = policy();
        assert_eq!(p.display_name_for("abc_a@auca.kg"), "abc_a");
        assert_eq!(p.display_name_for("ab_a@alumni.auca.kg"), "ab_a");
        assert_eq!(p.display_name_for("a_b@auca.kg"), "a_b@auca.kg");
        for email in ["abc_a@auca.kg", "a_b@auca.kg", "ivanov_a@auca.kg"] {
            assert!(crate::user::ProfileUpdate::new(&p.display_name_for(email)).is_ok());
        }
    }
}
