use crate::lead::normalize_email;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Granted,
    SignInRequired,
    Denied,
}

/// Admin gate. The identity itself comes from the fronting sign-in provider.
#[derive(Debug, Clone, Default)]
pub struct AdminPolicy {
    allowed: Vec<String>,
}

impl AdminPolicy {
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = emails
            .into_iter()
            .map(|email| normalize_email(email.as_ref()))
            .filter(|email| !email.is_empty())
            .collect();

        Self { allowed }
    }

    /// An empty allowlist leaves the dashboard open.
    pub fn is_open(&self) -> bool {
        self.allowed.is_empty()
    }

    pub fn decide(&self, identity: Option<&str>) -> AccessDecision {
        if self.is_open() {
            return AccessDecision::Granted;
        }

        match identity.map(normalize_email).filter(|email| !email.is_empty()) {
            None => AccessDecision::SignInRequired,
            Some(email) if self.allowed.contains(&email) => AccessDecision::Granted,
            Some(_) => AccessDecision::Denied,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AccessDecision, AdminPolicy};

    #[test]
    fn allowlisted_identity_is_granted_case_insensitively() {
        let policy = AdminPolicy::new(["Admin@VisaPal.io"]);

        assert_eq!(policy.decide(Some(" admin@visapal.io")), AccessDecision::Granted);
        assert_eq!(policy.decide(Some("someone@else.com")), AccessDecision::Denied);
        assert_eq!(policy.decide(None), AccessDecision::SignInRequired);
        assert_eq!(policy.decide(Some("  ")), AccessDecision::SignInRequired);
    }

    #[test]
    fn empty_allowlist_is_open() {
        let policy = AdminPolicy::new(Vec::<String>::new());

        assert!(policy.is_open());
        assert_eq!(policy.decide(None), AccessDecision::Granted);
    }
}
