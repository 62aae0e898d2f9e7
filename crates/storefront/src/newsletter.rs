use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use inkwell_core::{DomainError, Entity};

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Accepts `local@domain.tld` with no whitespace.
pub fn validate_email(email: &str) -> Result<(), DomainError> {
    let invalid = || DomainError::validation("please enter a valid email address");
    if email.is_empty() || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    match domain.rsplit_once('.') {
        Some((name, tld)) if !name.is_empty() && !tld.is_empty() => Ok(()),
        _ => Err(invalid()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    pub email: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Subscriber {
    type Id = String;

    fn id(&self) -> &Self::Id {
        &self.email
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscribeOutcome {
    Subscribed,
    Reactivated,
    AlreadySubscribed,
}

impl SubscribeOutcome {
    pub fn message(self) -> &'static str {
        match self {
            Self::Subscribed => "Thanks for subscribing!",
            Self::Reactivated => "Welcome back! Your subscription has been reactivated.",
            Self::AlreadySubscribed => "You're already subscribed.",
        }
    }
}

/// Newsletter subscribers keyed by normalised email.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsletterList {
    subscribers: BTreeMap<String, Subscriber>,
}

impl NewsletterList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, email: &str) -> Option<&Subscriber> {
        self.subscribers.get(&normalize_email(email))
    }

    pub fn active_count(&self) -> usize {
        self.subscribers.values().filter(|s| s.active).count()
    }

    pub fn subscribe(&mut self, email: &str, now: DateTime<Utc>) -> Result<SubscribeOutcome, DomainError> {
        let email = normalize_email(email);
        validate_email(&email)?;

        match self.subscribers.get_mut(&email) {
            Some(existing) if existing.active => Ok(SubscribeOutcome::AlreadySubscribed),
            Some(existing) => {
                existing.active = true;
                existing.updated_at = now;
                Ok(SubscribeOutcome::Reactivated)
            }
            None => {
                self.subscribers.insert(
                    email.clone(),
                    Subscriber {
                        email,
                        active: true,
                        created_at: now,
                        updated_at: now,
                    },
                );
                Ok(SubscribeOutcome::Subscribed)
            }
        }
    }

    /// Returns whether an active subscription was ended.
    pub fn unsubscribe(&mut self, email: &str, now: DateTime<Utc>) -> bool {
        match self.subscribers.get_mut(&normalize_email(email)) {
            Some(existing) if existing.active => {
                existing.active = false;
                existing.updated_at = now;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(validate_email("reader@inkwell.in").is_ok());
        assert!(validate_email("a.b+c@mail.example.com").is_ok());
        for bad in ["", "reader", "reader@", "@inkwell.in", "reader@inkwell", "re ader@inkwell.in", "a@b@c.in", "a@.in"] {
            assert!(validate_email(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn subscribe_lifecycle() {
        let now = Utc::now();
        let mut list = NewsletterList::new();

        assert_eq!(list.subscribe("  Reader@Inkwell.in ", now), Ok(SubscribeOutcome::Subscribed));
        assert_eq!(list.subscribe("reader@inkwell.in", now), Ok(SubscribeOutcome::AlreadySubscribed));
        assert_eq!(list.active_count(), 1);

        assert!(list.unsubscribe("READER@inkwell.in", now));
        assert!(!list.unsubscribe("reader@inkwell.in", now));
        assert_eq!(list.active_count(), 0);

        assert_eq!(list.subscribe("reader@inkwell.in", now), Ok(SubscribeOutcome::Reactivated));
        assert_eq!(list.get("reader@inkwell.in").map(|s| s.active), Some(true));
    }

    #[test]
    fn invalid_email_is_not_stored() {
        let mut list = NewsletterList::new();
        assert!(list.subscribe("nope", Utc::now()).is_err());
        assert_eq!(list.active_count(), 0);
    }
}
