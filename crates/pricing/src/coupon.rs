use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use inkwell_core::{DomainError, Entity, Money};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CouponKind {
    /// Percentage off the subtotal, in basis points (10% = 1000).
    Percent { basis_points: u32 },
    /// Fixed amount off the subtotal.
    Amount { amount: Money },
}

/// A discount code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub code: String,
    pub kind: CouponKind,
    #[serde(default)]
    pub min_subtotal: Option<Money>,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_redemptions: Option<u32>,
    #[serde(default = "default_per_user_limit")]
    pub per_user_limit: u32,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_per_user_limit() -> u32 {
    1
}

fn default_active() -> bool {
    true
}

impl Entity for Coupon {
    type Id = String;

    fn id(&self) -> &Self::Id {
        &self.code
    }
}

/// How often a coupon has been redeemed so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CouponUsage {
    pub redemptions: u32,
    /// Redemptions by the customer currently checking out.
    pub by_customer: u32,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CouponRejection {
    #[error("coupon code not recognised")]
    Unknown,

    #[error("coupon is no longer active")]
    Inactive,

    #[error("coupon is not valid yet")]
    NotStarted,

    #[error("coupon has expired")]
    Expired,

    #[error("order subtotal must be at least {required}")]
    BelowMinimum { required: Money },

    #[error("coupon has reached its redemption limit")]
    RedemptionLimitReached,

    #[error("you have already used this coupon")]
    PerUserLimitReached,
}

impl Coupon {
    /// Canonical form of a typed code.
    pub fn normalize_code(code: &str) -> String {
        code.trim().to_uppercase()
    }

    /// Normalise and sanity-check a coupon before it is stored.
    pub fn validated(mut self) -> Result<Coupon, DomainError> {
        self.code = Self::normalize_code(&self.code);
        if self.code.is_empty() {
            return Err(DomainError::validation("coupon code cannot be empty"));
        }
        match self.kind {
            CouponKind::Percent { basis_points } if basis_points == 0 || basis_points > 10_000 => {
                return Err(DomainError::validation("percent coupons must be between 0% and 100%"));
            }
            CouponKind::Amount { amount } if amount.is_zero() => {
                return Err(DomainError::validation("amount coupons must be greater than zero"));
            }
            _ => {}
        }
        if let (Some(start), Some(end)) = (self.starts_at, self.ends_at) {
            if end <= start {
                return Err(DomainError::validation("coupon must end after it starts"));
            }
        }
        if self.per_user_limit == 0 {
            return Err(DomainError::validation("per-user limit must be at least 1"));
        }
        Ok(self)
    }

    /// Check whether this coupon applies right now to `subtotal`.
    pub fn check(&self, subtotal: Money, now: DateTime<Utc>, usage: CouponUsage) -> Result<(), CouponRejection> {
        if !self.active {
            return Err(CouponRejection::Inactive);
        }
        if self.starts_at.is_some_and(|s| now < s) {
            return Err(CouponRejection::NotStarted);
        }
        if self.ends_at.is_some_and(|e| now > e) {
            return Err(CouponRejection::Expired);
        }
        if let Some(required) = self.min_subtotal {
            if subtotal < required {
                return Err(CouponRejection::BelowMinimum { required });
            }
        }
        if self.max_redemptions.is_some_and(|max| usage.redemptions >= max) {
            return Err(CouponRejection::RedemptionLimitReached);
        }
        if usage.by_customer >= self.per_user_limit {
            return Err(CouponRejection::PerUserLimitReached);
        }
        Ok(())
    }

    /// Discount on `subtotal`, never more than the subtotal itself.
    pub fn discount_for(&self, subtotal: Money) -> Money {
        let raw = match self.kind {
            CouponKind::Percent { basis_points } => subtotal.percent_of(basis_points),
            CouponKind::Amount { amount } => amount,
        };
        raw.min(subtotal)
    }
}

/// Look up `code` and check it. A missing or blank code means no coupon.
pub fn validate_coupon<'a, U>(
    coupons: &'a [Coupon],
    code: Option<&str>,
    subtotal: Money,
    now: DateTime<Utc>,
    usage_of: U,
) -> Result<Option<&'a Coupon>, CouponRejection>
where
    U: FnOnce(&Coupon) -> CouponUsage,
{
    let Some(code) = code.map(Coupon::normalize_code).filter(|c| !c.is_empty()) else {
        return Ok(None);
    };
    let coupon = coupons
        .iter()
        .find(|c| c.code == code)
        .ok_or(CouponRejection::Unknown)?;

    coupon.check(subtotal, now, usage_of(coupon))?;
    Ok(Some(coupon))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn percent(code: &str, bp: u32) -> Coupon {
        Coupon {
            code: code.to_string(),
            kind: CouponKind::Percent { basis_points: bp },
            min_subtotal: None,
            starts_at: None,
            ends_at: None,
            max_redemptions: None,
            per_user_limit: 1,
            active: true,
        }
    }

    #[test]
    fn lookup_is_case_insensitive_and_blank_means_none() {
        let coupons = vec![percent("WELCOME10", 1_000)];
        let now = Utc::now();
        let sub = Money::from_rupees(500);

        let hit = validate_coupon(&coupons, Some(" welcome10 "), sub, now, |_| CouponUsage::default()).unwrap();
        assert_eq!(hit.map(|c| c.code.as_str()), Some("WELCOME10"));

        assert_eq!(validate_coupon(&coupons, Some("  "), sub, now, |_| CouponUsage::default()), Ok(None));
        assert_eq!(validate_coupon(&coupons, None, sub, now, |_| CouponUsage::default()), Ok(None));
        assert_eq!(
            validate_coupon(&coupons, Some("NOPE"), sub, now, |_| CouponUsage::default()),
            Err(CouponRejection::Unknown)
        );
    }

    #[test]
    fn rejections_in_order() {
        let now = Utc::now();
        let sub = Money::from_rupees(500);
        let none = CouponUsage::default();

        let mut c = percent("X", 500);
        c.active = false;
        assert_eq!(c.check(sub, now, none), Err(CouponRejection::Inactive));

        let mut c = percent("X", 500);
        c.starts_at = Some(now + Duration::days(1));
        assert_eq!(c.check(sub, now, none), Err(CouponRejection::NotStarted));

        let mut c = percent("X", 500);
        c.ends_at = Some(now - Duration::seconds(1));
        assert_eq!(c.check(sub, now, none), Err(CouponRejection::Expired));

        let mut c = percent("X", 500);
        c.min_subtotal = Some(Money::from_rupees(1_000));
        assert_eq!(
            c.check(sub, now, none),
            Err(CouponRejection::BelowMinimum {
                required: Money::from_rupees(1_000)
            })
        );

        let mut c = percent("X", 500);
        c.max_redemptions = Some(3);
        let used = CouponUsage {
            redemptions: 3,
            by_customer: 0,
        };
        assert_eq!(c.check(sub, now, used), Err(CouponRejection::RedemptionLimitReached));

        let c = percent("X", 500);
        let mine = CouponUsage {
            redemptions: 1,
            by_customer: 1,
        };
        assert_eq!(c.check(sub, now, mine), Err(CouponRejection::PerUserLimitReached));
    }

    #[test]
    fn discount_amounts() {
        assert_eq!(
            percent("P", 1_000).discount_for(Money::from_paise(99_999)),
            Money::from_paise(9_999)
        );
        let flat = Coupon {
            kind: CouponKind::Amount {
                amount: Money::from_rupees(200),
            },
            ..percent("A", 1)
        };
        assert_eq!(flat.discount_for(Money::from_rupees(150)), Money::from_rupees(150));
        assert_eq!(flat.discount_for(Money::from_rupees(500)), Money::from_rupees(200));
    }

    #[test]
    fn validated_uppercases_and_rejects_nonsense() {
        let c = percent(" summer ", 2_000).validated().unwrap();
        assert_eq!(c.code, "SUMMER");
        assert!(percent("BAD", 0).validated().is_err());
        assert!(percent("BAD", 10_001).validated().is_err());
        assert!(percent("", 100).validated().is_err());
    }

    proptest! {
        #[test]
        fn discount_never_exceeds_subtotal(sub in 0u64..10_000_000, bp in 1u32..=10_000, amt in 1u64..10_000_000) {
            let sub = Money::from_paise(sub);
            prop_assert!(percent("P", bp).discount_for(sub) <= sub);
            let flat = Coupon { kind: CouponKind::Amount { amount: Money::from_paise(amt) }, ..percent("A", 1) };
            prop_assert!(flat.discount_for(sub) <= sub);
        }
    }
}
