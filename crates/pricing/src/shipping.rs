use serde::{Deserialize, Serialize};

use inkwell_core::Money;

/// Flat shipping by destination, free above a subtotal threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingPolicy {
    pub local_rate: Money,
    pub national_rate: Money,
    pub free_threshold: Money,
    /// Lower-case state names that get the local rate.
    pub local_regions: Vec<String>,
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self {
            local_rate: Money::from_paise(5_000),
            national_rate: Money::from_paise(10_000),
            free_threshold: Money::from_paise(150_000),
            local_regions: vec![
                "jammu and kashmir".to_string(),
                "j&k".to_string(),
                "kashmir".to_string(),
            ],
        }
    }
}

impl ShippingPolicy {
    pub fn is_local(&self, state: &str) -> bool {
        let state = state.trim().to_lowercase();
        self.local_regions.iter().any(|r| *r == state)
    }

    /// Shipping charge for a pre-discount subtotal.
    pub fn charge(&self, subtotal: Money, destination_state: Option<&str>) -> Money {
        if subtotal >= self.free_threshold {
            return Money::ZERO;
        }
        match destination_state {
            Some(state) if self.is_local(state) => self.local_rate,
            _ => self.national_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_national_and_free() {
        let p = ShippingPolicy::default();
        assert_eq!(p.charge(Money::from_rupees(100), Some("Kashmir")), Money::from_paise(5_000));
        assert_eq!(p.charge(Money::from_rupees(100), Some(" J&K ")), Money::from_paise(5_000));
        assert_eq!(p.charge(Money::from_rupees(100), Some("Kerala")), Money::from_paise(10_000));
        assert_eq!(p.charge(Money::from_rupees(100), None), Money::from_paise(10_000));
        assert_eq!(p.charge(Money::from_paise(150_000), Some("Kerala")), Money::ZERO);
    }
}
