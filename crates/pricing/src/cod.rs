//! Cash on delivery rules.

use thiserror::Error;

use inkwell_core::Money;

/// Largest order accepted for cash on delivery (₹50,000).
pub const MAX_COD_AMOUNT: Money = Money::from_paise(5_000_000);

const COD_RATE_BP: u32 = 200;
const MIN_COD_CHARGE: Money = Money::from_paise(2_000);
const MAX_COD_CHARGE: Money = Money::from_paise(10_000);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodUnavailable {
    #[error("COD not available for orders above ₹50,000")]
    AmountTooHigh,

    #[error("COD not available for this location")]
    InvalidPincode,
}

/// COD needs a six-digit Indian pincode and an amount within the cap.
pub fn cod_available(pincode: &str, amount: Money) -> Result<(), CodUnavailable> {
    if amount > MAX_COD_AMOUNT {
        return Err(CodUnavailable::AmountTooHigh);
    }
    let pincode = pincode.trim();
    if pincode.len() != 6 || !pincode.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CodUnavailable::InvalidPincode);
    }
    Ok(())
}

/// 2% of the amount, clamped to ₹20..=₹100.
pub fn cod_charge(amount: Money) -> Money {
    let charge = amount.percent_of(COD_RATE_BP);
    if charge < MIN_COD_CHARGE {
        MIN_COD_CHARGE
    } else if charge > MAX_COD_CHARGE {
        MAX_COD_CHARGE
    } else {
        charge
    }
}
