//! # Safe Ledger Math
//!
//! Overflow-checked arithmetic for share accounting and allocation planning.
//! All products widen to `u128` before dividing; division always floors, so a
//! sequence of proportional splits can only under-allocate, never over-allocate.

use crate::errors::{VaultError, VaultResult};

/// Macro to generate safe arithmetic functions
macro_rules! safe_arith {
    // Binary operations with checked methods
    ($fn_name:ident, $type:ty, $checked_method:ident, $error:expr) => {
        /// Checked arithmetic with overflow/underflow detection
        pub fn $fn_name(a: $type, b: $type) -> VaultResult<$type> {
            a.$checked_method(b).ok_or($error)
        }
    };

    // Division operations with zero check
    (div, $fn_name:ident, $type:ty) => {
        /// Safe division with zero check
        pub fn $fn_name(a: $type, b: $type) -> VaultResult<$type> {
            if b == 0 {
                return Err(VaultError::DivisionByZero);
            }
            Ok(a / b)
        }
    };
}

safe_arith!(safe_add_u64, u64, checked_add, VaultError::MathOverflow);
safe_arith!(safe_sub_u64, u64, checked_sub, VaultError::MathUnderflow);
safe_arith!(safe_mul_u64, u64, checked_mul, VaultError::MathOverflow);
safe_arith!(div, safe_div_u64, u64);

safe_arith!(safe_add_u128, u128, checked_add, VaultError::MathOverflow);
safe_arith!(safe_sub_u128, u128, checked_sub, VaultError::MathUnderflow);
safe_arith!(safe_mul_u128, u128, checked_mul, VaultError::MathOverflow);
safe_arith!(div, safe_div_u128, u128);

/// Floor of `a * b / denominator` with a u128 intermediate.
///
/// The product of two u64 values always fits in u128, so the only failure
/// modes are a zero denominator and a quotient that does not fit back in u64.
pub fn safe_mul_div_u64(a: u64, b: u64, denominator: u64) -> VaultResult<u64> {
    if denominator == 0 {
        return Err(VaultError::DivisionByZero);
    }
    let result = (a as u128 * b as u128) / denominator as u128;
    u64::try_from(result).map_err(|_| VaultError::MathOverflow)
}

/// Floor share of `amount` expressed in basis points
pub fn safe_bps_share(amount: u64, basis_points: u16) -> VaultResult<u64> {
    if !crate::constants::is_valid_bps(basis_points) {
        return Err(VaultError::PercentageOutOfRange { bps: basis_points });
    }
    safe_mul_div_u64(amount, basis_points as u64, crate::constants::BPS_DENOMINATOR)
}
