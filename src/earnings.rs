//! Earnings Calculator (Component B, §4.B). Projects raw accruals onto
//! per-account earnings entries as of a given timestamp.

use num_bigint::{BigInt, BigUint};
use num_traits::Signed;

use crate::domain::{parse_biguint, AccountAccrual, Address, Entry};
use crate::error::Result;

/// The canonical seconds-weighted-units -> token-units conversion rate.
fn conversion_divisor() -> BigUint {
    BigUint::from(10u32).pow(18)
}

/// Projects a single accrual row to an `Entry` at projection timestamp `t`,
/// or `None` if the entry would have non-positive `total_earned` (§4.B
/// "Entry emission rule").
pub fn project_entry(accrual: &AccountAccrual, t: i64) -> Result<Option<Entry>> {
    let address = Address::parse(&accrual.account_id)?;

    if let Some(raw) = &accrual.total_rewards_earned {
        let precomputed = parse_biguint("total_rewards_earned", raw)?;
        if precomputed > BigUint::from(0u32) {
            return Ok(Entry::new(address, precomputed));
        }
    }

    let total_earned = project_total_earned(accrual, t)?;
    Ok(Entry::new(address, total_earned))
}

/// Evaluates the literal formula from §4.B:
/// `total_earned = (seconds_accumulated + (t - updated_at) * last_effective_value) / 10^18`
/// using floor division. `delta` is signed; the formula is still evaluated
/// for a negative delta, but the result is clamped to zero rather than
/// allowed to go negative, since `Entry`/`total_earned` are defined as
/// non-negative quantities (§3) and a negative `T` relative to the accrual
/// is a caller error the projection is not responsible for rejecting here.
fn project_total_earned(accrual: &AccountAccrual, t: i64) -> Result<BigUint> {
    let seconds_accumulated = parse_biguint("seconds_accumulated", &accrual.seconds_accumulated)?;
    let last_effective_value =
        parse_biguint("last_effective_value", &accrual.last_effective_value)?;

    let delta = BigInt::from(t) - BigInt::from(accrual.updated_at_timestamp);
    let extra_secs = delta * BigInt::from(last_effective_value);
    let total_secs = BigInt::from(seconds_accumulated) + extra_secs;

    let total_secs = if total_secs.is_negative() {
        BigUint::from(0u32)
    } else {
        total_secs.to_biguint().expect("non-negative BigInt converts to BigUint")
    };

    Ok(total_secs / conversion_divisor())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accrual(
        seconds_accumulated: &str,
        last_effective_value: &str,
        updated_at: i64,
    ) -> AccountAccrual {
        AccountAccrual {
            account_id: "0x742d35Cc6bF8E65f8b95E6c5CB15F5C5D5b8DbC3".to_string(),
            seconds_accumulated: seconds_accumulated.to_string(),
            last_effective_value: last_effective_value.to_string(),
            updated_at_timestamp: updated_at,
            total_rewards_earned: None,
        }
    }

    #[test]
    fn matches_scenario_3_from_the_spec() {
        let a = accrual("439236", "9000000000000000000", 1_752_211_061);
        let entry = project_entry(&a, 1_752_214_661).unwrap().unwrap();
        assert_eq!(entry.total_earned, BigUint::from(32_400u64));
    }

    #[test]
    fn zero_last_effective_value_is_filtered_out() {
        let a = accrual("1000000", "0", 1_752_211_061);
        let entry = project_entry(&a, 1_752_211_061).unwrap();
        assert!(entry.is_none());
    }

    #[test]
    fn precomputed_total_rewards_earned_takes_precedence() {
        let mut a = accrual("0", "0", 1_752_211_061);
        a.total_rewards_earned = Some("42".to_string());
        let entry = project_entry(&a, 1_752_211_061).unwrap().unwrap();
        assert_eq!(entry.total_earned, BigUint::from(42u32));
    }

    #[test]
    fn zero_precomputed_total_rewards_falls_back_to_formula() {
        let mut a = accrual("439236", "9000000000000000000", 1_752_211_061);
        a.total_rewards_earned = Some("0".to_string());
        let entry = project_entry(&a, 1_752_214_661).unwrap().unwrap();
        assert_eq!(entry.total_earned, BigUint::from(32_400u64));
    }

    #[test]
    fn invalid_numeric_string_is_a_calc_input_error() {
        let a = accrual("not-a-number", "0", 0);
        let err = project_entry(&a, 0).unwrap_err();
        assert!(matches!(
            err,
            crate::error::OrchestratorError::CalcInputError { .. }
        ));
    }

    #[test]
    fn delta_at_accruals_own_timestamp_is_exact() {
        let a = accrual("1000000000000000000", "0", 100);
        let entry = project_entry(&a, 100).unwrap().unwrap();
        assert_eq!(entry.total_earned, BigUint::from(1u32));
    }
}
