use near_sdk::{near, require, AccountId, NearToken, Timestamp};

use crate::error::{LendingError, LendingResult};

const NANOS_IN_SEC: u64 = 1_000_000_000;
const SECS_IN_DAY: u64 = 86_400;

/// Smallest principal a borrower may request.
pub const MIN_LENDING_AMOUNT: NearToken = NearToken::from_near(1);

/// Attached when opening a request. Records are never deleted, so the fee
/// stays with the contract to cover the storage of the request and its guard.
pub const REQUEST_STORAGE_FEE: NearToken = NearToken::from_millinear(10);

/// Deployment parameters, fixed for the lifetime of the contract.
#[near(serializers = [json, borsh])]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LendingConfig {
    /// Protocol fee, percent of the principal (or of a listing's ask).
    pub commission_rate: u32,
    /// Collateral the borrower escrows, percent of the principal.
    pub collateral_rate: u32,
    /// Loan term in days, counted from activation.
    pub duration_days: u64,
    /// Receives every commission.
    pub vault_id: AccountId,
}

impl LendingConfig {
    /// Rejects configurations that would make requests unserviceable.
    /// Called once from the init method.
    pub fn validate(&self) {
        require!(self.collateral_rate > 0, "Collateral rate must be positive");
        require!(
            self.commission_rate <= 100,
            "Commission rate cannot exceed 100 percent"
        );
        require!(self.duration_days > 0, "Duration must be at least one day");
    }
}

pub fn days_to_nanos(days: u64) -> LendingResult<u64> {
    days.checked_mul(SECS_IN_DAY)
        .and_then(|secs| secs.checked_mul(NANOS_IN_SEC))
        .ok_or(LendingError::Overflow)
}

/// `amount * rate / 100`, rounding down.
pub fn percent_of(amount: NearToken, rate: u32) -> LendingResult<NearToken> {
    amount
        .checked_mul(u128::from(rate))
        .and_then(|scaled| scaled.checked_div(100))
        .ok_or(LendingError::Overflow)
}

pub fn checked_add(lhs: NearToken, rhs: NearToken) -> LendingResult<NearToken> {
    lhs.checked_add(rhs).ok_or(LendingError::Overflow)
}

pub fn checked_deadline(start: Timestamp, nanos: u64) -> LendingResult<Timestamp> {
    start.checked_add(nanos).ok_or(LendingError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_of_rounds_down_in_yocto() {
        let one = NearToken::from_near(1);
        assert_eq!(percent_of(one, 10).unwrap(), NearToken::from_millinear(100));
        assert_eq!(percent_of(one, 1).unwrap(), NearToken::from_millinear(10));
        assert_eq!(percent_of(one, 200).unwrap(), NearToken::from_near(2));
        assert_eq!(
            percent_of(NearToken::from_yoctonear(99), 1).unwrap(),
            NearToken::from_yoctonear(0)
        );
    }

    #[test]
    fn percent_of_reports_overflow() {
        assert_eq!(
            percent_of(NearToken::from_yoctonear(u128::MAX), 2),
            Err(LendingError::Overflow)
        );
    }

    #[test]
    fn a_year_in_nanoseconds() {
        assert_eq!(days_to_nanos(365).unwrap(), 365 * 86_400 * 1_000_000_000);
        assert_eq!(days_to_nanos(u64::MAX), Err(LendingError::Overflow));
    }

    #[test]
    #[should_panic(expected = "Collateral rate must be positive")]
    fn zero_collateral_rate_is_rejected() {
        LendingConfig {
            commission_rate: 1,
            collateral_rate: 0,
            duration_days: 365,
            vault_id: "vault.near".parse().unwrap(),
        }
        .validate();
    }
}
