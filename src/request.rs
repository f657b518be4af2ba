use near_sdk::{near, AccountId, NearToken, Timestamp};

use crate::config::{checked_add, checked_deadline, days_to_nanos, percent_of, LendingConfig};
use crate::error::{LendingError, LendingResult};

/// Identifier shared by a request, its action guard and its claim token.
pub type RequestId = u64;

#[near(serializers = [json, borsh])]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestStatus {
    Initialized,
    Pending,
    Ready,
    Active,
    Completed,
    Cancelled,
}

impl RequestStatus {
    /// Neither deposit round is over yet.
    pub fn accepts_deposits(self) -> bool {
        matches!(self, RequestStatus::Initialized | RequestStatus::Pending)
    }
}

/// A single lending agreement.
///
/// All amounts are derived once, at creation, from the principal and the rates
/// in force at that moment. Only `collateral_amount` may change afterwards,
/// through the one-time write-down on default.
#[near(serializers = [json, borsh])]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LendingRequest {
    pub id: RequestId,
    pub status: RequestStatus,

    pub amount: NearToken,
    pub interest_amount: NearToken,
    pub commission_amount: NearToken,
    pub collateral_amount: NearToken,
    pub total_amount: NearToken,

    pub duration: u64, // days
    pub created_at: Timestamp,
    pub start_date: Timestamp,
    pub maturity_date: Timestamp,

    pub borrower_id: AccountId,
    pub lender_id: Option<AccountId>,
}

impl LendingRequest {
    pub fn new(
        id: RequestId,
        borrower_id: AccountId,
        amount: NearToken,
        interest_rate: u32,
        config: &LendingConfig,
        created_at: Timestamp,
    ) -> LendingResult<Self> {
        let interest_amount = percent_of(amount, interest_rate)?;
        let commission_amount = percent_of(amount, config.commission_rate)?;
        let collateral_amount = percent_of(amount, config.collateral_rate)?;
        let total_amount = checked_add(checked_add(amount, interest_amount)?, commission_amount)?;

        Ok(Self {
            id,
            status: RequestStatus::Initialized,
            amount,
            interest_amount,
            commission_amount,
            collateral_amount,
            total_amount,
            duration: config.duration_days,
            created_at,
            start_date: 0,
            maturity_date: 0,
            borrower_id,
            lender_id: None,
        })
    }

    /// Moves one step along Initialized → Pending → Ready → Active → Completed.
    ///
    /// From `Completed` or `Cancelled` this does nothing; only
    /// [`cancel_request`](Self::cancel_request) reaches `Cancelled`.
    pub fn next_status(&mut self) {
        self.status = match self.status {
            RequestStatus::Initialized => RequestStatus::Pending,
            RequestStatus::Pending => RequestStatus::Ready,
            RequestStatus::Ready => RequestStatus::Active,
            RequestStatus::Active => RequestStatus::Completed,
            terminal => terminal,
        };
    }

    /// Sets `Cancelled` from any status. Callers decide when this is allowed.
    pub fn cancel_request(&mut self) {
        self.status = RequestStatus::Cancelled;
    }

    /// Starts the loan term at `now`. Calling it again restarts the term.
    pub fn activate(&mut self, now: Timestamp) -> LendingResult<()> {
        let maturity_date = checked_deadline(now, days_to_nanos(self.duration)?)?;
        self.start_date = now;
        self.maturity_date = maturity_date;
        Ok(())
    }

    pub fn set_lender(&mut self, lender_id: AccountId) {
        self.lender_id = Some(lender_id);
    }

    pub fn has_lender(&self) -> bool {
        self.lender_id.is_some()
    }

    pub fn is_borrower(&self, account_id: &AccountId) -> bool {
        &self.borrower_id == account_id
    }

    /// Forfeits `total_amount` of the collateral toward the claim payout.
    pub fn update_collateral_amount(&mut self) -> LendingResult<()> {
        self.collateral_amount = self
            .collateral_amount
            .checked_sub(self.total_amount)
            .ok_or(LendingError::Underflow {
                collateral: self.collateral_amount.as_yoctonear(),
                total: self.total_amount.as_yoctonear(),
            })?;
        Ok(())
    }

    pub fn is_matured(&self, now: Timestamp) -> bool {
        now > self.maturity_date
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LendingConfig {
        LendingConfig {
            commission_rate: 1,
            collateral_rate: 200,
            duration_days: 365,
            vault_id: "vault.near".parse().unwrap(),
        }
    }

    fn request() -> LendingRequest {
        LendingRequest::new(
            1,
            "borrower.near".parse().unwrap(),
            NearToken::from_near(1),
            10,
            &config(),
            42,
        )
        .unwrap()
    }

    #[test]
    fn derives_amounts_from_rates() {
        let request = request();
        assert_eq!(request.status, RequestStatus::Initialized);
        assert_eq!(request.interest_amount, NearToken::from_millinear(100));
        assert_eq!(request.commission_amount, NearToken::from_millinear(10));
        assert_eq!(request.collateral_amount, NearToken::from_near(2));
        assert_eq!(request.total_amount, NearToken::from_millinear(1_110));
        assert_eq!(request.duration, 365);
        assert_eq!(request.created_at, 42);
        assert_eq!((request.start_date, request.maturity_date), (0, 0));
        assert!(!request.has_lender());
    }

    #[test]
    fn walks_the_linear_chain_then_stops() {
        let mut request = request();
        let expected = [
            RequestStatus::Pending,
            RequestStatus::Ready,
            RequestStatus::Active,
            RequestStatus::Completed,
            RequestStatus::Completed,
        ];
        for status in expected {
            request.next_status();
            assert_eq!(request.status, status);
        }
    }

    #[test]
    fn next_status_does_not_leave_cancelled() {
        let mut request = request();
        request.cancel_request();
        request.next_status();
        assert_eq!(request.status, RequestStatus::Cancelled);
    }

    #[test]
    fn cancel_request_applies_from_any_status() {
        let mut request = request();
        for _ in 0..4 {
            request.next_status();
        }
        assert_eq!(request.status, RequestStatus::Completed);
        request.cancel_request();
        assert_eq!(request.status, RequestStatus::Cancelled);
    }

    #[test]
    fn activation_sets_the_term() {
        let mut request = request();
        let now = 1_700_000_000_000_000_000;
        request.activate(now).unwrap();
        assert_eq!(request.start_date, now);
        assert_eq!(
            request.maturity_date,
            now + 365 * 86_400 * 1_000_000_000
        );
        assert!(!request.is_matured(now));
        assert!(!request.is_matured(request.maturity_date));
        assert!(request.is_matured(request.maturity_date + 1));
    }

    #[test]
    fn collateral_write_down_happens_once() {
        let mut request = request();
        request.update_collateral_amount().unwrap();
        assert_eq!(request.collateral_amount, NearToken::from_millinear(890));
        assert_eq!(request.total_amount, NearToken::from_millinear(1_110));

        assert_eq!(
            request.update_collateral_amount(),
            Err(LendingError::Underflow {
                collateral: NearToken::from_millinear(890).as_yoctonear(),
                total: NearToken::from_millinear(1_110).as_yoctonear(),
            })
        );
        assert_eq!(request.collateral_amount, NearToken::from_millinear(890));
    }
}
