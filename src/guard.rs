use near_sdk::near;

use crate::error::{LendingError, LendingResult};

/// The one-shot actions tracked per request.
#[near(serializers = [json, borsh])]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuardedAction {
    BorrowerCollateralDeposited,
    BorrowerCollateralWithdrawn,
    BorrowerPaid,
    BorrowerClaimed,
    LenderDeposited,
    LenderClaimed,
}

/// One-time flags recording which actions already happened for a request.
///
/// Flags only ever move from `false` to `true`; a second `set_*` is an error.
#[near(serializers = [json, borsh])]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActionGuard {
    borrower_collateral_deposited: bool,
    borrower_collateral_withdrawn: bool,
    borrower_paid: bool,
    // Not consumed by any flow yet, kept so stored records stay stable.
    borrower_claimed: bool,
    lender_deposited: bool,
    lender_claimed: bool,
}

impl ActionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_done(&self, action: GuardedAction) -> bool {
        match action {
            GuardedAction::BorrowerCollateralDeposited => self.borrower_collateral_deposited,
            GuardedAction::BorrowerCollateralWithdrawn => self.borrower_collateral_withdrawn,
            GuardedAction::BorrowerPaid => self.borrower_paid,
            GuardedAction::BorrowerClaimed => self.borrower_claimed,
            GuardedAction::LenderDeposited => self.lender_deposited,
            GuardedAction::LenderClaimed => self.lender_claimed,
        }
    }

    /// Fails with `AlreadyDone` when `action` has been recorded.
    pub fn ensure_pending(&self, action: GuardedAction) -> LendingResult<()> {
        if self.is_done(action) {
            return Err(LendingError::AlreadyDone(action));
        }
        Ok(())
    }

    fn mark(&mut self, action: GuardedAction) -> LendingResult<()> {
        self.ensure_pending(action)?;
        let flag = match action {
            GuardedAction::BorrowerCollateralDeposited => &mut self.borrower_collateral_deposited,
            GuardedAction::BorrowerCollateralWithdrawn => &mut self.borrower_collateral_withdrawn,
            GuardedAction::BorrowerPaid => &mut self.borrower_paid,
            GuardedAction::BorrowerClaimed => &mut self.borrower_claimed,
            GuardedAction::LenderDeposited => &mut self.lender_deposited,
            GuardedAction::LenderClaimed => &mut self.lender_claimed,
        };
        *flag = true;
        Ok(())
    }

    pub fn set_borrower_collateral_deposited(&mut self) -> LendingResult<()> {
        self.mark(GuardedAction::BorrowerCollateralDeposited)
    }

    pub fn set_borrower_collateral_withdrawn(&mut self) -> LendingResult<()> {
        self.mark(GuardedAction::BorrowerCollateralWithdrawn)
    }

    pub fn set_borrower_paid(&mut self) -> LendingResult<()> {
        self.mark(GuardedAction::BorrowerPaid)
    }

    pub fn set_borrower_claimed(&mut self) -> LendingResult<()> {
        self.mark(GuardedAction::BorrowerClaimed)
    }

    pub fn set_lender_deposited(&mut self) -> LendingResult<()> {
        self.mark(GuardedAction::LenderDeposited)
    }

    pub fn set_lender_claimed(&mut self) -> LendingResult<()> {
        self.mark(GuardedAction::LenderClaimed)
    }

    pub fn borrower_collateral_deposited(&self) -> bool {
        self.borrower_collateral_deposited
    }

    pub fn borrower_collateral_withdrawn(&self) -> bool {
        self.borrower_collateral_withdrawn
    }

    pub fn borrower_paid(&self) -> bool {
        self.borrower_paid
    }

    pub fn borrower_claimed(&self) -> bool {
        self.borrower_claimed
    }

    pub fn lender_deposited(&self) -> bool {
        self.lender_deposited
    }

    pub fn lender_claimed(&self) -> bool {
        self.lender_claimed
    }

    /// Both sides have funded the request.
    pub fn both_deposited(&self) -> bool {
        self.borrower_collateral_deposited && self.lender_deposited
    }
}
