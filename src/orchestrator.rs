use near_sdk::{near, AccountId, NearToken};

use crate::book::RequestBook;
use crate::claims::ClaimLedger;
use crate::config::{LendingConfig, MIN_LENDING_AMOUNT, REQUEST_STORAGE_FEE};
use crate::context::CallContext;
use crate::custody::Custody;
use crate::error::{LendingError, LendingResult};
use crate::events::{log_lending_event, log_status_changed};
use crate::guard::{ActionGuard, GuardedAction};
use crate::request::{LendingRequest, RequestId, RequestStatus};

/// Sequences deposits, activation, repayment and claims for every request.
///
/// Each operation works on copies of the request and its guard. Payouts are
/// queued and claim tokens moved before the copies are committed, so an error
/// from any step leaves the book untouched. Queued payouts only leave the
/// contract after the call returns.
#[near(serializers = [borsh])]
pub struct LendingOrchestrator {
    config: LendingConfig,
    book: RequestBook,
}

fn ensure_borrower(request: &LendingRequest, caller: &AccountId) -> LendingResult<()> {
    if !request.is_borrower(caller) {
        return Err(LendingError::Unauthorized(caller.clone()));
    }
    Ok(())
}

fn ensure_payment(ctx: &CallContext, expected: NearToken) -> LendingResult<()> {
    if ctx.attached != expected {
        return Err(LendingError::AmountMismatch {
            expected: expected.as_yoctonear(),
            attached: ctx.attached.as_yoctonear(),
        });
    }
    Ok(())
}

impl LendingOrchestrator {
    pub fn new(config: LendingConfig) -> Self {
        Self {
            config,
            book: RequestBook::new(),
        }
    }

    pub fn config(&self) -> &LendingConfig {
        &self.config
    }

    pub fn book(&self) -> &RequestBook {
        &self.book
    }

    pub fn request(&self, id: RequestId) -> LendingResult<&LendingRequest> {
        self.book.request(id)
    }

    pub fn guard(&self, id: RequestId) -> LendingResult<&ActionGuard> {
        self.book.guard(id)
    }

    pub fn request_crypto_lending(
        &mut self,
        ctx: &CallContext,
        amount: NearToken,
        interest_rate: u32,
    ) -> LendingResult<RequestId> {
        if amount < MIN_LENDING_AMOUNT {
            return Err(LendingError::InvalidArgument(
                "requested amount is below one NEAR",
            ));
        }
        if interest_rate == 0 {
            return Err(LendingError::InvalidArgument(
                "interest rate must be positive",
            ));
        }
        ensure_payment(ctx, REQUEST_STORAGE_FEE)?;

        let id = self.book.next_id();
        let request = LendingRequest::new(
            id,
            ctx.caller.clone(),
            amount,
            interest_rate,
            &self.config,
            ctx.now,
        )?;
        self.book.open(request);

        log_lending_event("REQUESTED", id, &ctx.caller, amount);
        Ok(id)
    }

    /// Borrower escrows the collateral. The attached deposit must match it
    /// exactly.
    pub fn borrower_collateral(
        &mut self,
        ctx: &CallContext,
        id: RequestId,
    ) -> LendingResult<RequestStatus> {
        let (mut request, mut guard) = self.book.load(id)?;
        if !request.status.accepts_deposits() {
            return Err(LendingError::InvalidState(
                "collateral is only accepted before the request is funded",
            ));
        }
        ensure_borrower(&request, &ctx.caller)?;
        guard.ensure_pending(GuardedAction::BorrowerCollateralDeposited)?;
        ensure_payment(ctx, request.collateral_amount)?;

        guard.set_borrower_collateral_deposited()?;
        request.next_status();
        let status = request.status;
        self.book.commit(request, guard);

        log_lending_event("COLLATERAL_DEPOSITED", id, &ctx.caller, ctx.attached);
        log_status_changed(id, status);
        Ok(status)
    }

    /// Any account but the borrower supplies the principal and becomes the
    /// lender.
    pub fn lender_deposit(
        &mut self,
        ctx: &CallContext,
        id: RequestId,
    ) -> LendingResult<RequestStatus> {
        let (mut request, mut guard) = self.book.load(id)?;
        if !request.status.accepts_deposits() {
            return Err(LendingError::InvalidState(
                "principal is only accepted before the request is funded",
            ));
        }
        if request.has_lender() {
            return Err(LendingError::InvalidState(
                "a lender has already funded this request",
            ));
        }
        if request.is_borrower(&ctx.caller) {
            return Err(LendingError::Unauthorized(ctx.caller.clone()));
        }
        ensure_payment(ctx, request.amount)?;

        guard.set_lender_deposited()?;
        request.set_lender(ctx.caller.clone());
        request.next_status();
        let status = request.status;
        self.book.commit(request, guard);

        log_lending_event("PRINCIPAL_DEPOSITED", id, &ctx.caller, ctx.attached);
        log_status_changed(id, status);
        Ok(status)
    }

    /// Borrower starts the loan: the principal is released to them and the
    /// lender receives the claim token.
    pub fn borrower_active_crypto_lending<L: ClaimLedger, C: Custody>(
        &mut self,
        ctx: &CallContext,
        id: RequestId,
        claims: &mut L,
        custody: &mut C,
    ) -> LendingResult<RequestStatus> {
        let (mut request, guard) = self.book.load(id)?;
        ensure_borrower(&request, &ctx.caller)?;
        if request.status == RequestStatus::Cancelled {
            return Err(LendingError::InvalidState("request was cancelled"));
        }
        if request.status != RequestStatus::Ready || !guard.both_deposited() {
            return Err(LendingError::InvalidState(
                "both deposits must land before activation",
            ));
        }
        let lender_id = request
            .lender_id
            .clone()
            .ok_or(LendingError::InvalidState("request has no lender"))?;

        if claims.owner_of(id).is_ok() {
            return Err(LendingError::InvalidState("claim token already minted"));
        }

        request.next_status();
        request.activate(ctx.now)?;
        let status = request.status;
        let principal = request.amount;
        let borrower_id = request.borrower_id.clone();

        custody.send(&borrower_id, principal)?;
        claims.mint(&lender_id, id)?;
        self.book.commit(request, guard);

        log_lending_event("ACTIVATED", id, &borrower_id, principal);
        log_status_changed(id, status);
        Ok(status)
    }

    /// Borrower repays principal, interest and commission before maturity and
    /// gets the collateral back in the same call.
    pub fn borrower_repay_amount<C: Custody>(
        &mut self,
        ctx: &CallContext,
        id: RequestId,
        custody: &mut C,
    ) -> LendingResult<RequestStatus> {
        let (mut request, mut guard) = self.book.load(id)?;
        ensure_borrower(&request, &ctx.caller)?;
        if request.status != RequestStatus::Active {
            return Err(LendingError::InvalidState("only active loans can be repaid"));
        }
        if ctx.now >= request.maturity_date {
            return Err(LendingError::InvalidState("loan has reached maturity"));
        }
        ensure_payment(ctx, request.total_amount)?;

        guard.set_borrower_paid()?;
        guard.set_borrower_collateral_withdrawn()?;
        request.next_status();
        let status = request.status;
        let collateral = request.collateral_amount;
        let borrower_id = request.borrower_id.clone();

        custody.send(&borrower_id, collateral)?;
        self.book.commit(request, guard);

        log_lending_event("REPAID", id, &borrower_id, ctx.attached);
        log_status_changed(id, status);
        Ok(status)
    }

    /// Current claim holder collects `total - commission`; the vault gets the
    /// commission and the claim token is burned.
    ///
    /// Allowed once the loan is completed, or once it has matured unpaid. In
    /// the unpaid case the payout is carved out of the collateral.
    pub fn lender_claim_amount<L: ClaimLedger, C: Custody>(
        &mut self,
        ctx: &CallContext,
        id: RequestId,
        claims: &mut L,
        custody: &mut C,
    ) -> LendingResult<RequestStatus> {
        let (mut request, mut guard) = self.book.load(id)?;
        guard.ensure_pending(GuardedAction::LenderClaimed)?;
        let holder = claims.owner_of(id)?;
        if holder != ctx.caller {
            return Err(LendingError::Unauthorized(ctx.caller.clone()));
        }
        if request.status != RequestStatus::Completed && !request.is_matured(ctx.now) {
            return Err(LendingError::InvalidState(
                "loan is neither repaid nor past maturity",
            ));
        }

        if !guard.borrower_paid() {
            request.update_collateral_amount()?;
        }
        guard.set_lender_claimed()?;
        request.next_status();
        let status = request.status;
        let commission = request.commission_amount;
        let payout = request
            .total_amount
            .checked_sub(commission)
            .ok_or(LendingError::Overflow)?;

        custody.send_all(&[
            (holder.clone(), payout),
            (self.config.vault_id.clone(), commission),
        ])?;
        claims.burn(id)?;
        self.book.commit(request, guard);

        log_lending_event("CLAIMED", id, &holder, payout);
        log_status_changed(id, status);
        Ok(status)
    }

    /// Borrower takes back whatever collateral is left once the loan is
    /// completed.
    pub fn withdraw_collateral<C: Custody>(
        &mut self,
        ctx: &CallContext,
        id: RequestId,
        custody: &mut C,
    ) -> LendingResult<NearToken> {
        let (request, mut guard) = self.book.load(id)?;
        ensure_borrower(&request, &ctx.caller)?;
        guard.ensure_pending(GuardedAction::BorrowerCollateralWithdrawn)?;
        if request.status != RequestStatus::Completed {
            return Err(LendingError::InvalidState(
                "collateral is locked until the loan completes",
            ));
        }

        guard.set_borrower_collateral_withdrawn()?;
        let collateral = request.collateral_amount;
        let borrower_id = request.borrower_id.clone();

        custody.send(&borrower_id, collateral)?;
        self.book.commit(request, guard);

        log_lending_event("COLLATERAL_WITHDRAWN", id, &borrower_id, collateral);
        Ok(collateral)
    }

    /// Borrower abandons a request that is not fully funded. Whatever either
    /// side already deposited goes back to them.
    pub fn borrower_cancel_request<C: Custody>(
        &mut self,
        ctx: &CallContext,
        id: RequestId,
        custody: &mut C,
    ) -> LendingResult<RequestStatus> {
        let (mut request, mut guard) = self.book.load(id)?;
        if !request.status.accepts_deposits() {
            return Err(LendingError::InvalidState(
                "only unfunded requests can be cancelled",
            ));
        }
        ensure_borrower(&request, &ctx.caller)?;

        let mut refunds = Vec::new();
        if guard.borrower_collateral_deposited() {
            guard.set_borrower_collateral_withdrawn()?;
            refunds.push((request.borrower_id.clone(), request.collateral_amount));
        }
        if let Some(lender_id) = request.lender_id.clone() {
            refunds.push((lender_id, request.amount));
        }
        request.cancel_request();
        let status = request.status;

        custody.send_all(&refunds)?;
        self.book.commit(request, guard);

        for (receiver_id, amount) in refunds {
            log_lending_event("REFUNDED", id, &receiver_id, amount);
        }
        log_status_changed(id, status);
        Ok(status)
    }
}
