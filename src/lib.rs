use near_sdk::store::LookupMap;
use near_sdk::{env, ext_contract, near, AccountId, NearToken, PanicOnDefault, PromiseResult};

mod book;
mod claims;
mod config;
mod context;
mod custody;
mod error;
mod events;
mod guard;
mod market;
mod orchestrator;
mod request;

pub use book::RequestBook;
pub use claims::{ClaimId, ClaimLedger, ClaimRegistry, ClaimToken};
pub use config::{LendingConfig, MIN_LENDING_AMOUNT, REQUEST_STORAGE_FEE};
pub use context::CallContext;
pub use custody::{Custody, Payout, PayoutQueue};
pub use error::{LendingError, LendingResult};
pub use guard::{ActionGuard, GuardedAction};
pub use market::{Listing, ListingStatus, SecondaryMarket};
pub use orchestrator::LendingOrchestrator;
pub use request::{LendingRequest, RequestId, RequestStatus};

use events::log_payout_event;

const DEFAULT_PAGE_LIMIT: u32 = 50;

#[ext_contract(ext_self)]
pub trait SelfCallbacks {
    fn on_payouts_settled(&mut self, payouts: Vec<Payout>);
}

#[near(contract_state)]
#[derive(PanicOnDefault)]
pub struct Contract {
    pub lending: LendingOrchestrator,
    pub market: SecondaryMarket,
    pub claims: ClaimRegistry,
    // Payouts whose transfer receipt failed, keyed by receiver
    pub unsettled: LookupMap<AccountId, NearToken>,
}

#[near]
impl Contract {
    #[init]
    pub fn new(config: LendingConfig) -> Self {
        config.validate();
        Self {
            market: SecondaryMarket::new(config.commission_rate, config.vault_id.clone()),
            lending: LendingOrchestrator::new(config),
            claims: ClaimRegistry::new(),
            unsettled: LookupMap::new(b"u"),
        }
    }

    // --- LENDING LIFECYCLE ---

    /// Opens a request for `amount` at `interest_rate` percent. The caller
    /// becomes the borrower and attaches exactly the storage fee.
    #[payable]
    #[handle_result]
    pub fn request_crypto_lending(
        &mut self,
        amount: NearToken,
        interest_rate: u32,
    ) -> Result<RequestId, LendingError> {
        self.lending
            .request_crypto_lending(&CallContext::current(), amount, interest_rate)
    }

    /// Borrower attaches exactly the request's collateral.
    #[payable]
    #[handle_result]
    pub fn borrower_collateral(
        &mut self,
        request_id: RequestId,
    ) -> Result<RequestStatus, LendingError> {
        self.lending
            .borrower_collateral(&CallContext::current(), request_id)
    }

    /// Lender attaches exactly the requested principal.
    #[payable]
    #[handle_result]
    pub fn lender_deposit(&mut self, request_id: RequestId) -> Result<RequestStatus, LendingError> {
        self.lending.lender_deposit(&CallContext::current(), request_id)
    }

    #[handle_result]
    pub fn borrower_active_crypto_lending(
        &mut self,
        request_id: RequestId,
    ) -> Result<RequestStatus, LendingError> {
        let mut payouts = PayoutQueue::new();
        let status = self.lending.borrower_active_crypto_lending(
            &CallContext::current(),
            request_id,
            &mut self.claims,
            &mut payouts,
        )?;
        payouts.dispatch();
        Ok(status)
    }

    /// Borrower attaches exactly the request's total before maturity.
    #[payable]
    #[handle_result]
    pub fn borrower_repay_amount(
        &mut self,
        request_id: RequestId,
    ) -> Result<RequestStatus, LendingError> {
        let mut payouts = PayoutQueue::new();
        let status = self.lending.borrower_repay_amount(
            &CallContext::current(),
            request_id,
            &mut payouts,
        )?;
        payouts.dispatch();
        Ok(status)
    }

    #[handle_result]
    pub fn lender_claim_amount(
        &mut self,
        request_id: RequestId,
    ) -> Result<RequestStatus, LendingError> {
        let mut payouts = PayoutQueue::new();
        let status = self.lending.lender_claim_amount(
            &CallContext::current(),
            request_id,
            &mut self.claims,
            &mut payouts,
        )?;
        self.market.close_settled(request_id);
        payouts.dispatch();
        Ok(status)
    }

    #[handle_result]
    pub fn withdraw_collateral(
        &mut self,
        request_id: RequestId,
    ) -> Result<NearToken, LendingError> {
        let mut payouts = PayoutQueue::new();
        let amount = self.lending.withdraw_collateral(
            &CallContext::current(),
            request_id,
            &mut payouts,
        )?;
        payouts.dispatch();
        Ok(amount)
    }

    #[handle_result]
    pub fn borrower_cancel_request(
        &mut self,
        request_id: RequestId,
    ) -> Result<RequestStatus, LendingError> {
        let mut payouts = PayoutQueue::new();
        let status = self.lending.borrower_cancel_request(
            &CallContext::current(),
            request_id,
            &mut payouts,
        )?;
        payouts.dispatch();
        Ok(status)
    }

    // --- CLAIM TOKENS ---

    /// Lets `account_id` move the caller's claim. Approve this contract's own
    /// account before listing the claim for sale.
    #[handle_result]
    pub fn claim_approve(
        &mut self,
        token_id: ClaimId,
        account_id: AccountId,
    ) -> Result<(), LendingError> {
        self.claims
            .approve(&env::predecessor_account_id(), token_id, account_id)
    }

    #[handle_result]
    pub fn claim_revoke(&mut self, token_id: ClaimId) -> Result<(), LendingError> {
        self.claims.revoke(&env::predecessor_account_id(), token_id)
    }

    #[handle_result]
    pub fn claim_transfer(
        &mut self,
        receiver_id: AccountId,
        token_id: ClaimId,
    ) -> Result<(), LendingError> {
        self.claims
            .transfer(&env::predecessor_account_id(), receiver_id, token_id)
    }

    // --- SECONDARY MARKET ---

    #[handle_result]
    pub fn sell(&mut self, token_id: ClaimId, amount: NearToken) -> Result<Listing, LendingError> {
        self.market
            .sell(
                &CallContext::current(),
                token_id,
                amount,
                &self.claims,
                &env::current_account_id(),
            )
            .cloned()
    }

    /// Buyer attaches exactly the listing's total.
    #[payable]
    #[handle_result]
    pub fn buy(&mut self, token_id: ClaimId) -> Result<Listing, LendingError> {
        let mut payouts = PayoutQueue::new();
        let listing = self
            .market
            .buy(
                &CallContext::current(),
                token_id,
                &mut self.claims,
                &mut payouts,
                &env::current_account_id(),
            )?
            .clone();
        payouts.dispatch();
        Ok(listing)
    }

    #[handle_result]
    pub fn cancel_sell(&mut self, token_id: ClaimId) -> Result<Listing, LendingError> {
        self.market
            .cancel_sell(&CallContext::current(), token_id, &self.claims)
            .cloned()
    }

    // --- SETTLEMENT ---

    /// Retries every failed payout owed to the caller.
    #[handle_result]
    pub fn withdraw_unsettled(&mut self) -> Result<NearToken, LendingError> {
        let caller = env::predecessor_account_id();
        let amount = self
            .unsettled
            .remove(&caller)
            .ok_or(LendingError::InvalidState("no unsettled payouts for caller"))?;

        let mut payouts = PayoutQueue::new();
        payouts.send(&caller, amount)?;
        payouts.dispatch();
        Ok(amount)
    }

    // --- PRIVATE CALLBACKS ---

    #[private]
    pub fn on_payouts_settled(&mut self, payouts: Vec<Payout>) {
        let outcomes: Vec<bool> = (0..payouts.len() as u64)
            .map(|index| matches!(env::promise_result(index), PromiseResult::Successful(_)))
            .collect();
        self.record_settlement(payouts, outcomes);
    }

    // --- VIEWS ---

    pub fn get_config(&self) -> LendingConfig {
        self.lending.config().clone()
    }

    pub fn get_request(&self, request_id: RequestId) -> Option<LendingRequest> {
        self.lending.request(request_id).ok().cloned()
    }

    pub fn get_action_guard(&self, request_id: RequestId) -> Option<ActionGuard> {
        self.lending.guard(request_id).ok().cloned()
    }

    pub fn get_requests(&self, from_index: Option<u32>, limit: Option<u32>) -> Vec<LendingRequest> {
        self.lending
            .book()
            .page(from_index.unwrap_or(0), limit.unwrap_or(DEFAULT_PAGE_LIMIT))
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn get_request_count(&self) -> u32 {
        self.lending.book().len()
    }

    pub fn get_next_request_id(&self) -> RequestId {
        self.lending.book().next_id()
    }

    pub fn claim_owner_of(&self, token_id: ClaimId) -> Option<AccountId> {
        self.claims.owner_of(token_id).ok()
    }

    pub fn claim_approved_operator(&self, token_id: ClaimId) -> Option<AccountId> {
        self.claims.approved_operator(token_id).ok().flatten()
    }

    pub fn get_listing(&self, token_id: ClaimId) -> Option<Listing> {
        self.market.listing(token_id).ok().cloned()
    }

    pub fn get_listings(&self, from_index: Option<u32>, limit: Option<u32>) -> Vec<Listing> {
        self.market
            .page(from_index.unwrap_or(0), limit.unwrap_or(DEFAULT_PAGE_LIMIT))
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn unsettled_balance_of(&self, account_id: AccountId) -> NearToken {
        self.unsettled
            .get(&account_id)
            .copied()
            .unwrap_or(NearToken::from_yoctonear(0))
    }
}

impl Contract {
    /// Pairs each payout with its transfer outcome. Failed transfers are
    /// credited to the receiver's unsettled balance.
    fn record_settlement(&mut self, payouts: Vec<Payout>, outcomes: Vec<bool>) {
        for (payout, settled) in payouts.into_iter().zip(outcomes) {
            if settled {
                log_payout_event("SETTLED", &payout.receiver_id, payout.amount);
                continue;
            }
            let owed = self.unsettled_balance_of(payout.receiver_id.clone());
            self.unsettled
                .insert(payout.receiver_id.clone(), owed.saturating_add(payout.amount));
            log_payout_event("FAILED", &payout.receiver_id, payout.amount);
        }
    }
}
