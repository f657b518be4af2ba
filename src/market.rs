use near_sdk::{near, store::IterableMap, AccountId, NearToken, Timestamp};

use crate::claims::{ClaimId, ClaimLedger};
use crate::config::{checked_add, percent_of};
use crate::context::CallContext;
use crate::custody::Custody;
use crate::error::{LendingError, LendingResult};
use crate::events::log_listing_event;

#[near(serializers = [json, borsh])]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListingStatus {
    Active,
    Sold,
    Cancelled,
}

/// An offer to sell a claim token. Keyed by the claim id; selling again after
/// a sale or cancellation replaces the record.
#[near(serializers = [json, borsh])]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Listing {
    pub token_id: ClaimId,
    pub status: ListingStatus,
    pub seller_id: AccountId,
    pub amount: NearToken,
    pub commission_amount: NearToken,
    pub total_amount: NearToken,
    pub created_at: Timestamp,
    pub sold_at: Timestamp,
}

#[near(serializers = [borsh])]
pub struct SecondaryMarket {
    listings: IterableMap<ClaimId, Listing>,
    commission_rate: u32,
    vault_id: AccountId,
}

impl SecondaryMarket {
    pub fn new(commission_rate: u32, vault_id: AccountId) -> Self {
        Self {
            listings: IterableMap::new(b"l"),
            commission_rate,
            vault_id,
        }
    }

    pub fn listing(&self, token_id: ClaimId) -> LendingResult<&Listing> {
        self.listings.get(&token_id).ok_or(LendingError::NotFound {
            kind: "listing",
            id: token_id,
        })
    }

    /// Lists the caller's claim at `amount`. `market_id` is the account the
    /// holder must have approved to move the claim.
    pub fn sell<L: ClaimLedger>(
        &mut self,
        ctx: &CallContext,
        token_id: ClaimId,
        amount: NearToken,
        claims: &L,
        market_id: &AccountId,
    ) -> LendingResult<&Listing> {
        if let Some(listing) = self.listings.get(&token_id) {
            if listing.status == ListingStatus::Active {
                return Err(LendingError::InvalidState("claim is already listed"));
            }
        }
        if amount.as_yoctonear() == 0 {
            return Err(LendingError::InvalidArgument("listing amount must be positive"));
        }
        let owner_id = claims.owner_of(token_id)?;
        if owner_id != ctx.caller {
            return Err(LendingError::Unauthorized(ctx.caller.clone()));
        }
        if claims.approved_operator(token_id)?.as_ref() != Some(market_id) {
            return Err(LendingError::Unauthorized(market_id.clone()));
        }

        let commission_amount = percent_of(amount, self.commission_rate)?;
        let total_amount = checked_add(amount, commission_amount)?;
        self.listings.insert(
            token_id,
            Listing {
                token_id,
                status: ListingStatus::Active,
                seller_id: owner_id,
                amount,
                commission_amount,
                total_amount,
                created_at: ctx.now,
                sold_at: 0,
            },
        );

        log_listing_event("CREATED", token_id, &ctx.caller, amount);
        self.listing(token_id)
    }

    /// Buys a listed claim. The attached deposit must equal the listing's
    /// total; the holder gets the ask and the vault the commission.
    pub fn buy<L: ClaimLedger, C: Custody>(
        &mut self,
        ctx: &CallContext,
        token_id: ClaimId,
        claims: &mut L,
        custody: &mut C,
        market_id: &AccountId,
    ) -> LendingResult<&Listing> {
        let mut listing = self.listing(token_id)?.clone();
        if listing.status != ListingStatus::Active {
            return Err(LendingError::InvalidState("listing is not active"));
        }
        let holder = claims.owner_of(token_id)?;
        if holder == ctx.caller {
            return Err(LendingError::Unauthorized(ctx.caller.clone()));
        }
        if ctx.attached != listing.total_amount {
            return Err(LendingError::AmountMismatch {
                expected: listing.total_amount.as_yoctonear(),
                attached: ctx.attached.as_yoctonear(),
            });
        }
        if claims.approved_operator(token_id)?.as_ref() != Some(market_id) {
            return Err(LendingError::Unauthorized(market_id.clone()));
        }

        listing.status = ListingStatus::Sold;
        listing.sold_at = ctx.now;

        custody.send_all(&[
            (holder.clone(), listing.amount),
            (self.vault_id.clone(), listing.commission_amount),
        ])?;
        claims.transfer_with_approval_check(market_id, &holder, &ctx.caller, token_id)?;
        self.listings.insert(token_id, listing);

        log_listing_event("SOLD", token_id, &ctx.caller, ctx.attached);
        self.listing(token_id)
    }

    pub fn cancel_sell<L: ClaimLedger>(
        &mut self,
        ctx: &CallContext,
        token_id: ClaimId,
        claims: &L,
    ) -> LendingResult<&Listing> {
        let mut listing = self.listing(token_id)?.clone();
        if claims.owner_of(token_id)? != ctx.caller {
            return Err(LendingError::Unauthorized(ctx.caller.clone()));
        }
        if listing.status != ListingStatus::Active {
            return Err(LendingError::InvalidState("listing is not active"));
        }

        listing.status = ListingStatus::Cancelled;
        let amount = listing.amount;
        self.listings.insert(token_id, listing);

        log_listing_event("CANCELLED", token_id, &ctx.caller, amount);
        self.listing(token_id)
    }

    /// Takes a settled claim off the market. Only an Active listing changes;
    /// returns whether one did.
    pub fn close_settled(&mut self, token_id: ClaimId) -> bool {
        let Some(listing) = self.listings.get_mut(&token_id) else {
            return false;
        };
        if listing.status != ListingStatus::Active {
            return false;
        }
        listing.status = ListingStatus::Cancelled;
        log_listing_event("CLOSED", token_id, &listing.seller_id, listing.amount);
        true
    }

    pub fn page(&self, from_index: u32, limit: u32) -> Vec<&Listing> {
        self.listings
            .values()
            .skip(from_index as usize)
            .take(limit as usize)
            .collect()
    }
}
