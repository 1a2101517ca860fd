//! Wallet boundary: stake deduction at match start, prize award at the end.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetType {
    /// Play-money stake; still tracked, never pays out real value.
    Fake,
    Real,
}

/// Stake agreed at room creation; both players post the same amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetTerms {
    pub amount: i64,
    pub bet_type: BetType,
}

impl BetTerms {
    /// Winner takes both stakes.
    pub fn prize_pool(&self) -> i64 {
        self.amount * 2
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResult {
    Won,
    Lost,
}

#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn has_sufficient_balance(
        &self,
        player_id: i64,
        terms: BetTerms,
    ) -> Result<bool, DomainError>;

    /// Deduct the stake. Fails with `InsufficientBalance` rather than going
    /// negative.
    async fn deduct_bet(&self, player_id: i64, terms: BetTerms) -> Result<(), DomainError>;

    /// Credit winnings; returns the new balance.
    async fn award_winnings(
        &self,
        player_id: i64,
        terms: BetTerms,
        amount: i64,
    ) -> Result<i64, DomainError>;

    async fn record_result(
        &self,
        player_id: i64,
        result: MatchResult,
    ) -> Result<(), DomainError>;

    async fn balance(&self, player_id: i64, bet_type: BetType) -> Result<i64, DomainError>;
}

#[derive(Debug, Default, Clone, Copy)]
struct Account {
    fake: i64,
    real: i64,
    wins: u64,
    losses: u64,
}

impl Account {
    fn balance_mut(&mut self, bet_type: BetType) -> &mut i64 {
        match bet_type {
            BetType::Fake => &mut self.fake,
            BetType::Real => &mut self.real,
        }
    }

    fn balance(&self, bet_type: BetType) -> i64 {
        match bet_type {
            BetType::Fake => self.fake,
            BetType::Real => self.real,
        }
    }
}

#[derive(Default)]
pub struct InMemoryWallet {
    accounts: RwLock<HashMap<i64, Account>>,
}

impl InMemoryWallet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a balance, creating the account if needed.
    pub fn grant(&self, player_id: i64, bet_type: BetType, amount: i64) {
        let mut accounts = self.accounts.write();
        *accounts.entry(player_id).or_default().balance_mut(bet_type) += amount;
    }

    pub fn record(&self, player_id: i64) -> (u64, u64) {
        let accounts = self.accounts.read();
        accounts
            .get(&player_id)
            .map(|a| (a.wins, a.losses))
            .unwrap_or((0, 0))
    }
}

#[async_trait]
impl WalletStore for InMemoryWallet {
    async fn has_sufficient_balance(
        &self,
        player_id: i64,
        terms: BetTerms,
    ) -> Result<bool, DomainError> {
        Ok(self.balance(player_id, terms.bet_type).await? >= terms.amount)
    }

    async fn deduct_bet(&self, player_id: i64, terms: BetTerms) -> Result<(), DomainError> {
        let mut accounts = self.accounts.write();
        let account = accounts.entry(player_id).or_default();
        let balance = account.balance_mut(terms.bet_type);
        if *balance < terms.amount {
            return Err(DomainError::insufficient_balance(format!(
                "player {player_id} has {balance}, needs {}",
                terms.amount
            )));
        }
        *balance -= terms.amount;
        Ok(())
    }

    async fn award_winnings(
        &self,
        player_id: i64,
        terms: BetTerms,
        amount: i64,
    ) -> Result<i64, DomainError> {
        let mut accounts = self.accounts.write();
        let account = accounts.entry(player_id).or_default();
        let balance = account.balance_mut(terms.bet_type);
        *balance += amount;
        Ok(*balance)
    }

    async fn record_result(
        &self,
        player_id: i64,
        result: MatchResult,
    ) -> Result<(), DomainError> {
        let mut accounts = self.accounts.write();
        let account = accounts.entry(player_id).or_default();
        match result {
            MatchResult::Won => account.wins += 1,
            MatchResult::Lost => account.losses += 1,
        }
        Ok(())
    }

    async fn balance(&self, player_id: i64, bet_type: BetType) -> Result<i64, DomainError> {
        let accounts = self.accounts.read();
        Ok(accounts
            .get(&player_id)
            .map(|a| a.balance(bet_type))
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TERMS: BetTerms = BetTerms {
        amount: 100,
        bet_type: BetType::Fake,
    };

    #[tokio::test]
    async fn deduct_refuses_to_go_negative() {
        let wallet = InMemoryWallet::new();
        wallet.grant(7, BetType::Fake, 50);
        let err = wallet.deduct_bet(7, TERMS).await.unwrap_err();
        assert!(matches!(err, DomainError::InsufficientBalance(_)));
        assert_eq!(wallet.balance(7, BetType::Fake).await.unwrap(), 50);
    }

    #[tokio::test]
    async fn stake_and_prize_round_trip() {
        let wallet = InMemoryWallet::new();
        wallet.grant(1, BetType::Fake, 500);
        wallet.grant(2, BetType::Fake, 500);
        wallet.deduct_bet(1, TERMS).await.unwrap();
        wallet.deduct_bet(2, TERMS).await.unwrap();

        let new_balance = wallet.award_winnings(1, TERMS, TERMS.prize_pool()).await.unwrap();
        assert_eq!(new_balance, 600);
        assert_eq!(wallet.balance(2, BetType::Fake).await.unwrap(), 400);
    }

    #[tokio::test]
    async fn fake_and_real_balances_are_separate() {
        let wallet = InMemoryWallet::new();
        wallet.grant(3, BetType::Real, 1000);
        assert_eq!(wallet.balance(3, BetType::Fake).await.unwrap(), 0);
        assert!(!wallet.has_sufficient_balance(3, TERMS).await.unwrap());
    }

    #[tokio::test]
    async fn results_are_tallied() {
        let wallet = InMemoryWallet::new();
        wallet.record_result(4, MatchResult::Won).await.unwrap();
        wallet.record_result(4, MatchResult::Lost).await.unwrap();
        wallet.record_result(4, MatchResult::Won).await.unwrap();
        assert_eq!(wallet.record(4), (2, 1));
    }
}
