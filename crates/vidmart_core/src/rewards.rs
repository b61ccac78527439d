//! crates/vidmart_core/src/rewards.rs
//!
//! Loyalty coin summary and on-chain reward credits.

use rust_decimal::Decimal;
use tracing::{error, info};
use uuid::Uuid;

use crate::domain::{CoinTransaction, NewCoinTransaction, RewardReceipt};
use crate::ports::{BlockchainGateway, CoinAccountRepository, CoinTransactionRepository, PortError};
use crate::pricing;

#[derive(Debug, thiserror::Error)]
pub enum RewardError {
    #[error("Reward amount must be positive")]
    InvalidAmount,
    #[error(transparent)]
    Port(#[from] PortError),
}

/// What the rewards page shows.
#[derive(Debug, Clone, PartialEq)]
pub struct CoinSummary {
    pub balance: i64,
    /// Rupee value of the balance.
    pub value: Decimal,
    pub transactions: Vec<CoinTransaction>,
}

pub struct Rewards<'a, B, G>
where
    B: CoinAccountRepository + CoinTransactionRepository + ?Sized,
    G: BlockchainGateway + ?Sized,
{
    backend: &'a B,
    chain: &'a G,
}

impl<'a, B, G> Rewards<'a, B, G>
where
    B: CoinAccountRepository + CoinTransactionRepository + ?Sized,
    G: BlockchainGateway + ?Sized,
{
    pub fn new(backend: &'a B, chain: &'a G) -> Self {
        Self { backend, chain }
    }

    pub async fn summary(&self, user_id: Uuid) -> Result<CoinSummary, RewardError> {
        let balance = self
            .backend
            .find_coin_account(user_id)
            .await?
            .map_or(0, |account| account.balance);
        let transactions = self.backend.list_coin_transactions(user_id).await?;
        Ok(CoinSummary {
            balance,
            value: pricing::coin_value(balance),
            transactions,
        })
    }

    /// Transfers `amount` coins to the user's wallet and, once the gateway
    /// confirms, records them in the ledger. A gateway failure leaves the
    /// ledger untouched.
    pub async fn credit_reward(
        &self,
        user_id: Uuid,
        recipient: &str,
        amount: u32,
        note: Option<String>,
    ) -> Result<RewardReceipt, RewardError> {
        if amount == 0 {
            return Err(RewardError::InvalidAmount);
        }

        let receipt = self
            .chain
            .reward_coins(recipient, amount, note)
            .await
            .map_err(|e| {
                error!(%user_id, error = %e, "reward transfer failed");
                e
            })?;

        let balance = self
            .backend
            .find_coin_account(user_id)
            .await?
            .map_or(0, |account| account.balance);
        self.backend
            .set_coin_balance(user_id, balance + i64::from(amount))
            .await?;
        self.backend
            .append_coin_transaction(NewCoinTransaction::earned(user_id, amount, None))
            .await?;

        info!(%user_id, amount, tx = %receipt.transaction_id, "reward credited");
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Utc;
    use mockall::mock;
    use testresult::TestResult;

    use super::*;
    use crate::domain::{CoinAccount, CoinTransactionKind};
    use crate::ports::{MockBlockchainGateway, PortResult};

    mock! {
        pub Ledger {}

        #[async_trait]
        impl CoinAccountRepository for Ledger {
            async fn find_coin_account(&self, user_id: Uuid) -> PortResult<Option<CoinAccount>>;
            async fn set_coin_balance(&self, user_id: Uuid, balance: i64) -> PortResult<CoinAccount>;
        }

        #[async_trait]
        impl CoinTransactionRepository for Ledger {
            async fn append_coin_transaction(&self, transaction: NewCoinTransaction) -> PortResult<CoinTransaction>;
            async fn list_coin_transactions(&self, user_id: Uuid) -> PortResult<Vec<CoinTransaction>>;
        }
    }

    fn receipt(amount: u32) -> RewardReceipt {
        RewardReceipt {
            transaction_id: "TXID".into(),
            confirmed_round: 42,
            amount: Decimal::from(amount),
            recipient: "WALLET".into(),
            explorer_url: "https://testnet.explorer/tx/TXID".into(),
        }
    }

    #[tokio::test]
    async fn summary_values_coins_at_ten_paise() -> TestResult {
        let mut ledger = MockLedger::new();
        ledger
            .expect_find_coin_account()
            .returning(|user_id| Ok(Some(CoinAccount { user_id, balance: 250 })));
        ledger
            .expect_list_coin_transactions()
            .returning(|_| Ok(Vec::new()));
        let chain = MockBlockchainGateway::new();

        let summary = Rewards::new(&ledger, &chain).summary(Uuid::new_v4()).await?;

        assert_eq!(summary.balance, 250);
        assert_eq!(summary.value, "25.00".parse::<Decimal>()?);
        Ok(())
    }

    #[tokio::test]
    async fn confirmed_reward_is_credited() -> TestResult {
        let mut chain = MockBlockchainGateway::new();
        chain
            .expect_reward_coins()
            .withf(|recipient, amount, _| recipient == "WALLET" && *amount == 5)
            .returning(|_, amount, _| Ok(receipt(amount)));
        let mut ledger = MockLedger::new();
        ledger
            .expect_find_coin_account()
            .returning(|user_id| Ok(Some(CoinAccount { user_id, balance: 3 })));
        ledger
            .expect_set_coin_balance()
            .withf(|_, balance| *balance == 8)
            .times(1)
            .returning(|user_id, balance| Ok(CoinAccount { user_id, balance }));
        ledger
            .expect_append_coin_transaction()
            .withf(|tx| {
                tx.kind == CoinTransactionKind::Earned
                    && tx.amount == 5
                    && tx.description == "Rewarded 5 coins"
            })
            .times(1)
            .returning(|tx| {
                Ok(CoinTransaction {
                    id: Uuid::new_v4(),
                    user_id: tx.user_id,
                    amount: tx.amount,
                    kind: tx.kind,
                    description: tx.description,
                    order_id: tx.order_id,
                    created_at: Utc::now(),
                })
            });

        let receipt = Rewards::new(&ledger, &chain)
            .credit_reward(Uuid::new_v4(), "WALLET", 5, None)
            .await?;

        assert_eq!(receipt.confirmed_round, 42);
        Ok(())
    }

    #[tokio::test]
    async fn gateway_failure_leaves_ledger_unchanged() {
        let mut chain = MockBlockchainGateway::new();
        chain
            .expect_reward_coins()
            .returning(|_, _, _| Err(PortError::Gateway("account not opted in".into())));
        let mut ledger = MockLedger::new();
        ledger.expect_set_coin_balance().never();
        ledger.expect_append_coin_transaction().never();

        let result = Rewards::new(&ledger, &chain)
            .credit_reward(Uuid::new_v4(), "WALLET", 5, None)
            .await;

        assert!(matches!(
            result,
            Err(RewardError::Port(PortError::Gateway(_)))
        ));
    }
}
