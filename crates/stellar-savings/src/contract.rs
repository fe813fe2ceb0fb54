// ============================================================================
// STELLAR-SAVINGS - Savings Contract
// ============================================================================
// Operations exposed by the savings contract and read-only queries through
// simulation. Goal and saved values are opaque remote integers.
//
//   set_goal(user, i128)      state-changing
//   add_savings(user, i128)   state-changing
//   get_goal(user) -> i128    read-only
//   get_saved(user) -> i128   read-only
// ============================================================================

use crate::error::WalletError;
use crate::gateway::ContractGateway;
use crate::transaction::TransactionBuilder;
use crate::xdr;
use crate::Result;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Fee used for read-only simulations; never submitted
const READ_FEE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractOperation {
    SetGoal,
    AddSavings,
    GetSaved,
    GetGoal,
}

impl ContractOperation {
    /// Contract function symbol
    pub fn function_name(&self) -> &'static str {
        match self {
            ContractOperation::SetGoal => "set_goal",
            ContractOperation::AddSavings => "add_savings",
            ContractOperation::GetSaved => "get_saved",
            ContractOperation::GetGoal => "get_goal",
        }
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, ContractOperation::GetSaved | ContractOperation::GetGoal)
    }

    pub fn from_function_name(name: &str) -> Option<Self> {
        match name {
            "set_goal" => Some(ContractOperation::SetGoal),
            "add_savings" => Some(ContractOperation::AddSavings),
            "get_saved" => Some(ContractOperation::GetSaved),
            "get_goal" => Some(ContractOperation::GetGoal),
            _ => None,
        }
    }
}

/// One row of the community leaderboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub address: String,
    pub saved: i128,
}

/// Read-only client for the savings contract
#[derive(Clone)]
pub struct SavingsContract {
    gateway: Arc<dyn ContractGateway>,
    contract_id: String,
}

impl SavingsContract {
    pub fn new(gateway: Arc<dyn ContractGateway>, contract_id: impl Into<String>) -> Self {
        Self {
            gateway,
            contract_id: contract_id.into(),
        }
    }

    pub fn contract_id(&self) -> &str {
        &self.contract_id
    }

    /// Simulate a read-only function for `user`.
    ///
    /// The user's own account is the simulation source. Returns `None` when
    /// the function produced no integer value.
    pub async fn query(&self, operation: ContractOperation, user: &str) -> Result<Option<i128>> {
        let account = self.gateway.get_account(user).await?;
        let envelope = TransactionBuilder::new(&account)
            .fee(READ_FEE)
            .invoke_contract(
                &self.contract_id,
                operation.function_name(),
                vec![xdr::address_val(user)?],
            )
            .build()?;

        let simulation = self.gateway.simulate(&envelope).await?;
        if let Some(error) = simulation.error {
            return Err(WalletError::Simulation(error));
        }
        Ok(simulation.return_value()?.as_ref().and_then(xdr::val_as_i128))
    }

    /// Amount saved by `user`; 0 when unknown or unreadable
    pub async fn read_saved(&self, user: &str) -> i128 {
        self.read_or_zero(ContractOperation::GetSaved, user).await
    }

    /// Goal set by `user`; 0 when unknown or unreadable
    pub async fn read_goal(&self, user: &str) -> i128 {
        self.read_or_zero(ContractOperation::GetGoal, user).await
    }

    async fn read_or_zero(&self, operation: ContractOperation, user: &str) -> i128 {
        match self.query(operation, user).await {
            Ok(value) => value.unwrap_or(0),
            Err(e) => {
                debug!("{} for {} failed: {}", operation.function_name(), user, e);
                0
            }
        }
    }

    /// Saved amounts for all `users`, highest first
    pub async fn leaderboard(&self, users: &[String]) -> Vec<LeaderboardEntry> {
        let reads = users.iter().map(|user| async move {
            LeaderboardEntry {
                address: user.clone(),
                saved: self.read_saved(user).await,
            }
        });

        let mut entries = join_all(reads).await;
        entries.sort_by(|a, b| b.saved.cmp(&a.saved).then_with(|| a.address.cmp(&b.address)));
        entries
    }
}
