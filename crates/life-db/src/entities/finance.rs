//! Financial records owned by the remote service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationErrors;

use super::{Checks, Entity, RemoteEntity};

macro_rules! remote_entity {
    ($ty:ty, $resource:literal) => {
        impl RemoteEntity for $ty {
            const RESOURCE: &'static str = $resource;

            fn remote_id(&self) -> Option<&str> {
                self.id.as_deref()
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Checking,
    Savings,
    Credit,
    Cash,
    Investment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub kind: AccountKind,
    pub balance: f64,
    /// ISO 4217 code.
    pub currency: String,
}

impl Entity for Account {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let iso = self.currency.len() == 3 && self.currency.chars().all(|c| c.is_ascii_uppercase());
        Checks::new()
            .require(!self.name.trim().is_empty(), "name", "must not be empty")
            .require(self.balance.is_finite(), "balance", "must be a finite number")
            .require(iso, "currency", "must be a three-letter ISO code")
            .finish()
    }
}

remote_entity!(Account, "accounts");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    Expense,
    Transfer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub account_id: String,
    pub amount: f64,
    pub kind: TransactionKind,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub date: DateTime<Utc>,
}

impl Entity for Transaction {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Checks::new()
            .require(!self.account_id.is_empty(), "accountId", "must not be empty")
            .require(
                self.amount.is_finite() && self.amount > 0.0,
                "amount",
                "must be a positive number",
            )
            .finish()
    }
}

remote_entity!(Transaction, "transactions");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetPeriod {
    Weekly,
    Monthly,
    Yearly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub category: String,
    pub limit: f64,
    #[serde(default)]
    pub spent: f64,
    pub period: BudgetPeriod,
}

impl Entity for Budget {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Checks::new()
            .require(
                self.limit.is_finite() && self.limit >= 0.0,
                "limit",
                "must not be negative",
            )
            .require(self.spent.is_finite(), "spent", "must be a finite number")
            .finish()
    }
}

remote_entity!(Budget, "budgets");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub last_four: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_limit: Option<f64>,
    #[serde(default)]
    pub balance: f64,
    /// Day of month the statement is due.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_day: Option<u8>,
}

impl Entity for Card {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let digits = self.last_four.len() == 4 && self.last_four.chars().all(|c| c.is_ascii_digit());
        Checks::new()
            .require(digits, "lastFour", "must be four digits")
            .in_range(self.due_day, "dueDay", 1, 31)
            .finish()
    }
}

remote_entity!(Card, "cards");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Debt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub principal: f64,
    pub balance: f64,
    /// Annual rate in percent.
    #[serde(default)]
    pub interest_rate: f64,
    #[serde(default)]
    pub minimum_payment: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
}

impl Entity for Debt {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Checks::new()
            .require(self.balance >= 0.0, "balance", "must not be negative")
            .require(self.interest_rate >= 0.0, "interestRate", "must not be negative")
            .finish()
    }
}

remote_entity!(Debt, "debts");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentKind {
    Stock,
    Bond,
    Fund,
    Crypto,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Investment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub kind: InvestmentKind,
    pub quantity: f64,
    pub purchase_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_price: Option<f64>,
}

impl Entity for Investment {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Checks::new()
            .require(self.quantity >= 0.0, "quantity", "must not be negative")
            .require(self.purchase_price >= 0.0, "purchasePrice", "must not be negative")
            .finish()
    }
}

remote_entity!(Investment, "investments");

/// A recurring paid service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub amount: f64,
    pub period: BudgetPeriod,
    pub next_charge: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

impl Entity for Subscription {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Checks::new()
            .require(!self.name.trim().is_empty(), "name", "must not be empty")
            .require(self.amount >= 0.0, "amount", "must not be negative")
            .finish()
    }
}

remote_entity!(Subscription, "subscriptions");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialGoal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub target_amount: f64,
    #[serde(default)]
    pub current_amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
}

impl Entity for FinancialGoal {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Checks::new()
            .require(self.target_amount > 0.0, "targetAmount", "must be positive")
            .require(self.current_amount >= 0.0, "currentAmount", "must not be negative")
            .finish()
    }
}

remote_entity!(FinancialGoal, "financial-goals");
