//! Expense model for invoicer-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Expense category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    Marketing,
    Software,
    Travel,
    Equipment,
    Office,
    Other,
}

impl ExpenseCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseCategory::Marketing => "marketing",
            ExpenseCategory::Software => "software",
            ExpenseCategory::Travel => "travel",
            ExpenseCategory::Equipment => "equipment",
            ExpenseCategory::Office => "office",
            ExpenseCategory::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "marketing" => Some(ExpenseCategory::Marketing),
            "software" => Some(ExpenseCategory::Software),
            "travel" => Some(ExpenseCategory::Travel),
            "equipment" => Some(ExpenseCategory::Equipment),
            "office" => Some(ExpenseCategory::Office),
            "other" => Some(ExpenseCategory::Other),
            _ => None,
        }
    }
}

/// Recurrence frequency for recurring expenses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Monthly => "monthly",
            Frequency::Yearly => "yearly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "monthly" => Some(Frequency::Monthly),
            "yearly" => Some(Frequency::Yearly),
            _ => None,
        }
    }
}

/// Expense row owned by a user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Expense {
    pub expense_id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub amount: Decimal,
    pub category: String,
    pub date: NaiveDate,
    pub is_recurring: bool,
    pub frequency: Option<String>,
    pub created_utc: DateTime<Utc>,
}

/// Input for creating an expense.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateExpense {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub amount: Decimal,
    pub category: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub is_recurring: bool,
    pub frequency: Option<String>,
}

/// Input for updating an expense.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateExpense {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    pub amount: Option<Decimal>,
    pub category: Option<String>,
    pub date: Option<NaiveDate>,
    pub is_recurring: Option<bool>,
    pub frequency: Option<String>,
}

/// Filter parameters for listing expenses.
#[derive(Debug, Clone, Default)]
pub struct ListExpensesFilter {
    pub category: Option<ExpenseCategory>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}
