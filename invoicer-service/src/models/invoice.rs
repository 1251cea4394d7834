//! Invoice models and the monetary roll-up derived from them.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Invoice status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Pending,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
        }
    }

    /// Strict parse used for input validation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(InvoiceStatus::Draft),
            "pending" => Some(InvoiceStatus::Pending),
            "paid" => Some(InvoiceStatus::Paid),
            _ => None,
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Invoice header row. Items and taxes live in their own tables and are
/// lifetime-bound to the invoice.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub user_id: Uuid,
    pub client_id: Uuid,
    pub title: String,
    pub status: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub payment_date: Option<NaiveDate>,
    pub discount_percentage: Decimal,
    pub notes: String,
    pub created_utc: DateTime<Utc>,
}

/// Line item row: one product-quantity pairing on an invoice.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceItem {
    pub item_id: Uuid,
    pub invoice_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub created_utc: DateTime<Utc>,
}

/// Tax profile row: a named rate applied to the discounted subtotal.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceTax {
    pub tax_id: Uuid,
    pub invoice_id: Uuid,
    pub name: String,
    pub rate: Decimal,
    pub created_utc: DateTime<Utc>,
}

/// Line item joined with its product, as priced at read time.
#[derive(Debug, Clone, FromRow)]
pub struct InvoiceItemDetail {
    pub item_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub price: Decimal,
    pub quantity: i32,
}

impl InvoiceItemDetail {
    /// Monetary value of the line: quantity times the current product price.
    pub fn item_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Monetary roll-up of an invoice. Derived on every read from the current
/// items, discount, and taxes; never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceTotals {
    pub subtotal: Decimal,
    pub discounted_subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
}

impl InvoiceTotals {
    /// Compute the roll-up. All taxes apply to the same discounted subtotal,
    /// so their order does not matter.
    pub fn compute(
        items: &[InvoiceItemDetail],
        discount_percentage: Decimal,
        tax_rates: &[Decimal],
    ) -> Self {
        let subtotal: Decimal = items.iter().map(InvoiceItemDetail::item_total).sum();
        let discounted_subtotal =
            subtotal * (Decimal::ONE - discount_percentage / Decimal::ONE_HUNDRED);
        let tax_amount: Decimal = tax_rates
            .iter()
            .map(|rate| Self::tax_amount(discounted_subtotal, *rate))
            .sum();
        Self {
            subtotal,
            discounted_subtotal,
            tax_amount,
            total: discounted_subtotal + tax_amount,
        }
    }

    /// Amount one tax profile contributes.
    pub fn tax_amount(discounted_subtotal: Decimal, rate: Decimal) -> Decimal {
        discounted_subtotal * (rate / Decimal::ONE_HUNDRED)
    }
}

/// Line item in an invoice read, with its derived value.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceItemLine {
    pub item_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub price: Decimal,
    pub quantity: i32,
    pub item_total: Decimal,
}

/// Tax profile in an invoice read, with its derived amount.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceTaxLine {
    pub tax_id: Uuid,
    pub name: String,
    pub rate: Decimal,
    pub amount: Decimal,
}

/// Full invoice read: header, lines, taxes, and the computed totals.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub items: Vec<InvoiceItemLine>,
    pub taxes: Vec<InvoiceTaxLine>,
    #[serde(flatten)]
    pub totals: InvoiceTotals,
}

/// Submitted line item. An `id` matching an existing item updates it in
/// place; otherwise a new item is created.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct InvoiceItemInput {
    pub id: Option<Uuid>,
    pub product_id: Uuid,
    #[validate(range(min = 0))]
    pub quantity: i32,
}

/// Submitted tax profile, same id semantics as [`InvoiceItemInput`].
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct InvoiceTaxInput {
    pub id: Option<Uuid>,
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    pub rate: Decimal,
}

/// Input for creating an invoice with its nested items and taxes.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateInvoice {
    pub client_id: Uuid,
    #[serde(default)]
    pub title: String,
    pub due_date: NaiveDate,
    pub payment_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: String,
    pub status: Option<String>,
    pub discount_percentage: Option<Decimal>,
    #[serde(default)]
    #[validate(nested)]
    pub items: Vec<InvoiceItemInput>,
    #[serde(default)]
    #[validate(nested)]
    pub taxes: Vec<InvoiceTaxInput>,
}

/// Input for updating an invoice. `None` leaves a field unchanged; omitting
/// `items`/`taxes` leaves the nested collections untouched, while an empty
/// list deletes every member. The issue date is immutable.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateInvoice {
    pub client_id: Option<Uuid>,
    pub title: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub payment_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub status: Option<String>,
    pub discount_percentage: Option<Decimal>,
    #[validate(nested)]
    pub items: Option<Vec<InvoiceItemInput>>,
    #[validate(nested)]
    pub taxes: Option<Vec<InvoiceTaxInput>>,
}

/// Filter parameters for listing invoices.
#[derive(Debug, Clone, Default)]
pub struct ListInvoicesFilter {
    pub status: Option<InvoiceStatus>,
    pub search: Option<String>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}
