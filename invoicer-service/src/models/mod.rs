//! Domain models for invoicer-service.

mod client;
mod expense;
mod invoice;
mod product;
mod settings;

pub use client::{Client, CreateClient, ListClientsFilter, UpdateClient};
pub use expense::{
    CreateExpense, Expense, ExpenseCategory, Frequency, ListExpensesFilter, UpdateExpense,
};
pub use invoice::{
    CreateInvoice, Invoice, InvoiceDetail, InvoiceItem, InvoiceItemDetail, InvoiceItemInput,
    InvoiceItemLine, InvoiceStatus, InvoiceTax, InvoiceTaxInput, InvoiceTaxLine, InvoiceTotals,
    ListInvoicesFilter, UpdateInvoice,
};
pub use product::{AdjustStock, CreateProduct, ListProductsFilter, Product, StockHistory, UpdateProduct};
pub use settings::{UpdateUserSettings, UserSettings};
