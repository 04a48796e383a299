/// Finance routes
///
/// - `accounts`: Chart of accounts
/// - `transactions`: Ledger entries; posting moves the account balance
/// - `invoices`: Invoices with line items, status workflow and CSV export
/// - `expenses`: Expense claims with approval
/// - `reconciliations`: Bank statements matched against transactions
///
/// Money travels as decimal strings (`"1250.00"`); numbers are accepted on
/// input as well.

pub mod accounts;
pub mod expenses;
pub mod invoices;
pub mod reconciliations;
pub mod transactions;
