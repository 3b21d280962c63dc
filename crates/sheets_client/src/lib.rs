//! Remote grid store: a spreadsheet values API behind `GridStore`.
//!
//! One spreadsheet per party (the party's `grid_id` is the spreadsheet id),
//! one tab per installation (`[grid] sheet_name`). Cells are addressed A1
//! style by the category/period layout.
//!
//! No batching and no retries here; the engine retries failed cells.

mod auth;
mod client;

pub use auth::{
    credentials_file_path, load_credentials, load_credentials_from, save_credentials,
    save_credentials_to, SheetsCredentials, API_BASE_ENV, TOKEN_ENV,
};
pub use client::{SheetsClient, SheetsError, DEFAULT_API_BASE};
