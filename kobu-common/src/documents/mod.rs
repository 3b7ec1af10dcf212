//! Letters and CSV exports
//!
//! Produces plain text and CSV. Layout, letterheads and PDF conversion are
//! left to the client's print view.

pub mod csv;
pub mod letters;

pub use self::csv::{assets_csv, collectors_csv, payments_csv, CsvWriter};
pub use letters::{
    render_demand_letter, render_promise_acknowledgement, Letter, NOTICE_DAYS_RANGE,
};
