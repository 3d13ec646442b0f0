//! Invoice composition core: totals, validation, editing state, templates
//! and PDF export.
//!
//! The calculator and validator are pure and never fail; malformed input
//! degrades to `0` or to a field error. Only the edges (settings, drafts,
//! export) return `Result`.

pub mod calculator;
pub mod config;
pub mod draft;
pub mod error;
pub mod export;
pub mod format;
pub mod logging;
pub mod model;
pub mod state;
pub mod template;
pub mod validator;

pub use calculator::{TAX_RATE, compute_totals, line_total, to_number};
pub use error::{ConfigError, DraftError, ExportError, RenderError};
pub use model::{Invoice, InvoiceHeader, LineItem, LineItemId, Party, Totals};
pub use state::{Action, HeaderEdit, InvoiceState, apply_edit};
pub use template::Template;
pub use validator::{Classification, FieldKey, ValidationReport, validate};
