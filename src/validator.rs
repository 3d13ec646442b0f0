//! Business rules for a composed invoice.
//!
//! Every rule runs on every call; failures accumulate as field-keyed errors
//! (which block export) or free-text warnings (which do not). The outcome is a
//! [`ValidationReport`], never an `Err`.

use std::fmt;
use std::sync::LazyLock;

use chrono::{Months, NaiveDate};
use regex::Regex;
use serde::{Serialize, Serializer};

use crate::calculator::parse_number;
use crate::format::{format_currency, format_number};
use crate::model::{HeaderField, Invoice, ItemField, LineItemId, Party, Totals};

pub const MAX_QUANTITY_WITHOUT_WARNING: f64 = 1000.0;
pub const MAX_RATE_WITHOUT_WARNING: f64 = 100_000.0;
pub const MAX_TOTAL_WITHOUT_WARNING: f64 = 1_000_000.0;
pub const MAX_ITEMS_WITHOUT_WARNING: usize = 20;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9]\d{3,14}$").expect("phone pattern is valid"));

/// Where an error belongs: a header field or one field of one line item.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldKey {
    Header(HeaderField),
    Item(LineItemId, ItemField),
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKey::Header(field) => f.write_str(field.as_str()),
            FieldKey::Item(id, field) => write!(f, "{id}-{}", field.as_str()),
        }
    }
}

impl Serialize for FieldKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: FieldKey,
    pub message: String,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Valid,
    ValidWithWarnings,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub classification: Classification,
    pub message: String,
    /// In the order the rules fired.
    pub errors: Vec<FieldError>,
    pub warnings: Vec<String>,
    pub details: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.classification != Classification::Invalid
    }

    pub fn error_for(&self, key: FieldKey) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == key)
            .map(|e| e.message.as_str())
    }
}

#[derive(Default)]
struct Findings {
    errors: Vec<FieldError>,
    warnings: Vec<String>,
}

impl Findings {
    fn error(&mut self, field: FieldKey, message: impl Into<String>) {
        if self.errors.iter().any(|e| e.field == field) {
            return;
        }
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

/// Spaces, hyphens and parentheses are ignored before matching.
pub fn is_valid_phone(phone: &str) -> bool {
    let digits: String = phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    PHONE.is_match(&digits)
}

/// Run every rule against `invoice` and classify the outcome.
///
/// `totals` must come from [`crate::calculator::compute_totals`] over the same
/// items; `today` anchors the future-date check.
pub fn validate(invoice: &Invoice, totals: &Totals, today: NaiveDate) -> ValidationReport {
    let mut findings = Findings::default();
    let header = &invoice.header;

    let client_name = header.client.name.trim();
    if client_name.is_empty() {
        findings.error(FieldKey::Header(HeaderField::ClientName), "Client name is required");
    } else if client_name.chars().count() < 2 {
        findings.warn("Client name seems very short");
    }

    if let Some(vendor) = &header.vendor {
        if vendor.name.trim().is_empty() {
            findings.error(FieldKey::Header(HeaderField::VendorName), "Vendor name is required");
        }
    }

    if let Some(number) = &header.invoice_number {
        if number.trim().is_empty() {
            findings.error(
                FieldKey::Header(HeaderField::InvoiceNumber),
                "Invoice number is required",
            );
        }
    }

    check_contact(
        &mut findings,
        &header.client,
        HeaderField::ClientEmail,
        HeaderField::ClientPhone,
    );
    if let Some(vendor) = &header.vendor {
        check_contact(
            &mut findings,
            vendor,
            HeaderField::VendorEmail,
            HeaderField::VendorPhone,
        );
    }

    let future_limit = today.checked_add_months(Months::new(12)).unwrap_or(NaiveDate::MAX);
    if header.invoice_date > future_limit {
        findings.warn("Invoice date is more than a year in the future");
    }

    if let Some(due) = header.due_date {
        if due < header.invoice_date {
            findings.error(
                FieldKey::Header(HeaderField::DueDate),
                "Due date cannot be before invoice date",
            );
        }
    }

    let mut has_contributing_item = false;
    for (index, item) in invoice.items.iter().enumerate() {
        let n = index + 1;
        let description = item.description.trim();
        if description.is_empty() {
            findings.error(
                FieldKey::Item(item.id, ItemField::Description),
                "Description is required",
            );
        } else if description.chars().count() < 3 {
            findings.warn(format!("Item {n}: Description seems very short"));
        }

        let quantity = parse_number(item.quantity.as_str());
        match quantity {
            Some(q) if q > 0.0 => {
                if q > MAX_QUANTITY_WITHOUT_WARNING {
                    findings.warn(format!("Item {n}: Very high quantity ({})", format_number(q)));
                }
            }
            _ => findings.error(
                FieldKey::Item(item.id, ItemField::Quantity),
                "Quantity must be greater than 0",
            ),
        }

        // Unparseable rate is treated like a negative one.
        let rate = parse_number(item.rate.as_str());
        match rate {
            Some(r) if r >= 0.0 => {
                if r == 0.0 {
                    findings.warn(format!("Item {n}: Rate is set to 0"));
                } else if r > MAX_RATE_WITHOUT_WARNING {
                    findings.warn(format!("Item {n}: Very high rate ({})", format_currency(r)));
                }
            }
            _ => findings.error(
                FieldKey::Item(item.id, ItemField::Rate),
                "Rate must be 0 or greater",
            ),
        }

        if !description.is_empty()
            && quantity.is_some_and(|q| q > 0.0)
            && rate.is_some_and(|r| r >= 0.0)
        {
            has_contributing_item = true;
        }
    }

    if totals.total == 0.0 && has_contributing_item {
        findings.warn("Invoice total is 0 - check your rates");
    } else if totals.total > MAX_TOTAL_WITHOUT_WARNING {
        findings.warn(format!(
            "Very high invoice total: {}",
            format_currency(totals.total)
        ));
    }

    let item_count = invoice.items.len();
    if item_count > MAX_ITEMS_WITHOUT_WARNING {
        findings.warn(format!("High number of line items ({item_count})"));
    }

    let report = classify(findings, invoice, totals);
    tracing::debug!(
        classification = ?report.classification,
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        "invoice validated"
    );
    report
}

fn check_contact(findings: &mut Findings, party: &Party, email: HeaderField, phone: HeaderField) {
    let mail = party.email.trim();
    if !mail.is_empty() && !is_valid_email(mail) {
        findings.error(FieldKey::Header(email), "Please enter a valid email address");
    }

    let number = party.phone.trim();
    if !number.is_empty() && !is_valid_phone(number) {
        findings.error(FieldKey::Header(phone), "Please enter a valid phone number");
    }
}

fn classify(findings: Findings, invoice: &Invoice, totals: &Totals) -> ValidationReport {
    let Findings { errors, warnings } = findings;

    if !errors.is_empty() {
        let details = errors.iter().map(|e| e.message.clone()).collect();
        return ValidationReport {
            classification: Classification::Invalid,
            message: format!("Found {} error(s) that need to be fixed", errors.len()),
            errors,
            warnings,
            details,
        };
    }

    if !warnings.is_empty() {
        return ValidationReport {
            classification: Classification::ValidWithWarnings,
            message: "Invoice is valid but has some warnings".to_string(),
            errors,
            details: warnings.clone(),
            warnings,
        };
    }

    let header = &invoice.header;
    let mut details = vec![format!("Client: {}", header.client.name)];
    if let Some(vendor) = &header.vendor {
        details.push(format!("Vendor: {}", vendor.name));
    }
    details.push(format!("Items: {}", invoice.items.len()));
    details.push(format!("Total: {}", format_currency(totals.total)));

    ValidationReport {
        classification: Classification::Valid,
        message: "Invoice is valid and ready to use!".to_string(),
        errors,
        warnings,
        details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::compute_totals;
    use crate::model::{InvoiceHeader, LineItem};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn item(id: u64, description: &str, quantity: &str, rate: &str) -> LineItem {
        LineItem {
            id: LineItemId(id),
            description: description.to_string(),
            quantity: quantity.into(),
            rate: rate.into(),
        }
    }

    fn invoice(client: &str, items: Vec<LineItem>) -> Invoice {
        Invoice {
            header: InvoiceHeader {
                client: Party::named(client),
                invoice_date: today(),
                ..InvoiceHeader::default()
            },
            items,
        }
    }

    fn run(invoice: &Invoice) -> ValidationReport {
        validate(invoice, &compute_totals(&invoice.items), today())
    }

    fn item_key(id: u64, field: ItemField) -> FieldKey {
        FieldKey::Item(LineItemId(id), field)
    }

    #[test]
    fn blank_fields_and_bad_numbers_are_invalid() {
        let report = run(&invoice("", vec![item(1, "", "0", "-5")]));

        assert_eq!(report.classification, Classification::Invalid);
        assert_eq!(report.errors.len(), 4);
        assert!(report.warnings.is_empty());
        assert_eq!(report.message, "Found 4 error(s) that need to be fixed");
        assert_eq!(
            report.details,
            vec![
                "Client name is required",
                "Description is required",
                "Quantity must be greater than 0",
                "Rate must be 0 or greater",
            ]
        );
        assert_eq!(
            report.error_for(FieldKey::Header(HeaderField::ClientName)),
            Some("Client name is required")
        );
        assert!(report.error_for(item_key(1, ItemField::Description)).is_some());
        assert!(report.error_for(item_key(1, ItemField::Quantity)).is_some());
        assert!(report.error_for(item_key(1, ItemField::Rate)).is_some());
    }

    #[test]
    fn zero_rate_and_short_name_only_warn() {
        let inv = invoice("A", vec![item(1, "Widget", "2", "0")]);
        let totals = compute_totals(&inv.items);
        let report = validate(&inv, &totals, today());

        assert_eq!(totals, Totals::default());
        assert_eq!(report.classification, Classification::ValidWithWarnings);
        assert_eq!(report.message, "Invoice is valid but has some warnings");
        assert!(report.warnings.contains(&"Client name seems very short".to_string()));
        assert!(report.warnings.contains(&"Item 1: Rate is set to 0".to_string()));
        assert!(report.warnings.contains(&"Invoice total is 0 - check your rates".to_string()));
        assert_eq!(report.details, report.warnings);
    }

    #[test]
    fn clean_invoice_is_valid_with_summary() {
        let inv = invoice("Acme Corp", vec![item(1, "Consulting Services", "10", "500")]);
        let totals = compute_totals(&inv.items);
        let report = validate(&inv, &totals, today());

        assert_eq!(totals.subtotal, 5000.0);
        assert!((totals.tax - 900.0).abs() < 1e-9);
        assert!((totals.total - 5900.0).abs() < 1e-9);
        assert_eq!(report.classification, Classification::Valid);
        assert_eq!(report.message, "Invoice is valid and ready to use!");
        assert_eq!(
            report.details,
            vec!["Client: Acme Corp", "Items: 1", "Total: ₹5,900.00"]
        );
    }

    #[test]
    fn summary_names_vendor_when_present() {
        let mut inv = invoice("Acme Corp", vec![item(1, "Consulting Services", "10", "500")]);
        inv.header.vendor = Some(Party::named("Northwind"));
        let report = run(&inv);
        assert_eq!(report.details[1], "Vendor: Northwind");
    }

    #[test]
    fn due_date_before_invoice_date_is_an_error() {
        let mut inv = invoice("Acme Corp", vec![item(1, "Consulting Services", "10", "500")]);
        inv.header.due_date = today().pred_opt();
        let key = FieldKey::Header(HeaderField::DueDate);

        let report = run(&inv);
        assert_eq!(report.classification, Classification::Invalid);
        assert_eq!(report.error_for(key), Some("Due date cannot be before invoice date"));

        inv.header.due_date = Some(today());
        assert_eq!(run(&inv).error_for(key), None);

        inv.header.due_date = today().succ_opt();
        let report = run(&inv);
        assert_eq!(report.error_for(key), None);
        assert_eq!(report.classification, Classification::Valid);
    }

    #[test]
    fn quantity_boundary() {
        let at = run(&invoice("Acme Corp", vec![item(1, "Bolts", "1000", "1")]));
        assert!(at.warnings.is_empty());

        let over = run(&invoice("Acme Corp", vec![item(1, "Bolts", "1001", "1")]));
        assert_eq!(over.warnings, vec!["Item 1: Very high quantity (1001)"]);

        let huge = run(&invoice("Acme Corp", vec![item(1, "Bolts", "1e21", "1")]));
        assert!(huge.warnings.contains(&"Item 1: Very high quantity (1e+21)".to_string()));
    }

    #[test]
    fn rate_boundary() {
        let at = run(&invoice("Acme Corp", vec![item(1, "Audit", "1", "100000")]));
        assert!(at.warnings.is_empty());

        let over = run(&invoice("Acme Corp", vec![item(1, "Audit", "1", "100000.01")]));
        assert_eq!(over.warnings, vec!["Item 1: Very high rate (₹1,00,000.01)"]);
    }

    #[test]
    fn item_count_boundary() {
        let rows = |n: u64| (1..=n).map(|i| item(i, "Hosting", "1", "10")).collect::<Vec<_>>();

        assert!(run(&invoice("Acme Corp", rows(20))).warnings.is_empty());
        assert_eq!(
            run(&invoice("Acme Corp", rows(21))).warnings,
            vec!["High number of line items (21)"]
        );
    }

    #[test]
    fn high_total_warns_with_formatted_amount() {
        let report = run(&invoice("Acme Corp", vec![item(1, "Turbine", "20", "50000")]));
        assert_eq!(report.warnings, vec!["Very high invoice total: ₹11,80,000.00"]);
    }

    #[test]
    fn unparseable_rate_is_an_error() {
        let report = run(&invoice("Acme Corp", vec![item(1, "Audit", "1", "abc")]));
        assert_eq!(
            report.error_for(item_key(1, ItemField::Rate)),
            Some("Rate must be 0 or greater")
        );
    }

    #[test]
    fn short_description_warns_with_position() {
        let report = run(&invoice(
            "Acme Corp",
            vec![item(4, "Consulting", "1", "10"), item(9, "QA", "1", "10")],
        ));
        assert_eq!(report.warnings, vec!["Item 2: Description seems very short"]);
    }

    #[test]
    fn far_future_invoice_date_warns() {
        let mut inv = invoice("Acme Corp", vec![item(1, "Consulting", "1", "10")]);
        inv.header.invoice_date = NaiveDate::from_ymd_opt(2027, 10, 19).unwrap();
        assert!(run(&inv).warnings.is_empty());

        inv.header.invoice_date = NaiveDate::from_ymd_opt(2027, 10, 20).unwrap();
        assert_eq!(
            run(&inv).warnings,
            vec!["Invoice date is more than a year in the future"]
        );
    }

    #[test]
    fn optional_contact_fields_are_checked_when_filled() {
        let mut inv = invoice("Acme Corp", vec![item(1, "Consulting", "1", "10")]);
        inv.header.client.email = "billing@acme.in".to_string();
        inv.header.client.phone = "+91 (98) 7654-3210".to_string();
        assert_eq!(run(&inv).classification, Classification::Valid);

        inv.header.client.email = "billing@acme".to_string();
        inv.header.client.phone = "0123".to_string();
        let report = run(&inv);
        assert_eq!(
            report.error_for(FieldKey::Header(HeaderField::ClientEmail)),
            Some("Please enter a valid email address")
        );
        assert_eq!(
            report.error_for(FieldKey::Header(HeaderField::ClientPhone)),
            Some("Please enter a valid phone number")
        );
    }

    #[test]
    fn vendor_and_number_required_when_in_schema() {
        let mut inv = invoice("Acme Corp", vec![item(1, "Consulting", "1", "10")]);
        inv.header.vendor = Some(Party {
            email: "not-an-email".to_string(),
            ..Party::default()
        });
        inv.header.invoice_number = Some("  ".to_string());

        let report = run(&inv);
        assert_eq!(report.errors.len(), 3);
        assert!(report.error_for(FieldKey::Header(HeaderField::VendorName)).is_some());
        assert!(report.error_for(FieldKey::Header(HeaderField::InvoiceNumber)).is_some());
        assert!(report.error_for(FieldKey::Header(HeaderField::VendorEmail)).is_some());
    }

    #[test]
    fn phone_pattern() {
        assert!(is_valid_phone("9876543210"));
        assert!(is_valid_phone("+1 (555) 010-9999"));
        assert!(!is_valid_phone("+0 555 0100"));
        assert!(!is_valid_phone("12"));
        assert!(!is_valid_phone("1234567890123456"));
    }

    #[test]
    fn field_keys_render_like_form_ids() {
        assert_eq!(FieldKey::Header(HeaderField::DueDate).to_string(), "due_date");
        assert_eq!(item_key(17, ItemField::Quantity).to_string(), "17-quantity");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn validate_is_idempotent(
                client in "[ A-Za-z]{0,12}",
                rows in proptest::collection::vec(("[ a-z]{0,8}", "-?[0-9]{0,5}", "-?[0-9]{0,7}"), 1..25)
            ) {
                let items = rows
                    .iter()
                    .enumerate()
                    .map(|(i, (d, q, r))| item(i as u64 + 1, d, q, r))
                    .collect();
                let inv = invoice(&client, items);

                prop_assert_eq!(run(&inv), run(&inv));
            }
        }
    }
}
