//! Invoice layouts. Each variant is an embedded tera template producing Typst
//! markup; all three are fed the same [`TemplateContext`].

use std::collections::HashMap;
use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tera::{Context, Tera, Value};

use crate::calculator::{TAX_RATE, line_total, to_number};
use crate::error::RenderError;
use crate::format::{format_currency, format_date};
use crate::model::{Invoice, Party, Totals};

// Embedded at compile time so a bare binary can still render.
const MINIMAL: &str = include_str!("../templates/minimal.tera");
const PROFESSIONAL: &str = include_str!("../templates/professional.tera");
const MODERN: &str = include_str!("../templates/modern.tera");

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Template {
    Minimal,
    #[default]
    Professional,
    Modern,
}

impl Template {
    pub const ALL: [Template; 3] = [Template::Minimal, Template::Professional, Template::Modern];

    fn template_name(self) -> &'static str {
        match self {
            Template::Minimal => "minimal",
            Template::Professional => "professional",
            Template::Modern => "modern",
        }
    }

    /// Typst source for `invoice`. `totals` must belong to the same items.
    pub fn render(self, invoice: &Invoice, totals: &Totals) -> Result<String, RenderError> {
        let tera = engine()?;
        let context = Context::from_serialize(TemplateContext::new(invoice, totals))?;
        Ok(tera.render(self.template_name(), &context)?)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Template::Minimal => "Minimal",
            Template::Professional => "Professional",
            Template::Modern => "Modern",
        };
        f.write_str(label)
    }
}

fn engine() -> Result<Tera, RenderError> {
    let mut tera = Tera::default();
    tera.add_raw_templates(vec![
        (Template::Minimal.template_name(), MINIMAL),
        (Template::Professional.template_name(), PROFESSIONAL),
        (Template::Modern.template_name(), MODERN),
    ])?;
    tera.register_filter("typst", typst_string);
    Ok(tera)
}

/// Quote a value as a Typst string literal so user text can't inject markup.
fn typst_string(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    Ok(Value::String(quote_typst(&raw)))
}

fn quote_typst(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('"');
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[derive(Debug, Serialize)]
struct PartyView {
    name: String,
    email: Option<String>,
    phone: Option<String>,
    address_lines: Vec<String>,
}

impl PartyView {
    fn new(party: &Party, placeholder: &str) -> Self {
        let non_blank = |s: &str| {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        };
        Self {
            name: non_blank(&party.name).unwrap_or_else(|| placeholder.to_string()),
            email: non_blank(&party.email),
            phone: non_blank(&party.phone),
            address_lines: party.address_lines().into_iter().map(String::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ItemRow {
    position: usize,
    description: String,
    quantity: String,
    rate: String,
    amount: String,
}

/// Everything a layout may show, already formatted.
#[derive(Debug, Serialize)]
pub struct TemplateContext {
    client: PartyView,
    vendor: Option<PartyView>,
    invoice_number: Option<String>,
    invoice_date: String,
    due_date: Option<String>,
    items: Vec<ItemRow>,
    subtotal: String,
    tax_label: String,
    tax: String,
    total: String,
}

impl TemplateContext {
    pub fn new(invoice: &Invoice, totals: &Totals) -> Self {
        let header = &invoice.header;
        let items = invoice
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let description = item.description.trim();
                let quantity = item.quantity.as_str().trim();
                ItemRow {
                    position: index + 1,
                    description: if description.is_empty() {
                        format!("Item {}", index + 1)
                    } else {
                        description.to_string()
                    },
                    quantity: if quantity.is_empty() { "0".to_string() } else { quantity.to_string() },
                    rate: format_currency(to_number(&item.rate)),
                    amount: format_currency(line_total(item)),
                }
            })
            .collect();

        Self {
            client: PartyView::new(&header.client, "Client Name"),
            vendor: header.vendor.as_ref().map(|v| PartyView::new(v, "Your Company")),
            invoice_number: header
                .invoice_number
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(String::from),
            invoice_date: format_date(header.invoice_date),
            due_date: header.due_date.map(format_date),
            items,
            subtotal: format_currency(totals.subtotal),
            tax_label: format!("GST ({}%)", (TAX_RATE * 100.0).round()),
            tax: format_currency(totals.tax),
            total: format_currency(totals.total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::compute_totals;
    use crate::model::{InvoiceHeader, LineItem, LineItemId};
    use chrono::NaiveDate;

    fn sample() -> Invoice {
        Invoice {
            header: InvoiceHeader {
                client: Party {
                    name: "Acme \"Global\" Corp".to_string(),
                    address: "12 Park Street\n\nKolkata".to_string(),
                    ..Party::default()
                },
                vendor: Some(Party::named("Northwind Traders")),
                invoice_number: Some("INV-0042".to_string()),
                invoice_date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
                due_date: NaiveDate::from_ymd_opt(2026, 11, 18),
            },
            items: vec![
                LineItem {
                    id: LineItemId(1),
                    description: "Consulting Services".to_string(),
                    quantity: "10".into(),
                    rate: "500".into(),
                },
                LineItem {
                    id: LineItemId(2),
                    description: "  ".to_string(),
                    quantity: "".into(),
                    rate: "99".into(),
                },
            ],
        }
    }

    #[test]
    fn every_layout_renders_amounts_and_parties() {
        let invoice = sample();
        let totals = compute_totals(&invoice.items);

        for template in Template::ALL {
            let out = template.render(&invoice, &totals).unwrap();
            assert!(out.contains("\"₹5,900.00\""), "{template} lacks total");
            assert!(out.contains("\"Acme \\\"Global\\\" Corp\""), "{template} lacks client");
            assert!(out.contains("\"Kolkata\""), "{template} lacks address");
            assert!(out.contains("\"19 October 2026\""), "{template} lacks date");
            assert!(out.contains("\"Item 2\""), "{template} lacks fallback description");
        }
    }

    #[test]
    fn professional_layout_shows_vendor_number_and_due_date() {
        let invoice = sample();
        let out = Template::Professional
            .render(&invoice, &compute_totals(&invoice.items))
            .unwrap();
        assert!(out.contains("\"Northwind Traders\""));
        assert!(out.contains("\"INV-0042\""));
        assert!(out.contains("\"18 November 2026\""));
    }

    #[test]
    fn context_fills_placeholders() {
        let mut invoice = sample();
        invoice.header.client.name = "   ".to_string();
        let ctx = TemplateContext::new(&invoice, &compute_totals(&invoice.items));
        assert_eq!(ctx.client.name, "Client Name");
        assert_eq!(ctx.items[1].quantity, "0");
        assert_eq!(ctx.items[1].amount, "₹0.00");
        assert_eq!(ctx.tax_label, "GST (18%)");
    }

    #[test]
    fn quoting_escapes_markup() {
        assert_eq!(quote_typst("a\\b\"c\nd"), "\"a\\\\b\\\"c\\nd\"");
        assert_eq!(quote_typst("#set page(width: 1pt)"), "\"#set page(width: 1pt)\"");
    }
}
