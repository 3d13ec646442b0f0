use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use comfy_table::{Attribute, Cell, Color, Table};
use inquire::{Confirm, DateSelect, InquireError, Select, Text};

use invoice_desk::calculator::line_total;
use invoice_desk::config::{self, AppSettings};
use invoice_desk::draft::Draft;
use invoice_desk::export::{Exporter, TypstCompiler};
use invoice_desk::format::{format_currency, format_date};
use invoice_desk::model::{HeaderField, InvoiceHeader, ItemField, LineItemId, Party};
use invoice_desk::state::{Action, HeaderEdit, InvoiceState, apply_edit};
use invoice_desk::template::Template;
use invoice_desk::validator::{Classification, FieldKey, ValidationReport};
use invoice_desk::{TAX_RATE, logging};

// ==========================================
// CLI
// ==========================================

#[derive(Parser)]
#[command(name = "invoice-desk", about = "Compose, validate and export invoices")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose a new invoice interactively
    New,
    /// Validate a draft file
    Validate {
        draft: PathBuf,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show totals and the rendered layout for a draft file
    Preview {
        draft: PathBuf,
        #[arg(long, value_enum)]
        template: Option<Template>,
        /// Also print the generated Typst source
        #[arg(long)]
        source: bool,
    },
    /// Export a draft file to PDF
    Export {
        draft: PathBuf,
        #[arg(long, value_enum)]
        template: Option<Template>,
        /// Output directory (defaults to the configured one)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Configure output directory and default layout
    Config,
}

// ==========================================
// Main Function
// ==========================================

fn main() -> ExitCode {
    logging::init();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        use clap::CommandFactory;
        if let Err(e) = Cli::command().print_help() {
            eprintln!("❌ Error: {e}");
        }
        return ExitCode::SUCCESS;
    };

    if let Commands::Config = command {
        return match setup_config_wizard() {
            Some(_) => ExitCode::SUCCESS,
            None => ExitCode::FAILURE,
        };
    }

    let settings = match config::load_settings_from(&config::config_dir()) {
        Ok(Some(settings)) => settings,
        Ok(None) => AppSettings::default(),
        Err(e) => {
            eprintln!("❌ Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let today = Local::now().date_naive();

    match command {
        Commands::New => run_session(&settings, today),
        Commands::Validate { draft, json } => validate_draft(&draft, json, today),
        Commands::Preview { draft, template, source } => {
            preview_draft(&draft, template.unwrap_or(settings.default_template), source)
        }
        Commands::Export { draft, template, out } => {
            let out = out.unwrap_or_else(|| settings.output_path());
            export_draft(&draft, template.unwrap_or(settings.default_template), &out, today)
        }
        Commands::Config => ExitCode::SUCCESS,
    }
}

// ==========================================
// 1. Draft Commands
// ==========================================

fn load_draft(path: &Path) -> Option<InvoiceState> {
    match Draft::load(path) {
        Ok(draft) => Some(draft.into_state()),
        Err(e) => {
            eprintln!("❌ Error: {e}");
            None
        }
    }
}

fn validate_draft(path: &Path, json: bool, today: NaiveDate) -> ExitCode {
    let Some(state) = load_draft(path) else {
        return ExitCode::FAILURE;
    };
    let state = apply_edit(state, Action::Validate { today });
    let Some(report) = state.report() else {
        return ExitCode::FAILURE;
    };

    if json {
        match serde_json::to_string_pretty(report) {
            Ok(out) => println!("{out}"),
            Err(e) => {
                eprintln!("❌ Error: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        print_report(report);
    }

    if report.is_valid() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn preview_draft(path: &Path, template: Template, source: bool) -> ExitCode {
    let Some(state) = load_draft(path) else {
        return ExitCode::FAILURE;
    };
    print_preview(&state);

    if source {
        let invoice = state.logical_invoice();
        match template.render(&invoice, &state.totals()) {
            Ok(markup) => {
                println!("\n--- {template} layout ---");
                println!("{markup}");
            }
            Err(e) => {
                eprintln!("❌ Error: {e}");
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}

fn export_draft(path: &Path, template: Template, out: &Path, today: NaiveDate) -> ExitCode {
    let Some(state) = load_draft(path) else {
        return ExitCode::FAILURE;
    };
    if export_state(state, template, out, today).is_some() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Export or explain why not. Returns the validated state on success.
fn export_state(
    state: InvoiceState,
    template: Template,
    out: &Path,
    today: NaiveDate,
) -> Option<InvoiceState> {
    let state = apply_edit(state, Action::Validate { today });
    if let Some(report) = state.report() {
        if !report.is_valid() {
            print_report(report);
        }
    }

    let exporter = Exporter::new(TypstCompiler, out);
    println!("\n🔨 Compiling PDF ({template})...");
    match exporter.export(&state.logical_invoice(), template, today) {
        Ok(pdf) => {
            println!("✅ PDF Generated: {}", pdf.display());
            open_and_reveal(&pdf);
            Some(state)
        }
        Err(e) => {
            println!("❌ Export failed: {e}");
            None
        }
    }
}

// ==========================================
// 2. Interactive Session
// ==========================================

#[derive(Clone, Copy)]
enum MenuChoice {
    EditClient,
    EditVendor,
    EditDetails,
    AddItem,
    EditItem,
    RemoveItem,
    Preview,
    Validate,
    Export,
    Quit,
}

impl MenuChoice {
    const ALL: [MenuChoice; 10] = [
        MenuChoice::AddItem,
        MenuChoice::EditItem,
        MenuChoice::RemoveItem,
        MenuChoice::EditClient,
        MenuChoice::EditVendor,
        MenuChoice::EditDetails,
        MenuChoice::Preview,
        MenuChoice::Validate,
        MenuChoice::Export,
        MenuChoice::Quit,
    ];
}

impl fmt::Display for MenuChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MenuChoice::EditClient => "👤 Edit client",
            MenuChoice::EditVendor => "🏢 Edit vendor",
            MenuChoice::EditDetails => "📅 Invoice number & dates",
            MenuChoice::AddItem => "➕ Add line item",
            MenuChoice::EditItem => "✏️  Edit line item",
            MenuChoice::RemoveItem => "🗑️  Remove line item",
            MenuChoice::Preview => "👀 Preview",
            MenuChoice::Validate => "🔍 Validate",
            MenuChoice::Export => "📄 Export PDF",
            MenuChoice::Quit => "🚪 Quit",
        };
        f.write_str(label)
    }
}

fn run_session(settings: &AppSettings, today: NaiveDate) -> ExitCode {
    let vendor = match config::load_sender_from(&config::config_dir()) {
        Ok(vendor) => Some(vendor),
        Err(e) => {
            println!("⚠️  Could not load vendor defaults: {e}");
            None
        }
    };

    let header = InvoiceHeader {
        vendor,
        invoice_number: Some(format!("INV-{}-01", today.format("%Y%m%d"))),
        invoice_date: today,
        ..InvoiceHeader::default()
    };
    let mut state = InvoiceState::new(header);

    println!("\n--- New Invoice ---");
    state = edit_client(state);
    let first = state.invoice().items[0].id;
    state = edit_item(state, first);

    loop {
        let Some(choice) = answered(Select::new("What next?", MenuChoice::ALL.to_vec()).prompt())
        else {
            break;
        };

        state = match choice {
            MenuChoice::EditClient => edit_client(state),
            MenuChoice::EditVendor => edit_vendor(state),
            MenuChoice::EditDetails => edit_details(state),
            MenuChoice::AddItem => {
                let state = apply_edit(state, Action::AddItem);
                let id = state.invoice().items[state.invoice().items.len() - 1].id;
                edit_item(state, id)
            }
            MenuChoice::EditItem => match pick_item(&state, "Edit which item?") {
                Some(id) => edit_item(state, id),
                None => state,
            },
            MenuChoice::RemoveItem => remove_item(state),
            MenuChoice::Preview => {
                print_preview(&state);
                state
            }
            MenuChoice::Validate => {
                let state = apply_edit(state, Action::Validate { today });
                if let Some(report) = state.report() {
                    print_report(report);
                }
                state
            }
            MenuChoice::Export => {
                let template = pick_template(settings.default_template);
                match export_state(state.clone(), template, &settings.output_path(), today) {
                    Some(validated) => validated,
                    None => apply_edit(state, Action::Validate { today }),
                }
            }
            MenuChoice::Quit => {
                let quit = answered(
                    Confirm::new("Quit? The invoice is not saved.")
                        .with_default(false)
                        .prompt(),
                )
                .unwrap_or(true);
                if quit {
                    break;
                }
                state
            }
        };
    }

    ExitCode::SUCCESS
}

fn set_header(state: InvoiceState, field: HeaderField, value: String) -> InvoiceState {
    apply_edit(state, Action::UpdateHeader(HeaderEdit::Set(field, value)))
}

fn edit_client(mut state: InvoiceState) -> InvoiceState {
    let client = state.invoice().header.client.clone();
    let fields = [
        (HeaderField::ClientName, "Client Name:", client.name),
        (HeaderField::ClientEmail, "Client Email (Optional):", client.email),
        (HeaderField::ClientPhone, "Client Phone (Optional):", client.phone),
    ];
    for (field, label, current) in fields {
        state = prompt_header_field(state, field, label, &current);
    }
    prompt_address(state, HeaderField::ClientAddress, &client.address)
}

fn edit_vendor(state: InvoiceState) -> InvoiceState {
    let keep = answered(Confirm::new("Include vendor details?").with_default(true).prompt())
        .unwrap_or(true);
    let mut state = apply_edit(state, Action::UpdateHeader(HeaderEdit::Vendor(keep)));
    if !keep {
        return state;
    }

    let vendor = state.invoice().header.vendor.clone().unwrap_or_default();
    let fields = [
        (HeaderField::VendorName, "Vendor Name:", vendor.name),
        (HeaderField::VendorEmail, "Vendor Email (Optional):", vendor.email),
        (HeaderField::VendorPhone, "Vendor Phone (Optional):", vendor.phone),
    ];
    for (field, label, current) in fields {
        state = prompt_header_field(state, field, label, &current);
    }
    prompt_address(state, HeaderField::VendorAddress, &vendor.address)
}

fn edit_details(state: InvoiceState) -> InvoiceState {
    let header = state.invoice().header.clone();

    let numbered = answered(
        Confirm::new("Number this invoice?")
            .with_default(header.invoice_number.is_some())
            .prompt(),
    )
    .unwrap_or(true);
    let mut state = apply_edit(state, Action::UpdateHeader(HeaderEdit::Numbering(numbered)));
    if numbered {
        let current = header.invoice_number.unwrap_or_default();
        state = prompt_header_field(state, HeaderField::InvoiceNumber, "Invoice Number:", &current);
    }

    if let Some(date) = answered(
        DateSelect::new("Invoice Date:")
            .with_default(header.invoice_date)
            .prompt(),
    ) {
        state = set_header(state, HeaderField::InvoiceDate, date.format("%Y-%m-%d").to_string());
    }

    let wants_due = answered(
        Confirm::new("Set a due date?")
            .with_default(header.due_date.is_some())
            .prompt(),
    )
    .unwrap_or(false);
    if wants_due {
        let default = header.due_date.unwrap_or(header.invoice_date);
        if let Some(date) = answered(DateSelect::new("Due Date:").with_default(default).prompt()) {
            state = set_header(state, HeaderField::DueDate, date.format("%Y-%m-%d").to_string());
        }
    } else {
        state = set_header(state, HeaderField::DueDate, String::new());
    }
    state
}

fn prompt_header_field(
    state: InvoiceState,
    field: HeaderField,
    label: &str,
    current: &str,
) -> InvoiceState {
    match answered(Text::new(label).with_initial_value(current).prompt()) {
        Some(value) if value != current => set_header(state, field, value),
        _ => state,
    }
}

fn prompt_address(state: InvoiceState, field: HeaderField, current: &str) -> InvoiceState {
    println!("💡 Tip: Use '\\n' for new lines in the address.");
    let shown = current.replace('\n', "\\n");
    match answered(Text::new("Address (Optional):").with_initial_value(&shown).prompt()) {
        Some(value) if value != shown => set_header(state, field, value.replace("\\n", "\n")),
        _ => state,
    }
}

fn edit_item(mut state: InvoiceState, id: LineItemId) -> InvoiceState {
    let Some(item) = state.invoice().items.iter().find(|i| i.id == id).cloned() else {
        return state;
    };

    let fields = [
        (ItemField::Description, "Description:", item.description),
        (ItemField::Quantity, "Quantity:", item.quantity.to_string()),
        (ItemField::Rate, "Rate (₹):", item.rate.to_string()),
    ];
    for (field, label, current) in fields {
        if let Some(value) = answered(Text::new(label).with_initial_value(&current).prompt()) {
            if value != current {
                state = apply_edit(state, Action::UpdateItem { id, field, value });
            }
        }
    }
    state
}

fn item_label(index: usize, description: &str) -> String {
    let description = description.trim();
    if description.is_empty() {
        format!("#{} (no description)", index + 1)
    } else {
        format!("#{} {}", index + 1, description)
    }
}

fn pick_item(state: &InvoiceState, prompt: &str) -> Option<LineItemId> {
    let items: Vec<_> = state.active_items().collect();
    let labels: Vec<String> = items
        .iter()
        .enumerate()
        .map(|(i, item)| item_label(i, &item.description))
        .collect();
    let choice = answered(Select::new(prompt, labels.clone()).prompt())?;
    let index = labels.iter().position(|l| *l == choice)?;
    Some(items[index].id)
}

fn remove_item(state: InvoiceState) -> InvoiceState {
    if state.active_items().count() <= 1 {
        println!("⚠️  An invoice needs at least one line item.");
        return state;
    }
    let Some(id) = pick_item(&state, "Remove which item?") else {
        return state;
    };

    let state = apply_edit(state, Action::RemoveItem(id));
    if !state.is_removing(id) {
        println!("⚠️  An invoice needs at least one line item.");
        return state;
    }
    // Terminal output has no exit animation, so the removal is final right away.
    let state = apply_edit(state, Action::FinalizeRemoval(id));
    println!("🗑️  Item removed.");
    state
}

fn pick_template(default: Template) -> Template {
    let start = Template::ALL.iter().position(|t| *t == default).unwrap_or(0);
    answered(
        Select::new("Layout:", Template::ALL.to_vec())
            .with_starting_cursor(start)
            .prompt(),
    )
    .unwrap_or(default)
}

/// `None` when the user cancelled the prompt.
fn answered<T>(result: Result<T, InquireError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => None,
        Err(e) => {
            tracing::warn!(error = %e, "prompt failed");
            None
        }
    }
}

// ==========================================
// 3. Output
// ==========================================

fn print_report(report: &ValidationReport) {
    let icon = match report.classification {
        Classification::Valid => "✅",
        Classification::ValidWithWarnings => "⚠️ ",
        Classification::Invalid => "❌",
    };
    println!("\n{icon} {}", report.message);
    for detail in &report.details {
        println!("   • {detail}");
    }
}

fn error_cell(text: String, error: Option<&str>) -> Cell {
    match error {
        Some(msg) => Cell::new(format!("{text}\n{msg}")).fg(Color::Rgb { r: 185, g: 28, b: 28 }),
        None => Cell::new(text),
    }
}

fn print_preview(state: &InvoiceState) {
    let invoice = state.logical_invoice();
    let header = &invoice.header;
    let totals = state.totals();

    println!("\n--- INVOICE ---");
    if let Some(number) = header.invoice_number.as_deref().filter(|n| !n.trim().is_empty()) {
        println!("No.:          {number}");
    }
    println!("Invoice Date: {}", format_date(header.invoice_date));
    if let Some(due) = header.due_date {
        println!("Due Date:     {}", format_date(due));
    }
    print_party("Bill To", &header.client, "Client Name");
    if let Some(vendor) = &header.vendor {
        print_party("From", vendor, "Your Company");
    }

    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("#"),
        Cell::new("Description"),
        Cell::new("Qty"),
        Cell::new("Rate"),
        Cell::new("Amount"),
    ]);

    for (index, item) in invoice.items.iter().enumerate() {
        let description = if item.description.trim().is_empty() {
            format!("Item {}", index + 1)
        } else {
            item.description.clone()
        };
        let error = move |field| state.field_error(FieldKey::Item(item.id, field));
        table.add_row(vec![
            Cell::new(index + 1),
            error_cell(description, error(ItemField::Description)),
            error_cell(item.quantity.to_string(), error(ItemField::Quantity)),
            error_cell(
                format_currency(invoice_desk::to_number(&item.rate)),
                error(ItemField::Rate),
            ),
            Cell::new(format_currency(line_total(item))),
        ]);
    }

    let gst_label = format!("GST ({}%)", (TAX_RATE * 100.0).round());
    for (label, amount) in [("Subtotal", totals.subtotal), (gst_label.as_str(), totals.tax)] {
        table.add_row(vec![
            Cell::new(""),
            Cell::new(label),
            Cell::new(""),
            Cell::new(""),
            Cell::new(format_currency(amount)),
        ]);
    }
    table.add_row(vec![
        Cell::new(""),
        Cell::new("Total").add_attribute(Attribute::Bold),
        Cell::new(""),
        Cell::new(""),
        Cell::new(format_currency(totals.total)).add_attribute(Attribute::Bold),
    ]);

    println!("{table}");
}

fn print_party(title: &str, party: &Party, placeholder: &str) {
    let name = if party.name.trim().is_empty() { placeholder } else { party.name.as_str() };
    println!("{title}: {name}");
    for line in party.address_lines() {
        println!("    {line}");
    }
    for extra in [&party.email, &party.phone] {
        if !extra.trim().is_empty() {
            println!("    {}", extra.trim());
        }
    }
}

// ==========================================
// 4. Config & Utilities
// ==========================================

fn setup_config_wizard() -> Option<AppSettings> {
    println!("\n⚙️  --- Configuration Setup ---");
    let dir = config::config_dir();
    let current = match config::load_settings_from(&dir) {
        Ok(current) => current.unwrap_or_default(),
        Err(e) => {
            println!("⚠️  Ignoring unreadable settings: {e}");
            AppSettings::default()
        }
    };

    println!("📂 Opening folder picker...");
    let picked_path = rfd::FileDialog::new()
        .set_title("Select Invoice Output Directory")
        .pick_folder();

    let output_dir = match picked_path {
        Some(path) => path.to_string_lossy().to_string(),
        None => {
            println!("❌ No folder selected. Falling back to manual input.");
            answered(
                Text::new("Output Directory:")
                    .with_default(&current.output_dir)
                    .prompt(),
            )?
        }
    };

    let default_template = pick_template(current.default_template);
    let settings = AppSettings {
        output_dir,
        default_template,
    };

    match config::save_settings_to(&dir, &settings) {
        Ok(path) => {
            println!("✅ Settings saved to {}", path.display());
            Some(settings)
        }
        Err(e) => {
            println!("❌ Error: {e}");
            None
        }
    }
}

// Helper: Open file and reveal in Finder/Explorer
fn open_and_reveal(path: &Path) {
    #[cfg(target_os = "macos")]
    Command::new("open").arg("-R").arg(path).spawn().ok();

    #[cfg(target_os = "windows")]
    Command::new("explorer")
        .arg(format!("/select,{}", path.to_string_lossy()))
        .spawn()
        .ok();

    #[cfg(target_os = "linux")]
    Command::new("xdg-open").arg(path).spawn().ok();
}
