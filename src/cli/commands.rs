use crate::codec::{DecodeReport, EncodeReport, OutputTarget};
use crate::error::{XtractError, XtractResult};
use crate::service::Converter;
use crate::template::{DuplicateSheetPolicy, Template, TemplateEdit};
use colored::Colorize;
use std::path::PathBuf;

/// Parse a `KEY=VALUE` mapping argument.
pub fn parse_mapping(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((from, to)) if !from.trim().is_empty() && !to.trim().is_empty() => {
            Ok((from.trim().to_string(), to.trim().to_string()))
        }
        _ => Err(format!("expected FROM=TO, got '{}'", arg)),
    }
}

/// Parse a duplicate-sheet policy name.
pub fn parse_duplicate_policy(arg: &str) -> Result<DuplicateSheetPolicy, String> {
    match arg.replace('-', "_").as_str() {
        "error" => Ok(DuplicateSheetPolicy::Error),
        "last_wins" => Ok(DuplicateSheetPolicy::LastWins),
        _ => Err(format!("expected 'error' or 'last-wins', got '{}'", arg)),
    }
}

/// "No data" is a notice, not a failure.
fn tolerate_no_data<T>(result: XtractResult<T>) -> XtractResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(XtractError::NoData(message)) => {
            println!("{} {}", "ℹ️  Nothing to do:".yellow().bold(), message);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Execute the encode command
pub fn encode(
    converter: &Converter,
    input: PathBuf,
    template: &str,
    verbose: bool,
) -> XtractResult<()> {
    println!("{}", "📦 xtract - Encode".bold().green());
    println!("   Input:    {}", input.display());
    println!("   Template: {}", template.bright_blue().bold());
    println!("   Output:   {}\n", converter.output_dir().display());

    if verbose {
        print_template_summary(&converter.template(template)?);
    }

    let Some(report) = tolerate_no_data(converter.encode(&input, template))? else {
        return Ok(());
    };
    print_encode_report(&report, verbose);
    Ok(())
}

fn print_encode_report(report: &EncodeReport, verbose: bool) {
    println!("{}", "✅ Encode Complete!".bold().green());
    println!("   Archive: {}", report.archive_path.display().to_string().bold());
    println!(
        "   Request: {}  Timestamp: {}\n",
        report.request_id.bright_yellow(),
        report.timestamp
    );

    for sheet in &report.sheets {
        let label = if sheet.logical_name == sheet.sheet_name {
            sheet.sheet_name.clone()
        } else {
            format!("{} → {}", sheet.sheet_name, sheet.logical_name)
        };
        println!(
            "   📄 {} ({} rows, {} columns)",
            label.bright_blue().bold(),
            sheet.row_count,
            sheet.column_count
        );
        if verbose {
            println!("      {}", sheet.file_name.dimmed());
        }
    }

    if !report.skipped_sheets.is_empty() {
        println!(
            "\n   {} {}",
            "Skipped cache sheets:".yellow(),
            report.skipped_sheets.join(", ")
        );
    }
    println!();
}

/// Execute the decode command
pub fn decode(
    converter: &Converter,
    input: PathBuf,
    template: &str,
    output: Option<PathBuf>,
    verbose: bool,
) -> XtractResult<()> {
    println!("{}", "📂 xtract - Decode".bold().green());
    println!("   Input:    {}", input.display());
    println!("   Template: {}\n", template.bright_blue().bold());

    if verbose {
        print_template_summary(&converter.template(template)?);
    }

    let result = match output {
        Some(path) => converter.decode_to(&input, template, &OutputTarget::File(path)),
        None => converter.decode(&input, template),
    };
    let Some(report) = tolerate_no_data(result)? else {
        return Ok(());
    };
    print_decode_report(&report, verbose);
    Ok(())
}

fn print_decode_report(report: &DecodeReport, verbose: bool) {
    println!("{}", "✅ Decode Complete!".bold().green());
    println!(
        "   Spreadsheet: {}\n",
        report.workbook_path.display().to_string().bold()
    );
    for sheet in &report.sheets {
        println!(
            "   📊 {} ({} rows, {} columns)",
            sheet.sheet_name.bright_blue().bold(),
            sheet.row_count,
            sheet.column_count
        );
        if verbose {
            println!("      from {}", sheet.file_name.dimmed());
        }
    }
    if verbose && !report.skipped_members.is_empty() {
        println!(
            "\n   {} {}",
            "Ignored archive members:".yellow(),
            report.skipped_members.join(", ")
        );
    }
    println!();
}

fn print_template_summary(template: &Template) {
    println!("{}", "📋 Template:".cyan());
    println!("   Delimiter: {:?}", template.delimiter);
    println!(
        "   Records:   {} header, {} trailer",
        template.header_record_count, template.trailer_record_count
    );
    println!("   Files:     {}", template.file_naming_pattern);
    println!("   Archive:   {}\n", template.archive_naming_pattern);
}

/// List stored templates
pub fn template_list(converter: &Converter) -> XtractResult<()> {
    let names = converter.list_templates();
    match converter.store().path() {
        Some(path) => println!("{} {}", "📚 Templates in".bold().green(), path.display()),
        None => println!("{}", "📚 Templates".bold().green()),
    }
    if names.is_empty() {
        println!("   (none)");
    }
    for name in names {
        println!("   • {}", name.bright_blue());
    }
    Ok(())
}

/// Print one template as YAML
pub fn template_show(converter: &Converter, name: &str) -> XtractResult<()> {
    if !converter.store().exists(name) {
        println!(
            "{}",
            format!("⚠️  '{}' is not stored; showing the default template", name).yellow()
        );
    }
    let template = converter.store().get(name);
    println!("{}", format!("📋 {}", name).bold().green());
    print!("{}", serde_yaml::to_string(&template)?);
    Ok(())
}

/// Create (or overwrite) a template with the standard formats
pub fn template_create(
    converter: &mut Converter,
    name: &str,
    delimiter: char,
    header_records: usize,
    trailer_records: usize,
) -> XtractResult<()> {
    let overwriting = converter.store().exists(name);
    let template = converter.create_template(name, delimiter, header_records, trailer_records)?;
    if overwriting {
        println!("{}", format!("♻️  Replaced template '{}'", name).bold().yellow());
    } else {
        println!("{}", format!("✅ Created template '{}'", name).bold().green());
    }
    println!("   Files:   {}", template.file_naming_pattern);
    println!("   Archive: {}", template.archive_naming_pattern);
    Ok(())
}

/// Delete a template
pub fn template_delete(converter: &mut Converter, name: &str) -> XtractResult<()> {
    if converter.delete_template(name)? {
        println!("{}", format!("🗑️  Deleted template '{}'", name).bold().green());
    } else {
        println!("{}", format!("⚠️  No template named '{}'", name).yellow());
    }
    Ok(())
}

/// Edit formats and mappings of a stored template
pub fn template_set(converter: &mut Converter, name: &str, edit: TemplateEdit) -> XtractResult<()> {
    if edit.is_empty() {
        println!("{}", "⚠️  Nothing to change".yellow());
        return Ok(());
    }
    let template = converter.update_template(name, edit)?;
    println!("{}", format!("✅ Updated template '{}'", name).bold().green());
    println!("   Header:  {}", template.header_format);
    println!("   Trailer: {}", template.trailer_format);
    for (raw, logical) in &template.sheet_name_mappings {
        println!("   Sheet:   {} → {}", raw, logical);
    }
    for (from, to) in &template.column_mappings {
        println!("   Column:  {} → {}", from, to);
    }
    Ok(())
}
