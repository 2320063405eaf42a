use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use xtract::cli;
use xtract::logging;
use xtract::service::Converter;
use xtract::template::{
    DuplicateSheetPolicy, TemplateEdit, TemplateLookup, TemplateStore, DEFAULT_STORE_FILE,
    DEFAULT_TEMPLATE_NAME,
};

#[derive(Parser)]
#[command(name = "xtract")]
#[command(about = "Convert spreadsheets to framed flat-file archives and back")]
#[command(long_about = "xtract - template-driven spreadsheet ↔ flat-file archive converter

Each sheet of a workbook becomes one delimited text file framed by header and
trailer records; all files of a run are bundled into one zip archive. Decoding
reverses the process into a single workbook.

COMMANDS:
  encode    - Spreadsheet (.xlsx) to flat-file archive (.zip)
  decode    - Flat-file archive (.zip) to spreadsheet (.xlsx)
  template  - List, show, create, edit and delete templates

EXAMPLES:
  xtract encode positions.xlsx
  xtract encode positions.xlsx -t Acme --output-dir out/
  xtract decode TAXOPT.LPB.20250314093015123.482913.zip
  xtract template create Acme --delimiter ','
  xtract template set Acme --map-sheet ACCTMST=AccountMaster

Templates are read from xtract-templates.yaml unless --templates or
XTRACT_TEMPLATES points elsewhere. A path ending in .json is read as JSON.")]
#[command(version)]
struct Cli {
    /// Template store file
    #[arg(long, global = true, env = "XTRACT_TEMPLATES", default_value = DEFAULT_STORE_FILE)]
    templates: PathBuf,

    /// Show debug diagnostics and extra detail
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a spreadsheet into a flat-file archive
    Encode {
        /// Spreadsheet to encode (.xlsx)
        input: PathBuf,

        /// Template name
        #[arg(short, long, default_value = DEFAULT_TEMPLATE_NAME)]
        template: String,

        /// Directory the archive is written to
        #[arg(long, env = "XTRACT_OUTPUT_DIR", default_value = ".")]
        output_dir: PathBuf,

        /// Fail if the template is not stored instead of using the default
        #[arg(long)]
        strict: bool,
    },

    /// Decode a flat-file archive into a spreadsheet
    Decode {
        /// Archive to decode (.zip)
        input: PathBuf,

        /// Template name
        #[arg(short, long, default_value = DEFAULT_TEMPLATE_NAME)]
        template: String,

        /// Directory the spreadsheet is written to, named after the archive
        #[arg(long, env = "XTRACT_OUTPUT_DIR", default_value = ".")]
        output_dir: PathBuf,

        /// Exact spreadsheet path (overrides --output-dir)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Fail if the template is not stored instead of using the default
        #[arg(long)]
        strict: bool,
    },

    /// Manage templates
    Template {
        #[command(subcommand)]
        action: TemplateCommands,
    },
}

#[derive(Subcommand)]
enum TemplateCommands {
    /// List stored templates
    List,

    /// Print a template as YAML
    Show {
        name: String,
    },

    /// Create a template with the standard formats (overwrites)
    Create {
        name: String,

        /// Field delimiter
        #[arg(short, long, default_value_t = '|')]
        delimiter: char,

        /// Number of header records per file
        #[arg(long, default_value_t = 1)]
        header_records: usize,

        /// Number of trailer records per file
        #[arg(long, default_value_t = 1)]
        trailer_records: usize,
    },

    /// Delete a template
    Delete {
        name: String,
    },

    /// Change formats and add mappings of a stored template
    Set {
        name: String,

        /// Header record format, e.g. "HDR|{trading_request_id}|{sheet_name}"
        #[arg(long)]
        header_format: Option<String>,

        /// Trailer record format, e.g. "TLR|{row_count}"
        #[arg(long)]
        trailer_format: Option<String>,

        /// Sheet name mapping RAW=LOGICAL (repeatable)
        #[arg(long = "map-sheet", value_parser = cli::parse_mapping)]
        map_sheet: Vec<(String, String)>,

        /// Column name mapping SRC=DST (repeatable)
        #[arg(long = "map-column", value_parser = cli::parse_mapping)]
        map_column: Vec<(String, String)>,

        /// What decode does when two files name the same sheet: error or last-wins
        #[arg(long, value_parser = cli::parse_duplicate_policy)]
        duplicate_sheets: Option<DuplicateSheetPolicy>,
    },
}

fn lookup(strict: bool) -> TemplateLookup {
    if strict {
        TemplateLookup::Strict
    } else {
        TemplateLookup::OrDefault
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let store = TemplateStore::open(&cli.templates).with_context(|| {
        format!(
            "Failed to load template store {}",
            cli.templates.display()
        )
    })?;

    match cli.command {
        Commands::Encode {
            input,
            template,
            output_dir,
            strict,
        } => {
            let converter = Converter::new(store)
                .with_lookup(lookup(strict))
                .with_output_dir(output_dir);
            cli::encode(&converter, input, &template, cli.verbose)?;
        }

        Commands::Decode {
            input,
            template,
            output_dir,
            output,
            strict,
        } => {
            let converter = Converter::new(store)
                .with_lookup(lookup(strict))
                .with_output_dir(output_dir);
            cli::decode(&converter, input, &template, output, cli.verbose)?;
        }

        Commands::Template { action } => {
            let mut converter = Converter::new(store);
            match action {
                TemplateCommands::List => cli::template_list(&converter)?,
                TemplateCommands::Show { name } => cli::template_show(&converter, &name)?,
                TemplateCommands::Create {
                    name,
                    delimiter,
                    header_records,
                    trailer_records,
                } => cli::template_create(
                    &mut converter,
                    &name,
                    delimiter,
                    header_records,
                    trailer_records,
                )?,
                TemplateCommands::Delete { name } => cli::template_delete(&mut converter, &name)?,
                TemplateCommands::Set {
                    name,
                    header_format,
                    trailer_format,
                    map_sheet,
                    map_column,
                    duplicate_sheets,
                } => cli::template_set(
                    &mut converter,
                    &name,
                    TemplateEdit {
                        header_format,
                        trailer_format,
                        sheet_name_mappings: map_sheet,
                        column_mappings: map_column,
                        duplicate_sheets,
                    },
                )?,
            }
        }
    }

    Ok(())
}
