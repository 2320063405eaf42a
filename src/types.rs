use std::collections::BTreeMap;

/// Marker the producing spreadsheet tool embeds in the names of sheets that
/// hold formula caches. Such sheets never leave the workbook.
pub const CACHE_SHEET_MARKER: &str = "__FDSCACHE__";

//==============================================================================
// Sheet Tables
//==============================================================================

/// One sheet of text cells: named columns plus rows of equal width.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SheetTable {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SheetTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Build a table from column names and rows, padding short rows with
    /// empty cells.
    ///
    /// Rows wider than the column list are kept as-is; callers that need to
    /// reject them check [`SheetTable::widest_row`] first.
    pub fn with_rows(
        name: impl Into<String>,
        columns: Vec<String>,
        rows: impl IntoIterator<Item = Vec<String>>,
    ) -> Self {
        let mut table = Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        };
        for row in rows {
            table.push_row(row);
        }
        table
    }

    /// Append a row, padded to the column count.
    pub fn push_row(&mut self, mut row: Vec<String>) {
        if row.len() < self.columns.len() {
            row.resize(self.columns.len(), String::new());
        }
        self.rows.push(row);
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.rows.is_empty()
    }

    /// Width of the widest row (0 for a table without rows).
    pub fn widest_row(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// True when the sheet carries the formula-cache marker.
    pub fn is_cache_sheet(&self) -> bool {
        is_cache_sheet_name(&self.name)
    }

    /// Rename columns found in `mappings` (matched on the trimmed name);
    /// unmatched columns pass through.
    pub fn rename_columns(&mut self, mappings: &BTreeMap<String, String>) {
        for column in &mut self.columns {
            if let Some(mapped) = mappings.get(column.trim()) {
                *column = mapped.clone();
            }
        }
    }

    /// Trim surrounding whitespace from every cell and column name, then drop
    /// rows whose cells are all empty.
    pub fn trim_cells(&mut self) {
        for column in &mut self.columns {
            trim_in_place(column);
        }
        for row in &mut self.rows {
            for cell in row.iter_mut() {
                trim_in_place(cell);
            }
        }
        self.rows.retain(|row| row.iter().any(|cell| !cell.is_empty()));
    }

    /// Look up a cell by row index and column name.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(idx).map(String::as_str)
    }
}

fn trim_in_place(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}

pub fn is_cache_sheet_name(name: &str) -> bool {
    name.contains(CACHE_SHEET_MARKER)
}

/// Longest worksheet name a spreadsheet accepts.
pub const MAX_SHEET_NAME_CHARS: usize = 31;

const FORBIDDEN_SHEET_NAME_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

/// Check `name` against the worksheet naming rules, returning the broken
/// rule.
pub fn check_sheet_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("worksheet name is empty".to_string());
    }
    let len = name.chars().count();
    if len > MAX_SHEET_NAME_CHARS {
        return Err(format!(
            "worksheet name '{}' has {} characters; the limit is {}",
            name, len, MAX_SHEET_NAME_CHARS
        ));
    }
    if let Some(ch) = name.chars().find(|c| FORBIDDEN_SHEET_NAME_CHARS.contains(c)) {
        return Err(format!("worksheet name '{}' contains '{}'", name, ch));
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(format!(
            "worksheet name '{}' starts or ends with an apostrophe",
            name
        ));
    }
    if name.eq_ignore_ascii_case("history") {
        return Err(format!("worksheet name '{}' is reserved", name));
    }
    Ok(())
}

/// Worksheet names are unique regardless of case.
pub fn sheet_names_collide(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

//==============================================================================
// Workbooks
//==============================================================================

/// An ordered collection of sheets; `name` is the source file stem.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Workbook {
    pub name: String,
    pub sheets: Vec<SheetTable>,
}

impl Workbook {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sheets: Vec::new(),
        }
    }

    pub fn add_sheet(&mut self, sheet: SheetTable) {
        self.sheets.push(sheet);
    }

    pub fn sheet(&self, name: &str) -> Option<&SheetTable> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }
}
