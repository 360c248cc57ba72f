//! Export of the current table view to CSV, JSON or an HTML report

use crate::view::html::{detail_html, document, table_html};
use crate::view::{DetailModel, TableModel};
use anyhow::{Context, Result};
use chrono::Local;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
    Html,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Html => "html",
        }
    }

    /// Timestamped file name under `dir`, e.g. `users-20240101-120000.csv`
    pub fn file_path(&self, dir: &Path) -> PathBuf {
        let stamp = Local::now().format("%Y%m%d-%H%M%S");
        dir.join(format!("users-{}.{}", stamp, self.extension()))
    }
}

/// Export a rendered table to a file, returning the written path
///
/// HTML reports also carry the open detail panel, if any.
pub fn export_table(
    table: &TableModel,
    detail: Option<&DetailModel>,
    format: ExportFormat,
    path: &Path,
) -> Result<String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;

    match format {
        ExportFormat::Csv => write_csv(table, &mut file)?,
        ExportFormat::Json => write_json(table, &mut file)?,
        ExportFormat::Html => {
            let mut body = table_html(table);
            if let Some(model) = detail {
                body.push_str(&detail_html(model));
            }
            let page = document("Entra ID users", &body);
            file.write_all(page.as_bytes())?;
        }
    }

    Ok(path.to_string_lossy().to_string())
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn write_csv(table: &TableModel, out: &mut impl Write) -> Result<()> {
    let header: Vec<String> = table.headers.iter().map(|h| csv_field(h.label)).collect();
    writeln!(out, "{}", header.join(","))?;

    for row in &table.rows {
        let line: Vec<String> = row.cells.iter().map(|c| csv_field(c.text())).collect();
        writeln!(out, "{}", line.join(","))?;
    }
    Ok(())
}

fn write_json(table: &TableModel, out: &mut impl Write) -> Result<()> {
    let mut output = Vec::new();
    for row in &table.rows {
        let mut map = serde_json::Map::new();
        map.insert("id".to_string(), serde_json::Value::String(row.user_id.clone()));
        for (header, cell) in table.headers.iter().zip(&row.cells) {
            map.insert(
                header.field.api_name().to_string(),
                serde_json::Value::String(cell.text().to_string()),
            );
        }
        output.push(serde_json::Value::Object(map));
    }

    serde_json::to_writer_pretty(&mut *out, &output)?;
    writeln!(out)?;
    Ok(())
}
