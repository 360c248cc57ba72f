//! HTML rendering of the table and detail models
//!
//! Every directory-supplied string is escaped, including attribute
//! delimiters, before it reaches the markup.

use super::detail::DetailModel;
use super::table::{Cell, TableModel};
use std::fmt::Write;

/// Escape `& < > " ' ` = /` for use in text and attribute values
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '`' => out.push_str("&#x60;"),
            '=' => out.push_str("&#x3D;"),
            '/' => out.push_str("&#x2F;"),
            _ => out.push(c),
        }
    }
    out
}

fn cell_html(cell: &Cell) -> String {
    match cell {
        Cell::Badge(true) => r#"<span class="badge enabled">Enabled</span>"#.to_string(),
        Cell::Badge(false) => r#"<span class="badge disabled">Disabled</span>"#.to_string(),
        Cell::Name(name) => format!(r#"<span class="name">{}</span>"#, escape_html(name)),
        Cell::Text(text) => escape_html(text),
    }
}

/// `<table>` markup for a table model; rows carry the user id
pub fn table_html(model: &TableModel) -> String {
    let mut html = String::from("<table class=\"users\">\n<thead><tr>");
    for header in &model.headers {
        let _ = write!(html, "<th>{}</th>", escape_html(&header.title()));
    }
    html.push_str("</tr></thead>\n<tbody>\n");

    for row in &model.rows {
        let _ = write!(html, "<tr data-id=\"{}\">", escape_html(&row.user_id));
        for cell in &row.cells {
            let _ = write!(html, "<td>{}</td>", cell_html(cell));
        }
        html.push_str("</tr>\n");
    }

    html.push_str("</tbody>\n</table>\n");
    html
}

fn chip_list(html: &mut String, items: impl Iterator<Item = String>, empty: &str) {
    let mut items = items.peekable();
    if items.peek().is_none() {
        let _ = write!(html, "<p class=\"empty\">{empty}</p>");
        return;
    }
    html.push_str("<div class=\"chips\">");
    for item in items {
        html.push_str(&item);
    }
    html.push_str("</div>");
}

/// Detail panel markup
pub fn detail_html(model: &DetailModel) -> String {
    let mut html = String::from("<section class=\"detail\">\n");
    let _ = writeln!(html, "<h2>{}</h2>", escape_html(&model.title));
    let _ = writeln!(html, "<p class=\"subtitle\">{}</p>", escape_html(&model.subtitle));

    html.push_str("<h3>Basic Information</h3>\n<dl>");
    for (label, value) in &model.basic {
        let _ = write!(html, "<dt>{}</dt><dd>{}</dd>", escape_html(label), escape_html(value));
    }
    html.push_str("</dl>\n");

    let sections = model.groups.sections();
    if sections.is_empty() {
        html.push_str("<h3>Groups</h3><p class=\"empty\">No groups</p>\n");
    }
    for (heading, entries) in sections {
        let _ = write!(html, "<h3>{}</h3>", escape_html(heading));
        chip_list(
            &mut html,
            entries.iter().map(|g| {
                let class = if g.is_role { "chip role" } else { "chip" };
                format!("<span class=\"{class}\">{}</span>", escape_html(&g.name))
            }),
            "No groups",
        );
        html.push('\n');
    }

    html.push_str("<h3>Assigned Licenses</h3>");
    chip_list(
        &mut html,
        model.licenses.iter().map(|l| {
            format!(
                "<span class=\"chip\">{} <small>{}</small></span>",
                escape_html(&l.name),
                escape_html(&l.sku_id)
            )
        }),
        "No licenses",
    );

    html.push_str("\n<h3>Directory Roles</h3>");
    chip_list(
        &mut html,
        model
            .roles
            .iter()
            .map(|r| format!("<span class=\"chip role\">{}</span>", escape_html(r))),
        "No directory roles",
    );

    html.push_str("\n</section>\n");
    html
}

/// Standalone report page wrapping rendered fragments
pub fn document(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n\
         <style>{}</style>\n</head>\n<body>\n<h1>{}</h1>\n{}</body>\n</html>\n",
        escape_html(title),
        STYLE,
        escape_html(title),
        body
    )
}

const STYLE: &str = "body{font-family:sans-serif}\
table{border-collapse:collapse}th,td{border:1px solid #ccc;padding:4px 8px}\
.name{font-weight:bold}.badge{border-radius:8px;padding:0 6px}\
.enabled{background:#d4f4dd}.disabled{background:#f8d7da}\
.chip{display:inline-block;margin:2px;padding:0 6px;border:1px solid #999;border-radius:8px}\
.role{border-color:#c60}.empty{color:#777}";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::SortState;
    use crate::models::{User, UserField};
    use crate::view::TableView;

    const HOSTILE: &str = "&<>\"'`=/";

    #[test]
    fn test_escape_mandatory_set() {
        let escaped = escape_html(HOSTILE);
        for c in ['<', '>', '"', '\'', '`', '=', '/'] {
            assert!(!escaped.contains(c), "unescaped {c} in {escaped}");
        }
        // Every ampersand left must start an entity
        assert_eq!(escaped.matches('&').count(), HOSTILE.len());
        assert_eq!(escape_html("plain text"), "plain text");
    }

    #[test]
    fn test_table_cells_are_escaped() {
        let user = User {
            id: Some("x\" onclick=\"y".into()),
            display_name: Some(format!("Eve {HOSTILE}")),
            department: Some(HOSTILE.into()),
            ..Default::default()
        };
        let model = TableView::render(
            &[&user],
            &[UserField::DisplayName, UserField::Department],
            SortState::default(),
        );
        let html = table_html(&model);
        let body = html.split("<tbody>").nth(1).unwrap();
        assert!(!body.contains("onclick=\""));
        let escaped = "Eve &amp;&lt;&gt;&quot;&#39;&#x60;&#x3D;&#x2F;";
        assert!(body.contains(&format!("<span class=\"name\">{escaped}</span>")));
    }

    #[test]
    fn test_detail_empty_sections() {
        let user = User {
            display_name: Some("<b>Bob</b>".into()),
            ..Default::default()
        };
        let html = detail_html(&DetailModel::basic(&user));
        assert!(html.contains("<h2>&lt;b&gt;Bob&lt;&#x2F;b&gt;</h2>"));
        assert_eq!(html.matches("No groups").count(), 1);
        assert!(!html.contains("Security Groups"));
        assert!(html.contains("No licenses"));
        assert!(html.contains("No directory roles"));
    }
}
