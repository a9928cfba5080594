//! DOM walking helpers over `scraper` documents.
//!
//! The county pages nest layout tables several levels deep, so table
//! helpers only look at a table's own rows and a row's own cells.

use super::values::clean_text;
use scraper::{ElementRef, Html, Selector};

/// Element children of `el`, skipping text and comment nodes.
pub fn child_elements<'a>(el: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    el.children().filter_map(ElementRef::wrap)
}

/// Next element sibling, skipping whitespace text nodes.
pub fn next_element_sibling(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.next_siblings().find_map(ElementRef::wrap)
}

/// Normalized text content of an element.
pub fn text_of(el: ElementRef<'_>) -> String {
    clean_text(&el.text().collect::<String>())
}

/// Every `<table>` in the document, outer tables first.
pub fn tables(doc: &Html) -> Vec<ElementRef<'_>> {
    match Selector::parse("table") {
        Ok(sel) => doc.select(&sel).collect(),
        Err(_) => Vec::new(),
    }
}

/// Rows belonging to this table (not to nested tables).
pub fn table_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let mut rows = Vec::new();
    for child in child_elements(table) {
        match child.value().name() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => {
                rows.extend(child_elements(child).filter(|c| c.value().name() == "tr"));
            }
            _ => {}
        }
    }
    rows
}

/// Cells belonging to this row. Header cells are included when `with_th`.
pub fn row_cells(row: ElementRef<'_>, with_th: bool) -> Vec<ElementRef<'_>> {
    child_elements(row)
        .filter(|c| {
            let name = c.value().name();
            name == "td" || (with_th && name == "th")
        })
        .collect()
}

/// Normalized text of each cell in a row.
pub fn row_texts(row: ElementRef<'_>, with_th: bool) -> Vec<String> {
    row_cells(row, with_th).into_iter().map(text_of).collect()
}

/// Whether an element carries the given class.
pub fn has_class(el: ElementRef<'_>, class: &str) -> bool {
    el.value().classes().any(|c| c.eq_ignore_ascii_case(class))
}

/// Whether the element contains a nested table.
pub fn contains_table(el: ElementRef<'_>) -> bool {
    el.descendants()
        .filter_map(ElementRef::wrap)
        .any(|d| d.value().name() == "table")
}

/// Document text a reader would see: script and style bodies excluded.
pub fn visible_text(doc: &Html) -> String {
    let mut out = String::new();
    for node in doc.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|a| matches!(a.value().name(), "script" | "style" | "noscript"));
        if !hidden {
            out.push_str(text);
            out.push(' ');
        }
    }
    clean_text(&out)
}
