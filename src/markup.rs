//! Text scanning over raw record markup.
//!
//! The charge tables on the record pages are not well formed: the modified
//! sentence table closes `</td></tr>` inside a `<span>`, and a tree-building
//! parser repairs that by cutting the table short. Everything here works on
//! the untouched string and returns byte spans, so the true table and row
//! boundaries survive.
//!
//! Matching is ASCII case-insensitive. Lowercasing ASCII keeps byte offsets,
//! so spans found in the lowered copy index the original.

use std::ops::Range;

pub type Span = Range<usize>;

fn lowered(html: &str) -> String {
    html.to_ascii_lowercase()
}

/// Next `<name` (or `</name` when `closing`) that is a whole tag name, at or after `from`.
fn find_tag(lc: &str, name: &str, closing: bool, from: usize) -> Option<usize> {
    let needle = if closing { format!("</{}", name) } else { format!("<{}", name) };
    let bytes = lc.as_bytes();
    let mut pos = from;
    while pos <= lc.len() {
        let hit = lc.get(pos..)?.find(&needle)? + pos;
        let after = hit + needle.len();
        match bytes.get(after) {
            None => return Some(hit),
            Some(b) if b.is_ascii_whitespace() || *b == b'>' || *b == b'/' => return Some(hit),
            _ => pos = hit + 1,
        }
    }
    None
}

/// End of the tag starting at `start` (one past its `>`), or the input end.
fn tag_end(lc: &str, start: usize) -> usize {
    lc[start..].find('>').map_or(lc.len(), |i| start + i + 1)
}

/// Value of `attr` inside a single tag's text (`<tr class=grdRow ...>`).
fn attr_value<'t>(tag: &'t str, attr: &str) -> Option<&'t str> {
    let mut search_from = 0;
    while let Some(rel) = tag[search_from..].find(attr) {
        let at = search_from + rel;
        search_from = at + attr.len();
        let preceded_ok = at == 0 || tag.as_bytes()[at - 1].is_ascii_whitespace();
        let rest = tag[at + attr.len()..].trim_start();
        if !preceded_ok || !rest.starts_with('=') {
            continue;
        }
        let value = rest[1..].trim_start();
        return Some(match value.chars().next() {
            Some(q @ ('"' | '\'')) => {
                let inner = &value[1..];
                &inner[..inner.find(q).unwrap_or(inner.len())]
            }
            _ => {
                let end = value
                    .find(|c: char| c.is_ascii_whitespace() || c == '>' || c == '/')
                    .unwrap_or(value.len());
                &value[..end]
            }
        });
    }
    None
}

/// Span of the table whose `id` attribute is `id`, from `<table` through
/// its matching `</table>`.
pub fn find_table_by_id(html: &str, id: &str) -> Option<Span> {
    let lc = lowered(html);
    let wanted = id.to_ascii_lowercase();
    let mut from = 0;
    while let Some(start) = find_tag(&lc, "table", false, from) {
        let end = tag_end(&lc, start);
        if attr_value(&lc[start..end], "id") == Some(wanted.as_str()) {
            return table_span_from(html, start);
        }
        from = start + 1;
    }
    None
}

/// Span of the first table after the text `heading`.
pub fn find_table_after(html: &str, heading: &str) -> Option<Span> {
    let lc = lowered(html);
    let at = lc.find(&heading.to_ascii_lowercase())?;
    let start = find_tag(&lc, "table", false, at)?;
    table_span_from(html, start)
}

/// Given the offset of a `<table` tag, the span through its matching close,
/// counting nested tables. An unterminated table runs to the end of input.
pub fn table_span_from(html: &str, start: usize) -> Option<Span> {
    let lc = lowered(html);
    if !lc.get(start..)?.starts_with("<table") {
        return None;
    }
    let mut depth = 1usize;
    let mut pos = tag_end(&lc, start);

    loop {
        let next_open = find_tag(&lc, "table", false, pos);
        let Some(next_close) = find_tag(&lc, "table", true, pos) else {
            return Some(start..html.len());
        };
        match next_open {
            Some(open) if open < next_close => {
                depth += 1;
                pos = tag_end(&lc, open);
            }
            _ => {
                depth -= 1;
                pos = tag_end(&lc, next_close);
                if depth == 0 {
                    return Some(start..pos);
                }
            }
        }
    }
}

fn is_data_row_class(class: &str) -> bool {
    class
        .split_ascii_whitespace()
        .any(|c| c == "grdrow" || c == "grdrowalt")
}

/// Data rows of a table fragment: spans from each `<tr class=grdRow|grdRowAlt>`
/// to the next such row, or to the table's end. Row close tags are not
/// trusted because the defective rows corrupt them.
pub fn split_rows(table: &str) -> Vec<Span> {
    let lc = lowered(table);
    let table_end = lc.rfind("</table").unwrap_or(lc.len());

    let mut starts = Vec::new();
    let mut from = 0;
    while let Some(at) = find_tag(&lc, "tr", false, from) {
        if at >= table_end {
            break;
        }
        let end = tag_end(&lc, at);
        if attr_value(&lc[at..end], "class").map_or(false, is_data_row_class) {
            starts.push(at);
        }
        from = at + 1;
    }

    starts
        .iter()
        .enumerate()
        .map(|(i, &s)| s..starts.get(i + 1).copied().unwrap_or(table_end))
        .collect()
}

/// Cell texts of one row fragment, normalized.
///
/// A cell normally ends at `</td>`. When a row close (`</tr>` or a new `<tr`)
/// shows up first, the cell close was swallowed by the nesting defect: the
/// cell is cut there and the rest of the fragment is dropped. A `<td` before
/// any close means an unclosed cell, which ends where the next one starts.
pub fn extract_cells(row: &str) -> Vec<String> {
    let lc = lowered(row);
    let mut cells = Vec::new();
    let mut pos = 0;

    loop {
        let Some(open) = find_tag(&lc, "td", false, pos) else { break };
        let row_closed_first = [find_tag(&lc, "tr", true, pos), find_tag(&lc, "tr", false, pos)]
            .into_iter()
            .flatten()
            .any(|at| at < open);
        if row_closed_first {
            break;
        }

        let content_start = tag_end(&lc, open);
        let close_td = find_tag(&lc, "td", true, content_start);
        let close_tr = find_tag(&lc, "tr", true, content_start);
        let open_tr = find_tag(&lc, "tr", false, content_start);
        let next_td = find_tag(&lc, "td", false, content_start);

        let earliest = [close_td, close_tr, open_tr, next_td].into_iter().flatten().min();
        let Some(end) = earliest else {
            cells.push(normalize_cell(&row[content_start..]));
            break;
        };
        cells.push(normalize_cell(&row[content_start..end]));

        if Some(end) == close_td {
            pos = tag_end(&lc, end);
        } else if Some(end) == next_td {
            pos = end;
        } else {
            break;
        }
    }
    cells
}

/// Tags stripped, common entities decoded, whitespace collapsed and trimmed.
pub fn normalize_cell(fragment: &str) -> String {
    let mut text = String::with_capacity(fragment.len());
    let mut in_tag = false;
    for ch in fragment.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }

    let decoded = decode_entities(&text);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.replace('\u{a0}', " ");
    }
    const ENTITIES: [(&str, &str); 8] = [
        ("&nbsp;", " "),
        ("&#160;", " "),
        ("&lt;", "<"),
        ("&gt;", ">"),
        ("&quot;", "\""),
        ("&#39;", "'"),
        ("&apos;", "'"),
        ("&amp;", "&"),
    ];
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    'scan: while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        for (entity, replacement) in ENTITIES {
            let matches = tail
                .as_bytes()
                .get(..entity.len())
                .map_or(false, |t| t.eq_ignore_ascii_case(entity.as_bytes()));
            if matches {
                out.push_str(replacement);
                rest = &tail[entity.len()..];
                continue 'scan;
            }
        }
        out.push('&');
        rest = &tail[1..];
    }
    out.push_str(rest);
    out.replace('\u{a0}', " ")
}
