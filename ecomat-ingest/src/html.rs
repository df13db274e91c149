//! Minimal HTML helpers for scraping the publisher page
//!
//! The publisher page is server-rendered and regular enough that full DOM
//! parsing is unnecessary. These helpers do case-insensitive substring scans
//! over the raw markup and keep byte offsets valid against the original
//! string, so callers can relate an anchor back to its surrounding block.

/// ASCII-lowercase a string without disturbing byte offsets.
///
/// Non-ASCII characters pass through unchanged, so indexes found in the
/// lowered copy are valid in the original.
pub fn to_lower(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii() {
                c.to_ascii_lowercase()
            } else {
                c
            }
        })
        .collect()
}

/// One `<a>` element found in the page
#[derive(Debug, Clone)]
pub struct Anchor {
    /// Byte offset of `<a` in the original markup
    pub start: usize,
    /// Byte offset just past `</a>`
    pub end: usize,
    pub href: Option<String>,
    /// Inner text with tags stripped and entities decoded
    pub text: String,
}

/// Extract all anchor elements in document order
pub fn anchors(html: &str) -> Vec<Anchor> {
    let lc = to_lower(html);
    let mut out = Vec::new();
    let mut from = 0;

    while let Some(rel) = lc[from..].find("<a") {
        let start = from + rel;
        // Must be an actual <a> tag, not <abbr> or similar
        let next = lc.as_bytes().get(start + 2).copied();
        if !matches!(next, Some(b) if b.is_ascii_whitespace() || b == b'>') {
            from = start + 2;
            continue;
        }
        let Some(open_rel) = html[start..].find('>') else {
            break;
        };
        let open_end = start + open_rel + 1;
        let Some(close_rel) = lc[open_end..].find("</a") else {
            from = open_end;
            continue;
        };
        let inner_end = open_end + close_rel;
        let end = match lc[inner_end..].find('>') {
            Some(e) => inner_end + e + 1,
            None => lc.len(),
        };

        let open_tag = &html[start..open_end];
        out.push(Anchor {
            start,
            end,
            href: attr_value(open_tag, "href"),
            text: text_content(&html[open_end..inner_end]),
        });
        from = end;
    }
    out
}

/// Read an attribute value out of an opening tag.
///
/// Handles double-quoted, single-quoted and unquoted values. Attribute name
/// matching is case-insensitive and will not match inside a longer name
/// (`data-href` is not `href`).
pub fn attr_value(tag: &str, name: &str) -> Option<String> {
    let lc = to_lower(tag);
    let needle = to_lower(name);
    let bytes = tag.as_bytes();
    let mut search = 0;

    while let Some(rel) = lc[search..].find(&needle) {
        let at = search + rel;
        search = at + needle.len();

        if at > 0 {
            let before = bytes[at - 1];
            if before.is_ascii_alphanumeric() || before == b'-' {
                continue;
            }
        }
        let mut i = at + needle.len();
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'=' {
            continue;
        }
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            return None;
        }
        return Some(match bytes[i] {
            quote @ (b'"' | b'\'') => {
                let rest = &tag[i + 1..];
                match rest.find(quote as char) {
                    Some(q) => rest[..q].to_string(),
                    None => rest.to_string(),
                }
            }
            _ => tag[i..]
                .split(|c: char| c.is_ascii_whitespace() || c == '>')
                .next()
                .unwrap_or("")
                .to_string(),
        });
    }
    None
}

/// Text of the smallest `li`/`td`/`p`/`div` block containing `pos`.
///
/// Used to read the context around a download link: the version label and
/// publication date usually sit next to the anchor, not inside it.
pub fn enclosing_block(html: &str, pos: usize, tags: &[&str]) -> Option<String> {
    let lc = to_lower(html);
    let pos = pos.min(lc.len());
    let mut best: Option<(usize, usize, usize)> = None;

    for tag in tags {
        let open_pat = format!("<{}", tag);
        let close_pat = format!("</{}", tag);

        let Some(open) = lc[..pos].rfind(&open_pat) else {
            continue;
        };
        let next = lc.as_bytes().get(open + open_pat.len()).copied();
        if !matches!(next, Some(b) if b.is_ascii_whitespace() || b == b'>') {
            continue;
        }
        let Some(open_end_rel) = html[open..].find('>') else {
            continue;
        };
        let content_start = open + open_end_rel + 1;
        if content_start > pos {
            continue;
        }
        // The nearest opener must still be open at pos
        if lc[content_start..pos].contains(close_pat.as_str()) {
            continue;
        }
        let Some(close_rel) = lc[pos..].find(&close_pat) else {
            continue;
        };
        let content_end = pos + close_rel;

        match best {
            Some((bo, _, _)) if bo >= open => {}
            _ => best = Some((open, content_start, content_end)),
        }
    }

    best.map(|(_, s, e)| text_content(&html[s..e]))
}

/// Drop markup, decode entities and collapse whitespace
pub fn text_content(s: &str) -> String {
    normalize_ws(&decode_entities(&remove_tags(s)))
}

fn remove_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for ch in s.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

// &amp; last so "&amp;nbsp;" decodes to the literal "&nbsp;"
const ENTITIES: [(&str, &str); 19] = [
    ("&nbsp;", " "),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&apos;", "'"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&auml;", "ä"),
    ("&ouml;", "ö"),
    ("&uuml;", "ü"),
    ("&Auml;", "Ä"),
    ("&Ouml;", "Ö"),
    ("&Uuml;", "Ü"),
    ("&szlig;", "ß"),
    ("&eacute;", "é"),
    ("&egrave;", "è"),
    ("&agrave;", "à"),
    ("&ucirc;", "û"),
    ("&ocirc;", "ô"),
    ("&amp;", "&"),
];

/// Decode the named entities that actually occur on the publisher page
pub fn decode_entities(s: &str) -> String {
    let mut out = s.to_string();
    for (entity, replacement) in ENTITIES {
        if out.contains(entity) {
            out = out.replace(entity, replacement);
        }
    }
    out
}

/// Collapse runs of whitespace to single spaces and trim
pub fn normalize_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_space {
                out.push(' ');
                prev_space = true;
            }
        } else {
            out.push(ch);
            prev_space = false;
        }
    }
    out.trim().to_string()
}
