//! HTML serialization of a rendered form.

use formstage_core::dom::{Dom, NodeId, NodeKind};
use formstage_core::{FormError, FormResult};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Elements written without a closing tag.
pub const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "input", "meta", "link"];

const BASE_STYLE: &str = ".formstage-row{display:flex;gap:8px}\
.formstage-column{box-sizing:border-box}\
.formstage-field-wrapper{margin-bottom:8px}\
[hidden]{display:none!important}";

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Serialize `node` and its subtree. Inputs, selects and textareas reflect
/// their live state rather than the attributes they were created with.
pub fn to_html(dom: &Dom, node: NodeId) -> String {
    let mut out = String::new();
    write_node(dom, node, &mut out);
    out
}

fn write_node(dom: &Dom, node: NodeId, out: &mut String) {
    let Some(n) = dom.node(node) else { return };
    let tag = match &n.kind {
        NodeKind::Text(text) => {
            out.push_str(&escape_html(text));
            return;
        }
        NodeKind::Element { tag } => tag.as_str(),
    };

    let attrs = live_attrs(dom, node, tag);
    out.push('<');
    out.push_str(tag);
    for (key, value) in &attrs {
        out.push(' ');
        out.push_str(key);
        if !value.is_empty() {
            out.push_str("=\"");
            out.push_str(&escape_html(value));
            out.push('"');
        }
    }
    out.push('>');
    if VOID_ELEMENTS.contains(&tag) {
        return;
    }

    if tag == "textarea" {
        out.push_str(&escape_html(dom.value(node).unwrap_or_default()));
    } else {
        for child in dom.children(node) {
            write_node(dom, *child, out);
        }
    }
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

fn live_attrs(dom: &Dom, node: NodeId, tag: &str) -> BTreeMap<String, String> {
    let mut attrs = dom.attrs(node).cloned().unwrap_or_default();
    match tag {
        "input" => {
            let kind = attrs.get("type").map(String::as_str).unwrap_or("text");
            if matches!(kind, "checkbox" | "radio") {
                if dom.checked(node) {
                    attrs.insert("checked".into(), String::new());
                } else {
                    attrs.remove("checked");
                }
            } else if let Some(value) = dom.value(node) {
                attrs.insert("value".into(), value.to_string());
            }
        }
        "option" => {
            let parent_value = dom.parent(node).and_then(|p| dom.value(p));
            if let Some(parent_value) = parent_value {
                let own = dom
                    .attr(node, "value")
                    .map(str::to_string)
                    .unwrap_or_else(|| dom.text_content(node));
                if own == parent_value {
                    attrs.insert("selected".into(), String::new());
                } else {
                    attrs.remove("selected");
                }
            }
        }
        _ => {}
    }
    attrs
}

/// A standalone HTML page around `body`.
pub fn page(title: &str, body: &str, style: Option<&str>) -> FormResult<String> {
    let css = style.unwrap_or(BASE_STYLE);
    let mut html = String::new();
    write!(
        html,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{}</title>
<style>{}</style>
</head>
<body>
{}
</body>
</html>
"#,
        escape_html(title),
        css,
        body
    )
    .map_err(|e| FormError::ValidationError(e.to_string()))?;

    Ok(html)
}
