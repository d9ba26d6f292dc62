use formstage_core::{FormEvent, RendererOptions};
use formstage_render::session::{self, Interaction};
use formstage_render::{Patch, Renderer};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

fn contact_json() -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("../formstage-core/fixtures/contact.json");
    fs::read_to_string(&path).unwrap()
}

/// fA (checkbox) shows fB when ticked; typing "vip" into code fills discount.
fn toggle_form() -> Value {
    json!({
        "id": "toggle",
        "stages": {"s": {"children": ["r1", "r2"]}},
        "rows": {
            "r1": {"children": ["c1"]},
            "r2": {"children": ["c2"], "config": {"inputGroup": true}}
        },
        "columns": {
            "c1": {"children": ["fA", "fB", "code", "discount"], "config": {"width": "100.0%"}},
            "c2": {"children": ["extra"], "config": {"width": "100.0%"}}
        },
        "fields": {
            "fA": {
                "tag": "input",
                "attrs": {"type": "checkbox"},
                "config": {"label": "Show more"},
                "options": [{"label": "Yes", "value": "yes", "checked": false}]
            },
            "fB": {
                "tag": "input",
                "attrs": {"type": "text", "required": true},
                "config": {"label": "Details"},
                "conditions": [{
                    "if": [{"source": "field.fA", "sourceProperty": "checked", "comparison": "equals", "target": true}],
                    "then": [{"target": "field.fB", "targetProperty": "isVisible", "assignment": "equals"}]
                }]
            },
            "code": {"tag": "input", "attrs": {"type": "text"}, "config": {"label": "Code"}},
            "discount": {
                "tag": "input",
                "attrs": {"type": "text"},
                "config": {"label": "Fish & <Chips>"},
                "conditions": [{
                    "if": [{"source": "field.code", "sourceProperty": "value", "comparison": "equals", "target": "vip"}],
                    "then": [{"target": "field.discount", "targetProperty": "value", "assignment": "equals", "value": "10"}]
                }]
            },
            "extra": {
                "tag": "input",
                "attrs": {"type": "checkbox"},
                "config": {"label": "Extra"},
                "options": [{"label": "On", "value": "on", "checked": false}],
                "conditions": [{
                    "if": [{"source": "field.extra", "sourceProperty": "checked", "comparison": "equals", "target": true}],
                    "then": [{"target": "field.fB", "targetProperty": "isVisible", "assignment": "equals"}]
                }]
            }
        }
    })
}

fn render_toggle() -> formstage_render::RenderedForm {
    let data = formstage_core::FormData::from_value(toggle_form()).unwrap();
    Renderer::new(RendererOptions::default()).render(&data).unwrap()
}

#[test]
fn test_checkbox_toggles_visibility() {
    let mut form = render_toggle();
    assert!(form.is_hidden("fB"));
    let fb = form.element("fB").unwrap();
    assert!(!form.dom.has_attr(fb, "required"));

    let patches = form.set_checked("fA-0", true).unwrap();
    assert_eq!(
        patches,
        vec![
            Patch::SetHidden {
                id: "fB-wrapper".into(),
                hidden: false
            },
            Patch::SetRequired {
                id: "fB".into(),
                required: true
            },
        ]
    );
    assert!(!form.is_hidden("fB"));
    assert!(form.dom.has_attr(fb, "required"));

    form.set_checked("fA-0", false).unwrap();
    assert!(form.is_hidden("fB"));
    assert!(!form.dom.has_attr(fb, "required"));
}

#[test]
fn test_bare_checkbox_toggles_visibility() {
    let data = formstage_core::FormData::from_value(json!({
        "id": "bare",
        "stages": {"s": {"children": ["r"]}},
        "rows": {"r": {"children": ["c"]}},
        "columns": {"c": {"children": ["fA", "fB"], "config": {"width": "100.0%"}}},
        "fields": {
            "fA": {"tag": "input", "attrs": {"type": "checkbox"}},
            "fB": {
                "tag": "input",
                "attrs": {"type": "text"},
                "conditions": [{
                    "if": [{"source": "field.fA", "sourceProperty": "checked", "comparison": "equals", "target": true}],
                    "then": [{"target": "field.fB", "targetProperty": "isVisible", "assignment": "equals"}]
                }]
            }
        }
    }))
    .unwrap();
    let mut form = Renderer::new(RendererOptions::default()).render(&data).unwrap();
    let fa = form.element("fA").unwrap();
    assert_eq!(form.dom.tag(fa), Some("input"));
    assert!(form.is_hidden("fB"));

    let patches = form.set_checked("fA", true).unwrap();
    assert_eq!(
        patches,
        vec![Patch::SetHidden {
            id: "fB-wrapper".into(),
            hidden: false
        }]
    );
    assert!(!form.is_hidden("fB"));

    form.set_checked("fA", false).unwrap();
    assert!(form.is_hidden("fB"));
}

#[test]
fn test_text_input_assigns_value() {
    let mut form = render_toggle();
    assert_eq!(form.input("code", "regular").unwrap(), Vec::new());
    let patches = form.input("code", "vip").unwrap();
    assert_eq!(
        patches,
        vec![Patch::SetValue {
            id: "discount".into(),
            value: "10".into()
        }]
    );
    assert_eq!(form.value("discount"), Some("10"));
}

#[test]
fn test_contact_fixture_initial_conditions() {
    let mut renderer = Renderer::new(RendererOptions::default());
    let mut form = renderer.render_json(&contact_json()).unwrap();
    assert_eq!(form.form_id(), "contact-form");
    assert_eq!(
        form.initial_patches().to_vec(),
        vec![
            Patch::SetHidden {
                id: "f-frequency-wrapper".into(),
                hidden: true
            },
            Patch::SetRequired {
                id: "f-frequency".into(),
                required: false
            },
        ]
    );
    assert_eq!(form.value("f-frequency"), Some("weekly"));

    let rows: Vec<String> = form
        .dom
        .element_children(form.root)
        .into_iter()
        .filter_map(|n| form.dom.attr(n, "id").map(str::to_string))
        .collect();
    assert_eq!(rows, vec!["row-name".to_string(), "row-prefs".to_string()]);

    form.set_checked("f-subscribe-0", true).unwrap();
    assert!(!form.is_hidden("f-frequency"));
    form.select("f-frequency", "monthly").unwrap();
    assert!(form.to_html().contains(r#"<option selected value="monthly">"#));
}

#[test]
fn test_input_group_clone_has_no_listeners() {
    let mut form = render_toggle();
    let clone = form.add_input_group("r2").unwrap();
    let row = form.element(&clone).unwrap();
    let clone_input = form
        .dom
        .descendants(row)
        .into_iter()
        .find(|n| form.dom.attr(*n, "type") == Some("checkbox"))
        .unwrap();
    let clone_input_id = form.dom.attr(clone_input, "id").unwrap().to_string();

    assert_eq!(form.set_checked(&clone_input_id, true).unwrap(), Vec::new());
    assert!(form.is_hidden("fB"));

    assert!(!form.set_checked("extra-0", true).unwrap().is_empty());
    assert!(!form.is_hidden("fB"));
}

#[test]
fn test_html_escapes_labels() {
    let form = render_toggle();
    let html = form.to_html();
    assert!(html.contains("Fish &amp; &lt;Chips&gt;"));
    assert!(html.starts_with(r#"<form class="formstage-form" id="toggle">"#));
    let page = form.page("Toggle").unwrap();
    assert!(page.contains("<title>Toggle</title>"));
}

#[test]
fn test_rendered_event_uses_form_id_by_default() {
    let mut renderer = Renderer::new(RendererOptions::default());
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    renderer.subscribe(move |e| sink.borrow_mut().push(e.clone()));
    renderer.render_json(&contact_json()).unwrap();
    assert_eq!(
        *events.borrow(),
        vec![FormEvent::Rendered {
            container: "contact-form".into()
        }]
    );
}

#[test]
fn test_session_store_lifecycle() {
    let store = session::new_session_store();
    let json = toggle_form().to_string();
    let (container, html) =
        session::create_session(&store, RendererOptions::default(), &json).unwrap();
    assert_eq!(container, "toggle");
    assert!(html.contains("fB-wrapper"));

    let patches = session::dispatch(
        &store,
        &container,
        &Interaction::Check {
            id: "fA-0".into(),
            checked: true,
        },
    )
    .unwrap();
    assert_eq!(patches.len(), 2);

    session::dispatch(&store, &container, &Interaction::AddGroup { row: "r2".into() }).unwrap();
    let html = session::render_html(&store, &container).unwrap();
    assert!(html.contains("formstage-input-group-remove"));

    session::close_session(&store, &container);
    assert!(session::render_html(&store, &container).is_err());
}
