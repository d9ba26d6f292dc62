use formstage_core::columns::{even_width, format_width, parse_width};
use formstage_core::validator::find_orphans;
use formstage_core::{
    validate, ComponentKind, Container, ContainerRole, DragItem, DropOutcome, EditInput,
    EditOutcome, Editor, EditorOptions, Form, FormError, FormEvent,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

fn fixture(filename: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("fixtures");
    path.push(filename);
    fs::read_to_string(&path).unwrap()
}

fn contact_editor() -> Editor {
    let data: Value = serde_json::from_str(&fixture("contact.json")).unwrap();
    let options = EditorOptions {
        form_data: Some(data),
        ..Default::default()
    };
    Editor::new(options).unwrap()
}

fn assert_preview_matches(editor: &Editor) {
    let form = editor.form();
    for (kind, id) in form.walk() {
        if kind == ComponentKind::Field {
            continue;
        }
        assert_eq!(
            editor.preview().child_ids(&id),
            form.children(&id).to_vec(),
            "DOM order of {} '{}' drifted from its children",
            kind,
            id
        );
        assert_eq!(editor.preview().is_marked_empty(&id), form.is_empty(&id));
    }
}

// Round trip

#[test]
fn test_contact_fixture_round_trip() {
    let json = fixture("contact.json");
    let mut form = Form::new();
    form.load_json(&json).unwrap();
    let original: Value = serde_json::from_str(&json).unwrap();
    let serialized: Value = serde_json::from_str(&form.to_json().unwrap()).unwrap();
    assert_eq!(serialized, original);
}

#[test]
fn test_round_trip_without_record_ids() {
    let doc = json!({
        "id": "bare",
        "stages": {"s": {"children": ["r"]}},
        "rows": {"r": {"children": ["c"], "config": {"fieldset": false}}},
        "columns": {"c": {"children": ["x"], "config": {"width": "100.0%"}}},
        "fields": {
            "x": {
                "tag": "input",
                "attrs": {"type": "text"},
                "conditions": [{
                    "if": [{"source": "field.x", "sourceProperty": "value", "comparison": "equals", "target": "a", "note": "keep"}],
                    "then": [{"target": "field.x", "targetProperty": "isVisible", "assignment": "equals", "label": "also kept"}],
                    "name": "self check"
                }]
            }
        }
    });
    let mut form = Form::new();
    form.load_json(&doc.to_string()).unwrap();
    assert_eq!(form.get("s").map(|s| s.id.as_str()), Some("s"));
    let serialized: Value = serde_json::from_str(&form.to_json().unwrap()).unwrap();
    assert_eq!(serialized, doc);
}

#[test]
fn test_form_data_string_option_is_accepted() {
    let options = EditorOptions {
        form_data: Some(Value::String(fixture("contact.json"))),
        ..Default::default()
    };
    let editor = Editor::new(options).unwrap();
    assert_eq!(editor.form().id(), "contact-form");
    assert_eq!(editor.form().stage_id(), "stage-1");
}

// Order fidelity

#[test]
fn test_preview_order_follows_every_mutation() {
    let mut editor = contact_editor();
    assert_preview_matches(&editor);

    editor
        .sort("row-name", &["col-email".to_string(), "col-first".to_string()])
        .unwrap();
    assert_preview_matches(&editor);
    assert_eq!(
        editor.preview().child_ids("row-name"),
        vec!["col-email".to_string(), "col-first".to_string()]
    );

    let added = editor.add_control("textarea", "col-prefs", Some(0)).unwrap();
    assert_preview_matches(&editor);
    assert_eq!(editor.form().children("col-prefs")[0], added);

    editor.remove("f-subscribe").unwrap();
    assert_preview_matches(&editor);

    editor
        .start_drag(
            DragItem::Component("f-name".into()),
            Container::new(ContainerRole::Column, "col-first"),
        )
        .unwrap();
    editor
        .drop_on(&Container::new(ContainerRole::Column, "col-prefs"), Some(1))
        .unwrap();
    assert_preview_matches(&editor);
    assert!(!editor.form().contains("col-first"));
    assert_eq!(editor.form().children("col-prefs")[1], "f-name");
}

// Cascading empty cleanup

#[test]
fn test_removing_last_fields_cascades_to_stage() {
    let mut editor = contact_editor();

    let removed = editor.remove("f-name").unwrap();
    assert_eq!(removed, vec!["f-name".to_string(), "col-first".to_string()]);
    assert!(editor.form().contains("row-name"));
    assert_eq!(editor.form().get_value("col-email", "config.width"), Some(json!("100.0%")));

    editor.remove("f-email").unwrap();
    assert!(!editor.form().contains("row-name"));
    assert_eq!(editor.form().children("stage-1").to_vec(), vec!["row-prefs".to_string()]);

    editor.remove("f-subscribe").unwrap();
    editor.remove("f-frequency").unwrap();
    assert!(editor.form().contains("stage-1"));
    assert!(editor.form().is_empty("stage-1"));
    assert!(editor.preview().is_marked_empty("stage-1"));
    assert_eq!(editor.form().component_count(), 1);
}

// Id uniqueness

#[test]
fn test_ids_are_unique_across_kinds() {
    let mut editor = Editor::new(EditorOptions::default()).unwrap();
    let stage = editor.form().stage_id().to_string();
    let mut ids = vec![stage.clone()];
    for _ in 0..5 {
        let row = editor.add(ComponentKind::Row, Some(&stage), None, None).unwrap();
        ids.push(row.clone());
        for _ in 0..3 {
            let column = editor.add(ComponentKind::Column, Some(&row), None, None).unwrap();
            ids.push(column.clone());
            for control in ["text-input", "select", "checkbox"] {
                ids.push(editor.add_control(control, &column, None).unwrap());
            }
        }
        ids.push(editor.clone_component(&row).unwrap());
    }
    let unique: HashSet<&String> = ids.iter().collect();
    assert_eq!(unique.len(), ids.len());

    let all: Vec<&str> = editor.form().all_ids().collect();
    let unique_all: HashSet<&str> = all.iter().copied().collect();
    assert_eq!(unique_all.len(), all.len());
}

// Width redistribution

#[test]
fn test_width_redistribution_for_each_count() {
    let mut form = Form::new();
    let stage = form.stage_id().to_string();
    for n in 1..=6 {
        let row = form.add(ComponentKind::Row, Some(&stage), None, None).unwrap();
        for _ in 0..n {
            form.add(ComponentKind::Column, Some(&row), None, None).unwrap();
        }
        let expected = format_width(even_width(n));
        let mut sum = 0.0;
        for column in form.children(&row).to_vec() {
            let width = form.get_value(&column, "config.width").unwrap();
            assert_eq!(width, json!(expected));
            sum += parse_width(width.as_str().unwrap()).unwrap();
        }
        assert!((sum - 100.0).abs() <= 0.5, "{} columns sum to {}", n, sum);
    }
}

#[test]
fn test_column_preset_and_custom_marker() {
    let mut editor = contact_editor();
    editor.apply_column_preset("row-name", "25,75").unwrap();
    assert_eq!(editor.form().get_value("col-first", "config.width"), Some(json!("25.0%")));
    assert_eq!(editor.form().get_value("col-email", "config.width"), Some(json!("75.0%")));
    let presets = editor.column_presets("row-name").unwrap();
    let selected: Vec<_> = presets.iter().filter(|p| p.selected).collect();
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].value, "25,75");
}

// Disabled attribute rejection

#[test]
fn test_disabled_attribute_edit_raises_notice() {
    let mut editor = contact_editor();
    let notices = Rc::new(RefCell::new(Vec::new()));
    let sink = notices.clone();
    editor.subscribe(move |e| {
        if let FormEvent::Notice { message } = e {
            sink.borrow_mut().push(message.clone());
        }
    });
    editor
        .set("f-name", "config.panels", json!({"attrs": {"disabled": ["type"]}}))
        .unwrap();
    let before = editor.form().get_value("f-name", "attrs");

    let outcome = editor
        .edit("f-name", "attrs.type", EditInput::Text("password".into()))
        .unwrap();
    assert!(matches!(outcome, EditOutcome::Rejected(_)));
    let outcome = editor.add_attribute("f-name", "type", json!("password")).unwrap();
    assert!(matches!(outcome, EditOutcome::Rejected(_)));

    assert_eq!(editor.form().get_value("f-name", "attrs"), before);
    assert_eq!(notices.borrow().len(), 2);
}

// Drop filtering

#[test]
fn test_layout_column_dropped_into_column_creates_nothing() {
    let mut editor = contact_editor();
    let columns_before = editor.form().store(ComponentKind::Column).size();
    let fields_before = editor.form().store(ComponentKind::Field).size();

    for target in ["col-first", "f-name"] {
        editor
            .start_drag(
                DragItem::Control("layout-column".into()),
                Container::new(ContainerRole::ControlPanel, "layout"),
            )
            .unwrap();
        let outcome = editor
            .drop_on(&Container::new(ContainerRole::Column, target), None)
            .unwrap();
        assert!(matches!(outcome, DropOutcome::Rejected { .. }));
    }

    assert_eq!(editor.form().store(ComponentKind::Column).size(), columns_before);
    assert_eq!(editor.form().store(ComponentKind::Field).size(), fields_before);
    assert!(!editor.dnd().is_dragging());
}

// Validation

#[test]
fn test_invalid_documents() {
    assert!(matches!(
        validate(&fixture("invalid-shared-child.json")),
        Err(FormError::SharedChild { .. })
    ));
    assert!(matches!(
        validate(&fixture("invalid-syntax.json")),
        Err(FormError::ParseError { .. })
    ));
}

#[test]
fn test_malformed_document_leaves_form_untouched() {
    let mut editor = contact_editor();
    let before = editor.form_data();
    assert!(editor.load_json(&fixture("invalid-syntax.json")).is_err());
    assert!(editor.load_json(&fixture("invalid-shared-child.json")).is_err());
    assert_eq!(editor.form_data(), before);
}

#[test]
fn test_orphan_is_a_warning_only() {
    let data = validate(&fixture("orphan.json")).unwrap();
    assert_eq!(
        find_orphans(&data),
        vec![(ComponentKind::Field, "lonely".to_string())]
    );
}

// Options

#[test]
fn test_editor_options_from_yaml() {
    let yaml = r##"
editorContainer: "#builder"
sessionStorage: true
controls:
  disable:
    elements: [upload, hidden]
external:
  user:
    plan: pro
i18n:
  locale: de-DE
"##;
    let options = EditorOptions::from_yaml(yaml).unwrap();
    assert!(options.session_storage);
    assert_eq!(options.i18n.locale, "de-DE");
    let editor = Editor::new(options).unwrap();
    assert!(editor.controls().get("upload").is_none());
    assert!(editor.controls().get("text-input").is_some());
    assert!(editor
        .address_options()
        .iter()
        .any(|o| o.value == "external.user.plan"));
}
