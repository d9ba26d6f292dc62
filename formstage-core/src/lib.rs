//! # formstage core
//!
//! Component model and editing engine for the formstage form builder.
//!
//! A form is a tree of four component kinds, Stage → Row → Column → Field,
//! held in one store per kind and serialized as a single `formData`
//! document. Parent `children` arrays are the only source of ordering.
//!
//! ## Features
//! - Per-kind stores with config defaults and template materialization
//! - Drag-and-drop coordination with container acceptance rules
//! - Column width arithmetic (even split, resize, presets)
//! - Edit panel generation with disabled/locked policies
//! - Conditions with component and external addresses
//! - A headless DOM preview kept in step with the tree
//!
//! ## Example
//! ```ignore
//! use formstage_core::{Editor, EditorOptions, ComponentKind};
//!
//! let mut editor = Editor::new(EditorOptions::default())?;
//! let stage = editor.form().stage_id().to_string();
//! let row = editor.add(ComponentKind::Row, Some(&stage), None, None)?;
//! let column = editor.add(ComponentKind::Column, Some(&row), None, None)?;
//! editor.add_control("text-input", &column, None)?;
//! let json = editor.save()?.to_json()?;
//! ```

pub mod columns;
pub mod component;
pub mod conditions;
pub mod config;
pub mod controls;
pub mod dnd;
pub mod document;
pub mod dom;
pub mod editor;
pub mod error;
pub mod events;
pub mod form;
pub mod kind;
pub mod materialize;
pub mod panels;
pub mod resources;
pub mod storage;
pub mod store;
pub mod utils;
pub mod validator;

// --- Core types ---
pub use component::ComponentData;
pub use document::FormData;
pub use error::{FormError, FormResult};
pub use form::Form;
pub use kind::ComponentKind;
pub use store::{ComponentStore, TemplateLookup};

// --- Editor surface ---
pub use config::{ComponentConfigs, ControlOptions, EditorOptions, RendererOptions};
pub use controls::{Control, ControlRegistry};
pub use dnd::{Container, ContainerRole, DragDrop, DragItem, DropOutcome};
pub use editor::Editor;
pub use events::{Actions, Confirm, ConfirmRequest, EventBus, FormEvent};
pub use panels::{EditInput, EditOutcome, EditPanels, PanelName};

// --- Conditions ---
pub use conditions::{Address, Comparison, Condition, ConditionMap, Property};

/// Parse a `formData` document (JSON text) without loading it.
pub fn parse_form_data(json: &str) -> FormResult<FormData> {
    FormData::from_json(json)
}

/// Parse and structurally validate a `formData` document.
pub fn validate(json: &str) -> FormResult<FormData> {
    let data = FormData::from_json(json)?;
    validator::validate_form_data(&data)?;
    Ok(data)
}
