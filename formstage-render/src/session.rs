//! Render sessions: live forms kept by container id so a host can feed
//! user interactions back and receive patches.

use crate::renderer::{RenderedForm, Renderer};
use crate::runtime::Patch;
use dashmap::DashMap;
use formstage_core::{FormError, FormResult, RendererOptions};
use serde::{Deserialize, Serialize};

pub type RenderSessionStore = DashMap<String, RenderedForm>;

pub fn new_session_store() -> RenderSessionStore {
    DashMap::new()
}

/// A user interaction reported by the host page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Interaction {
    Input { id: String, value: String },
    Select { id: String, value: String },
    Check { id: String, checked: bool },
    AddGroup { row: String },
    RemoveGroup { id: String },
}

fn not_found(container: &str) -> FormError {
    FormError::ComponentNotFound {
        kind: "render session".to_string(),
        id: container.to_string(),
    }
}

/// Render `form_json` and keep the result under its container id.
/// Returns the container id and the initial HTML.
pub fn create_session(
    store: &RenderSessionStore,
    options: RendererOptions,
    form_json: &str,
) -> FormResult<(String, String)> {
    let mut renderer = Renderer::new(options);
    let form = renderer.render_json(form_json)?;
    let container = form.container().to_string();
    let html = form.to_html();
    if store.insert(container.clone(), form).is_some() {
        tracing::debug!(container = %container, "render session replaced");
    }
    Ok((container, html))
}

/// Apply one interaction. Adding or removing an input group yields no
/// patches; callers re-read the HTML instead.
pub fn dispatch(
    store: &RenderSessionStore,
    container: &str,
    interaction: &Interaction,
) -> FormResult<Vec<Patch>> {
    let mut form = store.get_mut(container).ok_or_else(|| not_found(container))?;

    match interaction {
        Interaction::Input { id, value } => form.input(id, value),
        Interaction::Select { id, value } => form.select(id, value),
        Interaction::Check { id, checked } => form.set_checked(id, *checked),
        Interaction::AddGroup { row } => form.add_input_group(row).map(|_| Vec::new()),
        Interaction::RemoveGroup { id } => form.remove_input_group(id).map(|_| Vec::new()),
    }
}

pub fn render_html(store: &RenderSessionStore, container: &str) -> FormResult<String> {
    let form = store.get(container).ok_or_else(|| not_found(container))?;
    Ok(form.to_html())
}

pub fn close_session(store: &RenderSessionStore, container: &str) {
    store.remove(container);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_interaction_wire_format() {
        let parsed: Interaction =
            serde_json::from_str(r#"{"type":"add_group","row":"r1"}"#).unwrap();
        assert_eq!(parsed, Interaction::AddGroup { row: "r1".into() });
        let parsed: Interaction =
            serde_json::from_str(r#"{"type":"check","id":"a-0","checked":true}"#).unwrap();
        assert_eq!(
            parsed,
            Interaction::Check {
                id: "a-0".into(),
                checked: true
            }
        );
    }

    #[test]
    fn test_missing_session() {
        let store = new_session_store();
        let err = render_html(&store, "nowhere").unwrap_err();
        assert!(matches!(err, FormError::ComponentNotFound { .. }));
        assert!(dispatch(
            &store,
            "nowhere",
            &Interaction::Input {
                id: "x".into(),
                value: "y".into()
            }
        )
        .is_err());
    }
}
