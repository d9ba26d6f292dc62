//! Editor event surface: change notifications, notices, and the injected
//! confirmation/action hooks that replace document-level custom events.

use crate::document::FormData;
use crate::kind::ComponentKind;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Describes one mutation of a component record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub kind: ComponentKind,
    pub id: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FormEvent {
    ComponentAdded {
        kind: ComponentKind,
        id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        parent: Option<String>,
    },
    ComponentRemoved {
        kind: ComponentKind,
        id: String,
    },
    ComponentUpdated(Change),
    /// The children of every container were emptied.
    Cleared,
    Rendered {
        container: String,
    },
    Saved {
        #[serde(rename = "formData")]
        form_data: FormData,
    },
    Loaded {
        #[serde(rename = "formId")]
        form_id: String,
    },
    /// User-facing message, e.g. a rejected attribute edit.
    Notice {
        message: String,
    },
}

type Listener = Box<dyn FnMut(&FormEvent)>;

/// Synchronous fan-out of [`FormEvent`]s to subscribed callbacks.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<Listener>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&FormEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn emit(&mut self, event: FormEvent) {
        for listener in self.listeners.iter_mut() {
            listener(&event);
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Destructive actions that need the user's consent.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmRequest {
    ClearAll { field_count: usize },
}

/// Confirmation collaborator. Returning `false` cancels the action.
pub trait Confirm {
    fn confirm(&mut self, request: &ConfirmRequest) -> bool;
}

impl<F: FnMut(&ConfirmRequest) -> bool> Confirm for F {
    fn confirm(&mut self, request: &ConfirmRequest) -> bool {
        self(request)
    }
}

/// Request to add an attribute through the edit panel.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeRequest {
    pub field_id: String,
    pub key: String,
    pub value: Value,
}

/// Request to add an option through the edit panel.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionRequest {
    pub field_id: String,
    pub option: Value,
}

/// Editor action hooks. Every hook defaults to allowing the action.
pub trait Actions {
    fn add_attribute(&mut self, _request: &AttributeRequest) -> bool {
        true
    }

    fn add_option(&mut self, _request: &OptionRequest) -> bool {
        true
    }

    fn save(&mut self, _form_data: &FormData) {}
}

/// Hooks that accept everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultActions;

impl Actions for DefaultActions {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_emit_reaches_all_listeners() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();
        for _ in 0..2 {
            let seen = seen.clone();
            bus.subscribe(move |e| seen.borrow_mut().push(e.clone()));
        }
        bus.emit(FormEvent::Cleared);
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn test_closure_confirm() {
        let mut deny = |_: &ConfirmRequest| false;
        assert!(!deny.confirm(&ConfirmRequest::ClearAll { field_count: 3 }));
    }
}
