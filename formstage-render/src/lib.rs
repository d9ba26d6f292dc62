//! # formstage render
//!
//! Renders a formstage `formData` document into a live form: a DOM tree in
//! stored order, conditional logic wired to input and change events, and
//! repeatable input-group rows.
//!
//! ```ignore
//! use formstage_render::{Renderer, RendererOptions};
//!
//! let mut renderer = Renderer::new(RendererOptions::default());
//! let mut form = renderer.render_json(json)?;
//! form.set_checked("fA-0", true)?;
//! println!("{}", form.to_html());
//! ```

pub mod html;
pub mod renderer;
pub mod runtime;
pub mod session;

pub use formstage_core::RendererOptions;
pub use renderer::{InputGroup, RenderedForm, Renderer};
pub use runtime::{EventKind, Patch, Runtime};
pub use session::{Interaction, RenderSessionStore};
