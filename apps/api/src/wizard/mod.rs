// Resume-builder wizard: sanitize -> validate -> form state -> debounced save,
// gated by the step navigator.

pub mod autosave;
pub mod form;
pub mod handlers;
pub mod navigator;
pub mod quality;
pub mod rules;
pub mod sanitize;
pub mod schema;
pub mod session;

pub use session::SessionRegistry;
