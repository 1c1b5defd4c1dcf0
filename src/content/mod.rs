pub mod generator;
pub mod preview;
pub mod rules;
pub mod sanitize;

pub use generator::{ContentGenerator, FieldValue};
pub use preview::{ContentError, preview_field, preview_generator};
pub use rules::{Rules, RulesInput};
