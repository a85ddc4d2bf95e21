//! Default collaborators: template-based prompt text and a no-op label provisioner

mod generator;

pub use generator::{NoopLabelProvisioner, TemplateContentGenerator};
