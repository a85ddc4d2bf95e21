//! Workflow template injection

mod injector;
mod shape;

pub use injector::{label_token, InjectionContext, TemplateInjector, WorkflowTemplate};
pub use shape::WorkflowShape;
