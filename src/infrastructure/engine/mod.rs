//! Remote workflow engine adapters

mod http_client;
mod http_engine;
mod in_memory;

pub use http_client::{HttpClient, HttpClientTrait, HttpResponse};
pub use http_engine::{classify_response, EngineEndpoint, HttpWorkflowEngine, ENGINE_DEPENDENCY};
pub use in_memory::{EngineCall, InMemoryWorkflowEngine};
