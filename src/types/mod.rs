//! Public request/response types.

mod message;
mod request;
mod response;

pub use message::{Message, Role};
pub use request::{ChatRequest, DEFAULT_DEPARTMENT};
pub use response::{ChatResponse, FinishReason, Usage};
