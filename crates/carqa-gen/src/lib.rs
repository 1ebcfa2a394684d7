//! carqa-gen
//!
//! Downstream of the retrieval core: builds the car-expert prompt from
//! an assembled context and conversation history, calls the generator
//! service, and exposes the end-to-end question answering engine.

pub mod engine;
pub mod prompt;
pub mod remote;

pub use engine::{QaEngine, NO_CONTEXT_REPLY};
pub use prompt::{build_system_prompt, build_user_message, focus_query};
pub use remote::RemoteGenerator;
