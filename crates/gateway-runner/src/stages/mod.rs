//! Concrete `Stage` implementations for the fixed pipeline declared in
//! `PipelineConfig::stages` (spec.md §2): preprocessor, acl, session
//! acquire, processor, chat handler, response wrapper, send reply.

pub mod acl;
pub mod chat_handler;
pub mod preprocessor;
pub mod processor;
pub mod response_wrapper;
pub mod send_reply;
pub mod session_acquire;

pub use acl::AclStage;
pub use chat_handler::ChatHandlerStage;
pub use preprocessor::PreprocessorStage;
pub use processor::ProcessorStage;
pub use response_wrapper::ResponseWrapperStage;
pub use send_reply::SendReplyStage;
pub use session_acquire::SessionAcquireStage;
