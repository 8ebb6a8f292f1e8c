pub mod conversation;
pub mod evaluation;
pub mod handlers;
pub mod prompts;
pub mod selector;
pub mod session;
