//! Command handlers for the Grounded CLI.

pub mod ask;
pub mod interactions;
pub mod knowledge;

pub use ask::AskCommand;
pub use interactions::InteractionsCommand;
pub use knowledge::KnowledgeCommand;
