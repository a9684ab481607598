/*!
 * Translation workflow: the step chain, the store seam it persists through,
 * and the orchestrator that runs tasks over them.
 */

pub mod orchestrator;
pub mod state;
pub mod store;

pub use orchestrator::{RunOutcome, TitleBatchLimits, WorkflowOrchestrator};
pub use state::WorkflowStep;
pub use store::WorkflowStore;
