pub mod machine;
pub mod state;

pub use machine::{transition, Node, Outcome, Pipeline};
pub use state::{AnalysisState, Criticality, Stage, StageStatus, WorkflowStatus};
