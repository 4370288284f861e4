#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DecisionError {
    #[error("Unsupported decision value: {0:?}")]
    InvalidDecision(String),
    #[error("Approval flow not found")]
    FlowNotFound,
    #[error("Step not found in the current template set")]
    StepNotFound,
    #[error("Step is not actionable")]
    StepNotActionable,
    #[error("Insufficient permissions for this step")]
    StepForbidden,
}
