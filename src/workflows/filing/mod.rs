mod audit;
mod classifier;
mod pipeline;

pub use audit::{evidence_file_name, AuditRecorder, DECLARATION_PREFIX};
pub use classifier::{ErrorClassifier, FailureClass};
pub use pipeline::{DeclarationSubmissionPipeline, FilingError, PipelineSettings, RunSummary};
