// Data processing pipeline: dataset abstraction, processing steps and the stage runner

pub mod dataset;
pub mod processing;
pub mod stage;

pub use dataset::Dataset;
pub use stage::{ExecutionContext, PipelineStage, StageJob, StageSummary};
