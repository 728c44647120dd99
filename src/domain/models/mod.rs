pub mod config;
pub mod fix_plan;
pub mod graph;
pub mod repair;
pub mod resource;
pub mod run_state;
pub mod task;
pub mod verification;

pub use config::{
    Config, ContextConfig, GeneratorConfig, LoggingConfig, MissingOutputPolicy, RepairConfig,
    ResourcesConfig, SchedulerConfig, VerificationConfig,
};
pub use fix_plan::{ApplyReport, CommandRecord, FileFix, FixLayer, FixPlan, LayerKind};
pub use graph::{TaskGraph, ValidatedGraph};
pub use repair::{
    AttemptOutcome, RepairAttempt, RepairHistory, RepairReport, RepairStatus, Strategy,
    MAX_REPAIR_ATTEMPTS,
};
pub use resource::{compute_limit, ConcurrencyBounds, LoadLevel, ResourceSample};
pub use run_state::{CompletionRecord, ExecutionState, ProjectPlan, RunState, RUN_STATE_VERSION};
pub use task::Task;
pub use verification::{
    extract_failing_file, truncate_output, VerificationResult, VerificationStatus,
};
