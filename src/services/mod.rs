//! Service layer: business logic coordination.

pub mod artifacts;
pub mod budget;
pub mod comparison;
pub mod lifecycle;
pub mod normalizer;
pub mod stage_invoker;

pub use artifacts::ArtifactService;
pub use budget::{BudgetDecision, BudgetEstimator, BudgetGate, CostEstimate};
pub use comparison::{ComparisonEngine, ComparisonResult};
pub use lifecycle::{AdvanceOutcome, LifecycleOrchestrator};
pub use normalizer::ScorecardNormalizer;
pub use stage_invoker::{is_retryable_failure, StageInvoker, StageOutcome};
