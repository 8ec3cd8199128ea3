//! Generation: executors, lifecycle hooks, the driver state machine and the
//! orchestration that wires them up for a command invocation.

pub mod driver;
pub mod executor;
pub mod hooks;
pub mod result;
pub mod run;

pub use driver::{CancelFlag, GenerationDriver, StepDisposition, StepReport};
pub use executor::{LocalExecutor, StepSlice, TransportError, WorkUnitExecutor};
pub use hooks::{
    CompletionHandler, HookLedger, HookPoint, HookRegistry, LifecycleObserver, MemoryHookLedger,
    SledHookLedger,
};
pub use result::{GenerationResult, Outcome, RunSummary};
pub use run::{generate, run_generate, GenerateRequest, RunEnvironment};
