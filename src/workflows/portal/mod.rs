mod detector;
mod machine;
mod session;
mod simulator;
mod state;
pub mod vocabulary;

pub use detector::{PageSignals, PageStateDetector};
pub use machine::{
    MachineSettings, PortalError, PortalStateMachine, RegisteredProperty, DEFAULT_MAX_TRANSITIONS,
};
pub use session::{
    IntentError, IntentExecutor, NoDelay, Pacer, PageInspector, PortalDriver, PortalSession,
    SessionError, ThreadPacer, UnavailableIntents,
};
pub use simulator::{
    FormRecord, Interaction, PortalScenario, SimulatedIntents, SimulatedPortal, SubmitOutcome,
};
pub use state::PortalState;
pub use vocabulary::DeclarationForm;
