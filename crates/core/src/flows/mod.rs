pub mod engine;
pub mod states;

pub use engine::{InteractionEngine, InteractionTransitionError};
pub use states::{InteractionAction, InteractionEvent, InteractionState, TransitionOutcome};
