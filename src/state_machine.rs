//! Menu-driven conversation state machine
//!
//! Implements the Elm Architecture pattern: a pure transition function
//! maps (state, event) to a new state plus effects for the runtime.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;


pub use effect::{Effect, Screen};
pub use event::{Action, Event};
pub use state::{ConvState, Mode, PostAction};
pub use transition::{current_screen, transition, TransitionContext, TransitionResult};
