mod item;
mod state;

pub use item::{Outcome, RunReport, Termination, WorkItem};
pub use state::{Rotation, RunState, Transition, resolve};
