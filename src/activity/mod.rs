mod colors;
mod completion;
mod machine;
mod record;
mod state;

pub use colors::{ColorSet, color_for_index};
pub use machine::ActivityStateMachine;
pub use record::{Activity, ActivityRecord, slugify};
pub use state::{ActivityState, Transition};
