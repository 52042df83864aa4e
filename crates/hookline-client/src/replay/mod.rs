//! Replay of captured traffic
//!
//! [`decode_replay`] turns imported rows into a timeline of [`ReplayFrame`]s,
//! sorted and rebased so the first frame is at time zero. A
//! [`ReplayScheduler`] then plays the timeline through a [`FrameSink`],
//! waiting the original gap between consecutive frames.

mod decode;
mod scheduler;

pub use decode::{decode_replay, rebase, ReplayFrame, ReplayRecord};
pub use scheduler::{FrameSink, ReplayScheduler, ReplayState, ReplayStatus};
