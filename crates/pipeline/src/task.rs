//! Per-chunk task state machine.

use crate::planner::ChunkDescriptor;

/// Processing state of one chunk within a run.
///
/// Legal transitions:
/// `Planned -> Fetching -> Compressing -> Uploading -> Completed`, with a
/// `Retrying` loop from any active state back to `Fetching`, and `Failed`
/// reachable from any active state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    Planned,
    Fetching,
    Compressing,
    Uploading,
    Retrying,
    Completed,
    Failed,
}

impl ChunkState {
    /// True for states no further transition can leave.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChunkState::Completed | ChunkState::Failed)
    }

    /// True while an attempt is in flight.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ChunkState::Fetching | ChunkState::Compressing | ChunkState::Uploading
        )
    }

    /// Whether moving to `next` is a legal transition.
    pub fn can_transition_to(&self, next: ChunkState) -> bool {
        match (self, next) {
            (ChunkState::Planned, ChunkState::Fetching) => true,
            (ChunkState::Fetching, ChunkState::Compressing) => true,
            (ChunkState::Compressing, ChunkState::Uploading) => true,
            (ChunkState::Uploading, ChunkState::Completed) => true,
            (from, ChunkState::Retrying) if from.is_active() => true,
            (ChunkState::Retrying, ChunkState::Fetching) => true,
            (from, ChunkState::Failed) if from.is_active() => true,
            _ => false,
        }
    }
}

/// The mutable unit of work bound to one chunk for one run.
///
/// Owned exclusively by the worker processing it; once terminal, only the
/// completion token (if any) survives, folded into the upload session.
#[derive(Debug, Clone)]
pub struct ChunkTask {
    descriptor: ChunkDescriptor,
    attempts: u32,
    state: ChunkState,
}

impl ChunkTask {
    pub fn new(descriptor: ChunkDescriptor) -> Self {
        Self {
            descriptor,
            attempts: 0,
            state: ChunkState::Planned,
        }
    }

    pub fn descriptor(&self) -> &ChunkDescriptor {
        &self.descriptor
    }

    /// Attempts started so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn state(&self) -> ChunkState {
        self.state
    }

    fn transition(&mut self, next: ChunkState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal chunk transition {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
    }

    /// Start an attempt: the fetch begins and the attempt counter ticks.
    pub fn begin_attempt(&mut self) {
        self.transition(ChunkState::Fetching);
        self.attempts += 1;
    }

    /// The fetched bytes are being compressed.
    pub fn begin_compress(&mut self) {
        self.transition(ChunkState::Compressing);
    }

    /// The compressed entry is being uploaded.
    pub fn begin_upload(&mut self) {
        self.transition(ChunkState::Uploading);
    }

    /// A transient error interrupted the attempt; another will follow.
    pub fn begin_retry(&mut self) {
        self.transition(ChunkState::Retrying);
    }

    pub fn complete(&mut self) {
        self.transition(ChunkState::Completed);
    }

    pub fn fail(&mut self) {
        self.transition(ChunkState::Failed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> ChunkDescriptor {
        ChunkDescriptor {
            index: 0,
            start: 0,
            end: 100,
        }
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut task = ChunkTask::new(descriptor());
        assert_eq!(task.state(), ChunkState::Planned);

        task.begin_attempt();
        assert_eq!(task.state(), ChunkState::Fetching);
        assert_eq!(task.attempts(), 1);

        task.begin_compress();
        task.begin_upload();
        task.complete();
        assert_eq!(task.state(), ChunkState::Completed);
        assert!(task.state().is_terminal());
    }

    #[test]
    fn test_retry_loops_back_to_fetching() {
        let mut task = ChunkTask::new(descriptor());
        task.begin_attempt();
        task.begin_compress();
        task.begin_retry();
        assert_eq!(task.state(), ChunkState::Retrying);

        task.begin_attempt();
        assert_eq!(task.state(), ChunkState::Fetching);
        assert_eq!(task.attempts(), 2);
    }

    #[test]
    fn test_failure_reachable_from_any_active_state() {
        for advance in [0usize, 1, 2] {
            let mut task = ChunkTask::new(descriptor());
            task.begin_attempt();
            if advance >= 1 {
                task.begin_compress();
            }
            if advance >= 2 {
                task.begin_upload();
            }
            task.fail();
            assert_eq!(task.state(), ChunkState::Failed);
        }
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let planned = ChunkState::Planned;
        assert!(!planned.can_transition_to(ChunkState::Uploading));
        assert!(!planned.can_transition_to(ChunkState::Completed));
        assert!(!planned.can_transition_to(ChunkState::Failed));
        assert!(!ChunkState::Completed.can_transition_to(ChunkState::Fetching));
        assert!(!ChunkState::Failed.can_transition_to(ChunkState::Retrying));
        assert!(!ChunkState::Fetching.can_transition_to(ChunkState::Uploading));
    }
}
