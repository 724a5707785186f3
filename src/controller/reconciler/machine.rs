//! # Reconcile State Machine
//!
//! A reconcile pass as a pure function `(State, Event) -> (State, Effect)`.
//!
//! The executor in `reconcile.rs` performs each [`Effect`] against the store
//! and feeds the result back as the next [`Event`]. Nothing here touches the
//! network, which is what lets every transition be unit tested.
//!
//! ```text
//! Pending ──Started──▶ Fetching
//! Fetching ──absent / deleting without finalizer──▶ Done
//! Fetching ──deleting──▶ CleaningUp ──▶ ReleasingFinalizer ──▶ Done
//! Fetching ──live──▶ LookingUpArtifact
//!     missing  ──▶ MarkingCreating ──▶ Creating ──▶ Done(RequeueAfter 1m)
//!     diverged ──▶ MarkingUpdating ──▶ Scaling ──▶ converge
//!     equal    ──▶ converge
//! converge: MarkingCreated? ──▶ AddingFinalizer? ──▶ Done
//! Creating / Scaling ──failure──▶ MarkingFailed ──▶ Errored
//! any other write ──conflict──▶ Done(RequeueAfter 500ms)
//! ```

use crate::constants::{ARTIFACT_CREATED_REQUEUE, CONFLICT_REQUEUE};
use crate::crd::{Executer, Phase};
use std::time::Duration;

/// What the machine needs to know about the Executer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkloadView {
    pub deleting: bool,
    pub has_finalizer: bool,
    pub phase: Phase,
    /// Desired replica count
    pub replicas: i32,
}

impl From<&Executer> for WorkloadView {
    fn from(executer: &Executer) -> Self {
        Self {
            deleting: executer.is_deleting(),
            has_finalizer: executer.has_finalizer(),
            phase: executer.phase(),
            replicas: executer.spec.replication,
        }
    }
}

/// How a pass ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Converged; wait for the next change
    Done,
    /// Run again right away
    Requeue,
    /// Run again after the delay
    RequeueAfter(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// A store call failed with something other than a conflict
    Store {
        operation: &'static str,
        message: String,
    },
    InvalidTransition { state: String, event: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    Pending,
    Fetching,
    CleaningUp,
    ReleasingFinalizer,
    LookingUpArtifact(WorkloadView),
    MarkingCreating(WorkloadView),
    Creating(WorkloadView),
    MarkingUpdating(WorkloadView),
    Scaling(WorkloadView),
    /// Recording `Failed` before surfacing the original failure
    MarkingFailed(Failure),
    MarkingCreated(WorkloadView),
    AddingFinalizer,
    Done(Outcome),
    Errored(Failure),
}

impl State {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Done(_) | State::Errored(_))
    }

    /// Store operation in flight while in this state
    fn operation(&self) -> &'static str {
        match self {
            State::Fetching => "fetch Executer",
            State::CleaningUp => "delete Deployment",
            State::ReleasingFinalizer => "remove finalizer",
            State::LookingUpArtifact(_) => "fetch Deployment",
            State::MarkingCreating(_)
            | State::MarkingUpdating(_)
            | State::MarkingFailed(_)
            | State::MarkingCreated(_) => "update status",
            State::Creating(_) => "create Deployment",
            State::Scaling(_) => "scale Deployment",
            State::AddingFinalizer => "add finalizer",
            State::Pending | State::Done(_) | State::Errored(_) => "none",
        }
    }
}

/// Classified result of a failed store call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreFailure {
    /// Optimistic-concurrency conflict
    Conflict,
    /// The target vanished mid-pass
    Gone,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started,
    WorkloadFetched(Option<WorkloadView>),
    /// Replica count of the existing Deployment, if any
    ArtifactFetched(Option<i32>),
    /// The last write (or delete) succeeded
    Written,
    StoreFailed(StoreFailure),
}

/// Side effects requested by the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    FetchWorkload,
    /// Explicit cascading delete of the owned Deployment
    Cleanup,
    RemoveFinalizer,
    FetchArtifact,
    SetPhase(Phase),
    CreateArtifact,
    ScaleArtifact(i32),
    AddFinalizer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub state: State,
    pub effect: Option<Effect>,
}

impl Step {
    fn to(state: State, effect: Effect) -> Self {
        Self {
            state,
            effect: Some(effect),
        }
    }

    fn done(outcome: Outcome) -> Self {
        Self {
            state: State::Done(outcome),
            effect: None,
        }
    }

    fn errored(failure: Failure) -> Self {
        Self {
            state: State::Errored(failure),
            effect: None,
        }
    }
}

/// Advance the machine by one event
#[must_use]
pub fn step(state: State, event: Event) -> Step {
    match (state, event) {
        (State::Pending, Event::Started) => Step::to(State::Fetching, Effect::FetchWorkload),

        (State::Fetching, Event::WorkloadFetched(None)) => Step::done(Outcome::Done),
        (State::Fetching, Event::WorkloadFetched(Some(view))) if view.deleting => {
            if view.has_finalizer {
                Step::to(State::CleaningUp, Effect::Cleanup)
            } else {
                Step::done(Outcome::Done)
            }
        }
        (State::Fetching, Event::WorkloadFetched(Some(view))) => {
            Step::to(State::LookingUpArtifact(view), Effect::FetchArtifact)
        }

        (State::CleaningUp, Event::Written) => {
            Step::to(State::ReleasingFinalizer, Effect::RemoveFinalizer)
        }
        (State::ReleasingFinalizer, Event::Written) => Step::done(Outcome::Done),

        (State::LookingUpArtifact(view), Event::ArtifactFetched(None)) => Step::to(
            State::MarkingCreating(view),
            Effect::SetPhase(Phase::Creating),
        ),
        (State::LookingUpArtifact(view), Event::ArtifactFetched(Some(current)))
            if current != view.replicas =>
        {
            Step::to(
                State::MarkingUpdating(view),
                Effect::SetPhase(Phase::Updating),
            )
        }
        (State::LookingUpArtifact(view), Event::ArtifactFetched(Some(_))) => converge(view),

        (State::MarkingCreating(view), Event::Written) => Step::to(
            State::Creating(WorkloadView {
                phase: Phase::Creating,
                ..view
            }),
            Effect::CreateArtifact,
        ),
        (State::Creating(_), Event::Written) => {
            Step::done(Outcome::RequeueAfter(ARTIFACT_CREATED_REQUEUE))
        }

        (State::MarkingUpdating(view), Event::Written) => Step::to(
            State::Scaling(WorkloadView {
                phase: Phase::Updating,
                ..view
            }),
            Effect::ScaleArtifact(view.replicas),
        ),
        (State::Scaling(view), Event::Written) => converge(view),

        (State::MarkingCreated(view), Event::Written) => converge(WorkloadView {
            phase: Phase::Created,
            ..view
        }),
        (State::AddingFinalizer, Event::Written) => Step::done(Outcome::Requeue),

        (State::MarkingFailed(original), Event::Written) => Step::errored(original),
        // The original failure still needs the error backoff
        (
            State::MarkingFailed(original),
            Event::StoreFailed(StoreFailure::Conflict | StoreFailure::Gone),
        ) => Step::errored(original),

        // Conflicts are expected under concurrent writers and never mark Failed
        (state, Event::StoreFailed(StoreFailure::Conflict)) if !state.is_terminal() => {
            Step::done(Outcome::RequeueAfter(CONFLICT_REQUEUE))
        }
        (state, Event::StoreFailed(StoreFailure::Gone)) if !state.is_terminal() => {
            Step::done(Outcome::Requeue)
        }

        (
            state @ (State::Creating(_) | State::Scaling(_)),
            Event::StoreFailed(StoreFailure::Failed(message)),
        ) => Step::to(
            State::MarkingFailed(Failure::Store {
                operation: state.operation(),
                message,
            }),
            Effect::SetPhase(Phase::Failed),
        ),
        (state, Event::StoreFailed(StoreFailure::Failed(message))) if !state.is_terminal() => {
            Step::errored(Failure::Store {
                operation: state.operation(),
                message,
            })
        }

        (state, event) => Step::errored(Failure::InvalidTransition {
            state: format!("{state:?}"),
            event: format!("{event:?}"),
        }),
    }
}

/// Steps 5 and 6: record `Created`, then make sure the finalizer is attached
fn converge(view: WorkloadView) -> Step {
    if view.phase != Phase::Created {
        Step::to(
            State::MarkingCreated(view),
            Effect::SetPhase(Phase::Created),
        )
    } else if !view.has_finalizer {
        Step::to(State::AddingFinalizer, Effect::AddFinalizer)
    } else {
        Step::done(Outcome::Done)
    }
}
