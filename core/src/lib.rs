//! # Taskstore Core
//!
//! Core traits and types for the taskstore reducer architecture.
//!
//! This crate provides the fundamental abstractions the rest of the
//! workspace is built on:
//!
//! - **State**: Domain state owned by a store
//! - **Action**: All possible inputs to a reducer (commands and feedback from effects)
//! - **Reducer**: Pure function `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: Side effect descriptions (not execution)
//! - **Environment**: Injected dependencies via traits
//!
//! Reducers never perform I/O. Anything that touches the outside world
//! (disk, network, timers) is returned as an [`effect::Effect`] and executed
//! by the runtime crate.
//!
//! ## Example
//!
//! ```
//! use taskstore_core::{effect::Effect, reducer::Reducer, SmallVec};
//!
//! #[derive(Clone, Debug, Default)]
//! struct CounterState {
//!     count: i64,
//! }
//!
//! #[derive(Clone, Debug)]
//! enum CounterAction {
//!     Increment,
//!     Decrement,
//! }
//!
//! struct CounterReducer;
//!
//! impl Reducer for CounterReducer {
//!     type State = CounterState;
//!     type Action = CounterAction;
//!     type Environment = ();
//!
//!     fn reduce(
//!         &self,
//!         state: &mut CounterState,
//!         action: CounterAction,
//!         _env: &(),
//!     ) -> SmallVec<[Effect<CounterAction>; 4]> {
//!         match action {
//!             CounterAction::Increment => state.count += 1,
//!             CounterAction::Decrement => state.count -= 1,
//!         }
//!         SmallVec::new()
//!     }
//! }
//!
//! let mut state = CounterState::default();
//! let effects = CounterReducer.reduce(&mut state, CounterAction::Increment, &());
//! assert_eq!(state.count, 1);
//! assert!(effects.is_empty());
//! ```

pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{smallvec, SmallVec};

/// The state transition trait
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// Applies actions to state and describes the follow-up work
    ///
    /// Implementations must be deterministic given the same state, action
    /// and environment; time and ids come from the environment.
    pub trait Reducer {
        /// State owned by the store
        type State;

        /// Inputs, including feedback from effects
        type Action;

        /// Injected dependencies
        type Environment;

        /// Update `state` for `action` and return the effects to run
        ///
        /// Most actions produce zero or one effect, so the result stays on
        /// the stack for the common case.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Descriptions of work for the runtime
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;

    /// Work returned by a reducer and run by the store
    ///
    /// Any action an effect yields is fed back into the reducer.
    pub enum Effect<Action> {
        /// Nothing to do
        None,

        /// Async work, optionally yielding an action
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),
    }

    impl<Action> std::fmt::Debug for Effect<Action> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Wrap an async computation as an effect
        pub fn future<F>(fut: F) -> Self
        where
            F: Future<Output = Option<Action>> + Send + 'static,
        {
            Effect::Future(Box::pin(fut))
        }
    }
}

/// Injected dependencies shared by reducers
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Source of the current time
    pub trait Clock: Send + Sync {
        /// Current UTC time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// Identifier source for newly created entities
    ///
    /// Reducers draw ids through this trait instead of calling a random
    /// generator directly, so tests can substitute predictable ids.
    pub trait IdGenerator: Send + Sync {
        /// Produce a fresh identifier, unique for the lifetime of the generator
        fn next_id(&self) -> String;
    }
}
