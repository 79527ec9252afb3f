//! The priority state machine that owns a character's current action.
//!
//! # Architecture
//!
//! The [`Arbitrator`] holds the current [`Action`] (or idle) together with
//! three bindings: the handler to play, the handler to run when interrupted,
//! and the handler to run on a natural end. It never runs behavior itself.
//! Every handler invocation goes through an [`ActionHost`], which the caller
//! supplies for the duration of one call, so handlers cannot reach back into
//! the arbitrator while it is mid-transition.
//!
//! # Transition
//!
//! [`Arbitrator::try_play`]:
//! 1. validates that every handler resolves on the action's owner,
//! 2. clamps both levels into `[0, ACTION_MAX]`,
//! 3. admits iff `action_level <= current cancel level` (ties admit),
//! 4. asks the host whether the play handler can run now
//!    ([`ActionHost::check_play`]),
//! 5. for a different action: runs the outgoing cancel binding, resets to
//!    idle, and binds the incoming handlers (a missing cancel or end handler
//!    binds [`Binding::ResetToIdle`]); for an equal action: keeps the bindings
//!    and replays,
//! 6. plays; on success the action becomes current.
//!
//! # Invariants
//!
//! - A rejected request (invalid definition, priority, failed play check)
//!   changes nothing.
//! - The outgoing cancel handler runs before the incoming play handler.
//! - Idle has cancel level `ACTION_MAX`, so any admissible level starts over it.

use std::fmt;

use crate::action::{Action, ACTION_MAX};
use crate::entity::EntityId;
use crate::error::CombatError;

/// Lifecycle phase a handler is bound to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum HandlerPhase {
    /// Play.
    Play,
    /// Cancel (interrupted).
    Cancel,
    /// End (finished).
    End,
}

impl fmt::Display for HandlerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Play => write!(f, "play"),
            Self::Cancel => write!(f, "cancel"),
            Self::End => write!(f, "end"),
        }
    }
}

/// What a cancel or end binding does when it fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding<B> {
    /// Run the owner's handler, then return to idle.
    Handler(B),
    /// Return to idle without running anything.
    ResetToIdle,
}

impl<B> Binding<B> {
    fn from_handler(handler: Option<B>) -> Self {
        handler.map_or(Self::ResetToIdle, Self::Handler)
    }
}

/// How an admitted request was carried out.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Admission {
    /// A different action was bound and started.
    Started,
    /// The request equalled the current action and its play handler ran again.
    Replayed,
}

/// Runs handlers on behalf of the arbitrator.
///
/// # Example
///
/// ```
/// use combat_core::action::{ActionHost, HandlerPhase};
/// use combat_core::entity::EntityId;
/// use combat_core::error::CombatError;
///
/// struct Log(Vec<String>);
///
/// impl ActionHost<&'static str> for Log {
///     fn resolves(&self, _owner: EntityId, _handler: &&'static str, _phase: HandlerPhase) -> bool {
///         true
///     }
///     fn play(&mut self, handler: &&'static str) -> Result<(), CombatError> {
///         self.0.push(format!("play {handler}"));
///         Ok(())
///     }
///     fn cancel(&mut self, handler: &&'static str) {
///         self.0.push(format!("cancel {handler}"));
///     }
///     fn end(&mut self, handler: &&'static str) {
///         self.0.push(format!("end {handler}"));
///     }
/// }
/// ```
pub trait ActionHost<B> {
    /// Returns `true` if `owner` can run `handler` in `phase`.
    fn resolves(&self, owner: EntityId, handler: &B, phase: HandlerPhase) -> bool;

    /// Checks that `handler` can run now without running it. Called after
    /// admission and before the outgoing action is cancelled, so an error
    /// leaves every state untouched.
    ///
    /// # Errors
    ///
    /// The error `play` would fail with.
    fn check_play(&self, _handler: &B) -> Result<(), CombatError> {
        Ok(())
    }

    /// Runs a play handler. An error means the handler could not run at call
    /// time although [`check_play`](Self::check_play) passed; the arbitrator
    /// then leaves the slot without a current action.
    fn play(&mut self, handler: &B) -> Result<(), CombatError>;

    /// Runs a cancel handler. Must not request another action.
    fn cancel(&mut self, handler: &B);

    /// Runs an end handler.
    fn end(&mut self, handler: &B);
}

/// Owner of the current-action slot.
#[derive(Debug, Clone)]
pub struct Arbitrator<B> {
    current: Option<Action<B>>,
    play: Option<B>,
    cancel: Option<Binding<B>>,
    end: Option<Binding<B>>,
}

impl<B> Default for Arbitrator<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> Arbitrator<B> {
    /// Creates an idle arbitrator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            current: None,
            play: None,
            cancel: None,
            end: None,
        }
    }

    /// The action occupying the slot, or `None` when idle.
    #[must_use]
    pub const fn current(&self) -> Option<&Action<B>> {
        self.current.as_ref()
    }

    /// Returns `true` when no action occupies the slot.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.current.is_none()
    }

    /// Cancel level of the current action; `ACTION_MAX` when idle.
    #[must_use]
    pub fn cancel_level(&self) -> i32 {
        self.current.as_ref().map_or(ACTION_MAX, |action| action.cancel_level)
    }

    /// Returns `true` if an action of `level` would be admitted now.
    #[must_use]
    pub fn can_play(&self, level: i32) -> bool {
        level <= self.cancel_level()
    }

    /// The handler that plays on the next replay.
    #[must_use]
    pub const fn bound_play(&self) -> Option<&B> {
        self.play.as_ref()
    }

    /// The bound cancel behavior.
    #[must_use]
    pub const fn bound_cancel(&self) -> Option<&Binding<B>> {
        self.cancel.as_ref()
    }

    /// The bound end behavior.
    #[must_use]
    pub const fn bound_end(&self) -> Option<&Binding<B>> {
        self.end.as_ref()
    }

    /// Clears the slot to idle and drops every binding.
    pub fn set_default(&mut self) {
        self.current = None;
        self.play = None;
        self.cancel = None;
        self.end = None;
    }

    /// Overwrites the slot from a replicated view. Bindings are left empty:
    /// only the authority runs handlers.
    pub(crate) fn mirror(&mut self, action: Option<Action<B>>) {
        self.set_default();
        self.current = action;
    }
}

impl<B: Clone + PartialEq + fmt::Debug> Arbitrator<B> {
    /// Requests the slot for `action`.
    ///
    /// # Errors
    ///
    /// - [`CombatError::InvalidActionDefinition`] if a handler does not resolve
    ///   on the owner (nothing changes),
    /// - [`CombatError::PriorityDenied`] if the action level is weaker than the
    ///   current cancel level (nothing changes),
    /// - whatever [`ActionHost::check_play`] returns (nothing changes),
    /// - whatever the play handler returns if it still fails at call time.
    pub fn try_play<H>(&mut self, host: &mut H, action: Action<B>) -> Result<Admission, CombatError>
    where
        H: ActionHost<B> + ?Sized,
    {
        validate(&*host, &action)?;
        let action = action.clamped();

        let current_cancel = self.cancel_level();
        if !self.can_play(action.action_level) {
            tracing::debug!(
                action = %action,
                current_cancel,
                "action denied by priority"
            );
            return Err(CombatError::PriorityDenied {
                requested: action.action_level,
                current_cancel,
            });
        }

        if let Err(err) = host.check_play(&action.handlers.play) {
            tracing::debug!(action = %action, error = %err, "action cannot play now");
            return Err(err);
        }

        let replay = self.current.as_ref() == Some(&action) && self.play.is_some();
        if !replay {
            self.cancel_current(&mut *host);
            self.cancel = Some(Binding::from_handler(action.handlers.cancel.clone()));
            self.end = Some(Binding::from_handler(action.handlers.end.clone()));
            self.play = Some(action.handlers.play.clone());
        }

        let Some(play) = self.play.clone() else {
            return Err(CombatError::InvalidActionDefinition {
                name: action.name,
                reason: "no play handler bound".to_string(),
            });
        };

        match host.play(&play) {
            Ok(()) => {
                tracing::debug!(action = %action, replay, "action played");
                self.current = Some(action);
                Ok(if replay {
                    Admission::Replayed
                } else {
                    Admission::Started
                })
            }
            Err(err) => {
                tracing::warn!(action = %action, error = %err, "action play failed");
                if !replay {
                    self.set_default();
                }
                Err(err)
            }
        }
    }

    /// Plays `action` with its action level forced to 0.
    ///
    /// Admission is guaranteed; only an invalid definition or a failing play
    /// handler can still reject it.
    ///
    /// # Errors
    ///
    /// Same as [`try_play`](Self::try_play), except `PriorityDenied`.
    pub fn force_play<H>(&mut self, host: &mut H, mut action: Action<B>) -> Result<Admission, CombatError>
    where
        H: ActionHost<B> + ?Sized,
    {
        action.action_level = 0;
        self.try_play(host, action)
    }

    /// Runs the bound cancel behavior of the current action and returns to
    /// idle. Returns the interrupted action.
    pub fn cancel_current<H>(&mut self, host: &mut H) -> Option<Action<B>>
    where
        H: ActionHost<B> + ?Sized,
    {
        let binding = self.cancel.take();
        let outgoing = self.current.take();
        if let Some(Binding::Handler(handler)) = binding {
            host.cancel(&handler);
        }
        self.set_default();
        outgoing
    }

    /// Runs the bound end behavior of the current action and returns to idle.
    /// Returns the finished action.
    pub fn end_current<H>(&mut self, host: &mut H) -> Option<Action<B>>
    where
        H: ActionHost<B> + ?Sized,
    {
        let binding = self.end.take();
        let finished = self.current.take();
        if let Some(Binding::Handler(handler)) = binding {
            host.end(&handler);
        }
        self.set_default();
        finished
    }
}

fn validate<B, H>(host: &H, action: &Action<B>) -> Result<(), CombatError>
where
    B: fmt::Debug,
    H: ActionHost<B> + ?Sized,
{
    let handlers = &action.handlers;
    let phases = [
        (Some(&handlers.play), HandlerPhase::Play),
        (handlers.cancel.as_ref(), HandlerPhase::Cancel),
        (handlers.end.as_ref(), HandlerPhase::End),
    ];
    for (handler, phase) in phases {
        let Some(handler) = handler else { continue };
        if !host.resolves(action.owner, handler, phase) {
            let reason = format!(
                "{phase} handler {handler:?} does not resolve on owner {}",
                action.owner
            );
            tracing::error!(action = %action, %reason, "invalid action definition");
            return Err(CombatError::InvalidActionDefinition {
                name: action.name.clone(),
                reason,
            });
        }
    }
    Ok(())
}
