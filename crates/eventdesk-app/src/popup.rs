// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Confirmation/action popups as an explicit state machine.
//!
//! ```text
//! Closed --open--> Open --confirm--> Confirming --ok--> Closed   (Confirmed)
//!                   |                    |
//!                   |                    +--err--> Open         (Failed)
//!                   +--cancel--> Closed                         (Cancelled)
//! ```
//!
//! The controller never performs the side effect itself. Each session carries
//! the caller's async action, and the session only closes once that action
//! settles successfully. Controller state is `Rc<RefCell<_>>`: it lives on one
//! UI thread and is never shared across threads.

use futures::FutureExt;
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::future::{self, LocalBoxFuture};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionHandle(u64);

impl SessionHandle {
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Closed,
    Open,
    Confirming,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopupOutcome<R> {
    Confirmed(R),
    Cancelled,
    /// The action rejected; the session is back to `Open`.
    Failed(String),
}

#[derive(Debug, Error)]
pub enum PopupError {
    #[error("popup session {0} is busy confirming -- wait for the action to settle")]
    SessionBusy(SessionHandle),
    #[error("popup session {0} is closed")]
    SessionClosed(SessionHandle),
    #[error("popup host was disposed -- its results are discarded")]
    Disposed,
    #[error("{0:#}")]
    ActionFailed(anyhow::Error),
}

type Action<P, R> = Rc<dyn Fn(&P) -> LocalBoxFuture<'static, anyhow::Result<R>>>;

struct Session<P, R> {
    status: SessionStatus,
    payload: P,
    action: Action<P, R>,
    subscribers: Vec<UnboundedSender<PopupOutcome<R>>>,
}

impl<P, R: Clone> Session<P, R> {
    fn notify(&mut self, outcome: PopupOutcome<R>) {
        self.subscribers
            .retain(|subscriber| subscriber.unbounded_send(outcome.clone()).is_ok());
    }
}

struct Registry<P, R> {
    next_id: u64,
    sessions: BTreeMap<SessionHandle, Session<P, R>>,
    disposed: bool,
}

/// Owns every popup session a host view opens.
pub struct PopupController<P, R> {
    inner: Rc<RefCell<Registry<P, R>>>,
}

impl<P, R> Clone for PopupController<P, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<P: 'static, R: Clone + 'static> Default for PopupController<P, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: 'static, R: Clone + 'static> PopupController<P, R> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Registry {
                next_id: 1,
                sessions: BTreeMap::new(),
                disposed: false,
            })),
        }
    }

    /// Opens a session around `payload`. `action` runs once per `confirm`
    /// against a snapshot of the payload, with the registry released.
    pub fn open<F, Fut>(&self, payload: P, action: F) -> Result<SessionHandle, PopupError>
    where
        F: Fn(&P) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<R>> + 'static,
    {
        let mut registry = self.inner.borrow_mut();
        if registry.disposed {
            return Err(PopupError::Disposed);
        }

        let handle = SessionHandle(registry.next_id);
        registry.next_id += 1;
        let action: Action<P, R> = Rc::new(move |payload: &P| action(payload).boxed_local());
        registry.sessions.insert(
            handle,
            Session {
                status: SessionStatus::Open,
                payload,
                action,
                subscribers: Vec::new(),
            },
        );
        debug!(session = %handle, "popup opened");
        Ok(handle)
    }

    /// Stream of outcomes for one session. It ends once the session closes.
    pub fn subscribe(
        &self,
        handle: SessionHandle,
    ) -> Result<UnboundedReceiver<PopupOutcome<R>>, PopupError> {
        let mut registry = self.inner.borrow_mut();
        let session = registry
            .sessions
            .get_mut(&handle)
            .ok_or(PopupError::SessionClosed(handle))?;
        let (sender, receiver) = mpsc::unbounded();
        session.subscribers.push(sender);
        Ok(receiver)
    }

    pub fn status(&self, handle: SessionHandle) -> SessionStatus {
        self.inner
            .borrow()
            .sessions
            .get(&handle)
            .map_or(SessionStatus::Closed, |session| session.status)
    }

    pub fn payload(&self, handle: SessionHandle) -> Option<P>
    where
        P: Clone,
    {
        self.inner
            .borrow()
            .sessions
            .get(&handle)
            .map(|session| session.payload.clone())
    }

    pub fn open_sessions(&self) -> Vec<SessionHandle> {
        self.inner.borrow().sessions.keys().copied().collect()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.borrow().disposed
    }

    /// Mutates the payload of an `Open` session.
    pub fn edit<T>(
        &self,
        handle: SessionHandle,
        edit: impl FnOnce(&mut P) -> T,
    ) -> Result<T, PopupError> {
        let mut registry = self.inner.borrow_mut();
        let session = registry
            .sessions
            .get_mut(&handle)
            .ok_or(PopupError::SessionClosed(handle))?;
        match session.status {
            SessionStatus::Open => Ok(edit(&mut session.payload)),
            SessionStatus::Confirming => Err(PopupError::SessionBusy(handle)),
            SessionStatus::Closed => Err(PopupError::SessionClosed(handle)),
        }
    }

    pub fn cancel(&self, handle: SessionHandle) -> Result<(), PopupError> {
        let mut registry = self.inner.borrow_mut();
        let status = registry
            .sessions
            .get(&handle)
            .map(|session| session.status)
            .ok_or(PopupError::SessionClosed(handle))?;
        if status == SessionStatus::Confirming {
            return Err(PopupError::SessionBusy(handle));
        }

        if let Some(mut session) = registry.sessions.remove(&handle) {
            session.notify(PopupOutcome::Cancelled);
        }
        debug!(session = %handle, "popup cancelled");
        Ok(())
    }

    /// Starts the session's action. The state checks happen on the call, not
    /// on first poll, so a second `confirm` is rejected immediately even if
    /// the first future has not been polled yet. The returned future must be
    /// driven to completion; dropping it early reopens the session.
    pub fn confirm(&self, handle: SessionHandle) -> LocalBoxFuture<'static, Result<R, PopupError>>
    where
        P: Clone,
    {
        let (action, payload) = {
            let mut registry = self.inner.borrow_mut();
            if registry.disposed {
                return future::ready(Err(PopupError::Disposed)).boxed_local();
            }
            let Some(session) = registry.sessions.get_mut(&handle) else {
                return future::ready(Err(PopupError::SessionClosed(handle))).boxed_local();
            };
            if session.status == SessionStatus::Confirming {
                return future::ready(Err(PopupError::SessionBusy(handle))).boxed_local();
            }
            session.status = SessionStatus::Confirming;
            (Rc::clone(&session.action), session.payload.clone())
        };

        let pending = action(&payload);
        debug!(session = %handle, "popup confirming");

        let mut guard = InFlight {
            inner: Rc::clone(&self.inner),
            handle,
            settled: false,
        };
        async move {
            let settled = pending.await;
            guard.settled = true;
            settle(&guard.inner, handle, settled)
        }
        .boxed_local()
    }

    /// Marks the host view as gone. Open sessions close silently; actions
    /// already in flight still settle, but their results are dropped.
    pub fn dispose(&self) {
        let mut registry = self.inner.borrow_mut();
        registry.disposed = true;
        let before = registry.sessions.len();
        registry
            .sessions
            .retain(|_, session| session.status == SessionStatus::Confirming);
        debug!(
            dropped = before - registry.sessions.len(),
            in_flight = registry.sessions.len(),
            "popup host disposed"
        );
    }
}

fn settle<P, R: Clone>(
    inner: &RefCell<Registry<P, R>>,
    handle: SessionHandle,
    settled: anyhow::Result<R>,
) -> Result<R, PopupError> {
    let mut registry = inner.borrow_mut();
    if registry.disposed {
        registry.sessions.remove(&handle);
        warn!(session = %handle, ok = settled.is_ok(), "action settled after host disposal; result discarded");
        return Err(PopupError::Disposed);
    }

    match settled {
        Ok(result) => {
            if let Some(mut session) = registry.sessions.remove(&handle) {
                session.notify(PopupOutcome::Confirmed(result.clone()));
            }
            debug!(session = %handle, "popup confirmed");
            Ok(result)
        }
        Err(error) => {
            if let Some(session) = registry.sessions.get_mut(&handle) {
                session.status = SessionStatus::Open;
                session.notify(PopupOutcome::Failed(format!("{error:#}")));
            }
            debug!(session = %handle, error = %format!("{error:#}"), "popup action failed");
            Err(PopupError::ActionFailed(error))
        }
    }
}

/// Reopens a `Confirming` session whose confirm future was dropped before the
/// action settled.
struct InFlight<P, R> {
    inner: Rc<RefCell<Registry<P, R>>>,
    handle: SessionHandle,
    settled: bool,
}

impl<P, R> Drop for InFlight<P, R> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let Ok(mut registry) = self.inner.try_borrow_mut() else {
            return;
        };
        if registry.disposed {
            registry.sessions.remove(&self.handle);
            return;
        }
        if let Some(session) = registry.sessions.get_mut(&self.handle)
            && session.status == SessionStatus::Confirming
        {
            session.status = SessionStatus::Open;
            warn!(session = %self.handle, "confirm dropped before settling; session reopened");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PopupController, PopupError, PopupOutcome, SessionStatus};
    use anyhow::anyhow;
    use futures::StreamExt;
    use futures::channel::oneshot;
    use futures::executor::block_on;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn confirm_runs_action_and_closes() {
        let controller = PopupController::<u32, String>::new();
        let handle = controller
            .open(7, |id: &u32| {
                let id = *id;
                async move { Ok(format!("deleted {id}")) }
            })
            .expect("open");
        let mut outcomes = controller.subscribe(handle).expect("subscribe");

        let result = block_on(controller.confirm(handle)).expect("confirm");
        assert_eq!(result, "deleted 7");
        assert_eq!(controller.status(handle), SessionStatus::Closed);
        assert_eq!(
            block_on(outcomes.next()),
            Some(PopupOutcome::Confirmed("deleted 7".to_owned()))
        );
        assert_eq!(block_on(outcomes.next()), None);
    }

    #[test]
    fn second_confirm_while_confirming_is_busy() {
        let controller = PopupController::<(), u8>::new();
        let (release, gate) = oneshot::channel::<u8>();
        let gate = Rc::new(std::cell::RefCell::new(Some(gate)));
        let handle = controller
            .open((), move |_: &()| {
                let gate = gate.borrow_mut().take();
                async move {
                    let gate = gate.ok_or_else(|| anyhow!("action ran twice"))?;
                    Ok(gate.await?)
                }
            })
            .expect("open");

        let first = controller.confirm(handle);
        assert_eq!(controller.status(handle), SessionStatus::Confirming);

        let second = block_on(controller.confirm(handle));
        assert!(matches!(second, Err(PopupError::SessionBusy(busy)) if busy == handle));
        assert!(matches!(
            controller.cancel(handle),
            Err(PopupError::SessionBusy(_))
        ));
        assert_eq!(controller.status(handle), SessionStatus::Confirming);

        release.send(3).expect("release action");
        assert_eq!(block_on(first).expect("first confirm settles"), 3);
        assert_eq!(controller.status(handle), SessionStatus::Closed);
    }

    #[test]
    fn cancel_emits_cancelled_and_invalidates_handle() {
        let calls = Rc::new(Cell::new(0));
        let counted = Rc::clone(&calls);
        let controller = PopupController::<&'static str, ()>::new();
        let handle = controller
            .open("team-1", move |_: &&'static str| {
                counted.set(counted.get() + 1);
                async { Ok(()) }
            })
            .expect("open");
        let mut outcomes = controller.subscribe(handle).expect("subscribe");

        controller.cancel(handle).expect("cancel");
        assert_eq!(block_on(outcomes.next()), Some(PopupOutcome::Cancelled));
        assert_eq!(block_on(outcomes.next()), None);

        let confirm = block_on(controller.confirm(handle));
        assert!(matches!(confirm, Err(PopupError::SessionClosed(_))));
        assert!(matches!(
            controller.cancel(handle),
            Err(PopupError::SessionClosed(_))
        ));
        assert_eq!(calls.get(), 0, "cancel must not run the action");
    }

    #[test]
    fn rejected_action_reopens_session_and_reports_reason() {
        let attempts = Rc::new(Cell::new(0));
        let counted = Rc::clone(&attempts);
        let controller = PopupController::<String, String>::new();
        let handle = controller
            .open("ada@example.com".to_owned(), move |email: &String| {
                counted.set(counted.get() + 1);
                let attempt = counted.get();
                let email = email.clone();
                async move {
                    if attempt == 1 {
                        Err(anyhow!("mail relay unavailable"))
                    } else {
                        Ok(format!("invited {email}"))
                    }
                }
            })
            .expect("open");
        let mut outcomes = controller.subscribe(handle).expect("subscribe");

        let error = block_on(controller.confirm(handle)).expect_err("first attempt fails");
        assert_eq!(error.to_string(), "mail relay unavailable");
        assert_eq!(controller.status(handle), SessionStatus::Open);
        assert_eq!(
            block_on(outcomes.next()),
            Some(PopupOutcome::Failed("mail relay unavailable".to_owned()))
        );

        let retried = block_on(controller.confirm(handle)).expect("retry succeeds");
        assert_eq!(retried, "invited ada@example.com");
        assert_eq!(
            block_on(outcomes.next()),
            Some(PopupOutcome::Confirmed("invited ada@example.com".to_owned()))
        );
    }

    #[test]
    fn edit_is_only_allowed_while_open() {
        let controller = PopupController::<Vec<u8>, usize>::new();
        let (release, gate) = oneshot::channel::<()>();
        let gate = Rc::new(std::cell::RefCell::new(Some(gate)));
        let handle = controller
            .open(Vec::new(), move |items: &Vec<u8>| {
                let len = items.len();
                let gate = gate.borrow_mut().take();
                async move {
                    if let Some(gate) = gate {
                        gate.await?;
                    }
                    Ok(len)
                }
            })
            .expect("open");

        controller
            .edit(handle, |items| items.push(1))
            .expect("edit while open");
        assert_eq!(controller.payload(handle), Some(vec![1]));

        let pending = controller.confirm(handle);
        assert!(matches!(
            controller.edit(handle, |items| items.push(2)),
            Err(PopupError::SessionBusy(_))
        ));
        release.send(()).expect("release");
        assert_eq!(block_on(pending).expect("confirm"), 1);
    }

    #[test]
    fn disposal_discards_results_that_settle_later() {
        let controller = PopupController::<(), u8>::new();
        let (release, gate) = oneshot::channel::<u8>();
        let gate = Rc::new(std::cell::RefCell::new(Some(gate)));
        let in_flight = controller
            .open((), move |_: &()| {
                let gate = gate.borrow_mut().take();
                async move { Ok(gate.ok_or_else(|| anyhow!("no gate"))?.await?) }
            })
            .expect("open in-flight");
        let idle = controller
            .open((), |_: &()| async { Ok(0) })
            .expect("open idle");
        let mut outcomes = controller.subscribe(in_flight).expect("subscribe");

        let pending = controller.confirm(in_flight);
        assert!(!controller.is_disposed());
        controller.dispose();
        assert!(controller.is_disposed());
        assert_eq!(controller.status(idle), SessionStatus::Closed);
        assert_eq!(controller.status(in_flight), SessionStatus::Confirming);

        release.send(9).expect("release");
        assert!(matches!(block_on(pending), Err(PopupError::Disposed)));
        assert_eq!(controller.status(in_flight), SessionStatus::Closed);
        assert_eq!(block_on(outcomes.next()), None, "no outcome after disposal");
        assert!(matches!(
            controller.open((), |_: &()| async { Ok(1) }),
            Err(PopupError::Disposed)
        ));
    }

    #[test]
    fn action_may_call_back_into_the_controller() {
        let controller = PopupController::<u8, SessionStatus>::new();
        let host = controller.clone();
        let follow_up = Rc::new(Cell::new(None));
        let opened = Rc::clone(&follow_up);
        let handle = controller
            .open(1, move |_: &u8| {
                let next = host.open(2, |_: &u8| async { Ok(SessionStatus::Open) });
                opened.set(next.ok());
                let own = host.open_sessions().first().map(|first| host.status(*first));
                async move { own.ok_or_else(|| anyhow!("no sessions")) }
            })
            .expect("open");

        let seen = block_on(controller.confirm(handle)).expect("confirm");
        assert_eq!(seen, SessionStatus::Confirming);
        let follow_up = follow_up.get().expect("nested open succeeded");
        assert_eq!(controller.status(follow_up), SessionStatus::Open);
        controller.dispose();
    }

    #[test]
    fn dropping_confirm_future_reopens_session() {
        let controller = PopupController::<(), ()>::new();
        let handle = controller
            .open((), |_: &()| futures::future::pending::<anyhow::Result<()>>())
            .expect("open");

        let pending = controller.confirm(handle);
        assert_eq!(controller.status(handle), SessionStatus::Confirming);
        drop(pending);
        assert_eq!(controller.status(handle), SessionStatus::Open);
    }

    #[test]
    fn sessions_are_independent() {
        let controller = PopupController::<u8, u8>::new();
        let first = controller
            .open(1, |value: &u8| {
                let value = *value;
                async move { Ok(value) }
            })
            .expect("open first");
        let second = controller
            .open(2, |value: &u8| {
                let value = *value;
                async move { Ok(value) }
            })
            .expect("open second");

        controller.cancel(first).expect("cancel first");
        assert_eq!(controller.status(second), SessionStatus::Open);
        assert_eq!(controller.open_sessions(), vec![second]);
        assert_eq!(block_on(controller.confirm(second)).expect("confirm"), 2);
    }
}
