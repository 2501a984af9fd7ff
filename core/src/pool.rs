//! A bounded pool of reusable sessions.
//!
//! # Design
//! Sessions are created lazily up to `max_size` and handed out as
//! `Arc<Session>`. A caller that finds the pool exhausted blocks on a condvar
//! until another caller releases a session. Released sessions are reset so
//! per-call handle state never carries over to the next borrower; defaults,
//! cookie store and connections stay with the session.

use std::ops::Deref;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::error::Result;
use crate::session::Session;

pub struct SessionPool {
    max_size: usize,
    config: SessionConfig,
    state: Mutex<PoolState>,
    available_cv: Condvar,
}

#[derive(Default)]
struct PoolState {
    available: Vec<Arc<Session>>,
    in_use: Vec<Arc<Session>>,
}

impl PoolState {
    fn total(&self) -> usize {
        self.available.len() + self.in_use.len()
    }
}

impl SessionPool {
    /// A pool of at most `max_size` sessions; zero is treated as one.
    pub fn new(max_size: usize) -> Self {
        Self::with_config(max_size, SessionConfig::default())
    }

    pub fn with_config(max_size: usize, config: SessionConfig) -> Self {
        Self {
            max_size: max_size.max(1),
            config,
            state: Mutex::new(PoolState::default()),
            available_cv: Condvar::new(),
        }
    }

    /// Borrow a session, creating one if the pool has room, otherwise waiting
    /// until one is released.
    pub fn acquire(&self) -> Result<Arc<Session>> {
        let mut state = self.lock();
        loop {
            if let Some(session) = state.available.pop() {
                state.in_use.push(Arc::clone(&session));
                return Ok(session);
            }
            if state.total() < self.max_size {
                let session = Arc::new(Session::with_config(self.config.clone())?);
                state.in_use.push(Arc::clone(&session));
                debug!(size = state.total(), max = self.max_size, "session pool grew");
                return Ok(session);
            }
            state = self
                .available_cv
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Return a session obtained from `acquire`. Sessions that did not come
    /// from this pool are ignored.
    pub fn release(&self, session: Arc<Session>) {
        let mut state = self.lock();
        let Some(index) = state.in_use.iter().position(|s| Arc::ptr_eq(s, &session)) else {
            warn!("released session does not belong to this pool");
            return;
        };
        let session = state.in_use.swap_remove(index);
        if let Err(err) = session.reset() {
            warn!(%err, "failed to reset pooled session");
        }
        state.available.push(session);
        drop(state);
        self.available_cv.notify_one();
    }

    /// Borrow a session that is released when the guard drops.
    pub fn checkout(&self) -> Result<PooledSession<'_>> {
        let session = self.acquire()?;
        Ok(PooledSession {
            pool: self,
            session: Some(session),
        })
    }

    /// Sessions created so far, borrowed or idle.
    pub fn size(&self) -> usize {
        self.lock().total()
    }

    /// Idle sessions ready to hand out without creating a new one.
    pub fn available(&self) -> usize {
        self.lock().available.len()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A session on loan from a `SessionPool`.
pub struct PooledSession<'a> {
    pool: &'a SessionPool,
    session: Option<Arc<Session>>,
}

impl PooledSession<'_> {
    /// Shared handle to the borrowed session, e.g. for `send_async`.
    pub fn shared(&self) -> Arc<Session> {
        Arc::clone(&**self)
    }
}

impl Deref for PooledSession<'_> {
    type Target = Arc<Session>;

    fn deref(&self) -> &Self::Target {
        // Only `Drop` takes the session out.
        match &self.session {
            Some(session) => session,
            None => unreachable!("pooled session used after release"),
        }
    }
}

impl Drop for PooledSession<'_> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.pool.release(session);
        }
    }
}
