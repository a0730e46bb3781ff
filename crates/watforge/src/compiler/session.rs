//! The compilation session.
//!
//! One session per thread at a time. It holds the global type table and the
//! live constant pool so that expansion can reach both without threading a
//! context through every node. `begin` hands back a [`SessionGuard`]; the
//! guard tears the session down on drop unless `done` already did.

use super::pool::{ConstantPool, FrozenPool};
use crate::error::{CompileError, CompileResult};
use crate::ir::WasmType;
use log::debug;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

struct ActiveSession {
    id: u64,
    globals: HashMap<String, WasmType>,
    pool: ConstantPool,
}

thread_local! {
    static SESSION: RefCell<Option<ActiveSession>> = const { RefCell::new(None) };
    static NEXT_ID: Cell<u64> = const { Cell::new(0) };
}

/// Start a session. Fails if one is already live on this thread.
pub fn begin<I>(globals: I, constant_base: u32) -> CompileResult<SessionGuard>
where
    I: IntoIterator<Item = (String, WasmType)>,
{
    SESSION.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_some() {
            return Err(CompileError::ReentrancyError);
        }
        let id = NEXT_ID.with(|next| {
            let id = next.get();
            next.set(id.wrapping_add(1));
            id
        });
        let globals: HashMap<_, _> = globals.into_iter().collect();
        debug!(
            "session {id}: begin with {} globals, constants at {constant_base:#x}",
            globals.len()
        );
        *slot = Some(ActiveSession {
            id,
            globals,
            pool: ConstantPool::new(constant_base),
        });
        Ok(SessionGuard { id })
    })
}

pub fn is_active() -> bool {
    SESSION.with(|cell| cell.borrow().is_some())
}

/// Intern `bytes` in the live pool.
pub fn intern(bytes: &[u8]) -> CompileResult<u32> {
    SESSION.with(|cell| {
        cell.borrow_mut()
            .as_mut()
            .ok_or(CompileError::NotCompiling)?
            .pool
            .intern(bytes)
    })
}

/// Declared type of a module global.
pub fn global_type(name: &str) -> CompileResult<WasmType> {
    SESSION.with(|cell| {
        let slot = cell.borrow();
        let session = slot.as_ref().ok_or(CompileError::NotCompiling)?;
        session
            .globals
            .get(name)
            .copied()
            .ok_or_else(|| CompileError::UndeclaredGlobal {
                name: name.to_string(),
            })
    })
}

/// Close the live session and return its frozen pool.
pub fn done() -> CompileResult<FrozenPool> {
    take(None)
}

/// Discard the live session, if any, without producing a pool.
pub fn teardown() {
    SESSION.with(|cell| {
        if let Some(session) = cell.borrow_mut().take() {
            debug!("session {}: torn down", session.id);
        }
    });
}

fn take(id: Option<u64>) -> CompileResult<FrozenPool> {
    SESSION.with(|cell| {
        let mut slot = cell.borrow_mut();
        let owned = match (slot.as_ref(), id) {
            (Some(_), None) => true,
            (Some(session), Some(id)) => session.id == id,
            (None, _) => false,
        };
        if !owned {
            return Err(CompileError::NotCompiling);
        }
        let session = slot.take().ok_or(CompileError::NotCompiling)?;
        let pool = session.pool.freeze();
        debug!(
            "session {}: done, {} constants in {} bytes",
            session.id,
            pool.len(),
            pool.byte_span()
        );
        Ok(pool)
    })
}

/// Keeps a session alive. Dropping it without calling [`SessionGuard::done`]
/// discards the session.
#[derive(Debug)]
#[must_use = "dropping the guard ends the session"]
pub struct SessionGuard {
    id: u64,
}

impl SessionGuard {
    pub fn done(self) -> CompileResult<FrozenPool> {
        take(Some(self.id))
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        SESSION.with(|cell| {
            let mut slot = cell.borrow_mut();
            if slot.as_ref().is_some_and(|s| s.id == self.id) {
                debug!("session {}: released by guard", self.id);
                *slot = None;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn globals() -> Vec<(String, WasmType)> {
        vec![("counter".to_string(), WasmType::I32)]
    }

    #[test]
    fn test_begin_twice_is_reentrancy_error() {
        let guard = begin(globals(), 0xFF).unwrap();
        assert_eq!(
            begin(globals(), 0xFF).unwrap_err(),
            CompileError::ReentrancyError
        );
        guard.done().unwrap();
    }

    #[test]
    fn test_done_without_begin() {
        assert_eq!(done().unwrap_err(), CompileError::NotCompiling);
    }

    #[test]
    fn test_intern_outside_session() {
        assert_eq!(intern(b"abc").unwrap_err(), CompileError::NotCompiling);
        assert_eq!(
            global_type("counter").unwrap_err(),
            CompileError::NotCompiling
        );
    }

    #[test]
    fn test_session_interns_and_freezes() {
        let guard = begin(globals(), 0xFF).unwrap();
        let abc = intern(b"abc").unwrap();
        let def = intern(b"def").unwrap();
        assert_eq!(intern(b"abc").unwrap(), abc);
        assert!(def >= abc + 4);
        let pool = guard.done().unwrap();
        assert_eq!(pool.len(), 2);
        assert!(!is_active());
    }

    #[test]
    fn test_global_lookup() {
        let guard = begin(globals(), 0).unwrap();
        assert_eq!(global_type("counter"), Ok(WasmType::I32));
        assert_eq!(
            global_type("missing"),
            Err(CompileError::UndeclaredGlobal {
                name: "missing".into()
            })
        );
        drop(guard);
    }

    #[test]
    fn test_guard_releases_on_drop() {
        {
            let _guard = begin(globals(), 0).unwrap();
            assert!(is_active());
        }
        assert!(!is_active());
        let guard = begin(globals(), 0).unwrap();
        guard.done().unwrap();
    }

    #[test]
    fn test_free_done_then_guard_drop() {
        let guard = begin(globals(), 0).unwrap();
        intern(b"x").unwrap();
        let pool = done().unwrap();
        assert_eq!(pool.len(), 1);
        // A new session started after `done` must survive the old guard.
        let next = begin(globals(), 0).unwrap();
        drop(guard);
        assert!(is_active());
        next.done().unwrap();
    }

    #[test]
    fn test_explicit_teardown() {
        let guard = begin(globals(), 0).unwrap();
        teardown();
        assert!(!is_active());
        assert_eq!(guard.done().unwrap_err(), CompileError::NotCompiling);
    }

    #[test]
    fn test_sessions_are_per_thread() {
        let guard = begin(globals(), 0).unwrap();
        let other = std::thread::spawn(|| {
            let g = begin(Vec::new(), 0).unwrap();
            g.done().is_ok()
        })
        .join()
        .unwrap();
        assert!(other);
        guard.done().unwrap();
    }
}
