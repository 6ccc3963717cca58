//! Process-wide toolchain lifecycle
//!
//! The shader front-end/back-end toolchain is process-global state:
//! initialization must happen-before any compilation, and teardown
//! must happen-after the last compile has finished. Rather than
//! leaving that as ambient global state, the contract is modeled as
//! a reference-counted RAII handle: every compiler holds a guard,
//! the first acquisition initializes the toolchain and the last
//! release tears it down, on every exit path.
//!
//! The embedded toolchain (naga) keeps no process state of its own
//! today, so init and teardown reduce to bookkeeping and a log line;
//! the bracket still defines the required ordering for any backend
//! that does.

use parking_lot::Mutex;

static ACTIVE_GUARDS: Mutex<usize> = Mutex::new(0);

/// Scoped handle on the process-wide toolchain.
///
/// Acquired by [`crate::ShaderCompiler::new`]; dropping the last
/// guard tears the toolchain down.
#[derive(Debug)]
pub struct ToolchainGuard {
    _priv: (),
}

impl ToolchainGuard {
    pub fn acquire() -> Self {
        let mut count = ACTIVE_GUARDS.lock();
        if *count == 0 {
            initialize_process();
        }
        *count += 1;
        Self { _priv: () }
    }

    /// Number of live guards in this process.
    pub fn active_guards() -> usize {
        *ACTIVE_GUARDS.lock()
    }
}

impl Drop for ToolchainGuard {
    fn drop(&mut self) {
        let mut count = ACTIVE_GUARDS.lock();
        *count -= 1;
        if *count == 0 {
            finalize_process();
        }
    }
}

fn initialize_process() {
    log::debug!("shader toolchain initialized");
}

fn finalize_process() {
    log::debug!("shader toolchain torn down");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_guards_keep_toolchain_alive() {
        // Other tests in this binary hold guards of their own, so
        // only lower bounds are stable here.
        let outer = ToolchainGuard::acquire();
        assert!(ToolchainGuard::active_guards() >= 1);
        {
            let _inner = ToolchainGuard::acquire();
            assert!(ToolchainGuard::active_guards() >= 2);
        }
        assert!(ToolchainGuard::active_guards() >= 1);
        drop(outer);
    }
}
