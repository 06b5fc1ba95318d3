use anyhow::{Context, Result};
use std::process::{Child, Command, Stdio};

/// Platform hook that keeps the display awake while music plays.
pub trait KeepAwake {
    fn acquire(&mut self) -> Result<()>;
    fn release(&mut self) -> Result<()>;
}

/// Holds an idle inhibitor by keeping `systemd-inhibit` alive for as long as
/// the lock is wanted.
#[derive(Debug, Default)]
pub struct InhibitKeepAwake {
    child: Option<Child>,
}

impl InhibitKeepAwake {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeepAwake for InhibitKeepAwake {
    fn acquire(&mut self) -> Result<()> {
        if self.child.is_some() {
            return Ok(());
        }
        let child = Command::new("systemd-inhibit")
            .args([
                "--what=idle",
                "--who=stopify",
                "--why=Playing music",
                "sleep",
                "infinity",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .context("failed to start systemd-inhibit")?;
        self.child = Some(child);
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        child.kill().context("failed to stop systemd-inhibit")?;
        let _ = child.wait();
        Ok(())
    }
}

impl Drop for InhibitKeepAwake {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoKeepAwake;

impl KeepAwake for NoKeepAwake {
    fn acquire(&mut self) -> Result<()> {
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        Ok(())
    }
}

pub fn platform_keep_awake() -> Box<dyn KeepAwake> {
    if cfg!(target_os = "linux") {
        Box::new(InhibitKeepAwake::new())
    } else {
        Box::new(NoKeepAwake)
    }
}

/// Tracks whether the lock is held so repeated requests are no-ops. A failed
/// acquire is not retried until the lock has been released once.
pub struct KeepAwakeGuard {
    backend: Box<dyn KeepAwake>,
    held: bool,
    failed: bool,
}

impl KeepAwakeGuard {
    pub fn new(backend: Box<dyn KeepAwake>) -> Self {
        Self {
            backend,
            held: false,
            failed: false,
        }
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    pub fn set_wanted(&mut self, wanted: bool) {
        if wanted {
            self.acquire();
        } else {
            self.release();
        }
    }

    pub fn acquire(&mut self) {
        if self.held || self.failed {
            return;
        }
        match self.backend.acquire() {
            Ok(()) => {
                log::debug!("keep-awake acquired");
                self.held = true;
            }
            Err(err) => {
                log::warn!("keep-awake unavailable: {err:#}");
                self.failed = true;
            }
        }
    }

    pub fn release(&mut self) {
        self.failed = false;
        if !self.held {
            return;
        }
        self.held = false;
        match self.backend.release() {
            Ok(()) => log::debug!("keep-awake released"),
            Err(err) => log::warn!("failed to release keep-awake: {err:#}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct CountingKeepAwake {
        calls: Rc<RefCell<Vec<&'static str>>>,
        fail_acquire: bool,
    }

    impl KeepAwake for CountingKeepAwake {
        fn acquire(&mut self) -> Result<()> {
            self.calls.borrow_mut().push("acquire");
            if self.fail_acquire {
                return Err(anyhow!("not supported"));
            }
            Ok(())
        }

        fn release(&mut self) -> Result<()> {
            self.calls.borrow_mut().push("release");
            Ok(())
        }
    }

    #[test]
    fn guard_acquires_and_releases_once() {
        let backend = CountingKeepAwake::default();
        let calls = backend.calls.clone();
        let mut guard = KeepAwakeGuard::new(Box::new(backend));

        guard.set_wanted(true);
        guard.set_wanted(true);
        assert!(guard.is_held());
        guard.set_wanted(false);
        guard.set_wanted(false);
        assert!(!guard.is_held());

        assert_eq!(*calls.borrow(), vec!["acquire", "release"]);
    }

    #[test]
    fn failed_acquire_waits_for_release_before_retry() {
        let backend = CountingKeepAwake {
            fail_acquire: true,
            ..CountingKeepAwake::default()
        };
        let calls = backend.calls.clone();
        let mut guard = KeepAwakeGuard::new(Box::new(backend));

        guard.set_wanted(true);
        guard.set_wanted(true);
        assert!(!guard.is_held());
        guard.set_wanted(false);
        guard.set_wanted(true);

        assert_eq!(*calls.borrow(), vec!["acquire", "acquire"]);
    }
}
