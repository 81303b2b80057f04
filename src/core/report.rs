use super::PersistError;
use log::warn;
use std::fmt;
use std::rc::Rc;

type Hook = Rc<dyn Fn(&PersistError)>;

/// Side channel for persistence failures.
///
/// Errors raised while flushing or hydrating are never propagated into the
/// store's notification machinery. They are logged and, when a hook is
/// installed, handed to the host.
#[derive(Clone, Default)]
pub struct ErrorReporter {
    hook: Option<Hook>,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hook<F>(hook: F) -> Self
    where
        F: Fn(&PersistError) + 'static,
    {
        Self {
            hook: Some(Rc::new(hook)),
        }
    }

    pub fn report(&self, err: PersistError) {
        warn!("persist: {}", err);
        if let Some(hook) = &self.hook {
            hook(&err);
        }
    }
}

impl fmt::Debug for ErrorReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorReporter")
            .field("hook", &self.hook.is_some())
            .finish()
    }
}
