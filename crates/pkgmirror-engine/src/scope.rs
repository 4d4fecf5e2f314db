//! Operation scopes
//!
//! A scope brackets one named operation with begin and end notifications.
//! The end is reported when the handle drops, so early returns and errors
//! still close the scope.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Receives scope notifications
pub trait ScopeListener: Send + Sync {
    fn on_begin(&self, name: &str, subject: &str);

    fn on_end(&self, name: &str, subject: &str, elapsed: Duration);
}

/// Opens scopes, optionally reporting them to a listener
#[derive(Clone, Default)]
pub struct OperationScope {
    listener: Option<Arc<dyn ScopeListener>>,
}

impl OperationScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listener(listener: Arc<dyn ScopeListener>) -> Self {
        Self {
            listener: Some(listener),
        }
    }

    pub fn begin(&self, name: &str, subject: &str) -> ScopeHandle {
        tracing::debug!("Begin {} for {}", name, subject);
        if let Some(listener) = &self.listener {
            listener.on_begin(name, subject);
        }

        ScopeHandle {
            name: name.to_string(),
            subject: subject.to_string(),
            span: tracing::info_span!("operation", name = %name, subject = %subject),
            started: Instant::now(),
            listener: self.listener.clone(),
        }
    }

    /// Run a future inside a scope
    pub async fn run<F: Future>(&self, name: &str, subject: &str, fut: F) -> F::Output {
        let handle = self.begin(name, subject);
        let span = handle.span().clone();
        let output = fut.instrument(span).await;
        drop(handle);
        output
    }
}

/// An open scope; closed on drop
pub struct ScopeHandle {
    name: String,
    subject: String,
    span: tracing::Span,
    started: Instant,
    listener: Option<Arc<dyn ScopeListener>>,
}

impl ScopeHandle {
    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for ScopeHandle {
    fn drop(&mut self) {
        let elapsed = self.elapsed();
        tracing::debug!(
            "End {} for {} after {:.2}s",
            self.name,
            self.subject,
            elapsed.as_secs_f64()
        );
        if let Some(listener) = &self.listener {
            listener.on_end(&self.name, &self.subject, elapsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Journal {
        events: Mutex<Vec<String>>,
    }

    impl ScopeListener for Journal {
        fn on_begin(&self, name: &str, subject: &str) {
            self.events.lock().unwrap().push(format!("begin {} {}", name, subject));
        }

        fn on_end(&self, name: &str, subject: &str, _elapsed: Duration) {
            self.events.lock().unwrap().push(format!("end {} {}", name, subject));
        }
    }

    #[test]
    fn test_end_on_drop() {
        let journal = Arc::new(Journal::default());
        let scope = OperationScope::with_listener(journal.clone());

        {
            let _handle = scope.begin("mirror", "Foo");
            assert_eq!(journal.events.lock().unwrap().len(), 1);
        }

        assert_eq!(
            *journal.events.lock().unwrap(),
            vec!["begin mirror Foo", "end mirror Foo"]
        );
    }

    #[tokio::test]
    async fn test_run_closes_on_error() {
        let journal = Arc::new(Journal::default());
        let scope = OperationScope::with_listener(journal.clone());

        let result: Result<(), &str> = scope
            .run("mirror", "packages.yaml", async {
                journal.events.lock().unwrap().push("work".to_string());
                Err("boom")
            })
            .await;

        assert!(result.is_err());
        assert_eq!(
            *journal.events.lock().unwrap(),
            vec!["begin mirror packages.yaml", "work", "end mirror packages.yaml"]
        );
    }

    #[test]
    fn test_without_listener() {
        let handle = OperationScope::new().begin("mirror", "Foo");
        assert!(handle.elapsed() < Duration::from_secs(60));
    }
}
