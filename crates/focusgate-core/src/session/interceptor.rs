//! Where compiled rules go.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::error::InterceptorError;
use crate::policy::RuleSet;

/// Receives rule sets whenever the compiled rules change.
///
/// Implementations replace whatever they installed before; installing the
/// same set twice must be harmless.
pub trait NavigationInterceptor: Send + Sync {
    fn install_rules(
        &self,
        rules: &RuleSet,
    ) -> impl Future<Output = Result<(), InterceptorError>> + Send;
}

/// Logs each rule set and installs nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingInterceptor;

impl NavigationInterceptor for LoggingInterceptor {
    async fn install_rules(&self, rules: &RuleSet) -> Result<(), InterceptorError> {
        info!(
            rules = rules.len(),
            navigation_hook = rules.needs_navigation_hook,
            "Rules updated"
        );
        Ok(())
    }
}

/// Writes each rule set as pretty JSON to a file, for a browser-side
/// component to pick up.
#[derive(Debug, Clone)]
pub struct RulesFileInterceptor {
    path: PathBuf,
}

impl RulesFileInterceptor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl NavigationInterceptor for RulesFileInterceptor {
    async fn install_rules(&self, rules: &RuleSet) -> Result<(), InterceptorError> {
        let body = serde_json::to_vec_pretty(rules)?;
        let write_failed = |source| InterceptorError::WriteFailed {
            path: self.path.clone(),
            source,
        };

        // Readers never see a half-written file.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &body).await.map_err(write_failed)?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(write_failed)?;
        debug!(path = %self.path.display(), rules = rules.len(), "Rules file written");
        Ok(())
    }
}

/// Keeps every installed rule set in memory. Clones share the history.
#[derive(Debug, Clone, Default)]
pub struct RecordingInterceptor {
    installed: Arc<Mutex<Vec<RuleSet>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent installs fail until switched back.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn installed(&self) -> Vec<RuleSet> {
        self.installed
            .lock()
            .map(|sets| sets.clone())
            .unwrap_or_default()
    }

    pub fn last(&self) -> Option<RuleSet> {
        self.installed.lock().ok()?.last().cloned()
    }
}

impl NavigationInterceptor for RecordingInterceptor {
    async fn install_rules(&self, rules: &RuleSet) -> Result<(), InterceptorError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(InterceptorError::Rejected("interceptor offline".into()));
        }
        let mut sets = self
            .installed
            .lock()
            .map_err(|e| InterceptorError::Rejected(e.to_string()))?;
        sets.push(rules.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{BlockingMode, PolicyEngine};

    fn sample_rules() -> RuleSet {
        let mut engine = PolicyEngine::default();
        engine.set_block_list(["x.com"]);
        engine.set_mode(BlockingMode::Blocklist);
        engine.compile_interception_rules(true, false, "blocked.html")
    }

    #[tokio::test]
    async fn rules_file_contains_the_rule_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        let interceptor = RulesFileInterceptor::new(&path);

        let rules = sample_rules();
        interceptor.install_rules(&rules).await.unwrap();

        let written: RuleSet =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written, rules);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn rules_file_reports_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let interceptor = RulesFileInterceptor::new(dir.path().join("missing/rules.json"));
        let err = interceptor.install_rules(&sample_rules()).await.unwrap_err();
        assert!(matches!(err, InterceptorError::WriteFailed { .. }));
    }

    #[tokio::test]
    async fn recording_interceptor_can_fail_on_demand() {
        let interceptor = RecordingInterceptor::new();
        interceptor.install_rules(&RuleSet::default()).await.unwrap();
        interceptor.set_fail(true);
        assert!(interceptor.install_rules(&sample_rules()).await.is_err());
        assert_eq!(interceptor.installed().len(), 1);
    }
}
