//! Outcome taxonomy and fixture lifecycle of the runner.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use casekit_harness::fixture::{FixtureProviders, FixtureSpec, InMemoryProvider};
use casekit_harness::tracker::{StaticTracker, TrackerRegistry};
use casekit_harness::{
    bug_is_open, skip_if, CaseContext, CaseError, CaseFilter, CaseId, CaseResult, ErrorKind, Level,
    Outcome, TestCase, TestMetadata, TestRunner,
};
use common::{FakeApp, FlakyProvider};

#[derive(Clone, Copy)]
enum Body {
    Pass,
    FailAssertion,
    Panic,
    DriverError,
}

struct ScriptedCase {
    name: String,
    metadata: TestMetadata,
    fixtures: Vec<FixtureSpec>,
    body: Body,
    runs: Arc<AtomicUsize>,
}

impl ScriptedCase {
    fn new(name: &str, body: Body) -> Self {
        Self {
            name: name.to_string(),
            metadata: TestMetadata::new(CaseId::new(name).unwrap(), Level::High),
            fixtures: vec![FixtureSpec::new("user", "user").attr("username", "foo")],
            body,
            runs: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn level(mut self, level: Level) -> Self {
        self.metadata.level = level;
        self
    }

    fn with_fixture(mut self, spec: FixtureSpec) -> Self {
        self.fixtures.push(spec);
        self
    }
}

#[async_trait]
impl TestCase for ScriptedCase {
    fn name(&self) -> &str {
        &self.name
    }

    fn metadata(&self) -> &TestMetadata {
        &self.metadata
    }

    fn fixtures(&self) -> &[FixtureSpec] {
        &self.fixtures
    }

    async fn run(&self, ctx: &CaseContext) -> CaseResult<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        assert_eq!(ctx.fixture("user")?.get("username"), Some("foo"));

        match self.body {
            Body::Pass => Ok(()),
            Body::FailAssertion => Err(CaseError::AssertionFailed("page did not greet".into())),
            Body::Panic => panic!("unexpected page state"),
            Body::DriverError => Err(CaseError::Driver("session lost".into())),
        }
    }
}

fn trackers() -> TrackerRegistry {
    TrackerRegistry::new().with(
        "bugzilla",
        Arc::new(
            StaticTracker::new("bugzilla")
                .with_open("100")
                .with_closed("200"),
        ),
    )
}

fn runner(provider: Arc<dyn casekit_harness::FixtureProvider>) -> TestRunner {
    TestRunner::new(Arc::new(FakeApp::new("foo", "bar")))
        .with_trackers(trackers())
        .with_fixtures(FixtureProviders::new().with_fallback(provider))
}

#[tokio::test]
async fn tracker_lookup_failure_is_its_own_outcome() {
    let users = Arc::new(InMemoryProvider::new());
    let runner = runner(users.clone());

    for condition in [bug_is_open("bugzilla", "999"), bug_is_open("jira", "100")] {
        let case = ScriptedCase::new("guarded", Body::Pass);
        let runs = case.runs.clone();

        let report = runner.run_case(&skip_if(condition, case)).await;

        assert!(
            matches!(report.outcome, Outcome::Errored { kind: ErrorKind::Tracker, .. }),
            "got {:?}",
            report.outcome
        );
        assert!(!report.outcome.is_passed());
        assert!(!report.outcome.is_skipped());
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
    assert_eq!(users.created(), 0);
}

#[tokio::test]
async fn panicking_body_is_a_failure_and_still_tears_down() {
    let users = Arc::new(InMemoryProvider::new());
    let report = runner(users.clone())
        .run_case(&ScriptedCase::new("panics", Body::Panic))
        .await;

    assert_eq!(
        report.outcome,
        Outcome::Failed {
            message: "unexpected page state".to_string()
        }
    );
    assert_eq!(users.created(), 1);
    assert_eq!(users.deleted(), 1);
}

#[tokio::test]
async fn driver_error_is_not_an_assertion_failure() {
    let users = Arc::new(InMemoryProvider::new());
    let report = runner(users.clone())
        .run_case(&ScriptedCase::new("driver", Body::DriverError))
        .await;

    assert!(matches!(report.outcome, Outcome::Errored { kind: ErrorKind::Driver, .. }));
    assert_eq!(users.deleted(), 1);
}

#[tokio::test]
async fn setup_failure_releases_what_was_acquired() {
    let provider = Arc::new(FlakyProvider::default());
    let case = ScriptedCase::new("setup", Body::Pass)
        .with_fixture(FixtureSpec::new("org", "organization").attr("fail", "create"));
    let runs = case.runs.clone();

    let report = runner(provider.clone()).run_case(&case).await;

    assert!(matches!(report.outcome, Outcome::Errored { kind: ErrorKind::Fixture, .. }));
    assert_eq!(runs.load(Ordering::SeqCst), 0, "body must not run without its fixtures");
    assert_eq!(provider.inner.created(), 1);
    assert_eq!(provider.inner.deleted(), 1);
    assert_eq!(report.fixtures, vec!["user:1".to_string()]);
}

#[tokio::test]
async fn teardown_failure_errors_a_passing_case() {
    let provider = Arc::new(FlakyProvider::failing_deletes());
    let report = runner(provider.clone())
        .run_case(&ScriptedCase::new("leaky", Body::Pass))
        .await;

    assert!(matches!(report.outcome, Outcome::Errored { kind: ErrorKind::Fixture, .. }));
    assert_eq!(report.teardown_errors.len(), 1);
    assert_eq!(provider.delete_attempts(), 1);
}

#[tokio::test]
async fn teardown_failure_does_not_mask_assertion_failure() {
    let provider = Arc::new(FlakyProvider::failing_deletes());
    let report = runner(provider.clone())
        .run_case(&ScriptedCase::new("both", Body::FailAssertion))
        .await;

    assert!(matches!(report.outcome, Outcome::Failed { .. }));
    assert_eq!(report.teardown_errors.len(), 1);
}

#[tokio::test]
async fn failures_are_isolated_per_case() {
    let users = Arc::new(InMemoryProvider::new());
    let cases: Vec<Arc<dyn TestCase>> = vec![
        Arc::new(ScriptedCase::new("first", Body::FailAssertion)),
        Arc::new(ScriptedCase::new("second", Body::Panic)),
        Arc::new(skip_if(bug_is_open("bugzilla", "100"), ScriptedCase::new("third", Body::Pass))),
        Arc::new(ScriptedCase::new("fourth", Body::Pass)),
    ];

    let suite = runner(users.clone()).run_cases(&cases).await.unwrap();

    assert_eq!(suite.total, 4);
    assert_eq!((suite.passed, suite.failed, suite.skipped, suite.errored), (1, 2, 1, 0));
    assert!(!suite.success());
    assert_eq!(users.created(), 3);
    assert_eq!(users.deleted(), 3);
}

#[tokio::test]
async fn nested_guards_skip_when_any_defect_is_open() {
    let users = Arc::new(InMemoryProvider::new());
    let case = skip_if(
        bug_is_open("bugzilla", "200"),
        skip_if(bug_is_open("bugzilla", "100"), ScriptedCase::new("nested", Body::Pass)),
    );
    assert_eq!(case.skip_conditions().len(), 2);

    let report = runner(users.clone()).run_case(&case).await;

    assert_eq!(
        report.outcome,
        Outcome::Skipped {
            reason: "bugzilla bug 100 is open".to_string()
        }
    );
    assert_eq!(users.created(), 0);
}

#[tokio::test]
async fn metadata_never_changes_the_outcome() {
    let users = Arc::new(InMemoryProvider::new());
    let runner = runner(users);

    for level in [Level::Low, Level::Critical] {
        let report = runner
            .run_case(&ScriptedCase::new("levels", Body::FailAssertion).level(level))
            .await;
        assert_eq!(report.outcome.label(), "failed");
        assert_eq!(report.metadata.level, level);
    }
}

#[tokio::test]
async fn duplicate_ids_are_rejected_before_running() {
    let users = Arc::new(InMemoryProvider::new());
    let a = ScriptedCase::new("same", Body::Pass);
    let mut b = ScriptedCase::new("other", Body::Pass);
    b.metadata.id = CaseId::new("same").unwrap();
    let runs = a.runs.clone();

    let cases: Vec<Arc<dyn TestCase>> = vec![Arc::new(a), Arc::new(b)];
    let err = runner(users).run_cases(&cases).await.unwrap_err();

    assert!(matches!(err, CaseError::DuplicateId { .. }));
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn filter_selects_by_level() {
    let users = Arc::new(InMemoryProvider::new());
    let cases: Vec<Arc<dyn TestCase>> = vec![
        Arc::new(ScriptedCase::new("minor", Body::Pass).level(Level::Low)),
        Arc::new(ScriptedCase::new("major", Body::Pass).level(Level::Critical)),
    ];
    let filter = CaseFilter {
        min_level: Some(Level::High),
        ..Default::default()
    };

    let suite = runner(users).run_filtered(&cases, &filter).await.unwrap();

    assert_eq!(suite.total, 1);
    assert!(suite.get("major").is_some());
}

#[tokio::test]
async fn panicking_fixture_service_does_not_stop_the_run() {
    let provider = Arc::new(FlakyProvider::default());
    let crashing = ScriptedCase::new("crashing", Body::Pass)
        .with_fixture(FixtureSpec::new("org", "organization").attr("fail", "create-panic"));
    let crashing_runs = crashing.runs.clone();
    let next = ScriptedCase::new("next", Body::Pass);
    let next_runs = next.runs.clone();
    let cases: Vec<Arc<dyn TestCase>> = vec![Arc::new(crashing), Arc::new(next)];

    let suite = runner(provider.clone()).run_cases(&cases).await.unwrap();

    let crashed = suite.get("crashing").unwrap();
    match &crashed.outcome {
        Outcome::Errored { kind, message } => {
            assert_eq!(*kind, ErrorKind::Fixture);
            assert!(message.contains("organization service crashed"), "{}", message);
        }
        other => panic!("expected fixture error, got {:?}", other),
    }
    assert_eq!(crashing_runs.load(Ordering::SeqCst), 0);
    assert_eq!(suite.get("next").unwrap().outcome, Outcome::Passed);
    assert_eq!(next_runs.load(Ordering::SeqCst), 1);
    // Both user fixtures were created and deleted.
    assert_eq!(provider.inner.created(), 2);
    assert_eq!(provider.inner.deleted(), 2);
}

#[tokio::test]
async fn panicking_delete_still_releases_the_rest() {
    let provider = Arc::new(FlakyProvider::default());
    let case = ScriptedCase::new("teardown", Body::Pass)
        .with_fixture(FixtureSpec::new("org", "organization").attr("fail", "delete-panic"));

    let report = runner(provider.clone()).run_case(&case).await;

    assert!(matches!(report.outcome, Outcome::Errored { kind: ErrorKind::Fixture, .. }));
    assert_eq!(report.teardown_errors.len(), 1);
    assert!(report.teardown_errors[0].contains("panicked"));
    assert_eq!(provider.delete_attempts(), 2);
    assert_eq!(provider.inner.deleted(), 1);
}

struct CrashingTracker;

#[async_trait]
impl casekit_harness::DefectTracker for CrashingTracker {
    async fn is_open(&self, _defect: &str) -> CaseResult<bool> {
        panic!("tracker client crashed")
    }
}

#[tokio::test]
async fn panicking_tracker_is_a_tracker_error() {
    let users = Arc::new(InMemoryProvider::new());
    let runner = TestRunner::new(Arc::new(FakeApp::new("foo", "bar")))
        .with_trackers(TrackerRegistry::new().with("bugzilla", Arc::new(CrashingTracker)))
        .with_fixtures(FixtureProviders::new().with_fallback(users.clone()));
    let cases: Vec<Arc<dyn TestCase>> = vec![
        Arc::new(skip_if(bug_is_open("bugzilla", "1"), ScriptedCase::new("guarded", Body::Pass))),
        Arc::new(ScriptedCase::new("unguarded", Body::Pass)),
    ];

    let suite = runner.run_cases(&cases).await.unwrap();

    assert!(matches!(
        suite.get("guarded").unwrap().outcome,
        Outcome::Errored { kind: ErrorKind::Tracker, .. }
    ));
    assert_eq!(suite.get("unguarded").unwrap().outcome, Outcome::Passed);
    assert_eq!(users.created(), 1);
}
