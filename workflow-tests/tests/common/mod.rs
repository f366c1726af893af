//! Common test utilities for workflow tests.

use mock_api::MockState;
use workflow_tests::{TestBackend, WorkflowTestContext};

/// Spawn a backend with `state` and a fresh client context against it.
pub async fn setup(state: MockState) -> (TestBackend, WorkflowTestContext) {
    let backend = TestBackend::spawn(state)
        .await
        .expect("Mock backend did not start");
    let ctx = WorkflowTestContext::new(&backend).expect("Failed to create workflow test context");
    (backend, ctx)
}
