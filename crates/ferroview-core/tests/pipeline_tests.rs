mod support;

use ferroview_core::pipeline::Trigger;
use std::path::PathBuf;
use support::harness;

#[tokio::test(start_paused = true)]
async fn test_direct_pipeline_calls_are_serialized() {
    let h = harness(1000);
    let session = h.editor.session();
    session.set_auto_compile(false);
    session.replace_document(PathBuf::from(support::DOC), "x".into());

    let pipeline = h.editor.pipeline();
    let (a, b) = tokio::join!(
        pipeline.compile(Trigger::Manual),
        pipeline.compile(Trigger::Manual)
    );

    assert!(a.unwrap().success);
    assert!(b.unwrap().success);
    assert_eq!(h.runner.runs().len(), 2);
    assert_eq!(h.runner.max_active(), 1);
    assert_eq!(session.artifact_revision(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_compiled_content_is_captured_at_trigger() {
    let h = harness(1000);
    let session = h.editor.session().clone();
    session.set_auto_compile(false);
    session.replace_document(PathBuf::from(support::DOC), "at trigger".into());

    let pipeline = h.editor.pipeline().clone();
    let compile = tokio::spawn(async move { pipeline.compile(Trigger::Manual).await });
    support::advance(10).await;
    session.set_content("typed while compiling");

    assert!(compile.await.unwrap().unwrap().success);
    assert_eq!(h.runner.runs(), vec!["at trigger".to_string()]);
    assert_eq!(
        h.store.get(std::path::Path::new(support::DOC)).as_deref(),
        Some("at trigger")
    );
}
