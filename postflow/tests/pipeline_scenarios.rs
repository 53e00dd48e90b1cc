//! End-to-end pipeline scenarios with scripted collaborators.
//!
//! These tests drive `create_post` through the quick-decision branches and the
//! revision loop to verify call ordering, iteration counts, and the shape of
//! the final result.

use chrono::{DateTime, TimeZone, Utc};

use postflow::core::platform::Platform;
use postflow::core::types::{Decision, FeedbackSource, Topic};
use postflow::io::provider::Role;
use postflow::pipeline::{
    DecisionPath, FailureKind, PipelineConfig, PipelineResult, create_post,
};
use postflow::test_support::{
    ScriptedProvider, ScriptedRenderer, audit_response, copy_response, design_response,
    test_crew, verdict_response,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 8, 15, 0)
        .single()
        .expect("valid time")
}

fn topic() -> Topic {
    Topic::new("10 tips for better morning routines").expect("topic")
}

fn run(provider: &ScriptedProvider, max_iterations: u32) -> (PipelineResult, tempfile::TempDir) {
    let temp = tempfile::tempdir().expect("tempdir");
    let result = create_post(
        provider,
        &ScriptedRenderer::new(),
        &test_crew(),
        &PipelineConfig {
            max_iterations,
            output_dir: temp.path().to_path_buf(),
            write_run_log: true,
        },
        &topic(),
        Platform::Instagram,
        now(),
    );
    (result, temp)
}

fn initial_drafts(provider: ScriptedProvider) -> ScriptedProvider {
    provider
        .with(Role::Design, design_response("10 tips"))
        .with(
            Role::Copy,
            copy_response(
                "Mornings set the tone.\nHere are 10 tips.",
                &["morning", "routine", "habits", "wellness", "productivity"],
            ),
        )
}

/// Scenario A: a 92/approved first audit goes to a full review, which
/// approves without any revision round.
#[test]
fn scenario_a_full_review_approves_without_revisions() {
    let provider = initial_drafts(ScriptedProvider::new())
        .with(Role::Audit, audit_response(92, true, &[]))
        .with(Role::Review, verdict_response("approve", 90, &[], None, None));

    let (result, temp) = run(&provider, 3);

    let PipelineResult::Approved(post) = result else {
        panic!("expected approval, got {result:?}");
    };
    assert_eq!(post.path, DecisionPath::FullReview);
    assert_eq!(post.iterations, 0);
    assert_eq!(post.audit_score, 92);
    assert_eq!(post.decision_score, 90);
    assert!(post.image.path.starts_with(temp.path()));
    assert!(post.image.path.is_file());
    assert_eq!(
        provider.roles(),
        vec![Role::Design, Role::Copy, Role::Audit, Role::Review]
    );
    provider.assert_drained();
}

/// Scenario B: a 60 first audit is fast-rejected; every round re-audits
/// before the manager sees the draft.
#[test]
fn scenario_b_fast_reject_reaudits_before_review() {
    let provider = initial_drafts(ScriptedProvider::new())
        .with(
            Role::Audit,
            audit_response(60, false, &["Increase design contrast", "Shorten the caption text"]),
        )
        // Round 1: both artifacts, re-audit still below the floor.
        .with(Role::Design, design_response("round 1"))
        .with(Role::Copy, copy_response("Round one copy", &[]))
        .with(Role::Audit, audit_response(75, false, &["Fix the caption text tone"]))
        // Round 2: copy only, passes the floor and the review.
        .with(Role::Copy, copy_response("Round two copy", &[]))
        .with(Role::Audit, audit_response(86, true, &[]))
        .with(Role::Review, verdict_response("approve", 88, &[], None, None));

    let (result, _temp) = run(&provider, 3);

    let PipelineResult::Approved(post) = result else {
        panic!("expected approval, got {result:?}");
    };
    assert_eq!(post.path, DecisionPath::Revised);
    assert_eq!(post.iterations, 2);
    assert_eq!(post.audit_score, 86);
    assert_eq!(post.decision_score, 88);
    assert_eq!(post.draft.copy.body, "Round two copy");
    assert_eq!(post.rounds[0].request.source, FeedbackSource::QuickReject);
    assert!(post.rounds[0].verdict.is_none());
    assert_eq!(post.rounds[1].request.source, FeedbackSource::Audit);

    let roles = provider.roles();
    let first_review = roles
        .iter()
        .position(|role| *role == Role::Review)
        .expect("review call");
    assert_eq!(
        roles.iter().filter(|role| **role == Role::Audit).count(),
        3,
        "initial audit plus one per round"
    );
    assert_eq!(roles[first_review - 1], Role::Audit);
    provider.assert_drained();
}

/// Scenario C: the manager keeps asking for revisions; with three rounds
/// allowed the run fails with the last feedback preserved.
#[test]
fn scenario_c_exhaustion_preserves_last_feedback() {
    let mut provider = initial_drafts(ScriptedProvider::new())
        .with(Role::Audit, audit_response(85, true, &[]))
        .with(
            Role::Review,
            verdict_response("revise", 70, &["flat layout"], Some("New layout"), None),
        );
    for round in 1..=3 {
        provider = provider
            .with(Role::Design, design_response(&format!("round {round}")))
            .with(Role::Audit, audit_response(85, true, &[]))
            .with(
                Role::Review,
                verdict_response(
                    "revise",
                    70,
                    &["still flat"],
                    Some(&format!("Layout attempt {}", round + 1)),
                    None,
                ),
            );
    }

    let (result, temp) = run(&provider, 3);

    let PipelineResult::Failed(post) = result else {
        panic!("expected failure, got {result:?}");
    };
    assert_eq!(post.kind, FailureKind::Exhausted);
    assert_eq!(post.iterations, 3);
    let feedback = post.last_feedback.expect("last feedback");
    assert_eq!(feedback.targets.design(), Some("Layout attempt 4"));
    assert_eq!(feedback.targets.copy(), None);
    let verdict = post.last_verdict.expect("last verdict");
    assert_eq!(verdict.decision, Decision::Revise);
    assert!(post.design.expect("design").markup.contains("round 3"));
    assert!(post.copy.is_some());
    assert_eq!(provider.calls(Role::Copy), 1);
    provider.assert_drained();

    let run_dir = post.run_dir.expect("run dir");
    assert!(run_dir.starts_with(temp.path()));
    assert!(run_dir.join("03-review.json").is_file());
    assert!(run_dir.join("result.json").is_file());
}

#[test]
fn audit_provider_failure_is_a_collaborator_failure() {
    let provider =
        initial_drafts(ScriptedProvider::new()).with_error(Role::Audit, "503 overloaded");

    let (result, _temp) = run(&provider, 3);

    let PipelineResult::Failed(post) = result else {
        panic!("expected failure");
    };
    assert_eq!(post.kind, FailureKind::Collaborator);
    assert!(post.reason.contains("audit provider call"), "{}", post.reason);
    assert!(post.design.is_some());
    assert!(post.copy.is_some());
    assert!(post.last_audit.is_none());
}

#[test]
fn approval_with_serious_concern_is_revised() {
    let provider = initial_drafts(ScriptedProvider::new())
        .with(Role::Audit, audit_response(88, true, &[]))
        .with(
            Role::Review,
            verdict_response(
                "approve",
                84,
                &["Wrong brand color"],
                Some("Use the brand blue"),
                None,
            ),
        )
        .with(Role::Design, design_response("blue"))
        .with(Role::Audit, audit_response(90, true, &[]))
        .with(Role::Review, verdict_response("approve", 92, &[], None, None));

    let (result, _temp) = run(&provider, 3);

    let PipelineResult::Approved(post) = result else {
        panic!("expected approval, got {result:?}");
    };
    assert_eq!(post.path, DecisionPath::Revised);
    assert_eq!(post.iterations, 1);
    assert_eq!(post.rounds[0].request.targets.design(), Some("Use the brand blue"));
    provider.assert_drained();
}

/// A first audit between the fast-reject line and the floor revises from the
/// audit's improvements; the manager only sees the re-audited draft.
#[test]
fn below_floor_first_audit_revises_before_any_review() {
    let provider = initial_drafts(ScriptedProvider::new())
        .with(
            Role::Audit,
            audit_response(75, false, &["Increase design contrast", "Shorten the caption text"]),
        )
        .with(Role::Design, design_response("high contrast"))
        .with(Role::Copy, copy_response("Shorter caption", &[]))
        .with(Role::Audit, audit_response(86, true, &[]))
        .with(Role::Review, verdict_response("approve", 89, &[], None, None));

    let (result, _temp) = run(&provider, 3);

    let PipelineResult::Approved(post) = result else {
        panic!("expected approval, got {result:?}");
    };
    assert_eq!(post.path, DecisionPath::Revised);
    assert_eq!(post.iterations, 1);
    assert_eq!(post.rounds[0].request.source, FeedbackSource::Audit);
    assert_eq!(
        post.rounds[0].request.targets.design(),
        Some("Increase design contrast")
    );
    assert_eq!(
        post.rounds[0].request.targets.copy(),
        Some("Shorten the caption text")
    );
    assert_eq!(
        provider.roles(),
        vec![
            Role::Design,
            Role::Copy,
            Role::Audit,
            Role::Design,
            Role::Copy,
            Role::Audit,
            Role::Review,
        ]
    );
    provider.assert_drained();
}
