//! Bounded revision loop: revise, re-audit, and review until approval or exhaustion.

use serde::Serialize;
use tracing::{info, warn};

use crate::agents::Crew;
use crate::core::parse::Parsed;
use crate::core::platform::Platform;
use crate::core::types::{AuditReport, DecisionVerdict, PostDraft, RevisionRequest, RevisionTarget};
use crate::core::verdict::request_from_audit;
use crate::io::provider::{Provider, Role};

/// Why `coordinate_revision` stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "stop", rename_all = "snake_case")]
pub enum RevisionStop {
    /// The re-audit passed the floor and the review approved.
    Approved { verdict: DecisionVerdict },
    /// Every allowed round was spent without an approval.
    Exhausted { max_iterations: u32 },
    /// A collaborator call failed; the draft is the last complete one.
    Failed { reason: String },
}

/// Record of one revision round, kept for the run log and the final result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevisionRound {
    pub round: u32,
    pub request: RevisionRequest,
    pub audit: Option<AuditReport>,
    /// `None` when the re-audit failed and the review was skipped.
    pub verdict: Option<DecisionVerdict>,
}

/// Summary of a revision loop invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevisionRun {
    pub draft: PostDraft,
    /// Rounds started, at most `max_iterations`.
    pub iterations: u32,
    /// Audit of the current draft, if one was completed.
    pub audit: Option<AuditReport>,
    /// Feedback the next round would have acted on.
    pub last_feedback: RevisionRequest,
    pub rounds: Vec<RevisionRound>,
    /// Roles whose responses fell back to a default record.
    pub fallbacks: Vec<Role>,
    pub stop: RevisionStop,
}

/// Progress notifications emitted while the loop runs.
#[derive(Debug, Clone, Copy)]
pub enum RevisionEvent<'a> {
    RoundStarted { round: u32, request: &'a RevisionRequest },
    Revised { round: u32, draft: &'a PostDraft },
    Audited { round: u32, audit: &'a AuditReport },
    Reviewed { round: u32, verdict: &'a DecisionVerdict },
}

/// Run at most `max_iterations` revision rounds starting from `draft`.
///
/// Each round regenerates the targeted artifacts and re-audits the new pair.
/// A re-audit below the approval floor produces the next feedback directly;
/// only a passing re-audit is sent to the manager for review. Collaborator
/// failures stop the loop with the last complete draft instead of erroring.
pub fn coordinate_revision<P: Provider, F: FnMut(&RevisionEvent<'_>)>(
    crew: &Crew,
    provider: &P,
    platform: Platform,
    draft: PostDraft,
    request: RevisionRequest,
    max_iterations: u32,
    mut on_event: F,
) -> RevisionRun {
    let mut run = RevisionRun {
        draft,
        iterations: 0,
        audit: None,
        last_feedback: request,
        rounds: Vec::new(),
        fallbacks: Vec::new(),
        stop: RevisionStop::Exhausted { max_iterations },
    };

    for round in 1..=max_iterations {
        run.iterations = round;
        on_event(&RevisionEvent::RoundStarted {
            round,
            request: &run.last_feedback,
        });
        let mut record = RevisionRound {
            round,
            request: run.last_feedback.clone(),
            audit: None,
            verdict: None,
        };

        match revise_draft(crew, provider, platform, &run.draft, &run.last_feedback) {
            Ok((revised, fallbacks)) => {
                run.draft = revised;
                run.fallbacks.extend(fallbacks);
            }
            Err(err) => return fail(run, record, &err),
        }
        on_event(&RevisionEvent::Revised {
            round,
            draft: &run.draft,
        });

        let audit = match crew.auditor.audit(provider, platform, &run.draft) {
            Ok(parsed) => take(parsed, Role::Audit, &mut run.fallbacks),
            Err(err) => return fail(run, record, &err),
        };
        on_event(&RevisionEvent::Audited {
            round,
            audit: &audit,
        });
        record.audit = Some(audit.clone());
        run.audit = Some(audit.clone());

        if !audit.approved {
            info!(round, score = audit.overall_score, "re-audit below floor; skipping review");
            run.last_feedback = request_from_audit(&audit);
            run.rounds.push(record);
            continue;
        }

        let verdict = match crew.manager.review(provider, platform, &run.draft, &audit) {
            Ok(parsed) => take(parsed, Role::Review, &mut run.fallbacks),
            Err(err) => return fail(run, record, &err),
        };
        on_event(&RevisionEvent::Reviewed {
            round,
            verdict: &verdict,
        });
        record.verdict = Some(verdict.clone());
        run.rounds.push(record);

        if verdict.is_approved() {
            info!(round, score = verdict.manager_score, "revision approved");
            run.stop = RevisionStop::Approved { verdict };
            return run;
        }
        run.last_feedback = RevisionRequest::from_verdict(&verdict);
    }

    warn!(max_iterations, "revision loop exhausted; manual intervention needed");
    run
}

fn take<T>(parsed: Parsed<T>, role: Role, fallbacks: &mut Vec<Role>) -> T {
    if parsed.is_fallback() {
        fallbacks.push(role);
    }
    parsed.into_inner()
}

fn fail(mut run: RevisionRun, record: RevisionRound, err: &anyhow::Error) -> RevisionRun {
    warn!(round = record.round, err = %format!("{err:#}"), "revision round failed");
    run.rounds.push(record);
    run.stop = RevisionStop::Failed {
        reason: format!("{err:#}"),
    };
    run
}

/// Regenerate the artifacts named by `request`, returning a new draft.
///
/// A request without targets revises both artifacts with its reason.
fn revise_draft<P: Provider>(
    crew: &Crew,
    provider: &P,
    platform: Platform,
    draft: &PostDraft,
    request: &RevisionRequest,
) -> anyhow::Result<(PostDraft, Vec<Role>)> {
    let targets = match &request.targets {
        RevisionTarget::None => {
            RevisionTarget::Both(request.reason.clone(), request.reason.clone())
        }
        targets => targets.clone(),
    };
    let mut fallbacks = Vec::new();

    let design = match targets.design() {
        Some(feedback) => take(
            crew.designer
                .revise(provider, platform, &draft.design, feedback)?,
            Role::Design,
            &mut fallbacks,
        ),
        None => draft.design.clone(),
    };
    let copy = match targets.copy() {
        Some(feedback) => take(
            crew.copywriter
                .revise(provider, platform, &draft.copy, feedback)?,
            Role::Copy,
            &mut fallbacks,
        ),
        None => draft.copy.clone(),
    };
    Ok((PostDraft { design, copy }, fallbacks))
}
