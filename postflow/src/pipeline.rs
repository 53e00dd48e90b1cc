//! Orchestration for a single `postflow create` post: generate, audit, decide,
//! revise, render.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::agents::Crew;
use crate::core::gate::QuickDecision;
use crate::core::naming::{render_file_name, run_id};
use crate::core::parse::Parsed;
use crate::core::platform::Platform;
use crate::core::types::{
    AuditReport, CopyArtifact, DecisionVerdict, DesignArtifact, PostDraft, RevisionRequest, Topic,
};
use crate::core::verdict::{fast_approve_verdict, quick_reject_request, request_from_audit};
use crate::io::outputs::unused_file_name;
use crate::io::provider::{Provider, Role};
use crate::io::renderer::{RenderRequest, RenderedImage, Renderer};
use crate::io::run_log::RunLog;
use crate::revision::{RevisionEvent, RevisionRound, RevisionStop, coordinate_revision};

/// Configuration for a single pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_iterations: u32,
    /// Rendered images land here; run logs go under `runs/`.
    pub output_dir: PathBuf,
    pub write_run_log: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            output_dir: PathBuf::from("output"),
            write_run_log: true,
        }
    }
}

/// How an approved post got its approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionPath {
    /// First audit scored high enough to skip the review.
    FastApprove,
    /// First review approved without revisions.
    FullReview,
    /// Approved after one or more revision rounds.
    Revised,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The revision loop ran out of rounds.
    Exhausted,
    /// A provider or the renderer failed.
    Collaborator,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApprovedPost {
    pub platform: Platform,
    pub topic: String,
    pub path: DecisionPath,
    pub draft: PostDraft,
    pub image: RenderedImage,
    pub audit_score: u8,
    pub decision_score: u8,
    pub audit: AuditReport,
    pub verdict: DecisionVerdict,
    pub iterations: u32,
    pub rounds: Vec<RevisionRound>,
    pub fallbacks: Vec<Role>,
    pub run_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedPost {
    pub platform: Platform,
    pub topic: String,
    pub kind: FailureKind,
    pub reason: String,
    /// Last complete artifacts, when generation got that far.
    pub design: Option<DesignArtifact>,
    pub copy: Option<CopyArtifact>,
    pub iterations: u32,
    pub last_feedback: Option<RevisionRequest>,
    pub last_audit: Option<AuditReport>,
    pub last_verdict: Option<DecisionVerdict>,
    pub rounds: Vec<RevisionRound>,
    pub fallbacks: Vec<Role>,
    pub run_dir: Option<PathBuf>,
}

/// Terminal result of `create_post`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineResult {
    Approved(ApprovedPost),
    Failed(FailedPost),
}

impl PipelineResult {
    pub fn is_approved(&self) -> bool {
        matches!(self, PipelineResult::Approved(_))
    }

    pub fn platform(&self) -> Platform {
        match self {
            PipelineResult::Approved(post) => post.platform,
            PipelineResult::Failed(post) => post.platform,
        }
    }

    pub fn iterations(&self) -> u32 {
        match self {
            PipelineResult::Approved(post) => post.iterations,
            PipelineResult::Failed(post) => post.iterations,
        }
    }
}

/// Mutable state of one run, turned into a `PipelineResult` at the end.
struct RunState {
    platform: Platform,
    topic: String,
    design: Option<DesignArtifact>,
    copy: Option<CopyArtifact>,
    audit: Option<AuditReport>,
    verdict: Option<DecisionVerdict>,
    last_feedback: Option<RevisionRequest>,
    iterations: u32,
    rounds: Vec<RevisionRound>,
    fallbacks: Vec<Role>,
    log: Option<RunLog>,
}

impl RunState {
    fn take<T>(&mut self, parsed: Parsed<T>, role: Role) -> T {
        if parsed.is_fallback() {
            self.fallbacks.push(role);
        }
        parsed.into_inner()
    }

    /// Best-effort stage snapshot; a failed write never fails the run.
    fn log_stage<T: Serialize>(&self, iteration: u32, stage: &str, value: &T) {
        if let Some(log) = &self.log
            && let Err(err) = log.write_stage(iteration, stage, value)
        {
            warn!(stage, err = %format!("{err:#}"), "failed to write run log");
        }
    }

    fn run_dir(&self) -> Option<PathBuf> {
        self.log.as_ref().map(|log| log.dir().to_path_buf())
    }

    fn fail(self, kind: FailureKind, reason: String) -> PipelineResult {
        warn!(platform = %self.platform, ?kind, reason = %reason, "post failed");
        let result = PipelineResult::Failed(FailedPost {
            platform: self.platform,
            run_dir: self.run_dir(),
            topic: self.topic,
            kind,
            reason,
            design: self.design,
            copy: self.copy,
            iterations: self.iterations,
            last_feedback: self.last_feedback,
            last_audit: self.audit,
            last_verdict: self.verdict,
            rounds: self.rounds,
            fallbacks: self.fallbacks,
        });
        write_result(self.log.as_ref(), &result);
        result
    }

    fn collaborator_failure(self, err: &anyhow::Error) -> PipelineResult {
        self.fail(FailureKind::Collaborator, format!("{err:#}"))
    }
}

fn write_result(log: Option<&RunLog>, result: &PipelineResult) {
    if let Some(log) = log
        && let Err(err) = log.write_result(result)
    {
        warn!(err = %format!("{err:#}"), "failed to write run result");
    }
}

fn open_run_log(config: &PipelineConfig, run_id: &str) -> Option<RunLog> {
    if !config.write_run_log {
        return None;
    }
    match RunLog::create(&config.output_dir, run_id) {
        Ok(log) => Some(log),
        Err(err) => {
            warn!(err = %format!("{err:#}"), "run log disabled");
            None
        }
    }
}

/// Create one post for `platform`, start to finish.
///
/// Never returns an error: collaborator failures and loop exhaustion become a
/// `PipelineResult::Failed` carrying whatever artifacts were produced so far.
#[instrument(skip_all, fields(platform = %platform))]
pub fn create_post<P: Provider, R: Renderer>(
    provider: &P,
    renderer: &R,
    crew: &Crew,
    config: &PipelineConfig,
    topic: &Topic,
    platform: Platform,
    now: DateTime<Utc>,
) -> PipelineResult {
    let run_id = run_id(&now, platform);
    let mut state = RunState {
        platform,
        topic: topic.as_str().to_string(),
        design: None,
        copy: None,
        audit: None,
        verdict: None,
        last_feedback: None,
        iterations: 0,
        rounds: Vec::new(),
        fallbacks: Vec::new(),
        log: open_run_log(config, &run_id),
    };
    let run_id = state.log.as_ref().map_or(run_id.as_str(), RunLog::run_id);
    info!(run_id = %run_id, topic = %topic, "creating post");

    let design = match crew.designer.create(provider, topic, platform) {
        Ok(parsed) => state.take(parsed, Role::Design),
        Err(err) => return state.collaborator_failure(&err),
    };
    if let Some(log) = &state.log
        && let Err(err) = log.write_markup(0, &design.markup)
    {
        warn!(err = %format!("{err:#}"), "failed to write design markup");
    }
    state.design = Some(design.clone());

    let copy = match crew.copywriter.create(provider, topic, platform) {
        Ok(parsed) => state.take(parsed, Role::Copy),
        Err(err) => return state.collaborator_failure(&err),
    };
    state.log_stage(0, "copy", &copy);
    state.copy = Some(copy.clone());
    let mut draft = PostDraft { design, copy };

    let audit = match crew.auditor.audit(provider, platform, &draft) {
        Ok(parsed) => state.take(parsed, Role::Audit),
        Err(err) => return state.collaborator_failure(&err),
    };
    state.log_stage(0, "audit", &audit);
    state.audit = Some(audit.clone());

    let quick = crew.manager.quick_decision(&audit);
    let (path, request) = match quick {
        QuickDecision::FastApprove => {
            state.verdict = Some(fast_approve_verdict(&audit));
            (DecisionPath::FastApprove, None)
        }
        QuickDecision::FastReject => (DecisionPath::Revised, Some(quick_reject_request(&audit))),
        QuickDecision::FullReview if !audit.approved => {
            info!(score = audit.overall_score, "audit below floor; revising before review");
            (DecisionPath::Revised, Some(request_from_audit(&audit)))
        }
        QuickDecision::FullReview => {
            let verdict = match crew.manager.review(provider, platform, &draft, &audit) {
                Ok(parsed) => state.take(parsed, Role::Review),
                Err(err) => return state.collaborator_failure(&err),
            };
            state.log_stage(0, "review", &verdict);
            let request =
                (!verdict.is_approved()).then(|| RevisionRequest::from_verdict(&verdict));
            state.verdict = Some(verdict);
            match request {
                Some(request) => (DecisionPath::Revised, Some(request)),
                None => (DecisionPath::FullReview, None),
            }
        }
    };

    if let Some(request) = request {
        state.last_feedback = Some(request.clone());
        let log = state.log.clone();
        let run = coordinate_revision(
            crew,
            provider,
            platform,
            draft,
            request,
            config.max_iterations,
            |event| log_event(log.as_ref(), event),
        );
        draft = run.draft;
        state.design = Some(draft.design.clone());
        state.copy = Some(draft.copy.clone());
        state.iterations = run.iterations;
        state.rounds = run.rounds;
        state.fallbacks.extend(run.fallbacks);
        state.last_feedback = Some(run.last_feedback);
        if let Some(audit) = run.audit {
            state.audit = Some(audit);
        }
        match run.stop {
            RevisionStop::Approved { verdict } => state.verdict = Some(verdict),
            RevisionStop::Exhausted { max_iterations } => {
                if let Some(verdict) = state.rounds.iter().rev().find_map(|r| r.verdict.clone()) {
                    state.verdict = Some(verdict);
                }
                return state.fail(
                    FailureKind::Exhausted,
                    format!(
                        "revision limit of {max_iterations} rounds reached; manual intervention needed"
                    ),
                );
            }
            RevisionStop::Failed { reason } => {
                return state.fail(FailureKind::Collaborator, reason);
            }
        }
    }

    let image = match render(renderer, config, &draft.design, platform, now) {
        Ok(image) => image,
        Err(err) => return state.collaborator_failure(&err.context("render approved design")),
    };

    let (Some(audit), Some(verdict)) = (state.audit.take(), state.verdict.take()) else {
        return state.fail(
            FailureKind::Collaborator,
            "approved post is missing its audit or verdict".to_string(),
        );
    };
    info!(
        path = ?path,
        audit_score = audit.overall_score,
        decision_score = verdict.manager_score,
        iterations = state.iterations,
        image = %image.path.display(),
        "post approved"
    );
    let result = PipelineResult::Approved(ApprovedPost {
        platform,
        run_dir: state.run_dir(),
        topic: state.topic,
        path,
        draft,
        image,
        audit_score: audit.overall_score,
        decision_score: verdict.manager_score,
        audit,
        verdict,
        iterations: state.iterations,
        rounds: state.rounds,
        fallbacks: state.fallbacks,
    });
    write_result(state.log.as_ref(), &result);
    result
}

fn render<R: Renderer>(
    renderer: &R,
    config: &PipelineConfig,
    design: &DesignArtifact,
    platform: Platform,
    now: DateTime<Utc>,
) -> anyhow::Result<RenderedImage> {
    let file_name = unused_file_name(&config.output_dir, &render_file_name(platform, &now));
    let output_path = config.output_dir.join(file_name);
    renderer.render(&RenderRequest {
        markup: &design.markup,
        dimensions: design.dimensions,
        output_path: &output_path,
    })
}

fn log_event(log: Option<&RunLog>, event: &RevisionEvent<'_>) {
    let Some(log) = log else {
        return;
    };
    let written = match event {
        RevisionEvent::RoundStarted { round, request } => {
            log.write_stage(*round, "feedback", request)
        }
        RevisionEvent::Revised { round, draft } => log
            .write_markup(*round, &draft.design.markup)
            .and_then(|_| log.write_stage(*round, "copy", &draft.copy)),
        RevisionEvent::Audited { round, audit } => log.write_stage(*round, "audit", audit),
        RevisionEvent::Reviewed { round, verdict } => log.write_stage(*round, "review", verdict),
    };
    if let Err(err) = written {
        warn!(err = %format!("{err:#}"), "failed to write run log");
    }
}
