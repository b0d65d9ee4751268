use crate::{
    config::Config,
    error::SplitError,
    frame_interval::{self, FrameIntervalInputs},
    model::{Action, ActionType, Job, Medium, Properties, Stage},
    properties::{self, COMPUTED_FRAME_INTERVAL, PropertyLayers},
    segmenter::{DetectionContext, DetectionRequest, MediaSegmenter, Segmenter},
    segmenting_plan::SegmentingPlan,
    store::{AlgorithmCatalog, MediumStateStore},
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// One routed unit of work, ready for the message transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkUnitRequest {
    pub recipient_queue: String,
    pub reply_to: String,
    pub priority: u8,
    pub request: DetectionRequest,
}

/// Resolved settings for one action on one medium.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPlan {
    pub medium_id: u64,
    pub action_index: usize,
    pub action_name: String,
    pub algorithm: String,
    pub computed_frame_interval: Option<u32>,
    pub properties: Properties,
    pub segmenting_plan: SegmentingPlan,
}

/// Splits one stage of a job into work units.
///
/// A split call is sequential: media in job order, then actions in stage
/// order, then whatever order the segmenter emits.
pub struct StageSplitter<C: AlgorithmCatalog, S: MediumStateStore> {
    cfg: Config,
    catalog: C,
    store: S,
}

struct JobOverrides<'a> {
    job: &'a Properties,
    algorithms: &'a BTreeMap<String, Properties>,
}

impl<C: AlgorithmCatalog, S: MediumStateStore> StageSplitter<C, S> {
    pub fn new(cfg: &Config, catalog: C, store: S) -> Self {
        Self {
            cfg: cfg.clone(),
            catalog,
            store,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Split the stage the job is currently on.
    pub fn split_current_stage(&self, job: &mut Job) -> Result<Vec<WorkUnitRequest>> {
        let stage = current_stage(job)?.clone();
        self.split(job, &stage)
    }

    pub fn split(&self, job: &mut Job, stage: &Stage) -> Result<Vec<WorkUnitRequest>> {
        validate(job, stage)?;

        let first_detection = is_first_detection_stage(job);
        let prior_stage = job.current_stage.checked_sub(1);
        info!(
            "[Job {}|{}] splitting stage '{}' ({} action(s), {} medium/media) first_detection={}",
            job.id,
            job.current_stage,
            stage.name,
            stage.actions.len(),
            job.media.len(),
            first_detection
        );

        let Job {
            id: job_id,
            current_stage: stage_index,
            priority,
            media,
            overridden_job_properties,
            overridden_algorithm_properties,
            ..
        } = job;
        let (job_id, stage_index, priority) = (*job_id, *stage_index, *priority);
        let overrides = JobOverrides {
            job: overridden_job_properties,
            algorithms: overridden_algorithm_properties,
        };

        let mut out = Vec::new();

        for medium in media.iter_mut() {
            if medium.failed {
                debug!(
                    "[Job {}:{}:*] Skipping Media #{} - it is in an error state.",
                    job_id, stage_index, medium.id
                );
                continue;
            }

            let previous_tracks = match (first_detection, prior_stage) {
                (false, Some(prior)) => self
                    .store
                    .prior_tracks(job_id, medium.id, prior)
                    .with_context(|| {
                        format!(
                            "loading stage {prior} tracks for job {job_id} medium #{}",
                            medium.id
                        )
                    })?,
                _ => BTreeSet::new(),
            };

            let segmenter = Segmenter::for_media_type(medium.media_type);
            let mut injected = false;

            for (action_index, action) in stage.actions.iter().enumerate() {
                let plan = self.prepare(&overrides, medium, action_index, action);

                // The last action with a computed value decides what is recorded.
                if let Some(interval) = plan.computed_frame_interval {
                    medium.add_property(COMPUTED_FRAME_INTERVAL, interval.to_string());
                    injected = true;
                    info!(
                        "Added {}={} to medium #{} properties due to FRAME_RATE_CAP override.",
                        COMPUTED_FRAME_INTERVAL, interval, medium.id
                    );
                }

                let ctx = DetectionContext {
                    job_id,
                    stage_index,
                    stage_name: stage.name.clone(),
                    action_index,
                    action_name: action.name.clone(),
                    is_first_detection_stage: first_detection,
                    algorithm_properties: properties::to_algorithm_properties(&plan.properties),
                    previous_tracks: previous_tracks.clone(),
                    segmenting_plan: plan.segmenting_plan,
                };

                let requests = segmenter.create_work_units(medium, &ctx);
                debug!(
                    "[Job {}|{}|{}] Created {} work units for Media #{}.",
                    job_id,
                    stage_index,
                    action_index,
                    requests.len(),
                    medium.id
                );

                let recipient_queue = self.recipient_queue(stage.action_type, &action.algorithm);
                out.extend(requests.into_iter().map(|request| WorkUnitRequest {
                    recipient_queue: recipient_queue.clone(),
                    reply_to: self.cfg.routing.reply_to.clone(),
                    priority,
                    request,
                }));
            }

            if injected {
                self.store
                    .persist_medium(job_id, medium)
                    .with_context(|| format!("persisting medium #{} for job {job_id}", medium.id))?;
            }
        }

        info!(
            "[Job {}|{}] stage '{}' produced {} work unit(s)",
            job_id,
            stage_index,
            stage.name,
            out.len()
        );
        Ok(out)
    }

    /// Resolve properties and segmenting plans without segmenting or persisting anything.
    pub fn plan(&self, job: &Job, stage: &Stage) -> Result<Vec<ActionPlan>> {
        validate(job, stage)?;
        let overrides = JobOverrides {
            job: &job.overridden_job_properties,
            algorithms: &job.overridden_algorithm_properties,
        };

        let mut plans = Vec::new();
        for medium in job.media.iter().filter(|m| !m.failed) {
            // Later actions see what earlier ones record, as they do in `split`.
            let mut working = medium.clone();
            for (action_index, action) in stage.actions.iter().enumerate() {
                let plan = self.prepare(&overrides, &working, action_index, action);
                if let Some(interval) = plan.computed_frame_interval {
                    working.add_property(COMPUTED_FRAME_INTERVAL, interval.to_string());
                }
                plans.push(plan);
            }
        }
        Ok(plans)
    }

    fn prepare(
        &self,
        overrides: &JobOverrides<'_>,
        medium: &Medium,
        action_index: usize,
        action: &Action,
    ) -> ActionPlan {
        let definition = self.catalog.algorithm(&action.algorithm);
        if definition.is_none() {
            debug!("algorithm '{}' not found; using no defaults", action.algorithm);
        }
        let defaults = properties::algorithm_defaults(definition.as_ref());
        let job_algorithm = overrides.algorithms.get(&action.algorithm);

        let computed = frame_interval::resolve(&FrameIntervalInputs {
            media_fps: frame_interval::media_fps(medium),
            system_cap: self.cfg.frame_rate.cap,
            job: overrides.job,
            job_algorithm,
            medium: &medium.properties,
        });

        // A value recorded by an earlier action or stage stays in effect unless
        // this action computes its own.
        let mut medium_layer = medium.properties.clone();
        if let Some(interval) = computed {
            medium_layer.insert(COMPUTED_FRAME_INTERVAL.to_string(), interval.to_string());
        }

        let resolved = properties::resolve(&PropertyLayers {
            algorithm_defaults: Some(&defaults),
            action: Some(&action.properties),
            job: Some(overrides.job),
            job_algorithm,
            medium: Some(&medium_layer),
        });
        let segmenting_plan = SegmentingPlan::from_properties(&self.cfg.segmenting, &resolved);
        debug!(?segmenting_plan, "medium #{} action {}", medium.id, action.name);

        ActionPlan {
            medium_id: medium.id,
            action_index,
            action_name: action.name.clone(),
            algorithm: action.algorithm.clone(),
            computed_frame_interval: computed,
            properties: resolved,
            segmenting_plan,
        }
    }

    fn recipient_queue(&self, action_type: ActionType, algorithm: &str) -> String {
        format!(
            "{}{}_{}_REQUEST",
            self.cfg.routing.queue_prefix, action_type, algorithm
        )
    }
}

/// True when no DETECTION stage precedes the job's current stage.
pub fn is_first_detection_stage(job: &Job) -> bool {
    job.pipeline
        .stages
        .iter()
        .position(|s| s.action_type == ActionType::Detection)
        .is_some_and(|first| first >= job.current_stage)
}

pub fn current_stage(job: &Job) -> Result<&Stage> {
    if job.pipeline.stages.is_empty() {
        return Err(SplitError::NoStages { job_id: job.id }.into());
    }
    job.stage(job.current_stage).ok_or_else(|| {
        SplitError::StageOutOfRange {
            job_id: job.id,
            current: job.current_stage,
            stages: job.pipeline.stages.len(),
        }
        .into()
    })
}

fn validate(job: &Job, stage: &Stage) -> Result<()> {
    current_stage(job)?;
    if let Some(action_index) = stage
        .actions
        .iter()
        .position(|a| a.algorithm.trim().is_empty())
    {
        return Err(SplitError::MissingAlgorithm {
            job_id: job.id,
            stage: stage.name.clone(),
            action_index,
        }
        .into());
    }
    Ok(())
}
