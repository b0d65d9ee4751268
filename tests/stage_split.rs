use anyhow::{Result, bail};
use stage_split::config::Config;
use stage_split::error::SplitError;
use stage_split::model::{
    Action, ActionType, AlgorithmDefinition, Job, MediaType, Medium, Pipeline, Properties,
    PropertyDefinition, Stage, Track,
};
use stage_split::properties::{COMPUTED_FRAME_INTERVAL, FRAME_INTERVAL, HORIZONTAL_FLIP, ROTATION};
use stage_split::segmenter::WorkRange;
use stage_split::splitter::{StageSplitter, is_first_detection_stage};
use stage_split::store::{InMemoryCatalog, InMemoryStore, MediumStateStore};
use std::cell::RefCell;
use std::collections::BTreeSet;

fn props(pairs: &[(&str, &str)]) -> Properties {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn stage(name: &str, action_type: ActionType, algorithms: &[&str]) -> Stage {
    Stage {
        name: name.into(),
        action_type,
        actions: algorithms
            .iter()
            .map(|alg| Action {
                name: format!("{alg} ACTION"),
                algorithm: alg.to_string(),
                properties: Properties::new(),
            })
            .collect(),
    }
}

fn video(id: u64, fps: &str, frames: &str) -> Medium {
    Medium {
        id,
        uri: format!("file:///media/{id}.mp4"),
        media_type: MediaType::Video,
        failed: false,
        metadata: props(&[("FPS", fps), ("FRAME_COUNT", frames)]),
        properties: Properties::new(),
    }
}

fn job(stages: Vec<Stage>, current_stage: usize, media: Vec<Medium>) -> Job {
    Job {
        id: 42,
        pipeline: Pipeline {
            name: "TEST PIPELINE".into(),
            stages,
        },
        current_stage,
        priority: 5,
        media,
        overridden_job_properties: Properties::new(),
        overridden_algorithm_properties: Default::default(),
    }
}

fn catalog() -> InMemoryCatalog {
    InMemoryCatalog::new([AlgorithmDefinition {
        name: "FACECV".into(),
        action_type: ActionType::Detection,
        properties: vec![PropertyDefinition {
            name: "MIN_FACE_SIZE".into(),
            default_value: "48".into(),
        }],
    }])
}

fn capped_config(cap: f64) -> Config {
    let mut cfg = Config::default();
    cfg.frame_rate.cap = cap;
    cfg
}

/// Store that records every call and never has tracks.
#[derive(Default)]
struct RecordingStore {
    track_queries: RefCell<Vec<(u64, u64, usize)>>,
    persisted: RefCell<Vec<Medium>>,
}

impl MediumStateStore for RecordingStore {
    fn prior_tracks(
        &self,
        job_id: u64,
        medium_id: u64,
        stage_index: usize,
    ) -> Result<BTreeSet<Track>> {
        self.track_queries
            .borrow_mut()
            .push((job_id, medium_id, stage_index));
        Ok(BTreeSet::new())
    }

    fn persist_medium(&self, _job_id: u64, medium: &Medium) -> Result<()> {
        self.persisted.borrow_mut().push(medium.clone());
        Ok(())
    }
}

struct BrokenStore;

impl MediumStateStore for BrokenStore {
    fn prior_tracks(&self, _: u64, _: u64, _: usize) -> Result<BTreeSet<Track>> {
        bail!("connection refused")
    }

    fn persist_medium(&self, _: u64, _: &Medium) -> Result<()> {
        bail!("connection refused")
    }
}

fn sampling_intervals(units: &[stage_split::splitter::WorkUnitRequest]) -> Vec<u32> {
    units
        .iter()
        .map(|u| match u.request.range {
            WorkRange::Video { frame_interval, .. } => frame_interval,
            _ => panic!("expected video work unit"),
        })
        .collect()
}

#[test]
fn system_cap_sets_sampling_interval() {
    let mut job = job(
        vec![stage("FACE DETECTION", ActionType::Detection, &["FACECV"])],
        0,
        vec![video(1, "30", "100")],
    );
    let splitter = StageSplitter::new(&capped_config(10.0), catalog(), InMemoryStore::new());

    let plans = splitter.plan(&job, &job.pipeline.stages[0]).expect("plan");
    assert_eq!(plans[0].computed_frame_interval, Some(3));
    assert_eq!(plans[0].segmenting_plan.sampling_interval, 3);

    let units = splitter.split_current_stage(&mut job).expect("split");
    assert_eq!(sampling_intervals(&units), vec![3]);
    assert_eq!(
        job.media[0].properties.get(COMPUTED_FRAME_INTERVAL).map(String::as_str),
        Some("3")
    );
    assert_eq!(splitter.store().persist_calls(), vec![(42, 1)]);
    let stored = splitter.store().medium(42, 1).expect("persisted medium");
    assert_eq!(stored.properties.get(COMPUTED_FRAME_INTERVAL).map(String::as_str), Some("3"));
}

#[test]
fn algorithm_interval_discards_cap() {
    let mut job = job(
        vec![stage("FACE DETECTION", ActionType::Detection, &["FACECV"])],
        0,
        vec![video(1, "30", "100")],
    );
    job.overridden_algorithm_properties
        .insert("FACECV".into(), props(&[(FRAME_INTERVAL, "5")]));
    let splitter = StageSplitter::new(&capped_config(10.0), catalog(), InMemoryStore::new());

    let units = splitter.split_current_stage(&mut job).expect("split");
    assert_eq!(sampling_intervals(&units), vec![5]);
    assert!(splitter.store().persist_calls().is_empty());
    assert!(!job.media[0].properties.contains_key(COMPUTED_FRAME_INTERVAL));
}

#[test]
fn job_transform_override_clears_action_rotation() {
    let mut detection = stage("FACE DETECTION", ActionType::Detection, &["FACECV"]);
    detection.actions[0].properties = props(&[(ROTATION, "90")]);
    let mut job = job(vec![detection], 0, vec![video(1, "30", "10")]);
    job.overridden_job_properties = props(&[(HORIZONTAL_FLIP, "true")]);
    let splitter = StageSplitter::new(&Config::default(), catalog(), InMemoryStore::new());

    let units = splitter.split_current_stage(&mut job).expect("split");
    let names: Vec<_> = units[0]
        .request
        .algorithm_properties
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    assert!(names.contains(&HORIZONTAL_FLIP));
    assert!(names.contains(&"MIN_FACE_SIZE"));
    assert!(!names.contains(&ROTATION));
}

#[test]
fn first_detection_stage_detection() {
    let stages = vec![
        stage("MARKUP", ActionType::Markup, &["M"]),
        stage("OTHER", ActionType::Markup, &["O"]),
        stage("FACE DETECTION", ActionType::Detection, &["FACECV"]),
    ];
    assert!(is_first_detection_stage(&job(stages.clone(), 2, vec![])));
    assert!(is_first_detection_stage(&job(stages.clone(), 0, vec![])));

    let two = vec![
        stage("FACE DETECTION", ActionType::Detection, &["FACECV"]),
        stage("PERSON DETECTION", ActionType::Detection, &["OCV"]),
    ];
    assert!(!is_first_detection_stage(&job(two, 1, vec![])));

    let none = vec![stage("MARKUP", ActionType::Markup, &["M"])];
    assert!(!is_first_detection_stage(&job(none, 0, vec![])));
}

#[test]
fn first_detection_stage_skips_track_lookup() {
    let stages = vec![
        stage("A", ActionType::Markup, &["M"]),
        stage("B", ActionType::Markup, &["M"]),
        stage("FACE DETECTION", ActionType::Detection, &["FACECV"]),
    ];
    let mut job = job(stages, 2, vec![video(1, "30", "10")]);
    let splitter = StageSplitter::new(&Config::default(), catalog(), RecordingStore::default());
    let units = splitter.split_current_stage(&mut job).expect("split");
    assert_eq!(units.len(), 1);
    assert!(splitter.store().track_queries.borrow().is_empty());
}

#[test]
fn later_stage_segments_prior_tracks() {
    let stages = vec![
        stage("FACE DETECTION", ActionType::Detection, &["FACECV"]),
        stage("PERSON DETECTION", ActionType::Detection, &["OCV"]),
    ];
    let mut job = job(stages, 1, vec![video(1, "30", "1000"), video(2, "30", "1000")]);
    let tracks = [
        Track {
            job_id: 42,
            medium_id: 1,
            stage_index: 0,
            action_index: 0,
            start_frame: 100,
            stop_frame: 150,
            start_time_ms: 3333,
            stop_time_ms: 5000,
            track_type: "FACE".into(),
            confidence: 0.8,
            properties: Properties::new(),
        },
    ];
    let splitter = StageSplitter::new(
        &Config::default(),
        catalog(),
        InMemoryStore::with_tracks(tracks),
    );
    let units = splitter.split_current_stage(&mut job).expect("split");

    // Medium 2 had no tracks in stage 0, so nothing to follow up on.
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].request.medium_id, 1);
    assert_eq!(
        units[0].request.range,
        WorkRange::Video {
            start_frame: 100,
            stop_frame: 150,
            frame_interval: 1
        }
    );
}

#[test]
fn failed_media_produce_nothing() {
    let mut broken = video(1, "30", "100");
    broken.failed = true;
    let mut job = job(
        vec![stage("FACE DETECTION", ActionType::Detection, &["FACECV"])],
        0,
        vec![broken],
    );
    let splitter = StageSplitter::new(&capped_config(10.0), catalog(), RecordingStore::default());
    assert!(splitter.split_current_stage(&mut job).expect("split").is_empty());
    assert!(splitter.plan(&job, &job.pipeline.stages[0]).expect("plan").is_empty());
    assert!(splitter.store().persisted.borrow().is_empty());
    assert!(job.media[0].properties.is_empty());
}

#[test]
fn routing_and_order() {
    let mut job = job(
        vec![stage("DETECT", ActionType::Detection, &["FACECV", "OCV"])],
        0,
        vec![video(1, "30", "10"), video(2, "30", "10")],
    );
    let splitter = StageSplitter::new(&Config::default(), catalog(), InMemoryStore::new());
    let units = splitter.split_current_stage(&mut job).expect("split");

    let order: Vec<_> = units
        .iter()
        .map(|u| (u.request.medium_id, u.recipient_queue.as_str()))
        .collect();
    assert_eq!(
        order,
        vec![
            (1, "DETECTION_FACECV_REQUEST"),
            (1, "DETECTION_OCV_REQUEST"),
            (2, "DETECTION_FACECV_REQUEST"),
            (2, "DETECTION_OCV_REQUEST"),
        ]
    );
    assert!(units.iter().all(|u| u.reply_to == "MPF.COMPLETED_DETECTIONS"));
    assert!(units.iter().all(|u| u.priority == 5));
    assert_eq!(units[1].request.action_index, 1);
}

#[test]
fn queue_prefix_is_prepended() {
    let mut cfg = Config::default();
    cfg.routing.queue_prefix = "MPF.".into();
    let mut job = job(
        vec![stage("DETECT", ActionType::Detection, &["FACECV"])],
        0,
        vec![video(1, "30", "10")],
    );
    let splitter = StageSplitter::new(&cfg, catalog(), InMemoryStore::new());
    let units = splitter.split_current_stage(&mut job).expect("split");
    assert_eq!(units[0].recipient_queue, "MPF.DETECTION_FACECV_REQUEST");
}

#[test]
fn persists_once_per_medium_with_last_value() {
    let mut job = job(
        vec![stage("DETECT", ActionType::Detection, &["FACECV", "OCV"])],
        0,
        vec![video(1, "30", "100")],
    );
    job.overridden_algorithm_properties
        .insert("OCV".into(), props(&[("FRAME_RATE_CAP", "15")]));
    let splitter = StageSplitter::new(&capped_config(10.0), catalog(), RecordingStore::default());
    let units = splitter.split_current_stage(&mut job).expect("split");

    assert_eq!(sampling_intervals(&units), vec![3, 2]);
    let persisted = splitter.store().persisted.borrow();
    assert_eq!(persisted.len(), 1);
    assert_eq!(
        persisted[0].properties.get(COMPUTED_FRAME_INTERVAL).map(String::as_str),
        Some("2")
    );
}

#[test]
fn recorded_interval_reaches_later_plain_action() {
    let mut job = job(
        vec![stage("DETECT", ActionType::Detection, &["FACECV", "OCV"])],
        0,
        vec![video(1, "30", "100")],
    );
    job.overridden_algorithm_properties
        .insert("FACECV".into(), props(&[("FRAME_RATE_CAP", "15")]));
    let splitter = StageSplitter::new(&Config::default(), catalog(), RecordingStore::default());

    let plans = splitter.plan(&job, &job.pipeline.stages[0]).expect("plan");
    let computed: Vec<_> = plans.iter().map(|p| p.computed_frame_interval).collect();
    assert_eq!(computed, vec![Some(2), None]);
    let planned: Vec<_> = plans.iter().map(|p| p.segmenting_plan.sampling_interval).collect();
    assert_eq!(planned, vec![2, 2]);

    let units = splitter.split_current_stage(&mut job).expect("split");
    assert_eq!(sampling_intervals(&units), vec![2, 2]);
    let persisted = splitter.store().persisted.borrow();
    assert_eq!(persisted.len(), 1);
    assert_eq!(
        persisted[0].properties.get(COMPUTED_FRAME_INTERVAL).map(String::as_str),
        Some("2")
    );
}

#[test]
fn explicit_action_interval_keeps_earlier_recorded_value() {
    let mut job = job(
        vec![stage("DETECT", ActionType::Detection, &["FACECV", "OCV"])],
        0,
        vec![video(1, "30", "100")],
    );
    job.overridden_algorithm_properties
        .insert("OCV".into(), props(&[(FRAME_INTERVAL, "5")]));
    let splitter = StageSplitter::new(&capped_config(10.0), catalog(), InMemoryStore::new());
    let units = splitter.split_current_stage(&mut job).expect("split");

    // OCV computes nothing of its own, so the value FACECV recorded still applies.
    assert_eq!(sampling_intervals(&units), vec![3, 3]);
    assert_eq!(
        job.media[0].properties.get(COMPUTED_FRAME_INTERVAL).map(String::as_str),
        Some("3")
    );
}

#[test]
fn interval_recorded_in_earlier_stage_carries_over() {
    let stages = vec![
        stage("FACE DETECTION", ActionType::Detection, &["FACECV"]),
        stage("FACE MARKUP", ActionType::Markup, &["MARKUPCV"]),
    ];
    let mut medium = video(1, "30", "100");
    medium.add_property(COMPUTED_FRAME_INTERVAL, "4");
    let mut job = job(stages, 1, vec![medium]);
    let splitter = StageSplitter::new(&Config::default(), catalog(), RecordingStore::default());

    let plans = splitter.plan(&job, &job.pipeline.stages[1]).expect("plan");
    assert_eq!(plans[0].computed_frame_interval, None);
    assert_eq!(plans[0].segmenting_plan.sampling_interval, 4);

    splitter.split_current_stage(&mut job).expect("split");
    assert!(splitter.store().persisted.borrow().is_empty());
}

#[test]
fn missing_algorithm_definition_is_not_fatal() {
    let mut job = job(
        vec![stage("DETECT", ActionType::Detection, &["UNKNOWN"])],
        0,
        vec![video(1, "30", "10")],
    );
    let splitter = StageSplitter::new(&Config::default(), catalog(), InMemoryStore::new());
    let units = splitter.split_current_stage(&mut job).expect("split");
    assert_eq!(units.len(), 1);
    assert!(units[0].request.algorithm_properties.is_empty());
}

#[test]
fn contract_violations_surface() {
    let splitter = StageSplitter::new(&Config::default(), catalog(), InMemoryStore::new());

    let mut empty = job(vec![], 0, vec![]);
    let err = splitter.split_current_stage(&mut empty).expect_err("no stages");
    assert_eq!(err.downcast_ref::<SplitError>(), Some(&SplitError::NoStages { job_id: 42 }));

    let mut past_end = job(vec![stage("DETECT", ActionType::Detection, &["FACECV"])], 3, vec![]);
    let err = splitter.split_current_stage(&mut past_end).expect_err("out of range");
    assert!(matches!(
        err.downcast_ref::<SplitError>(),
        Some(SplitError::StageOutOfRange { current: 3, stages: 1, .. })
    ));

    let mut nameless = job(vec![stage("DETECT", ActionType::Detection, &[""])], 0, vec![]);
    let err = splitter.split_current_stage(&mut nameless).expect_err("missing algorithm");
    assert!(matches!(
        err.downcast_ref::<SplitError>(),
        Some(SplitError::MissingAlgorithm { action_index: 0, .. })
    ));
}

#[test]
fn store_failures_propagate() {
    let stages = vec![
        stage("FACE DETECTION", ActionType::Detection, &["FACECV"]),
        stage("PERSON DETECTION", ActionType::Detection, &["OCV"]),
    ];
    let mut job = job(stages, 1, vec![video(1, "30", "10")]);
    let splitter = StageSplitter::new(&Config::default(), catalog(), BrokenStore);
    let err = splitter.split_current_stage(&mut job).expect_err("store down");
    assert!(format!("{err:#}").contains("connection refused"));
}
