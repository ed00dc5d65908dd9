use std::fmt;
use std::fmt::{Display, Formatter};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use edmcore::data::event::{EventHeader, EventStore};
use edmcore::data::reco::ReconstructedParticle;
use crate::cache::{CacheLayout, CollectionCache};
use crate::config::PfaConfig;
use crate::engine::PatternRecognition;
use crate::error::{PfaError, Result};
use crate::summary::extract::{extract_summary, EventSummary};
use crate::summary::io::{SharedAccumulator, SummaryAccumulator};
use crate::truth::association::{flatten, ParticleTruthAssociation, RecoMcLink, TruthAssociationBuilder};

/// Everything one event hands to persistence, labelled with its output collection names.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EventProducts {
    pub header: EventHeader,
    pub pfo_collection: String,
    pub cluster_collection: String,
    pub start_vertex_collection: String,
    pub association_collection: String,
    pub particles: Vec<ReconstructedParticle>,
    pub associations: Vec<ParticleTruthAssociation>,
    pub links: Vec<RecoMcLink>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JobReport {
    pub seen: usize,
    pub processed: usize,
    pub skipped_by_config: usize,
    pub skipped_not_found: usize,
    pub aborted: usize,
    pub summaries: usize,
}

impl JobReport {
    fn count(&mut self, outcome: &Outcome) {
        self.seen += 1;
        match outcome {
            Outcome::Processed(_) => self.processed += 1,
            Outcome::SkippedByConfig => self.skipped_by_config += 1,
            Outcome::Failed(e) if e.is_recoverable() => self.skipped_not_found += 1,
            Outcome::Failed(_) => self.aborted += 1,
        }
    }
}

impl Display for JobReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "events seen: {}, processed: {}, skipped by config: {}, skipped for missing input: {}, aborted: {}, summaries: {}",
            self.seen, self.processed, self.skipped_by_config, self.skipped_not_found, self.aborted, self.summaries
        )
    }
}

enum Outcome {
    Processed(Box<EventProducts>),
    SkippedByConfig,
    Failed(PfaError),
}

fn settle(result: Result<(EventProducts, EventSummary)>, header: &EventHeader) -> (Outcome, Option<EventSummary>) {
    match result {
        Ok((products, summary)) => {
            debug!("{}: {} particles, {} truth links", header, products.particles.len(), products.links.len());
            (Outcome::Processed(Box::new(products)), Some(summary))
        }
        Err(e) if e.is_recoverable() => {
            warn!("{}: skipped, {}", header, e);
            (Outcome::Failed(e), None)
        }
        Err(e) => {
            warn!("{}: aborted, {}", header, e);
            (Outcome::Failed(e), None)
        }
    }
}

/// Runs one event through cache, engine, association and summary extraction.
///
/// Cache and builder are created per call and dropped before returning.
fn run_event<E: PatternRecognition>(
    config: &PfaConfig,
    layout: &CacheLayout,
    engine: &mut E,
    event: &EventStore,
) -> Result<(EventProducts, EventSummary)> {
    let mut cache = CollectionCache::new(layout.clone());
    match cache.update(event) {
        Ok(_) => {}
        Err(e) if e.is_recoverable() && !config.skip_incomplete_events => {
            debug!("{}: continuing with incomplete input, {}", event.header, e);
        }
        Err(e) => return Err(e),
    }

    engine.reset();
    engine.build_inputs(&cache)?;
    let particles = engine.extract_particles()?;

    let builder = TruthAssociationBuilder::from_cache(&cache, config.calo_weight);
    let associations = builder.associate(&particles, &cache)?;

    let summary = extract_summary(&cache, &particles, &associations);
    let links = flatten(&associations);

    let products = EventProducts {
        header: event.header,
        pfo_collection: config.output.pfo_collection.clone(),
        cluster_collection: config.output.cluster_collection.clone(),
        start_vertex_collection: config.output.start_vertex_collection.clone(),
        association_collection: config.output.association_collection.clone(),
        particles,
        associations,
        links,
    };
    Ok((products, summary))
}

/// Job-level context: owns the engine, the summary accumulator and the counters.
pub struct PfaJob<E: PatternRecognition> {
    config: PfaConfig,
    layout: CacheLayout,
    engine: E,
    summaries: Option<SummaryAccumulator>,
    report: JobReport,
}

impl<E: PatternRecognition> PfaJob<E> {
    pub fn new(config: PfaConfig, engine: E) -> Result<Self> {
        config.validate()?;
        let layout = CacheLayout::from_config(&config);
        let summaries = config.output.summary_path.as_ref().map(|_| SummaryAccumulator::new());
        info!("pfa job with engine {}, skipping first {} events", engine.name(), config.n_events_to_skip);
        Ok(PfaJob { config, layout, engine, summaries, report: JobReport::default() })
    }

    /// Keeps summaries in memory even without a flush destination.
    pub fn with_summaries(mut self) -> Self {
        if self.summaries.is_none() {
            self.summaries = Some(SummaryAccumulator::new());
        }
        self
    }

    pub fn config(&self) -> &PfaConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn report(&self) -> JobReport {
        self.report
    }

    pub fn summaries(&self) -> Option<&SummaryAccumulator> {
        self.summaries.as_ref()
    }

    /// Processes one event.
    ///
    /// `Ok(None)` for events covered by `n_events_to_skip`. Missing mandatory input
    /// gives `PfaError::NotFound` unless incomplete events are allowed; other per-event
    /// failures come back as they are. The job stays usable after any error.
    pub fn process_event(&mut self, event: &EventStore) -> Result<Option<EventProducts>> {
        let (outcome, summary) = if self.report.seen < self.config.n_events_to_skip {
            debug!("{}: skipped by configuration", event.header);
            (Outcome::SkippedByConfig, None)
        } else {
            settle(run_event(&self.config, &self.layout, &mut self.engine, event), &event.header)
        };
        self.report.count(&outcome);

        if let (Some(acc), Some(summary)) = (self.summaries.as_mut(), summary) {
            acc.record(summary);
            self.report.summaries += 1;
        }

        match outcome {
            Outcome::Processed(products) => Ok(Some(*products)),
            Outcome::SkippedByConfig => Ok(None),
            Outcome::Failed(e) => Err(e),
        }
    }

    /// Runs every event, continuing past skipped and aborted ones.
    pub fn run<'a>(&mut self, events: impl IntoIterator<Item = &'a EventStore>) -> Vec<EventProducts> {
        events.into_iter()
            .filter_map(|event| self.process_event(event).ok().flatten())
            .collect()
    }

    /// Flushes the summary accumulator if a path is configured, then returns the counts.
    pub fn finalize(self) -> Result<JobReport> {
        if let (Some(acc), Some(path)) = (&self.summaries, &self.config.output.summary_path) {
            acc.flush(path)?;
            info!("wrote {} event summaries ({} particle rows) to {}", acc.len(), acc.row_count(), path);
        }
        info!("{}", self.report);
        Ok(self.report)
    }
}

/// Processes independent events concurrently.
///
/// Every event gets its own cache, builder and engine from `make_engine`; only the
/// summary accumulator is shared. Products keep input order, summaries are sorted by
/// run and event number.
pub fn process_parallel<E, F>(
    config: &PfaConfig,
    events: &[EventStore],
    make_engine: F,
) -> Result<(Vec<EventProducts>, SummaryAccumulator, JobReport)>
where
    E: PatternRecognition,
    F: Fn() -> E + Sync,
{
    config.validate()?;
    let layout = CacheLayout::from_config(config);
    let shared = SharedAccumulator::new();

    let outcomes: Vec<Outcome> = events.par_iter().enumerate().map(|(i, event)| {
        if i < config.n_events_to_skip {
            return Outcome::SkippedByConfig;
        }
        let mut engine = make_engine();
        let (outcome, summary) = settle(run_event(config, &layout, &mut engine, event), &event.header);
        if let Some(summary) = summary {
            shared.record(summary);
        }
        outcome
    }).collect();

    let mut report = JobReport::default();
    let mut products = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        report.count(&outcome);
        if let Outcome::Processed(p) = outcome {
            products.push(*p);
        }
    }

    let mut summaries = shared.into_inner();
    summaries.sort_by_event();
    report.summaries = summaries.len();

    if let Some(path) = &config.output.summary_path {
        summaries.flush(path)?;
        info!("wrote {} event summaries ({} particle rows) to {}", summaries.len(), summaries.row_count(), path);
    }
    info!("{}", report);
    Ok((products, summaries, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use edmcore::data::event::Collection;
    use edmcore::data::hits::{CalorimeterHit, Track};
    use edmcore::data::ids::ObjectId;
    use edmcore::data::mc_particle::McParticle;
    use edmcore::data::relation::{CaloRelationWeight, CaloTruthRelation};
    use crate::engine::FixedOutputEngine;

    fn event(number: u32, with_tracks: bool) -> EventStore {
        let mut event = EventStore::new(EventHeader { run: 1, event: number });
        event.insert_with_id("MCParticle", 1, Collection::McParticles(vec![
            McParticle::new(ObjectId::new(1, 0), 22, 0.0, 0.0, [0.0, 0.0, 1.0]),
        ]));
        event.insert_with_id("ECALBarrel", 2, Collection::CaloHits(vec![
            CalorimeterHit::new(ObjectId::new(2, 0), 0, 1.0, [0.0, 0.0, 2400.0]),
        ]));
        if with_tracks {
            event.insert_with_id("MarlinTrkTracks", 3, Collection::Tracks(vec![
                Track::new(ObjectId::new(3, 0), [1.0, 0.0, 0.0], 1.0),
            ]));
        }
        event.insert_with_id("RelationCaloHit", 4, Collection::CaloRelations(vec![
            CaloTruthRelation::new(ObjectId::new(2, 0), ObjectId::new(1, 0), CaloRelationWeight::new(1.0, 1.0)),
        ]));
        event
    }

    fn photon_engine() -> FixedOutputEngine {
        FixedOutputEngine::new(vec![ReconstructedParticle::new(22).with_calo_hit(ObjectId::new(2, 0))])
    }

    #[test]
    fn test_process_event_produces_associations() {
        let mut job = PfaJob::new(PfaConfig::default(), photon_engine()).unwrap().with_summaries();
        let products = job.process_event(&event(0, true)).unwrap().unwrap();

        assert_eq!(products.pfo_collection, "PandoraPFOs");
        assert_eq!(products.cluster_collection, "PandoraClusters");
        assert_eq!(products.start_vertex_collection, "PandoraPFANewStartVertices");
        assert_eq!(products.association_collection, "pfoMCRecoParticleAssociation");
        assert_eq!(products.associations.len(), 1);
        assert_eq!(products.links.len(), 1);
        assert_eq!(products.links[0].sim, ObjectId::new(1, 0));
        assert_eq!(job.summaries().map(|s| s.len()), Some(1));
        assert_eq!(job.engine().inputs_built, 1);
    }

    #[test]
    fn test_missing_mandatory_skips_event() {
        let mut job = PfaJob::new(PfaConfig::default(), photon_engine()).unwrap();
        let err = job.process_event(&event(0, false)).unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(job.report().skipped_not_found, 1);
        assert_eq!(job.engine().inputs_built, 0);

        // next event is unaffected
        assert!(job.process_event(&event(1, true)).unwrap().is_some());
    }

    #[test]
    fn test_incomplete_events_can_be_processed() {
        let mut config = PfaConfig::default();
        config.skip_incomplete_events = false;
        let mut job = PfaJob::new(config, photon_engine()).unwrap();
        assert!(job.process_event(&event(0, false)).unwrap().is_some());
        assert_eq!(job.report().processed, 1);
    }

    #[test]
    fn test_fatal_event_does_not_stop_job() {
        let engine = FixedOutputEngine::new(vec![
            ReconstructedParticle::new(22).with_calo_hit(ObjectId::new(2, 7)),
        ]);
        let mut job = PfaJob::new(PfaConfig::default(), engine).unwrap();
        let events = vec![event(0, true), event(1, true)];
        let products = job.run(&events);

        assert!(products.is_empty());
        let report = job.finalize().unwrap();
        assert_eq!(report.aborted, 2);
        assert_eq!(report.seen, 2);
    }

    #[test]
    fn test_output_labels_follow_config() {
        let mut config = PfaConfig::default();
        config.output.cluster_collection = "RecoClusters".to_string();
        config.output.start_vertex_collection = "RecoStartVertices".to_string();
        let mut job = PfaJob::new(config, photon_engine()).unwrap();
        let products = job.process_event(&event(0, true)).unwrap().unwrap();
        assert_eq!(products.cluster_collection, "RecoClusters");
        assert_eq!(products.start_vertex_collection, "RecoStartVertices");
    }

    #[test]
    fn test_shared_collection_id_aborts_event() {
        let mut bad = event(0, true);
        bad.insert_with_id("HCALBarrel", 2, Collection::CaloHits(Vec::new()));

        let mut job = PfaJob::new(PfaConfig::default(), photon_engine()).unwrap();
        let err = job.process_event(&bad).unwrap_err();
        assert!(matches!(err, PfaError::DuplicateCollectionId { collection_id: 2, .. }));
        assert_eq!(job.report().aborted, 1);
        assert_eq!(job.engine().inputs_built, 0);

        assert!(job.process_event(&event(1, true)).unwrap().is_some());
    }

    #[test]
    fn test_engine_failure_aborts_event() {
        let mut job = PfaJob::new(PfaConfig::default(), FixedOutputEngine::failing("no geometry")).unwrap();
        let err = job.process_event(&event(0, true)).unwrap_err();
        assert!(err.is_event_fatal());
        assert_eq!(job.report().aborted, 1);
    }

    #[test]
    fn test_events_to_skip() {
        let mut config = PfaConfig::default();
        config.n_events_to_skip = 2;
        let mut job = PfaJob::new(config, photon_engine()).unwrap();
        let events: Vec<EventStore> = (0..5).map(|i| event(i, true)).collect();
        let products = job.run(&events);

        assert_eq!(products.len(), 3);
        assert_eq!(products[0].header.event, 2);
        let report = job.report();
        assert_eq!(report.skipped_by_config, 2);
        assert_eq!(report.processed, 3);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = PfaConfig::default();
        config.output.pfo_collection = String::new();
        assert!(matches!(PfaJob::new(config, photon_engine()), Err(PfaError::Config(_))));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let events: Vec<EventStore> = (0..8).map(|i| event(i, i % 3 != 0)).collect();

        let mut job = PfaJob::new(PfaConfig::default(), photon_engine()).unwrap().with_summaries();
        let sequential = job.run(&events);
        let seq_report = job.report();

        let (parallel, summaries, report) = process_parallel(&PfaConfig::default(), &events, photon_engine).unwrap();
        assert_eq!(parallel, sequential);
        assert_eq!(report, seq_report);
        assert_eq!(summaries.events(), job.summaries().unwrap().events());
    }
}
