// THEORY:
// Every valid object's series is independent of every other object's, so the
// per-object analysis can run concurrently. `ParallelAnalyzer` fans the objects
// out to the tokio blocking pool (measurement is CPU-bound and synchronous),
// bounded by a semaphore sized to the machine, and then restores object-id order
// so the report is identical to the sequential analyzer's. Mosaic and export run
// only after every object has finished, exactly as in the sequential pipeline.

use crate::core_modules::analyzer::{
    AnalysisConfig, AnalysisReport, ObjectOutcome, SkippedObject, TimeSeriesAnalyzer,
};
use crate::core_modules::frame_source::FrameSource;
use crate::core_modules::particle_analyzer::CandidateObject;
use crate::error::{EclosionError, Result};
use crate::pipeline::{EclosionPipeline, Report};
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::Semaphore;

pub struct ParallelAnalyzer {
    analyzer: Arc<TimeSeriesAnalyzer>,
    workers: usize,
}

impl ParallelAnalyzer {
    /// One worker per logical CPU.
    pub fn new(config: AnalysisConfig) -> Self {
        Self::with_workers(config, num_cpus::get())
    }

    pub fn with_workers(config: AnalysisConfig, workers: usize) -> Self {
        Self {
            analyzer: Arc::new(TimeSeriesAnalyzer::new(config)),
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub async fn analyze<S>(
        &self,
        source: Arc<S>,
        candidates: Arc<Vec<CandidateObject>>,
        valid_ids: &[usize],
    ) -> Result<AnalysisReport>
    where
        S: FrameSource + Send + Sync + 'static,
    {
        debug!("analyzing {} objects on {} workers", valid_ids.len(), self.workers);
        self.analyzer.check_window(source.as_ref());
        let semaphore = Arc::new(Semaphore::new(self.workers));

        let tasks = valid_ids.iter().map(|&id| {
            let analyzer = Arc::clone(&self.analyzer);
            let source = Arc::clone(&source);
            let candidates = Arc::clone(&candidates);
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| EclosionError::Worker(e.to_string()))?;
                let outcome = tokio::task::spawn_blocking(move || {
                    match candidates.iter().find(|c| c.id == id) {
                        Some(object) => analyzer.analyze_object(source.as_ref(), object),
                        None => Ok(ObjectOutcome::Skipped(SkippedObject {
                            object_id: id,
                            reason: "unknown object id".into(),
                        })),
                    }
                })
                .await
                .map_err(|e| EclosionError::Worker(e.to_string()))??;
                Ok::<_, EclosionError>((id, outcome))
            }
        });

        let mut outcomes = futures::future::join_all(tasks)
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?;
        outcomes.sort_by_key(|(id, _)| *id);

        for (_, outcome) in &outcomes {
            if let ObjectOutcome::Skipped(skipped) = outcome {
                warn!("object {} skipped: {}", skipped.object_id, skipped.reason);
            }
        }
        Ok(AnalysisReport::from_outcomes(
            outcomes.into_iter().map(|(_, outcome)| outcome),
        ))
    }
}

impl EclosionPipeline {
    /// Same as [`EclosionPipeline::run`], with the per-object analysis spread over
    /// `workers` blocking tasks.
    pub async fn run_parallel<S>(&self, source: Arc<S>, workers: usize) -> Result<Report>
    where
        S: FrameSource + Send + Sync + 'static,
    {
        info!("Start processing...");
        let detection = match self.detect(source.as_ref()) {
            Ok(detection) => detection,
            Err(EclosionError::NoObjectsFound) => {
                warn!("No objects found on frame {}", self.config().reference_frame);
                return Ok(Report::NoObjectsFound);
            }
            Err(err) => return Err(err),
        };
        if detection.valid_ids.is_empty() {
            warn!("No candidate object lies within the pupa size range");
            return Ok(Report::NoObjectsFound);
        }

        let analyzer = ParallelAnalyzer::with_workers(self.config().analysis(), workers);
        let candidates = Arc::new(detection.candidates.clone());
        let analysis = analyzer
            .analyze(source, candidates, &detection.valid_ids)
            .await?;
        Ok(Self::report(detection, analysis))
    }
}
