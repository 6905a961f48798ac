//! Bounded fan-out over a scene list.
//!
//! Launches one job per scene with at most K concurrently in flight and
//! returns the scenes in their original order once every job settles. A
//! failing job degrades to its input scene — the artifact is simply missing —
//! and the failure is surfaced in the stage report rather than swallowed.

use crate::error::Error;
use crate::models::Scene;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::warn;

/// The settled result of one scene job.
#[derive(Debug)]
pub struct JobOutcome {
    pub scene: Scene,
    pub error: Option<Error>,
}

impl JobOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregated result of one fan-out stage.
#[derive(Debug)]
pub struct StageReport {
    pub outcomes: Vec<JobOutcome>,
}

impl StageReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Scenes in original order, updated where their job succeeded.
    pub fn into_scenes(self) -> Vec<Scene> {
        self.outcomes.into_iter().map(|o| o.scene).collect()
    }
}

/// Progress callback: (completed, total), called once per job completion in
/// completion order — which is independent of submission order.
pub type ProgressFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Run `job` over every scene with at most `limit` in flight.
///
/// Each job receives the scene by value and returns the (possibly updated)
/// scene or an error. On error the input scene is carried through unchanged;
/// the stage itself always completes.
pub async fn fan_out<J, F>(
    scenes: Vec<Scene>,
    limit: usize,
    job: J,
    on_progress: Option<ProgressFn>,
) -> StageReport
where
    J: Fn(Scene) -> F + Send + Sync + 'static,
    F: Future<Output = Result<Scene, Error>> + Send + 'static,
{
    let total = scenes.len();
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let completed = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let job = Arc::new(job);

    let mut handles = Vec::with_capacity(total);

    for scene in scenes {
        let semaphore = Arc::clone(&semaphore);
        let completed = Arc::clone(&completed);
        let on_progress = on_progress.clone();
        let job = Arc::clone(&job);

        handles.push(tokio::spawn(async move {
            // Semaphore is never closed while jobs run.
            let _permit = semaphore.acquire_owned().await.expect("semaphore closed");

            let order = scene.order;
            let fallback = scene.clone();
            let outcome = match (*job)(scene).await {
                Ok(updated) => JobOutcome {
                    scene: updated,
                    error: None,
                },
                Err(e) => {
                    warn!("Scene {order} job failed: {e}");
                    JobOutcome {
                        scene: fallback,
                        error: Some(e),
                    }
                }
            };

            let done = completed.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
            if let Some(cb) = on_progress {
                (*cb)(done, total);
            }

            outcome
        }));
    }

    let mut outcomes = Vec::with_capacity(total);
    for settled in futures::future::join_all(handles).await {
        // Jobs never panic by contract; a panicking job still degrades the
        // whole stage rather than losing results.
        match settled {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => warn!("Scene job panicked: {e}"),
        }
    }

    // Completion order is arbitrary; hand results back in narrative order.
    outcomes.sort_by_key(|o| o.scene.order);

    StageReport { outcomes }
}
