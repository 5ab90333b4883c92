use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{error, info, info_span, Instrument};

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Job panicked: {0}")]
    Panicked(String),
    #[error("Job was cancelled")]
    Cancelled,
    #[error("Semaphore error: {0}")]
    Semaphore(String),
}

/// Runs independent per-package jobs with bounded concurrency.
///
/// Each job runs in its own task inside a `package` span, so a panic in one
/// job is reported for that package only and log lines stay attributable.
pub struct ProvenanceExecutor {
    semaphore: Arc<Semaphore>,
}

impl ProvenanceExecutor {
    pub fn new(concurrency_limit: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency_limit.max(1))),
        }
    }

    /// Runs every job and returns the outcomes in input order.
    pub async fn run_all<T, Fut>(
        &self,
        jobs: Vec<(String, Fut)>,
    ) -> Vec<(String, Result<T, JobError>)>
    where
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let mut handles = Vec::with_capacity(jobs.len());

        for (name, job) in jobs {
            let semaphore = Arc::clone(&self.semaphore);
            let span = info_span!("package", name = %name);

            let handle = tokio::spawn(
                async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| JobError::Semaphore(e.to_string()))?;

                    info!("Starting package");
                    let output = job.await;
                    info!("Finished package");
                    Ok::<T, JobError>(output)
                }
                .instrument(span),
            );
            handles.push((name, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) if e.is_panic() => {
                    error!(package = %name, "Package job panicked");
                    Err(JobError::Panicked(e.to_string()))
                }
                Err(_) => Err(JobError::Cancelled),
            };
            results.push((name, outcome));
        }
        results
    }
}
