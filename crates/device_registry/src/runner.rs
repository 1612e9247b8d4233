//! Runs the service processes until one fails or a shutdown signal arrives,
//! then runs every closer under a shared timeout.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

type BoxFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

pub type AppProcess = Box<dyn FnOnce(CancellationToken) -> BoxFuture + Send>;

pub type Closer = Box<dyn FnOnce() -> BoxFuture + Send>;

pub struct Runner {
    processes: Vec<(String, AppProcess)>,
    closers: Vec<Closer>,
    closer_timeout: Duration,
    cancellation_token: CancellationToken,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    pub fn new() -> Self {
        Self {
            processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(10),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Add a process. An error from any process cancels the others.
    pub fn with_named_process<F, Fut>(mut self, name: impl Into<String>, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.processes
            .push((name.into(), Box::new(|token| Box::pin(process(token)))));
        self
    }

    /// Add a closer. Closers run after every process has stopped, whatever the outcome.
    pub fn with_closer<F, Fut>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.closers.push(Box::new(|| Box::pin(closer())));
        self
    }

    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Run to completion and return the first process error, if any.
    pub async fn run(self) -> anyhow::Result<()> {
        let token = self.cancellation_token;
        spawn_signal_handlers(token.clone());

        let mut join_set = JoinSet::new();
        for (name, process) in self.processes {
            let process_token = token.clone();
            join_set.spawn(async move { (name, process(process_token).await) });
        }

        let mut first_error = None;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((name, Ok(()))) => {
                    debug!(process = %name, "process completed");
                }
                Ok((name, Err(err))) => {
                    if !token.is_cancelled() {
                        error!(process = %name, "process failed: {:#}", err);
                        first_error = Some(err);
                    }
                }
                Err(err) => {
                    error!("process panicked: {}", err);
                    if first_error.is_none() {
                        first_error = Some(anyhow::anyhow!("process panicked: {}", err));
                    }
                }
            }

            // Any process ending means the service is going down
            token.cancel();
        }

        run_closers(self.closers, self.closer_timeout).await;

        match first_error {
            Some(err) => Err(err),
            None => {
                info!("Service stopped");
                Ok(())
            }
        }
    }
}

fn spawn_signal_handlers(token: CancellationToken) {
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal");
                ctrl_c_token.cancel();
            }
            Err(err) => error!("Error setting up signal handler: {}", err),
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received SIGTERM signal");
                token.cancel();
            }
            Err(err) => error!("Error setting up SIGTERM handler: {}", err),
        }
    });
}

async fn run_closers(closers: Vec<Closer>, timeout: Duration) {
    if closers.is_empty() {
        return;
    }
    info!("Running closers with timeout of {:?}", timeout);

    let mut closer_set = JoinSet::new();
    for closer in closers {
        closer_set.spawn(closer());
    }

    let drain = async {
        while let Some(result) = closer_set.join_next().await {
            match result {
                Ok(Ok(())) => debug!("Closer completed successfully"),
                Ok(Err(err)) => error!("Closer error: {:#}", err),
                Err(err) => error!("Closer panicked: {}", err),
            }
        }
    };

    if tokio::time::timeout(timeout, drain).await.is_err() {
        error!("Closers timed out after {:?}", timeout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_cancel_stops_processes_and_runs_closers() {
        let closed = Arc::new(AtomicBool::new(false));
        let closed_flag = closed.clone();
        let token = CancellationToken::new();

        let runner = Runner::new()
            .with_named_process("waiter", |ctx| async move {
                ctx.cancelled().await;
                Ok(())
            })
            .with_closer(move || async move {
                closed_flag.store(true, Ordering::SeqCst);
                Ok(())
            })
            .with_cancellation_token(token.clone());

        let handle = tokio::spawn(runner.run());
        token.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_failing_process_cancels_the_rest() {
        let runner = Runner::new()
            .with_named_process("waiter", |ctx| async move {
                ctx.cancelled().await;
                Ok(())
            })
            .with_named_process("failing", |_| async move {
                Err(anyhow::anyhow!("bind failed"))
            });

        let result = tokio::time::timeout(Duration::from_secs(5), runner.run())
            .await
            .unwrap();
        assert_eq!(result.unwrap_err().to_string(), "bind failed");
    }

    #[tokio::test]
    async fn test_slow_closer_times_out() {
        let runner = Runner::new()
            .with_named_process("done", |_| async move { Ok(()) })
            .with_closer(|| async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .with_closer_timeout(Duration::from_millis(50));

        let result = tokio::time::timeout(Duration::from_secs(5), runner.run())
            .await
            .unwrap();
        assert!(result.is_ok());
    }
}
