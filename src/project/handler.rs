// src/project/handler.rs

//! Task handlers.
//!
//! Every handler implements [`Handler`]. The adapter constructors cover the
//! common shapes so user code rarely implements the trait by hand:
//!
//! | shape                                   | constructor          |
//! |-----------------------------------------|----------------------|
//! | `Fn()`                                  | [`func`]             |
//! | `Fn() -> anyhow::Result<()>`            | [`try_func`]         |
//! | `Fn(Context) -> impl Future<()>`        | [`with_context`]     |
//! | `Fn(Context) -> impl Future<Result<()>>`| [`try_with_context`] |

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;

use crate::exec::{RunOptions, Supervisor};
use crate::watch::FileEvent;

pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Work performed when a task runs.
pub trait Handler: Send + Sync {
    fn handle(&self, ctx: Context) -> HandlerFuture<'_>;
}

/// Data passed to a handler for one run.
#[derive(Clone)]
pub struct Context {
    /// Qualified log name, e.g. `build>clean`.
    pub task: String,
    /// The file change that triggered this run, in watch mode.
    pub event: Option<FileEvent>,
    /// The task's own watch patterns.
    pub watch_globs: Vec<String>,
    /// Arguments following `--` on the command line.
    pub args: Vec<String>,
    supervisor: Arc<Supervisor>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("task", &self.task)
            .field("event", &self.event)
            .field("watch_globs", &self.watch_globs)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

impl Context {
    pub fn new(task: impl Into<String>, supervisor: Arc<Supervisor>) -> Self {
        Self {
            task: task.into(),
            event: None,
            watch_globs: Vec::new(),
            args: Vec::new(),
            supervisor,
        }
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// The changed file, unless it was deleted; otherwise the task's watch
    /// patterns.
    pub fn any_file(&self) -> Vec<String> {
        match &self.event {
            Some(event) if !event.is_deleted() => {
                vec![event.path.to_string_lossy().into_owned()]
            }
            _ => self.watch_globs.clone(),
        }
    }

    pub async fn run(&self, command: &str) -> Result<()> {
        self.supervisor.run(command, &RunOptions::default()).await
    }

    pub async fn bash(&self, script: &str) -> Result<()> {
        self.supervisor.bash(script, &RunOptions::default()).await
    }

    pub async fn start(&self, command: &str) -> Result<()> {
        self.supervisor.start(command, &RunOptions::default()).await
    }
}

struct Func<F>(F);

impl<F> Handler for Func<F>
where
    F: Fn() + Send + Sync,
{
    fn handle(&self, _ctx: Context) -> HandlerFuture<'_> {
        (self.0)();
        Box::pin(async { Ok(()) })
    }
}

struct TryFunc<F>(F);

impl<F> Handler for TryFunc<F>
where
    F: Fn() -> Result<()> + Send + Sync,
{
    fn handle(&self, _ctx: Context) -> HandlerFuture<'_> {
        let result = (self.0)();
        Box::pin(async move { result })
    }
}

struct WithContext<F>(F);

impl<F, Fut> Handler for WithContext<F>
where
    F: Fn(Context) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn handle(&self, ctx: Context) -> HandlerFuture<'_> {
        let fut = (self.0)(ctx);
        Box::pin(async move {
            fut.await;
            Ok(())
        })
    }
}

struct TryWithContext<F>(F);

impl<F, Fut> Handler for TryWithContext<F>
where
    F: Fn(Context) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    fn handle(&self, ctx: Context) -> HandlerFuture<'_> {
        Box::pin((self.0)(ctx))
    }
}

pub fn func<F>(f: F) -> Arc<dyn Handler>
where
    F: Fn() + Send + Sync + 'static,
{
    Arc::new(Func(f))
}

pub fn try_func<F>(f: F) -> Arc<dyn Handler>
where
    F: Fn() -> Result<()> + Send + Sync + 'static,
{
    Arc::new(TryFunc(f))
}

pub fn with_context<F, Fut>(f: F) -> Arc<dyn Handler>
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(WithContext(f))
}

pub fn try_with_context<F, Fut>(f: F) -> Arc<dyn Handler>
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(TryWithContext(f))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::SystemTime;

    use crate::watch::FileEventKind;

    use super::*;

    fn ctx() -> Context {
        Context::new("t", Arc::new(Supervisor::default()))
    }

    #[tokio::test]
    async fn every_shape_is_invocable() {
        let hits = Arc::new(AtomicUsize::new(0));

        let h1 = {
            let hits = Arc::clone(&hits);
            func(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };
        let h2 = try_func(|| anyhow::bail!("nope"));
        let h3 = {
            let hits = Arc::clone(&hits);
            with_context(move |ctx: Context| {
                let hits = Arc::clone(&hits);
                async move {
                    assert_eq!(ctx.task, "t");
                    hits.fetch_add(1, Ordering::SeqCst);
                }
            })
        };
        let h4 = try_with_context(|_ctx: Context| async { Ok(()) });

        h1.handle(ctx()).await.unwrap();
        assert_eq!(h2.handle(ctx()).await.unwrap_err().to_string(), "nope");
        h3.handle(ctx()).await.unwrap();
        h4.handle(ctx()).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn any_file_prefers_the_changed_file() {
        let mut c = ctx();
        c.watch_globs = vec!["src/**/*.rs".into()];
        assert_eq!(c.any_file(), vec!["src/**/*.rs"]);

        c.event = Some(FileEvent::new(
            PathBuf::from("/p/src/a.rs"),
            FileEventKind::Modified,
            SystemTime::now(),
        ));
        assert_eq!(c.any_file(), vec!["/p/src/a.rs"]);

        c.event = Some(FileEvent::new(
            PathBuf::from("/p/src/a.rs"),
            FileEventKind::Deleted,
            SystemTime::now(),
        ));
        assert_eq!(c.any_file(), vec!["src/**/*.rs"]);
    }
}
