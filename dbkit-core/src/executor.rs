//! Executor wrapper.
//!
//! Every top-level operation runs through [`db_executor`], which gives it a
//! lazily resolved project context and turns its result into [`Outcome`]s:
//! errors are logged once, here, and become `{success: false}`. Operations
//! may produce a single outcome or a stream of progress outcomes; both
//! shapes get the same treatment, including stopping the spinner on every
//! exit path.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{self, BoxStream, StreamExt};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::driver::DriverRegistry;
use crate::error::{DbkitError, DbkitResult};
use crate::generator::{FileEmitter, TemplateEmitter};
use crate::logger::{LogLevel, Logger, StopSpinner};
use crate::resolver::{ProjectResolver, ResolverFactory};
use crate::workspace::WorkspaceConfig;

/// Invocation context provided by the host.
#[derive(Debug, Clone, Default)]
pub struct ExecutorContext {
    /// Workspace root.
    pub root: PathBuf,
    /// Invoking project.
    pub project_name: Option<String>,
    /// Workspace projects.
    pub workspace: WorkspaceConfig,
    /// Working directory of the invocation.
    pub cwd: PathBuf,
    /// Host verbose flag.
    pub is_verbose: bool,
}

/// Options common to every operation.
pub trait ExecutorOptions {
    /// Verbosity override.
    fn verbosity(&self) -> Option<LogLevel>;
}

/// Result of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// Whether the operation succeeded.
    pub success: bool,
}

impl Outcome {
    /// Successful outcome.
    pub fn success() -> Self {
        Self { success: true }
    }

    /// Failed outcome.
    pub fn failure() -> Self {
        Self { success: false }
    }
}

/// Raw result of an operation.
pub enum Execution {
    /// One eventual outcome.
    Single(BoxFuture<'static, DbkitResult<Outcome>>),
    /// Sequence of progress outcomes.
    Stream(BoxStream<'static, DbkitResult<Outcome>>),
}

/// Result of a wrapped operation; errors are already logged.
pub enum ExecutionResult {
    /// One eventual outcome.
    Single(BoxFuture<'static, Outcome>),
    /// Sequence of progress outcomes.
    Stream(BoxStream<'static, Outcome>),
}

impl ExecutionResult {
    /// Drive the operation to completion.
    pub async fn outcomes(self) -> Vec<Outcome> {
        match self {
            Self::Single(future) => vec![future.await],
            Self::Stream(stream) => stream.collect().await,
        }
    }
}

impl fmt::Debug for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(_) => f.write_str("ExecutionResult::Single"),
            Self::Stream(_) => f.write_str("ExecutionResult::Stream"),
        }
    }
}

/// Shared collaborators of one invocation.
#[derive(Clone)]
pub struct Services {
    /// Output handle.
    pub logger: Logger,
    /// Driver registry.
    pub registry: Arc<DriverRegistry>,
    /// Builds project resolvers.
    pub resolvers: Arc<dyn ResolverFactory>,
    /// Writes generated files.
    pub emitter: Arc<dyn FileEmitter>,
}

impl Services {
    /// Create services writing migrations with the [`TemplateEmitter`].
    pub fn new(
        logger: Logger,
        registry: Arc<DriverRegistry>,
        resolvers: Arc<dyn ResolverFactory>,
    ) -> Self {
        Self {
            logger,
            registry,
            resolvers,
            emitter: Arc::new(TemplateEmitter),
        }
    }

    /// Use another file emitter.
    pub fn with_emitter(mut self, emitter: Arc<dyn FileEmitter>) -> Self {
        self.emitter = emitter;
        self
    }
}

/// Context handed to operations.
pub struct DbContext {
    context: ExecutorContext,
    services: Services,
    resolver: OnceCell<ProjectResolver>,
}

impl DbContext {
    /// Create a context; the resolver is built on first access.
    pub fn new(context: ExecutorContext, services: Services) -> Self {
        Self {
            context,
            services,
            resolver: OnceCell::new(),
        }
    }

    /// Host context.
    pub fn context(&self) -> &ExecutorContext {
        &self.context
    }

    /// Output handle.
    pub fn logger(&self) -> &Logger {
        &self.services.logger
    }

    /// Driver registry.
    pub fn registry(&self) -> &DriverRegistry {
        &self.services.registry
    }

    /// File emitter.
    pub fn emitter(&self) -> &dyn FileEmitter {
        self.services.emitter.as_ref()
    }

    /// Directory of the invoking project.
    pub fn project_root(&self) -> DbkitResult<PathBuf> {
        let name = self
            .context
            .project_name
            .as_deref()
            .ok_or(DbkitError::MissingProjectContext)?;
        let project = self
            .context
            .workspace
            .projects
            .get(name)
            .ok_or_else(|| DbkitError::UnknownProject(name.to_string()))?;
        Ok(self.context.root.join(&project.root))
    }

    /// Resolver of the invoking project, built on first access.
    pub fn resolver(&self) -> DbkitResult<&ProjectResolver> {
        self.resolver.get_or_try_init(|| {
            let root = self.project_root()?;
            Ok(self
                .services
                .resolvers
                .resolver(&root, &self.services.logger))
        })
    }
}

impl fmt::Debug for DbContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbContext")
            .field("context", &self.context)
            .field("resolver", &self.resolver.get())
            .finish()
    }
}

/// Wrap `operation` into a logged, failure-normalized executor.
pub fn db_executor<O, F>(operation: F) -> impl Fn(O, ExecutorContext, &Services) -> ExecutionResult
where
    O: ExecutorOptions,
    F: Fn(O, Arc<DbContext>) -> Execution,
{
    move |options, context, services| {
        let logger = services.logger.clone();
        let verbosity = options
            .verbosity()
            .or(context.is_verbose.then_some(LogLevel::Debug));
        logger.set_verbosity(verbosity);

        let context = Arc::new(DbContext::new(context, services.clone()));
        match operation(options, context) {
            Execution::Single(future) => ExecutionResult::Single(Box::pin(async move {
                let _stop = StopSpinner(logger.clone());
                match future.await {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        report(&logger, &err);
                        Outcome::failure()
                    }
                }
            })),
            Execution::Stream(stream) => ExecutionResult::Stream(guard_stream(stream, logger)),
        }
    }
}

fn report(logger: &Logger, err: &DbkitError) {
    logger.stop();
    logger.error_chain(err);
}

struct StreamState {
    inner: BoxStream<'static, DbkitResult<Outcome>>,
    logger: Logger,
    failed: bool,
    _stop: StopSpinner,
}

fn guard_stream(
    inner: BoxStream<'static, DbkitResult<Outcome>>,
    logger: Logger,
) -> BoxStream<'static, Outcome> {
    let state = StreamState {
        inner,
        _stop: StopSpinner(logger.clone()),
        logger,
        failed: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.failed {
            return None;
        }

        match state.inner.next().await? {
            Ok(outcome) => Some((outcome, state)),
            Err(err) => {
                report(&state.logger, &err);
                state.failed = true;
                Some((Outcome::failure(), state))
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        ConnectionJournal, MemoryConfigStore, MemoryResolverFactory, MockConnectionManager,
        RecordingSpinner,
    };
    use futures::FutureExt;

    struct Opts(Option<LogLevel>);

    impl ExecutorOptions for Opts {
        fn verbosity(&self) -> Option<LogLevel> {
            self.0
        }
    }

    fn services() -> (Services, RecordingSpinner) {
        let backend = RecordingSpinner::default();
        let resolvers = MemoryResolverFactory::new(
            MemoryConfigStore::new(),
            MockConnectionManager::new(ConnectionJournal::default()),
        );
        let services = Services::new(
            Logger::new(backend.clone()),
            Arc::new(DriverRegistry::new()),
            Arc::new(resolvers),
        );
        (services, backend)
    }

    fn context(project: Option<&str>) -> ExecutorContext {
        ExecutorContext {
            root: PathBuf::from("/work"),
            project_name: project.map(str::to_string),
            workspace: WorkspaceConfig::default().with_project("api", "apps/api"),
            cwd: PathBuf::from("/work"),
            is_verbose: false,
        }
    }

    #[tokio::test]
    async fn test_single_success_is_returned_verbatim() {
        let (services, _) = services();
        let executor = db_executor(|_: Opts, ctx: Arc<DbContext>| {
            ctx.logger().spin("working");
            Execution::Single(async { Ok(Outcome::success()) }.boxed())
        });

        let outcomes = executor(Opts(None), context(Some("api")), &services)
            .outcomes()
            .await;
        assert_eq!(outcomes, vec![Outcome::success()]);
        assert!(!services.logger.is_spinning());
    }

    #[tokio::test]
    async fn test_single_error_is_logged() {
        let (services, backend) = services();
        let executor = db_executor(|_: Opts, ctx: Arc<DbContext>| {
            Execution::Single(
                async move {
                    ctx.logger().spin("working");
                    ctx.resolver()?;
                    Ok(Outcome::success())
                }
                .boxed(),
            )
        });

        let outcomes = executor(Opts(None), context(None), &services)
            .outcomes()
            .await;
        assert_eq!(outcomes, vec![Outcome::failure()]);
        assert!(!services.logger.is_spinning());
        assert!(backend.has_line(LogLevel::Error, "Missing projectName in context"));
    }

    #[tokio::test]
    async fn test_stream_stops_after_first_error() {
        let (services, backend) = services();
        let executor = db_executor(|_: Opts, ctx: Arc<DbContext>| {
            ctx.logger().spin("streaming");
            Execution::Stream(
                stream::iter(vec![
                    Ok(Outcome::success()),
                    Err(DbkitError::query("boom")),
                    Ok(Outcome::success()),
                ])
                .boxed(),
            )
        });

        let outcomes = executor(Opts(None), context(Some("api")), &services)
            .outcomes()
            .await;
        assert_eq!(outcomes, vec![Outcome::success(), Outcome::failure()]);
        assert!(!services.logger.is_spinning());
        assert!(backend.has_line(LogLevel::Error, "Query error: boom"));
    }

    #[tokio::test]
    async fn test_dropped_stream_stops_spinner() {
        let (services, _) = services();
        let executor = db_executor(|_: Opts, ctx: Arc<DbContext>| {
            ctx.logger().spin("streaming");
            Execution::Stream(stream::iter((0..3).map(|_| Ok(Outcome::success()))).boxed())
        });

        let ExecutionResult::Stream(mut stream) =
            executor(Opts(None), context(Some("api")), &services)
        else {
            panic!("expected a stream");
        };
        assert_eq!(stream.next().await, Some(Outcome::success()));
        assert!(services.logger.is_spinning());
        drop(stream);
        assert!(!services.logger.is_spinning());
    }

    #[tokio::test]
    async fn test_verbosity_from_options() {
        let (services, _) = services();
        let executor = db_executor(|_: Opts, _ctx: Arc<DbContext>| {
            Execution::Single(async { Ok(Outcome::success()) }.boxed())
        });

        executor(Opts(Some(LogLevel::Debug)), context(Some("api")), &services)
            .outcomes()
            .await;
        assert_eq!(services.logger.verbosity(), LogLevel::Debug);

        executor(Opts(None), context(Some("api")), &services)
            .outcomes()
            .await;
        assert_eq!(services.logger.verbosity(), LogLevel::Info);
    }

    #[test]
    fn test_resolver_is_lazy() {
        let (services, _) = services();

        let ctx = DbContext::new(context(Some("api")), services.clone());
        assert!(ctx.resolver.get().is_none());
        let resolver = ctx.resolver().unwrap();
        assert_eq!(resolver.root(), std::path::Path::new("/work/apps/api"));

        let ctx = DbContext::new(context(Some("web")), services);
        assert!(matches!(ctx.resolver(), Err(DbkitError::UnknownProject(name)) if name == "web"));
    }
}
