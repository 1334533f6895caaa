use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use tokio::signal::unix::SignalKind;
use tokio::{select, time};

use crate::config::LoggingConfig;
use crate::context::Context;
use crate::logging;
use crate::signal::SignalHandler;

const FORCE_SHUTDOWN_AFTER: Duration = Duration::from_secs(60);

pub trait Config: Sized {
	fn parse() -> anyhow::Result<Self>;

	fn logging(&self) -> &LoggingConfig;

	fn name(&self) -> &str;

	fn pre_hook(&mut self) -> anyhow::Result<()> {
		Ok(())
	}
}

#[allow(async_fn_in_trait)]
pub trait Global<C: Config>: Sized {
	async fn new(ctx: Context, config: C) -> anyhow::Result<Self>;
}

/// Runs a worker process: config, logging, global state, then `process` until
/// it returns or a SIGINT/SIGTERM arrives. Shutdown cancels the shared
/// [`Context`] and waits for every holder to let go of it, up to a minute or
/// a second signal.
pub async fn bootstrap<C: Config, G: Global<C>, F: Future<Output = anyhow::Result<()>> + Send + 'static>(
	process: impl FnOnce(Arc<G>) -> F,
) -> anyhow::Result<()> {
	let (ctx, handler) = Context::new();

	let config = C::parse()
		.and_then(|mut config| {
			config.pre_hook()?;
			Ok(config)
		})
		.map_err(|err| {
			if let Err(log_err) = logging::init("info", Default::default()) {
				eprintln!("failed to init logging: {log_err}");
			}

			err
		})
		.context("failed to parse config")?;

	logging::init(&config.logging().level, config.logging().mode).context("failed to init logging")?;

	tracing::info!(name = config.name(), "starting up");

	let global = Arc::new(G::new(ctx, config).await.context("failed to create global state")?);

	tracing::debug!("global state created, starting process");

	let mut process_future = tokio::spawn(process(global));

	let mut signal_handler = SignalHandler::new()
		.with_signal(SignalKind::interrupt())
		.and_then(|handler| handler.with_signal(SignalKind::terminate()))
		.context("failed to install signal handlers")?;

	let mut result = Ok(());

	select! {
		kind = signal_handler.recv() => tracing::info!(signal = ?kind, "shutting down"),
		r = &mut process_future => {
			result = match r {
				Ok(Ok(())) => Err(anyhow::anyhow!("process stopped unexpectedly")),
				Ok(Err(err)) => Err(err.context("process failed")),
				Err(err) => Err(anyhow::Error::new(err).context("process panicked")),
			};

			if let Err(err) = &result {
				tracing::error!("{:#}", err);
			}
		}
	}

	tracing::info!("waiting for tasks to finish");

	select! {
		_ = time::sleep(FORCE_SHUTDOWN_AFTER) => tracing::warn!("force shutting down"),
		_ = signal_handler.recv() => tracing::warn!("force shutting down"),
		_ = handler.cancel() => tracing::info!("shutdown complete"),
	}

	result
}
