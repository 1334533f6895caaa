use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use sqlx::postgres::PgPoolOptions;

use crate::config::{DatabaseConfig, RmqConfig};
use crate::context::Context;
use crate::rmq::ConnectionPool;

#[macro_export]
macro_rules! impl_global_traits {
	($struct:ty) => {
		impl $crate::global::GlobalCtx for $struct {
			#[inline(always)]
			fn ctx(&self) -> &$crate::context::Context {
				&self.ctx
			}
		}

		impl $crate::global::GlobalDb for $struct {
			#[inline(always)]
			fn db(&self) -> &::std::sync::Arc<sqlx::PgPool> {
				&self.db
			}
		}

		impl $crate::global::GlobalRmq for $struct {
			#[inline(always)]
			fn rmq(&self) -> &::std::sync::Arc<$crate::rmq::ConnectionPool> {
				&self.rmq
			}
		}

		impl $crate::global::GlobalConfig for $struct {}
	};
}

pub trait GlobalCtx {
	fn ctx(&self) -> &Context;
}

pub trait GlobalConfig {
	#[inline(always)]
	fn config<C>(&self) -> &C
	where
		Self: GlobalConfigProvider<C>,
	{
		GlobalConfigProvider::provide_config(self)
	}
}

pub trait GlobalConfigProvider<C> {
	fn provide_config(&self) -> &C;
}

pub trait GlobalDb {
	fn db(&self) -> &Arc<sqlx::PgPool>;
}

pub trait GlobalRmq {
	fn rmq(&self) -> &Arc<ConnectionPool>;
}

pub async fn setup_database(config: &DatabaseConfig) -> anyhow::Result<Arc<sqlx::PgPool>> {
	let pool = PgPoolOptions::new()
		.max_connections(config.max_connections)
		.acquire_timeout(Duration::from_secs(10))
		.connect(&config.uri)
		.await
		.context("failed to connect to database")?;

	Ok(Arc::new(pool))
}

/// Connects the broker pool and starts its reconnect loop, which lives until
/// `ctx` is cancelled.
pub async fn setup_rmq(ctx: &Context, name: &str, config: &RmqConfig) -> anyhow::Result<Arc<ConnectionPool>> {
	let pool = ConnectionPool::connect(
		config.uri.clone(),
		lapin::ConnectionProperties::default().with_connection_name(name.into()),
		Duration::from_secs(config.timeout_secs),
		config.pool_size,
	)
	.await
	.context("failed to connect to rabbitmq")?;

	let pool = Arc::new(pool);

	let reconnects = pool.clone();
	let ctx = ctx.clone();
	tokio::spawn(async move {
		tokio::select! {
			result = reconnects.handle_reconnects() => {
				if let Err(err) = result {
					tracing::error!(error = %err, "rabbitmq reconnect loop stopped");
				}
			}
			_ = ctx.done() => {}
		}
	});

	Ok(pool)
}
