use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A cancellation scope shared by every task of the process.
///
/// Clones keep the scope alive: [`Handler::cancel`] signals all of them and
/// then waits until each clone has been dropped, which is how in-flight work
/// gets to finish (acks, connection close) before the process exits.
#[derive(Clone)]
pub struct Context {
	token: CancellationToken,
	_alive: mpsc::Sender<()>,
}

pub struct Handler {
	token: CancellationToken,
	alive: mpsc::Receiver<()>,
}

impl Context {
	#[must_use]
	pub fn new() -> (Self, Handler) {
		let token = CancellationToken::new();
		let (alive_tx, alive_rx) = mpsc::channel(1);

		(
			Self {
				token: token.clone(),
				_alive: alive_tx,
			},
			Handler { token, alive: alive_rx },
		)
	}

	pub async fn done(&self) {
		self.token.cancelled().await
	}
}

impl Handler {
	/// Cancels every context and waits for them to be dropped.
	pub async fn cancel(mut self) {
		self.token.cancel();
		let _ = self.alive.recv().await;
	}
}
