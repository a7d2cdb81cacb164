use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};

const CALL_TIMEOUT: Duration = Duration::from_secs(30);
const EVENT_CAPACITY: usize = 256;

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value>>>>>;

/// Event pushed by the browser.
#[derive(Debug, Clone)]
pub struct CdpEvent {
	pub method: String,
	pub params: Value,
	/// Flattened target session the event belongs to, if any.
	pub session_id: Option<String>,
}

/// Browser-level DevTools connection.
///
/// Cloning is not supported; share it behind an `Arc`.
pub struct CdpConnection {
	next_id: AtomicU64,
	pending: Pending,
	outbound: mpsc::UnboundedSender<Message>,
	events: broadcast::Sender<CdpEvent>,
	closed: watch::Receiver<bool>,
	tasks: Vec<JoinHandle<()>>,
}

impl CdpConnection {
	/// Opens the browser WebSocket at `ws_url`.
	pub async fn connect(ws_url: &str) -> Result<Self> {
		let (stream, _) = tokio_tungstenite::connect_async(ws_url)
			.await
			.map_err(|err| Error::ConnectionFailed(format!("{ws_url}: {err}")))?;
		debug!(target = "foxden.engine", url = ws_url, "connected to devtools");
		Ok(Self::from_stream(stream))
	}

	/// Wraps an already-established WebSocket.
	pub fn from_stream<S>(stream: WebSocketStream<S>) -> Self
	where
		S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
	{
		let (mut sink, mut source) = stream.split();
		let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
		let (events, _) = broadcast::channel(EVENT_CAPACITY);
		let (closed_tx, closed) = watch::channel(false);
		let pending: Pending = Arc::new(Mutex::new(HashMap::new()));

		let writer = tokio::spawn(async move {
			while let Some(message) = outbound_rx.recv().await {
				if let Err(err) = sink.send(message).await {
					debug!(target = "foxden.engine", error = %err, "devtools write failed");
					break;
				}
			}
			let _ = sink.close().await;
		});

		let reader_pending = Arc::clone(&pending);
		let reader_events = events.clone();
		let reader = tokio::spawn(async move {
			while let Some(frame) = source.next().await {
				let text = match frame {
					Ok(Message::Text(text)) => text,
					Ok(Message::Close(_)) => break,
					Ok(_) => continue,
					Err(err) => {
						debug!(target = "foxden.engine", error = %err, "devtools read failed");
						break;
					}
				};
				dispatch(&text, &reader_pending, &reader_events);
			}

			let _ = closed_tx.send(true);
			for (_, waiter) in reader_pending.lock().drain() {
				let _ = waiter.send(Err(Error::TargetClosed("devtools connection closed".to_string())));
			}
			debug!(target = "foxden.engine", "devtools connection closed");
		});

		Self {
			next_id: AtomicU64::new(1),
			pending,
			outbound,
			events,
			closed,
			tasks: vec![writer, reader],
		}
	}

	/// Sends `method` and waits for its result.
	///
	/// `session_id` routes the command to an attached target session.
	pub async fn call(&self, method: &str, params: Value, session_id: Option<&str>) -> Result<Value> {
		if self.is_closed() {
			return Err(Error::TargetClosed(format!("{method}: devtools connection closed")));
		}

		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let mut request = json!({ "id": id, "method": method, "params": params });
		if let Some(session_id) = session_id {
			request["sessionId"] = Value::String(session_id.to_string());
		}

		let (tx, rx) = oneshot::channel();
		self.pending.lock().insert(id, tx);

		// The reader may have drained pending between the first check and the insert.
		if self.is_closed() {
			self.pending.lock().remove(&id);
			return Err(Error::TargetClosed(format!("{method}: devtools connection closed")));
		}

		trace!(target = "foxden.engine", id, method, "devtools call");
		if self.outbound.send(Message::Text(request.to_string())).is_err() {
			self.pending.lock().remove(&id);
			return Err(Error::TargetClosed(format!("{method}: devtools writer stopped")));
		}

		match tokio::time::timeout(CALL_TIMEOUT, rx).await {
			Ok(Ok(result)) => result,
			Ok(Err(_)) => Err(Error::TargetClosed(format!("{method}: response channel dropped"))),
			Err(_) => {
				self.pending.lock().remove(&id);
				Err(Error::Timeout(format!("{method} after {}s", CALL_TIMEOUT.as_secs())))
			}
		}
	}

	/// Subscribes to browser events from this point on.
	pub fn subscribe(&self) -> broadcast::Receiver<CdpEvent> {
		self.events.subscribe()
	}

	/// Resolves once the connection has closed.
	pub async fn closed(&self) {
		let mut closed = self.closed.clone();
		let _ = closed.wait_for(|closed| *closed).await;
	}

	pub fn is_closed(&self) -> bool {
		*self.closed.borrow()
	}
}

impl Drop for CdpConnection {
	fn drop(&mut self) {
		for task in &self.tasks {
			task.abort();
		}
	}
}

fn dispatch(text: &str, pending: &Pending, events: &broadcast::Sender<CdpEvent>) {
	let message: Value = match serde_json::from_str(text) {
		Ok(value) => value,
		Err(err) => {
			warn!(target = "foxden.engine", error = %err, "discarding malformed devtools frame");
			return;
		}
	};

	if let Some(id) = message.get("id").and_then(Value::as_u64) {
		let Some(waiter) = pending.lock().remove(&id) else {
			trace!(target = "foxden.engine", id, "response for unknown request");
			return;
		};
		let result = match message.get("error") {
			Some(error) => {
				let text = error
					.get("message")
					.and_then(Value::as_str)
					.map(str::to_string)
					.unwrap_or_else(|| error.to_string());
				Err(Error::Protocol(text))
			}
			None => Ok(message.get("result").cloned().unwrap_or(Value::Null)),
		};
		let _ = waiter.send(result);
		return;
	}

	if let Some(method) = message.get("method").and_then(Value::as_str) {
		let event = CdpEvent {
			method: method.to_string(),
			params: message.get("params").cloned().unwrap_or(Value::Null),
			session_id: message.get("sessionId").and_then(Value::as_str).map(str::to_string),
		};
		// No subscribers is fine.
		let _ = events.send(event);
	}
}
