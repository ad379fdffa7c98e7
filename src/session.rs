//! # Client Sessions
//!
//! A [`Session`] is one client connection's view of the store. The transport
//! layer feeds it decoded [`Request`]s and writes back whatever it returns,
//! plus everything that arrives on [`Session::outbound`].
//!
//! ```text
//!   transport ──Request──► Session::handle ──► Vec<Response> (Append/Read/Unsubscribe)
//!                               │
//!                               └─ Subscribe ──► forwarding task per subscription
//!                                                    │
//!   transport ◄──Response::Event── outbound channel ◄┘
//! ```
//!
//! Subscription handles are only meaningful within the session that created
//! them. Closing or dropping the session stops all of them.

use std::collections::HashMap;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::debug;

use crate::api::EventStore;
use crate::error::Error;
use crate::protocol::{ErrorKind, Request, Response, WireEvent};
use crate::subscription::{CatchUpSubscription, SubscriptionHandle, SubscriptionId};
use crate::types::{CommitPosition, NewEvent, SubscribeFrom};

pub struct Session {
    store: EventStore,
    outbound_tx: mpsc::Sender<Response>,
    outbound_rx: mpsc::Receiver<Response>,
    subscriptions: HashMap<SubscriptionId, SubscriptionHandle>,
}

impl Session {
    pub fn new(store: EventStore) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(store.config().subscriber_queue_capacity);
        Self {
            store,
            outbound_tx,
            outbound_rx,
            subscriptions: HashMap::new(),
        }
    }

    /// Events pushed by this session's subscriptions.
    pub fn outbound(&mut self) -> &mut mpsc::Receiver<Response> {
        &mut self.outbound_rx
    }

    /// Handles of the subscriptions opened by this session.
    pub fn subscription_handles(&self) -> impl Iterator<Item = SubscriptionId> + '_ {
        self.subscriptions.keys().copied()
    }

    /// Executes one request.
    ///
    /// `Subscribe` must be issued from within a tokio runtime, which hosts
    /// the forwarding task.
    pub fn handle(&mut self, request: Request) -> Vec<Response> {
        match request {
            Request::Append {
                stream_name,
                expected_version,
                events,
            } => {
                let events: Vec<NewEvent> = events.into_iter().map(NewEvent::from).collect();
                match self.store.append_to_stream(stream_name, expected_version, events) {
                    Ok(commit_position) => vec![Response::AppendResult { commit_position }],
                    Err(e) => vec![Response::from(e)],
                }
            }

            Request::Read {
                stream_name,
                from_position,
                direction,
                max_count,
            } => {
                let options = Request::read_options(from_position, direction, max_count);
                match self.store.read_stream(stream_name, options) {
                    Ok(reader) => reader
                        .map(|event| Response::Event(WireEvent::from(event)))
                        .chain(std::iter::once(Response::ReadComplete))
                        .collect(),
                    Err(e) => vec![Response::from(e)],
                }
            }

            Request::Subscribe { from_position } => {
                let runtime = match Handle::try_current() {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        return vec![Response::Error {
                            kind: ErrorKind::Internal,
                            message: format!("subscribe needs an async runtime: {}", e),
                        }];
                    }
                };

                let from = SubscribeFrom::from(from_position.map(CommitPosition::from_raw));
                let subscription = self.store.subscribe_to_all(from);
                let handle = subscription.handle();
                let id = handle.id();

                runtime.spawn(forward(subscription, handle.clone(), self.outbound_tx.clone()));
                self.subscriptions.insert(id, handle);
                vec![Response::Subscribed { handle: id }]
            }

            Request::Unsubscribe { handle } => match self.subscriptions.remove(&handle) {
                Some(subscription) => {
                    subscription.stop();
                    vec![Response::Unsubscribed { handle }]
                }
                None => vec![Response::Error {
                    kind: Error::SubscriptionClosed.kind(),
                    message: format!("no open subscription with handle {}", handle),
                }],
            },
        }
    }

    /// Stops every subscription of this session.
    pub fn close(&mut self) {
        for (_, handle) in self.subscriptions.drain() {
            handle.stop();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

/// Pumps one subscription into the session's outbound channel.
async fn forward(
    mut subscription: CatchUpSubscription,
    handle: SubscriptionHandle,
    outbound: mpsc::Sender<Response>,
) {
    while let Some(event) = subscription.next().await {
        let response = Response::Event(WireEvent::from(event));
        tokio::select! {
            biased;
            _ = handle.stopped() => break,
            sent = outbound.send(response) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }
    debug!(subscription = handle.id(), "session forwarding ended");
}
