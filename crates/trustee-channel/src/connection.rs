//! Request/reply plumbing shared by both kinds of trustee
//!
//! A server thread owns the guardian and answers JSON frames one at a time.
//! Proxies block on the reply, so they must not be driven from inside an
//! async runtime.

use crate::wire::Envelope;
use guardian_core::{Error, GuardianId, Result};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Requests queued per trustee before senders block
pub const DEFAULT_QUEUE_DEPTH: usize = 16;

/// A JSON request and where to send its JSON reply
pub(crate) type Frame = (String, oneshot::Sender<String>);

/// Client side of a trustee channel
#[derive(Debug, Clone)]
pub(crate) struct Connection {
    trustee_id: GuardianId,
    requests: mpsc::Sender<Frame>,
}

impl Connection {
    pub(crate) fn new(trustee_id: GuardianId, requests: mpsc::Sender<Frame>) -> Self {
        Self {
            trustee_id,
            requests,
        }
    }

    pub(crate) fn trustee_id(&self) -> &str {
        &self.trustee_id
    }

    /// Send one request and wait for its reply
    pub(crate) fn call<Req, Resp>(&self, request: Req) -> Result<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let envelope = Envelope::new(request);
        let frame = serde_json::to_string(&envelope)?;
        let (reply_tx, reply_rx) = oneshot::channel();

        self.requests
            .blocking_send((frame, reply_tx))
            .map_err(|_| Error::transport(&self.trustee_id, "trustee server has stopped"))?;
        let reply = reply_rx
            .blocking_recv()
            .map_err(|_| Error::transport(&self.trustee_id, "no reply to request"))?;

        let response: Envelope<Resp> = serde_json::from_str(&reply)
            .map_err(|e| Error::transport(&self.trustee_id, format!("malformed reply: {}", e)))?;
        if response.request_id != envelope.request_id {
            return Err(Error::transport(
                &self.trustee_id,
                "reply does not match the request",
            ));
        }

        debug!(trustee_id = %self.trustee_id, request_id = %envelope.request_id, "Reply received");
        Ok(response.payload)
    }
}

/// Answer frames until every sender is dropped
///
/// Frames that do not parse are dropped without a reply; the caller then
/// sees a closed reply channel.
pub(crate) fn serve<Req, Resp, F>(
    trustee_id: &str,
    mut requests: mpsc::Receiver<Frame>,
    mut handle: F,
) where
    Req: DeserializeOwned,
    Resp: Serialize,
    F: FnMut(Req) -> Resp,
{
    while let Some((frame, reply)) = requests.blocking_recv() {
        let envelope: Envelope<Req> = match serde_json::from_str(&frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(%trustee_id, error = %e, "Dropping malformed request");
                continue;
            }
        };

        let response = envelope.answer(&mut handle);
        match serde_json::to_string(&response) {
            Ok(json) => {
                if reply.send(json).is_err() {
                    warn!(%trustee_id, "Caller went away before the reply");
                }
            }
            Err(e) => warn!(%trustee_id, error = %e, "Failed to encode reply"),
        }
    }
    debug!(%trustee_id, "Trustee server stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{KeyCeremonyRequest, KeyCeremonyResponse};

    #[test]
    fn test_stopped_server_is_a_transport_error() {
        let (tx, rx) = mpsc::channel(DEFAULT_QUEUE_DEPTH);
        drop(rx);
        let connection = Connection::new("guardian-1".into(), tx);

        let err = connection
            .call::<_, KeyCeremonyResponse>(KeyCeremonyRequest::SendJointPublicKey)
            .unwrap_err();
        assert!(matches!(err, Error::Transport { ref trustee, .. } if trustee == "guardian-1"));
    }

    #[test]
    fn test_malformed_request_gets_no_reply() {
        let (tx, rx) = mpsc::channel::<Frame>(DEFAULT_QUEUE_DEPTH);
        let server = std::thread::spawn(move || {
            serve(
                "guardian-1",
                rx,
                |_: KeyCeremonyRequest| KeyCeremonyResponse::Accepted { accepted: true },
            )
        });

        let (reply_tx, reply_rx) = oneshot::channel();
        tx.blocking_send(("not json".into(), reply_tx)).unwrap();
        assert!(reply_rx.blocking_recv().is_err());

        let connection = Connection::new("guardian-1".into(), tx);
        let response: KeyCeremonyResponse = connection
            .call(KeyCeremonyRequest::SendPublicKeys)
            .unwrap();
        assert!(matches!(response, KeyCeremonyResponse::Accepted { accepted: true }));

        drop(connection);
        server.join().unwrap();
    }
}
