//! Decrypting trustee behind a channel

use crate::connection::{serve, Connection, DEFAULT_QUEUE_DEPTH};
use crate::wire::{DecryptingRequest, DecryptingResponse};
use guardian_core::decryption::{
    DecryptingGuardian, DecryptionProofRecovery, DecryptionProofTuple,
};
use guardian_core::elgamal::Ciphertext;
use guardian_core::{DecryptingTrustee, ElementModP, ElementModQ, Error, Result};
use tokio::sync::mpsc;
use tracing::info;

/// Proxy for a [`DecryptingGuardian`] running on its own server thread
///
/// The server stops once the proxy is dropped.
pub struct ChannelDecryptingTrustee {
    x_coordinate: u32,
    election_public_key: ElementModP,
    connection: Connection,
}

impl ChannelDecryptingTrustee {
    pub fn spawn(guardian: DecryptingGuardian) -> Result<Self> {
        let id = guardian.id().to_string();
        let x_coordinate = guardian.x_coordinate();
        let election_public_key = guardian.election_public_key().clone();
        let (tx, rx) = mpsc::channel(DEFAULT_QUEUE_DEPTH);

        let server_id = id.clone();
        std::thread::Builder::new()
            .name(format!("decrypting-{}", id))
            .spawn(move || serve(&server_id, rx, |request| handle(&guardian, request)))
            .map_err(|e| Error::transport(&id, format!("failed to start server: {}", e)))?;

        info!(trustee_id = %id, x_coordinate, "Decrypting trustee started");
        Ok(Self {
            x_coordinate,
            election_public_key,
            connection: Connection::new(id, tx),
        })
    }

    fn call(&self, request: DecryptingRequest) -> Result<DecryptingResponse> {
        match self.connection.call(request)? {
            DecryptingResponse::Error { reason } => {
                Err(Error::transport(self.connection.trustee_id(), reason))
            }
            response => Ok(response),
        }
    }

    fn unexpected(&self, response: DecryptingResponse) -> Error {
        let kind = match response {
            DecryptingResponse::PartialDecryptions { .. } => "partial decryptions",
            DecryptingResponse::CompensatedDecryptions { .. } => "compensated decryptions",
            DecryptingResponse::Error { .. } => "error",
        };
        Error::transport(
            self.connection.trustee_id(),
            format!("unexpected response: {}", kind),
        )
    }
}

fn handle(guardian: &DecryptingGuardian, request: DecryptingRequest) -> DecryptingResponse {
    match request {
        DecryptingRequest::PartialDecrypt {
            texts,
            extended_base_hash,
        } => DecryptingResponse::PartialDecryptions {
            results: guardian.partial_decrypt(&texts, &extended_base_hash),
        },
        DecryptingRequest::CompensatedDecrypt {
            missing_guardian_id,
            texts,
            extended_base_hash,
        } => match guardian.compensated_decrypt(&missing_guardian_id, &texts, &extended_base_hash) {
            Ok(results) => DecryptingResponse::CompensatedDecryptions { results },
            Err(e) => DecryptingResponse::Error {
                reason: e.to_string(),
            },
        },
    }
}

impl DecryptingTrustee for ChannelDecryptingTrustee {
    fn id(&self) -> &str {
        self.connection.trustee_id()
    }

    fn x_coordinate(&self) -> u32 {
        self.x_coordinate
    }

    fn election_public_key(&self) -> &ElementModP {
        &self.election_public_key
    }

    fn partial_decrypt(
        &self,
        texts: &[Ciphertext],
        extended_base_hash: &ElementModQ,
    ) -> Result<Vec<DecryptionProofTuple>> {
        let request = DecryptingRequest::PartialDecrypt {
            texts: texts.to_vec(),
            extended_base_hash: extended_base_hash.clone(),
        };
        match self.call(request)? {
            DecryptingResponse::PartialDecryptions { results } => Ok(results),
            other => Err(self.unexpected(other)),
        }
    }

    fn compensated_decrypt(
        &self,
        missing_guardian_id: &str,
        texts: &[Ciphertext],
        extended_base_hash: &ElementModQ,
    ) -> Result<Vec<DecryptionProofRecovery>> {
        let request = DecryptingRequest::CompensatedDecrypt {
            missing_guardian_id: missing_guardian_id.to_string(),
            texts: texts.to_vec(),
            extended_base_hash: extended_base_hash.clone(),
        };
        match self.call(request)? {
            DecryptingResponse::CompensatedDecryptions { results } => Ok(results),
            other => Err(self.unexpected(other)),
        }
    }
}
