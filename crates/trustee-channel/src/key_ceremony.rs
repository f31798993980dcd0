//! Key ceremony trustee behind a channel

use crate::connection::{serve, Connection, DEFAULT_QUEUE_DEPTH};
use crate::wire::{KeyCeremonyRequest, KeyCeremonyResponse};
use guardian_core::keyceremony::{
    Guardian, PartialKeyBackup, PartialKeyChallengeResponse, PartialKeyVerification, PublicKeySet,
};
use guardian_core::{ElementModP, Error, KeyCeremonyTrustee, Result};
use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tracing::info;

/// Proxy for a [`Guardian`] running on its own server thread
pub struct ChannelKeyCeremonyTrustee {
    x_coordinate: u32,
    connection: Connection,
    server: JoinHandle<Guardian>,
}

impl ChannelKeyCeremonyTrustee {
    /// Move `guardian` onto a server thread and return a proxy for it
    pub fn spawn(guardian: Guardian) -> Result<Self> {
        let id = guardian.id().to_string();
        let x_coordinate = guardian.x_coordinate();
        let (tx, rx) = mpsc::channel(DEFAULT_QUEUE_DEPTH);

        let server_id = id.clone();
        let server = std::thread::Builder::new()
            .name(format!("trustee-{}", id))
            .spawn(move || {
                let mut guardian = guardian;
                serve(&server_id, rx, |request| handle(&mut guardian, request));
                guardian
            })
            .map_err(|e| Error::transport(&id, format!("failed to start server: {}", e)))?;

        info!(trustee_id = %id, x_coordinate, "Key ceremony trustee started");
        Ok(Self {
            x_coordinate,
            connection: Connection::new(id, tx),
            server,
        })
    }

    /// Stop the server and take the guardian back
    pub fn shutdown(self) -> Result<Guardian> {
        let id = self.connection.trustee_id().to_string();
        drop(self.connection);
        self.server
            .join()
            .map_err(|_| Error::transport(id, "server thread panicked"))
    }

    fn call(&self, request: KeyCeremonyRequest) -> Result<KeyCeremonyResponse> {
        match self.connection.call(request)? {
            KeyCeremonyResponse::Error { reason } => {
                Err(Error::transport(self.connection.trustee_id(), reason))
            }
            response => Ok(response),
        }
    }

    fn unexpected(&self, response: KeyCeremonyResponse) -> Error {
        Error::transport(
            self.connection.trustee_id(),
            format!("unexpected response: {:?}", response),
        )
    }
}

fn handle(guardian: &mut Guardian, request: KeyCeremonyRequest) -> KeyCeremonyResponse {
    match request {
        KeyCeremonyRequest::SendPublicKeys => KeyCeremonyResponse::PublicKeys {
            keys: guardian.share_public_keys(),
        },
        KeyCeremonyRequest::ReceivePublicKeys { keys } => KeyCeremonyResponse::Accepted {
            accepted: guardian.receive_public_keys(&keys),
        },
        KeyCeremonyRequest::SendPartialKeyBackup { designated_id } => KeyCeremonyResponse::Backup {
            backup: guardian.send_partial_key_backup(&designated_id),
        },
        KeyCeremonyRequest::VerifyPartialKeyBackup { backup } => {
            KeyCeremonyResponse::Verification {
                verification: guardian.verify_partial_key_backup(&backup),
            }
        }
        KeyCeremonyRequest::SendBackupChallengeResponse { designated_id } => {
            KeyCeremonyResponse::ChallengeResponse {
                response: Guardian::send_backup_challenge_response(guardian, &designated_id),
            }
        }
        KeyCeremonyRequest::SendJointPublicKey => match guardian.publish_joint_key() {
            Ok(key) => KeyCeremonyResponse::JointPublicKey { key },
            Err(e) => KeyCeremonyResponse::Error {
                reason: e.to_string(),
            },
        },
    }
}

impl KeyCeremonyTrustee for ChannelKeyCeremonyTrustee {
    fn id(&self) -> &str {
        self.connection.trustee_id()
    }

    fn x_coordinate(&self) -> u32 {
        self.x_coordinate
    }

    fn send_public_keys(&mut self) -> Result<PublicKeySet> {
        match self.call(KeyCeremonyRequest::SendPublicKeys)? {
            KeyCeremonyResponse::PublicKeys { keys } => Ok(keys),
            other => Err(self.unexpected(other)),
        }
    }

    fn receive_public_keys(&mut self, keys: &PublicKeySet) -> Result<bool> {
        let request = KeyCeremonyRequest::ReceivePublicKeys { keys: keys.clone() };
        match self.call(request)? {
            KeyCeremonyResponse::Accepted { accepted } => Ok(accepted),
            other => Err(self.unexpected(other)),
        }
    }

    fn send_partial_key_backup(&mut self, designated_id: &str) -> Result<PartialKeyBackup> {
        let request = KeyCeremonyRequest::SendPartialKeyBackup {
            designated_id: designated_id.to_string(),
        };
        match self.call(request)? {
            KeyCeremonyResponse::Backup { backup } => Ok(backup),
            other => Err(self.unexpected(other)),
        }
    }

    fn verify_partial_key_backup(
        &mut self,
        backup: &PartialKeyBackup,
    ) -> Result<PartialKeyVerification> {
        let request = KeyCeremonyRequest::VerifyPartialKeyBackup {
            backup: backup.clone(),
        };
        match self.call(request)? {
            KeyCeremonyResponse::Verification { verification } => Ok(verification),
            other => Err(self.unexpected(other)),
        }
    }

    fn send_backup_challenge_response(
        &mut self,
        designated_id: &str,
    ) -> Result<PartialKeyChallengeResponse> {
        let request = KeyCeremonyRequest::SendBackupChallengeResponse {
            designated_id: designated_id.to_string(),
        };
        match self.call(request)? {
            KeyCeremonyResponse::ChallengeResponse { response } => Ok(response),
            other => Err(self.unexpected(other)),
        }
    }

    fn send_joint_public_key(&mut self) -> Result<ElementModP> {
        match self.call(KeyCeremonyRequest::SendJointPublicKey)? {
            KeyCeremonyResponse::JointPublicKey { key } => Ok(key),
            other => Err(self.unexpected(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guardian_core::{CeremonyConfig, Group};

    #[test]
    fn test_proxy_forwards_to_guardian() {
        let group = Group::reduced();
        let config = CeremonyConfig::new(2, 2).unwrap();
        let first = Guardian::new(&group, "guardian-1", 1, &config, None).unwrap();
        let second = Guardian::new(&group, "guardian-2", 2, &config, None).unwrap();
        let second_keys = second.share_public_keys();

        let mut proxy = ChannelKeyCeremonyTrustee::spawn(first).unwrap();
        assert_eq!(proxy.id(), "guardian-1");
        assert_eq!(proxy.x_coordinate(), 1);
        assert_eq!(proxy.send_public_keys().unwrap().owner_id, "guardian-1");

        // joint key needs both guardians' keys
        assert!(matches!(
            proxy.send_joint_public_key(),
            Err(Error::Transport { .. })
        ));
        assert!(proxy.receive_public_keys(&second_keys).unwrap());

        let backup = proxy.send_partial_key_backup("guardian-2").unwrap();
        assert_eq!(backup.designated_guardian_id, "guardian-2");
        assert!(backup.encrypted_coordinate.is_some());

        let response = proxy.send_backup_challenge_response("guardian-2").unwrap();
        assert_eq!(response.designated_guardian_x_coordinate, 2);
        assert!(response.coordinate.is_some());

        let guardian = proxy.shutdown().unwrap();
        assert_eq!(guardian.guardian_public_keys().len(), 2);
    }
}
