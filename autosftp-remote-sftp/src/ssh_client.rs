use russh::client::Handler;
use russh::keys::HashAlg;
use tracing::info;

/// Client-side handler. Host keys are not verified: every key is accepted and
/// its fingerprint logged.
#[derive(Debug, Default)]
pub(crate) struct Client;

impl Handler for Client {
    type Error = anyhow::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &russh::keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        let fp_sha256 = server_public_key.fingerprint(HashAlg::Sha256);
        info!("accepting server key {fp_sha256}");
        Ok(true)
    }
}
