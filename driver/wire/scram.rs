/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Client side of SCRAM-SHA-256 (RFC 5802, RFC 7677).

use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::error::DriverError;

pub const MECHANISM: &str = "SCRAM-SHA-256";
const MIN_ITERATIONS: u32 = 4096;
const GS2_HEADER: &str = "n,,";
const CHANNEL_BINDING: &str = "biws"; // base64("n,,")

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone, PartialEq, Eq)]
pub struct ScramCredential {
    pub username: String,
    pub password: String,
    pub source: String,
}

impl std::fmt::Debug for ScramCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScramCredential").field("username", &self.username).field("source", &self.source).finish()
    }
}

/// One authentication conversation. `client_first`, then `client_final` with the server's first
/// message, then `verify_server_final`.
#[derive(Debug)]
pub struct ScramConversation {
    credential: ScramCredential,
    client_nonce: String,
    client_first_bare: String,
    server_signature: Option<[u8; 32]>,
}

impl ScramConversation {
    pub fn new(credential: ScramCredential) -> Self {
        let nonce: [u8; 24] = rand::thread_rng().gen();
        Self::with_nonce(credential, STANDARD.encode(nonce))
    }

    pub fn with_nonce(credential: ScramCredential, client_nonce: String) -> Self {
        let client_first_bare = format!("n={},r={client_nonce}", sasl_name(&credential.username));
        Self { credential, client_nonce, client_first_bare, server_signature: None }
    }

    pub fn client_first(&self) -> Vec<u8> {
        format!("{GS2_HEADER}{}", self.client_first_bare).into_bytes()
    }

    pub fn client_final(&mut self, server_first: &[u8]) -> Result<Vec<u8>, DriverError> {
        let server_first = std::str::from_utf8(server_first).map_err(|_| self.error("server-first is not UTF-8"))?;
        let server_nonce = attribute(server_first, 'r').ok_or_else(|| self.error("server-first has no nonce"))?;
        if !server_nonce.starts_with(&self.client_nonce) {
            return Err(self.error("server nonce does not extend the client nonce"));
        }
        let salt = attribute(server_first, 's')
            .and_then(|salt| STANDARD.decode(salt).ok())
            .ok_or_else(|| self.error("server-first has no valid salt"))?;
        let iterations = attribute(server_first, 'i')
            .and_then(|iterations| iterations.parse::<u32>().ok())
            .filter(|iterations| *iterations >= MIN_ITERATIONS)
            .ok_or_else(|| self.error("server-first has no valid iteration count"))?;

        let mut salted_password = [0_u8; 32];
        pbkdf2::pbkdf2_hmac::<Sha256>(self.credential.password.as_bytes(), &salt, iterations, &mut salted_password);
        let client_key = self.hmac(&salted_password, b"Client Key")?;
        let stored_key: [u8; 32] = Sha256::digest(client_key).into();
        let without_proof = format!("c={CHANNEL_BINDING},r={server_nonce}");
        let auth_message = format!("{},{server_first},{without_proof}", self.client_first_bare);
        let client_signature = self.hmac(&stored_key, auth_message.as_bytes())?;
        let proof: Vec<u8> = client_key.iter().zip(client_signature.iter()).map(|(key, signature)| key ^ signature).collect();

        let server_key = self.hmac(&salted_password, b"Server Key")?;
        self.server_signature = Some(self.hmac(&server_key, auth_message.as_bytes())?);
        Ok(format!("{without_proof},p={}", STANDARD.encode(proof)).into_bytes())
    }

    pub fn verify_server_final(&self, server_final: &[u8]) -> Result<(), DriverError> {
        let server_final = std::str::from_utf8(server_final).map_err(|_| self.error("server-final is not UTF-8"))?;
        if let Some(error) = attribute(server_final, 'e') {
            return Err(self.error(&format!("server rejected the proof: {error}")));
        }
        let verifier = attribute(server_final, 'v')
            .and_then(|verifier| STANDARD.decode(verifier).ok())
            .ok_or_else(|| self.error("server-final has no verifier"))?;
        match self.server_signature {
            Some(expected) if verifier == expected => Ok(()),
            _ => Err(self.error("server signature mismatch")),
        }
    }

    fn hmac(&self, key: &[u8], message: &[u8]) -> Result<[u8; 32], DriverError> {
        let mut mac = HmacSha256::new_from_slice(key).map_err(|_| self.error("invalid HMAC key"))?;
        mac.update(message);
        Ok(mac.finalize().into_bytes().into())
    }

    fn error(&self, details: &str) -> DriverError {
        DriverError::Authentication { username: self.credential.username.clone(), details: details.to_owned() }
    }
}

fn sasl_name(username: &str) -> String {
    username.replace('=', "=3D").replace(',', "=2C")
}

fn attribute(message: &str, name: char) -> Option<&str> {
    message.split(',').find_map(|pair| pair.strip_prefix(name).and_then(|rest| rest.strip_prefix('=')))
}
