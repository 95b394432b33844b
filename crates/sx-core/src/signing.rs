//! Canonical plan encoding and cryptographic attestation.
//!
//! An approved plan is serialized with deterministic key ordering and
//! signed with RSA-PSS over SHA-256 (randomized padding). The resulting
//! [`SignedPlan`] is the only artifact ever handed to remediation
//! primitives or shipped to a remote enforcement agent.

use crate::plan::CandidatePlan;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rsa::pss::{BlindedSigningKey, Signature, VerifyingKey};
use rsa::sha2::Sha256;
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// RSA modulus size used for generated signing keys.
pub const SIGNING_KEY_BITS: usize = 2048;

/// Errors from signing and verification.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("plan canonicalization failed: {0}")]
    Canonicalization(#[from] serde_json::Error),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("signature is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("signature verification failed")]
    Verification,
}

/// A canonicalized plan plus its detached signature, base64-encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedPlan {
    /// The plan, re-encoded with sorted keys when serialized.
    pub plan: CandidatePlan,
    /// RSA-PSS/SHA-256 signature over the canonical plan bytes.
    pub signature: String,
}

/// Canonical byte encoding of a plan: JSON with lexicographically sorted
/// object keys.
///
/// serde_json's default map type is ordered, so routing the plan through
/// `Value` yields the key-sorted encoding. The `preserve_order` feature
/// must not be enabled on serde_json or this property is lost.
pub fn canonical_bytes(plan: &CandidatePlan) -> Result<Vec<u8>, SigningError> {
    let value = serde_json::to_value(plan)?;
    Ok(serde_json::to_vec(&value)?)
}

/// Holds the private half of the attestation keypair and produces
/// [`SignedPlan`] artifacts.
pub struct PlanSigner {
    key: RsaPrivateKey,
}

impl PlanSigner {
    /// Generates a fresh keypair. Key material lives only for the process
    /// lifetime; a restart re-keys the installation.
    pub fn generate() -> Result<Self, SigningError> {
        Self::generate_with_bits(SIGNING_KEY_BITS)
    }

    /// Generates a keypair with an explicit modulus size.
    pub fn generate_with_bits(bits: usize) -> Result<Self, SigningError> {
        let mut rng = rand::thread_rng();
        let key = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| SigningError::KeyGeneration(e.to_string()))?;
        info!(bits, "Generated plan signing keypair");
        Ok(Self { key })
    }

    /// Wraps an existing private key.
    pub fn new(key: RsaPrivateKey) -> Self {
        Self { key }
    }

    /// The public half, for distribution to verifying agents.
    pub fn public_key(&self) -> RsaPublicKey {
        self.key.to_public_key()
    }

    /// Signs the canonical encoding of a plan.
    pub fn sign(&self, plan: &CandidatePlan) -> Result<SignedPlan, SigningError> {
        let message = canonical_bytes(plan)?;
        let signing_key = BlindedSigningKey::<Sha256>::new(self.key.clone());
        let mut rng = rand::thread_rng();
        let signature = signing_key.sign_with_rng(&mut rng, &message);
        Ok(SignedPlan {
            plan: plan.clone(),
            signature: BASE64.encode(signature.to_bytes()),
        })
    }
}

/// Verifies a signed plan against the given public key.
///
/// Succeeds only if the signature matches the canonical encoding of
/// `signed.plan` exactly; any altered byte invalidates it.
pub fn verify_signed_plan(
    public_key: &RsaPublicKey,
    signed: &SignedPlan,
) -> Result<(), SigningError> {
    let message = canonical_bytes(&signed.plan)?;
    let raw = BASE64.decode(&signed.signature)?;
    let signature = Signature::try_from(raw.as_slice()).map_err(|_| SigningError::Verification)?;
    let verifying_key = VerifyingKey::<Sha256>::new(public_key.clone());
    verifying_key
        .verify(&message, &signature)
        .map_err(|_| SigningError::Verification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ThreatKind;
    use crate::plan::{Action, ActionCommand, Severity};
    use std::collections::HashMap;

    // 1024-bit keys keep the test suite fast; production keys are 2048.
    fn test_signer() -> PlanSigner {
        PlanSigner::generate_with_bits(1024).unwrap()
    }

    fn test_plan() -> CandidatePlan {
        CandidatePlan {
            plan_id: "plan-sign-test".to_string(),
            case_id: "case-1".to_string(),
            generated_by: "expert".to_string(),
            threat_type: ThreatKind::FilelessAttack,
            severity: Severity::Critical,
            confidence: 0.9,
            actions: vec![Action {
                id: "a1".to_string(),
                command: ActionCommand::KillProcess,
                params: HashMap::from([("pid".to_string(), serde_json::json!(555))]),
                priority: 10,
            }],
        }
    }

    #[test]
    fn test_canonical_bytes_sorted_and_stable() {
        let plan = test_plan();
        let first = canonical_bytes(&plan).unwrap();
        let second = canonical_bytes(&plan).unwrap();
        assert_eq!(first, second);

        // Keys of the top-level object appear in sorted order.
        let text = String::from_utf8(first).unwrap();
        let actions_pos = text.find("\"actions\"").unwrap();
        let threat_pos = text.find("\"threat_type\"").unwrap();
        let case_pos = text.find("\"case_id\"").unwrap();
        assert!(actions_pos < case_pos);
        assert!(case_pos < threat_pos);
    }

    #[test]
    fn test_sign_verify_round_trip() {
        let signer = test_signer();
        let signed = signer.sign(&test_plan()).unwrap();
        verify_signed_plan(&signer.public_key(), &signed).unwrap();
    }

    #[test]
    fn test_tampered_plan_fails_verification() {
        let signer = test_signer();
        let mut signed = signer.sign(&test_plan()).unwrap();
        signed.plan.confidence = 0.1;

        assert!(matches!(
            verify_signed_plan(&signer.public_key(), &signed),
            Err(SigningError::Verification)
        ));
    }

    #[test]
    fn test_tampered_action_param_fails_verification() {
        let signer = test_signer();
        let mut signed = signer.sign(&test_plan()).unwrap();
        signed.plan.actions[0]
            .params
            .insert("pid".to_string(), serde_json::json!(1));

        assert!(verify_signed_plan(&signer.public_key(), &signed).is_err());
    }

    #[test]
    fn test_wrong_key_fails_verification() {
        let signer = test_signer();
        let other = test_signer();
        let signed = signer.sign(&test_plan()).unwrap();

        assert!(verify_signed_plan(&other.public_key(), &signed).is_err());
    }

    #[test]
    fn test_randomized_padding_varies_signature() {
        let signer = test_signer();
        let plan = test_plan();
        let first = signer.sign(&plan).unwrap();
        let second = signer.sign(&plan).unwrap();

        // PSS salts are random, so two signings differ but both verify.
        assert_ne!(first.signature, second.signature);
        verify_signed_plan(&signer.public_key(), &first).unwrap();
        verify_signed_plan(&signer.public_key(), &second).unwrap();
    }

    #[test]
    fn test_garbage_signature_rejected() {
        let signer = test_signer();
        let mut signed = signer.sign(&test_plan()).unwrap();
        signed.signature = "not-base64!!!".to_string();
        assert!(matches!(
            verify_signed_plan(&signer.public_key(), &signed),
            Err(SigningError::Encoding(_))
        ));
    }
}
