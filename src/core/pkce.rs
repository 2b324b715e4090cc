//! PKCE Generator
//!
//! RFC 7636 Proof Key for Code Exchange, S256 method.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Random bytes behind a verifier; encodes to 43 characters.
const VERIFIER_BYTES: usize = 32;

/// Challenge method sent with every authorization request.
pub const CODE_CHALLENGE_METHOD: &str = "S256";

/// Verifier/challenge pair for one authorization request.
#[derive(Clone)]
pub struct PkceParams {
    pub code_verifier: String,
    pub code_challenge: String,
}

impl std::fmt::Debug for PkceParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceParams")
            .field("code_verifier", &"[REDACTED]")
            .field("code_challenge", &self.code_challenge)
            .finish()
    }
}

/// PKCE generator interface (for dependency injection).
pub trait PkceGenerator: Send + Sync {
    /// Generate PKCE parameters.
    fn generate(&self) -> PkceParams;

    /// Compute challenge from verifier.
    fn compute_challenge(&self, verifier: &str) -> String {
        compute_s256_challenge(verifier)
    }
}

/// BASE64URL(SHA256(verifier)) without padding.
pub fn compute_s256_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// URL-safe random string from 32 bytes of OS randomness.
pub fn random_url_safe_string() -> String {
    let mut bytes = [0u8; VERIFIER_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Default PKCE generator implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPkceGenerator;

impl DefaultPkceGenerator {
    /// Create new PKCE generator.
    pub fn new() -> Self {
        Self
    }
}

impl PkceGenerator for DefaultPkceGenerator {
    fn generate(&self) -> PkceParams {
        let code_verifier = random_url_safe_string();
        let code_challenge = self.compute_challenge(&code_verifier);
        PkceParams {
            code_verifier,
            code_challenge,
        }
    }
}

/// Mock PKCE generator for testing.
#[derive(Default)]
pub struct MockPkceGenerator {
    next_verifier: std::sync::Mutex<Option<String>>,
    generate_history: std::sync::Mutex<Vec<PkceParams>>,
}

impl MockPkceGenerator {
    /// Create new mock PKCE generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the next verifier to generate.
    pub fn set_next_verifier(&self, verifier: impl Into<String>) -> &Self {
        *self.next_verifier.lock().unwrap() = Some(verifier.into());
        self
    }

    /// Get generate history.
    pub fn get_generate_history(&self) -> Vec<PkceParams> {
        self.generate_history.lock().unwrap().clone()
    }
}

impl PkceGenerator for MockPkceGenerator {
    fn generate(&self) -> PkceParams {
        let code_verifier = self
            .next_verifier
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| format!("mock-verifier-{:0>29}", rand::random::<u32>()));

        let params = PkceParams {
            code_challenge: self.compute_challenge(&code_verifier),
            code_verifier,
        };

        self.generate_history.lock().unwrap().push(params.clone());
        params
    }
}

/// Validate PKCE verifier format.
pub fn is_valid_verifier(verifier: &str) -> bool {
    let len = verifier.len();
    if !(43..=128).contains(&len) {
        return false;
    }

    verifier
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_' || c == '~')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pkce_generation() {
        let generator = DefaultPkceGenerator::new();
        let params = generator.generate();

        assert_eq!(params.code_verifier.len(), 43);
        assert!(is_valid_verifier(&params.code_verifier));
        assert_eq!(params.code_challenge, compute_s256_challenge(&params.code_verifier));
        assert!(!params.code_challenge.contains('='));
    }

    #[test]
    fn test_verifiers_are_unique() {
        let generator = DefaultPkceGenerator::new();
        assert_ne!(generator.generate().code_verifier, generator.generate().code_verifier);
    }

    #[test]
    fn test_pkce_s256_challenge() {
        // RFC 7636 appendix B
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(
            compute_s256_challenge(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_verifier_validation() {
        assert!(is_valid_verifier(
            "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"
        ));
        assert!(!is_valid_verifier("short"));
        assert!(!is_valid_verifier(
            "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOE!@#"
        ));
    }

    #[test]
    fn test_mock_pkce_generator() {
        let generator = MockPkceGenerator::new();
        generator.set_next_verifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");

        let params = generator.generate();
        assert_eq!(params.code_challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
        assert_eq!(generator.get_generate_history().len(), 1);
    }

    #[test]
    fn test_debug_redacts_verifier() {
        let params = DefaultPkceGenerator::new().generate();
        assert!(!format!("{:?}", params).contains(&params.code_verifier));
    }
}
