use crate::db::LinkRepository;
use crate::error::{AppError, AppResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Character set for generating short codes.
const ALPHABET_CHARS: &[char] = &[
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M',
    'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm',
    'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

/// Length of hash-based short codes.
pub const HASH_CODE_LENGTH: usize = 8;

/// Length of secure short codes.
pub const SECURE_CODE_LENGTH: usize = 12;

/// Service for generating short codes.
pub struct ShortCodeService;

impl ShortCodeService {
    /// Random base62 code of the given length.
    pub fn random(length: usize) -> String {
        nanoid::nanoid!(length, ALPHABET_CHARS)
    }

    /// Deterministic code: URL-safe base64 of the SHA-256 of `url`, truncated.
    pub fn hash(url: &str) -> String {
        let digest = Sha256::digest(url.as_bytes());
        let mut encoded = URL_SAFE_NO_PAD.encode(digest);
        encoded.truncate(HASH_CODE_LENGTH);
        encoded
    }

    /// Keyed, non-reversible code over `url` and a fresh random nonce.
    ///
    /// Two calls with the same URL produce different codes.
    pub fn secure(url: &str, secret: &[u8]) -> AppResult<String> {
        let nonce: [u8; 16] = rand::random();

        let mut mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| AppError::Internal(format!("Invalid secret key: {}", e)))?;
        mac.update(url.as_bytes());
        mac.update(&nonce);

        let mut encoded = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        encoded.truncate(SECURE_CODE_LENGTH);
        Ok(encoded)
    }

    /// Generate a unique short code that doesn't already exist in the repository.
    ///
    /// # Arguments
    ///
    /// * `max_attempts` - Maximum number of attempts to generate a unique code
    /// * `repository` - Repository to check for existing codes
    /// * `generate` - Produces one candidate code per call
    ///
    /// # Errors
    ///
    /// Returns `AppError::ShortCodeGenerationFailed` if unable to generate a unique
    /// code within the specified number of attempts.
    pub async fn generate_unique<F>(
        max_attempts: u32,
        repository: &dyn LinkRepository,
        mut generate: F,
    ) -> AppResult<String>
    where
        F: FnMut() -> AppResult<String> + Send,
    {
        for _ in 0..max_attempts {
            let code = generate()?;

            if !repository.short_code_exists(&code).await? {
                return Ok(code);
            }
        }

        Err(AppError::ShortCodeGenerationFailed)
    }
}

/// Join a base URL and a short code with exactly one slash.
pub fn format_short_url(base_url: &str, short_code: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        short_code.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockLinkRepository;

    #[test]
    fn test_alphabet_chars_const() {
        // Verify the alphabet has 62 characters (0-9, A-Z, a-z)
        assert_eq!(ALPHABET_CHARS.len(), 62);
    }

    #[test]
    fn test_alphabet_chars_unique() {
        let unique: std::collections::HashSet<_> = ALPHABET_CHARS.iter().collect();
        assert_eq!(unique.len(), ALPHABET_CHARS.len());
    }

    #[test]
    fn test_random_code_uses_alphabet() {
        let code = ShortCodeService::random(8);
        assert_eq!(code.chars().count(), 8);
        assert!(code.chars().all(|c| ALPHABET_CHARS.contains(&c)));
    }

    #[test]
    fn test_hash_code_is_deterministic() {
        let a = ShortCodeService::hash("https://example.com");
        let b = ShortCodeService::hash("https://example.com");
        let c = ShortCodeService::hash("https://example.org");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), HASH_CODE_LENGTH);
        assert!(a
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'));
    }

    #[test]
    fn test_secure_code_varies_per_call() {
        let secret = b"0123456789abcdef0123456789abcdef";
        let a = ShortCodeService::secure("https://example.com", secret).unwrap();
        let b = ShortCodeService::secure("https://example.com", secret).unwrap();

        assert_eq!(a.len(), SECURE_CODE_LENGTH);
        assert_ne!(a, b);
    }

    #[test]
    fn test_format_short_url_normalizes_slashes() {
        assert_eq!(
            format_short_url("http://localhost:8090/", "/abc"),
            "http://localhost:8090/abc"
        );
        assert_eq!(format_short_url("https://sh.rt", "abc"), "https://sh.rt/abc");
        assert_eq!(format_short_url("https://sh.rt///", "abc"), "https://sh.rt/abc");
    }

    #[tokio::test]
    async fn test_generate_unique_retries_on_collision() {
        let mut repository = MockLinkRepository::new();
        let mut seq = mockall::Sequence::new();
        repository
            .expect_short_code_exists()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(true));
        repository
            .expect_short_code_exists()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(false));

        let mut candidates = vec!["second", "first"];
        let code = ShortCodeService::generate_unique(5, &repository, || {
            Ok(candidates.pop().unwrap_or("extra").to_string())
        })
        .await
        .unwrap();

        assert_eq!(code, "second");
    }

    #[tokio::test]
    async fn test_generate_unique_gives_up() {
        let mut repository = MockLinkRepository::new();
        repository
            .expect_short_code_exists()
            .times(3)
            .returning(|_| Ok(true));

        let result =
            ShortCodeService::generate_unique(3, &repository, || Ok("taken".to_string())).await;

        assert!(matches!(result, Err(AppError::ShortCodeGenerationFailed)));
    }
}
