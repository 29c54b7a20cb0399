//! Cache key generation for AI risk scores

use sha2::{Digest, Sha256};

use crate::service::assessment::prompts::RISK_SCORING_SYSTEM_PROMPT;

/// Generate cache key hash for one AI scoring call
///
/// The key is based on:
/// - profile id and threat id
/// - the full prompt (which already embeds responses, context and exposure)
/// - prompt version (hash of the system prompt)
/// - model id
pub fn generate_score_cache_key(
    profile_id: &str,
    threat_id: &str,
    prompt: &str,
    model_id: &str,
) -> String {
    let prompt_version = hash_string(RISK_SCORING_SYSTEM_PROMPT);
    let prompt_hash = hash_string(prompt);

    let key_components = format!(
        "{}|{}|{}|{}|{}",
        profile_id, threat_id, prompt_hash, prompt_version, model_id
    );

    hash_string(&key_components)
}

/// Hash a string to a hex string using SHA256
fn hash_string(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_stable_and_sensitive() {
        let a = generate_score_cache_key("warehouse", "cargo_theft", "prompt", "gpt-4o-mini");
        let b = generate_score_cache_key("warehouse", "cargo_theft", "prompt", "gpt-4o-mini");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        assert_ne!(a, generate_score_cache_key("warehouse", "fire", "prompt", "gpt-4o-mini"));
        assert_ne!(a, generate_score_cache_key("warehouse", "cargo_theft", "prompt!", "gpt-4o-mini"));
        assert_ne!(a, generate_score_cache_key("warehouse", "cargo_theft", "prompt", "gpt-4o"));
    }

    #[test]
    fn test_hash_string_is_sha256_hex() {
        assert_eq!(
            hash_string(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
