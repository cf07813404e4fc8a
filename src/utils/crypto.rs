use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};

pub fn calculate_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Random object name for the media store, e.g. `ssv_3kQd...`.
pub fn generate_asset_id() -> String {
    let key: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(20)
        .map(char::from)
        .collect();

    format!("ssv_{}", key)
}

/// Signature for media CDN requests: parameters sorted by name, joined as
/// `a=1&b=2`, with the API secret appended before hashing.
pub fn sign_params(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    calculate_sha256(format!("{}{}", joined, api_secret).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_calculation() {
        assert_eq!(
            calculate_sha256(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_asset_id_format() {
        let a = generate_asset_id();
        let b = generate_asset_id();
        assert!(a.starts_with("ssv_"));
        assert_eq!(a.len(), 24);
        assert_ne!(a, b);
    }

    #[test]
    fn test_signature_ignores_param_order() {
        let first = sign_params(&[("timestamp", "10".to_string()), ("public_id", "x".to_string())], "s");
        let second = sign_params(&[("public_id", "x".to_string()), ("timestamp", "10".to_string())], "s");
        assert_eq!(first, second);
        assert_eq!(first, calculate_sha256(b"public_id=x&timestamp=10s"));
        assert_ne!(first, sign_params(&[("public_id", "x".to_string())], "other"));
    }
}
