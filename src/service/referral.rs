use rand::{rngs::OsRng, TryRngCore};
use thiserror::Error;
use uuid::Builder;

#[derive(Debug, Error)]
pub enum CodeGenError {
    #[error("Entropy source failed: {0}")]
    Entropy(String),
}

/// Issues reward codes. Implementations must not repeat a code and must not
/// need coordination between concurrent callers.
pub trait CodeGenerator: Send + Sync {
    fn next_code(&self) -> Result<String, CodeGenError>;
}

/// 122 random bits from the OS entropy source, rendered as a v4 UUID.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn next_code(&self) -> Result<String, CodeGenError> {
        let mut bytes = [0u8; 16];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| CodeGenError::Entropy(e.to_string()))?;

        Ok(Builder::from_random_bytes(bytes).into_uuid().to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_codes_are_unique_v4_uuids() {
        let codes: HashSet<String> = (0..10_000)
            .map(|_| RandomCodeGenerator.next_code().unwrap())
            .collect();

        assert_eq!(codes.len(), 10_000);
        for code in codes.iter().take(10) {
            let parsed = uuid::Uuid::parse_str(code).unwrap();
            assert_eq!(parsed.get_version_num(), 4);
        }
    }

    #[test]
    fn test_concurrent_callers_do_not_collide() {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                std::thread::spawn(|| {
                    (0..1_000)
                        .map(|_| RandomCodeGenerator.next_code().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let all: HashSet<String> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();

        assert_eq!(all.len(), 4_000);
    }
}
