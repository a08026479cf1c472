//! Password hashing and verification using Argon2id
//!
//! Stored credentials are self-describing `$`-delimited strings carrying the
//! algorithm tag, version, cost parameters, salt and derived key. Verification
//! always re-derives with the parameters parsed out of the stored string, so
//! hashes created under older cost parameters keep verifying after an upgrade.

use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

/// Salt length in bytes
const SALT_LEN: usize = 16;

/// Derived key length in bytes
const KEY_LEN: usize = 32;

/// Argon2 cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Costs {
    /// Iterations (time cost)
    pub time: u32,
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Parallel lanes
    pub parallelism: u32,
}

impl Default for Argon2Costs {
    fn default() -> Self {
        Self {
            time: 3,
            memory_kib: 64 * 1024,
            parallelism: 2,
        }
    }
}

/// Password hashing errors
///
/// `Malformed` and `Mismatch` both mean "verification failed" to anything
/// above the service layer; the distinction exists for internal logging only.
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("entropy source failure: {0}")]
    Rand(String),

    #[error("key derivation failed")]
    Derivation,

    #[error("malformed stored credential")]
    Malformed,

    #[error("password does not match stored credential")]
    Mismatch,
}

/// Hash a password with the default cost parameters.
///
/// Salt randomness is the only non-determinism: two calls with the same
/// password never produce the same encoded string.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    hash_password_with_costs(password, Argon2Costs::default())
}

/// Hash a password with explicit cost parameters.
///
/// Exposed so operators can roll cost upgrades gradually; existing hashes
/// keep verifying because `compare_password` reads costs from the stored
/// string, never from the current defaults.
pub fn hash_password_with_costs(
    password: &str,
    costs: Argon2Costs,
) -> Result<String, PasswordError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|e| PasswordError::Rand(e.to_string()))?;

    let key = derive_key(password, &salt, costs)?;

    Ok(format!(
        "$argon2id$v=19$m={},t={},p={}${}${}",
        costs.memory_kib,
        costs.time,
        costs.parallelism,
        hex::encode(salt),
        hex::encode(key),
    ))
}

/// Verify a password against a stored encoded credential.
pub fn compare_password(password: &str, encoded: &str) -> Result<(), PasswordError> {
    let (costs, salt, stored_key_hex) = parse_encoded(encoded)?;

    let derived = derive_key(password, &salt, costs)?;

    // Textual comparison of the hex encodings matches the stored format
    // already in production; re-derivation dominates the timing.
    if hex::encode(derived) != stored_key_hex {
        return Err(PasswordError::Mismatch);
    }

    Ok(())
}

fn derive_key(
    password: &str,
    salt: &[u8],
    costs: Argon2Costs,
) -> Result<[u8; KEY_LEN], PasswordError> {
    let params = Params::new(costs.memory_kib, costs.time, costs.parallelism, Some(KEY_LEN))
        .map_err(|_| PasswordError::Malformed)?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = [0u8; KEY_LEN];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key)
        .map_err(|_| PasswordError::Derivation)?;

    Ok(key)
}

/// Split the stored string into costs, salt bytes and the stored key hex.
///
/// Expected shape: `$argon2id$v=19$m=..,t=..,p=..$<salt hex>$<key hex>`
fn parse_encoded(encoded: &str) -> Result<(Argon2Costs, Vec<u8>, String), PasswordError> {
    let fields: Vec<&str> = encoded.split('$').collect();
    if fields.len() != 6 || !fields[0].is_empty() || fields[1] != "argon2id" || fields[2] != "v=19"
    {
        return Err(PasswordError::Malformed);
    }

    let costs = parse_costs(fields[3]).ok_or(PasswordError::Malformed)?;
    let salt = hex::decode(fields[4]).map_err(|_| PasswordError::Malformed)?;

    // Validate the stored key is hex before comparing against it
    hex::decode(fields[5]).map_err(|_| PasswordError::Malformed)?;

    Ok((costs, salt, fields[5].to_string()))
}

/// Parse the `m=..,t=..,p=..` parameter field.
fn parse_costs(field: &str) -> Option<Argon2Costs> {
    let mut memory_kib = None;
    let mut time = None;
    let mut parallelism = None;

    for part in field.split(',') {
        let (key, value) = part.split_once('=')?;
        match key {
            "m" => memory_kib = value.parse().ok(),
            "t" => time = value.parse().ok(),
            "p" => parallelism = value.parse().ok(),
            _ => return None,
        }
    }

    Some(Argon2Costs {
        time: time?,
        memory_kib: memory_kib?,
        parallelism: parallelism?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let password = "TestPassword123!";

        let hash = hash_password(password).unwrap();
        compare_password(password, &hash).unwrap();
    }

    #[test]
    fn test_encoded_shape() {
        let hash = hash_password("secret").unwrap();
        assert!(hash.starts_with("$argon2id$v=19$m=65536,t=3,p=2$"));
        assert_eq!(hash.split('$').count(), 6);
    }

    #[test]
    fn test_hash_is_different_each_time() {
        let password = "TestPassword123!";

        let hash1 = hash_password(password).unwrap();
        let hash2 = hash_password(password).unwrap();

        // Hashes differ through the salt, but both verify
        assert_ne!(hash1, hash2);
        compare_password(password, &hash1).unwrap();
        compare_password(password, &hash2).unwrap();
    }

    #[test]
    fn test_verify_fails_with_wrong_password() {
        let hash = hash_password("TestPassword123!").unwrap();
        let err = compare_password("WrongPassword", &hash).unwrap_err();
        assert!(matches!(err, PasswordError::Mismatch));
    }

    #[test]
    fn test_corrupted_hash_is_malformed() {
        // Too few fields
        let err = compare_password("pw", "$argon2id$v=19$m=65536,t=3,p=2$abcd").unwrap_err();
        assert!(matches!(err, PasswordError::Malformed));

        // Bad parameter field
        let err =
            compare_password("pw", "$argon2id$v=19$m=65536,t=3$aabb$ccdd").unwrap_err();
        assert!(matches!(err, PasswordError::Malformed));

        // Non-hex salt
        let err =
            compare_password("pw", "$argon2id$v=19$m=65536,t=3,p=2$zzzz$ccdd").unwrap_err();
        assert!(matches!(err, PasswordError::Malformed));
    }

    #[test]
    fn test_old_cost_parameters_still_verify() {
        let legacy = Argon2Costs {
            time: 2,
            memory_kib: 32 * 1024,
            parallelism: 1,
        };

        let hash = hash_password_with_costs("TestPassword123!", legacy).unwrap();
        assert!(hash.contains("m=32768,t=2,p=1"));

        // Verification uses the stored parameters, not the current defaults
        compare_password("TestPassword123!", &hash).unwrap();
    }
}
