/*
[INPUT]:  Operating system randomness via UUID v4
[OUTPUT]: Opaque, unguessable correlation tokens
[POS]:    Auth layer - correlation token generation
[UPDATE]: When token length or hashing changes
*/

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::types::CorrelationToken;

/// Generate a fresh correlation token.
///
/// 122 random bits from a v4 UUID, hashed with SHA-256 and hex encoded so the
/// token carries no ordering information.
pub fn generate_token() -> CorrelationToken {
    let id = Uuid::new_v4();
    let digest = Sha256::digest(id.to_string().as_bytes());
    CorrelationToken::new(hex::encode(digest))
}
