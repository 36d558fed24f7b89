//! Data model: checkout payloads and hash-linked ledger blocks.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// One book-checkout event, the payload of a block.
///
/// Field names are part of the hash pre-image (the payload is serialized to
/// JSON before hashing), so the serde renames below must never change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutEvent {
    #[serde(rename = "bookid")]
    pub book_id: String,
    pub user: String,
    pub checkout_date: String,
    /// True only for the bootstrap entry of a fresh chain.
    pub is_genesis: bool,
}

impl CheckoutEvent {
    /// The sentinel payload carried by every genesis block.
    pub fn genesis() -> Self {
        CheckoutEvent {
            book_id: String::new(),
            user: String::new(),
            checkout_date: String::new(),
            is_genesis: true,
        }
    }

    /// Canonical JSON form used in the hash pre-image.
    pub fn canonical_json(&self) -> String {
        // A struct of plain strings and a bool cannot fail to serialize.
        serde_json::to_string(self).expect("payload json")
    }
}

/// One immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Sequential position, 0 for genesis, +1 per block.
    pub position: u64,
    pub payload: CheckoutEvent,
    /// RFC 3339 creation time, fixed at construction.
    pub timestamp: String,
    /// SHA-256 hex over (position, timestamp, payload json, previous hash).
    pub hash: String,
    /// Predecessor's hash; empty string only for genesis.
    pub previous_hash: String,
}

impl Block {
    /// Construct the successor of `prev` carrying `payload`.
    pub fn next(prev: &Block, payload: CheckoutEvent) -> Block {
        let position = prev.position + 1;
        let timestamp = now_rfc3339();
        let hash = compute_hash(position, &timestamp, &payload.canonical_json(), &prev.hash);
        Block {
            position,
            payload,
            timestamp,
            hash,
            previous_hash: prev.hash.clone(),
        }
    }

    /// The fixed first block of a fresh chain. Hashed exactly like any other
    /// block so it stays independently verifiable.
    pub fn genesis() -> Block {
        let payload = CheckoutEvent::genesis();
        let timestamp = now_rfc3339();
        let hash = compute_hash(0, &timestamp, &payload.canonical_json(), "");
        Block {
            position: 0,
            payload,
            timestamp,
            hash,
            previous_hash: String::new(),
        }
    }

    /// Recompute this block's hash from its own fields.
    pub fn recompute_hash(&self) -> String {
        compute_hash(
            self.position,
            &self.timestamp,
            &self.payload.canonical_json(),
            &self.previous_hash,
        )
    }
}

/// Digest a block's fields in the fixed pre-image order: decimal position,
/// timestamp, serialized payload, previous hash. Lowercase hex output.
pub fn compute_hash(
    position: u64,
    timestamp: &str,
    payload_json: &str,
    previous_hash: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(position.to_string().as_bytes());
    hasher.update(timestamp.as_bytes());
    hasher.update(payload_json.as_bytes());
    hasher.update(previous_hash.as_bytes());
    hex::encode(hasher.finalize())
}

/// Current UTC time as RFC 3339 text (stable and sortable as text).
fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .expect("rfc3339 format")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(book_id: &str) -> CheckoutEvent {
        CheckoutEvent {
            book_id: book_id.into(),
            user: "alice".into(),
            checkout_date: "2024-01-01".into(),
            is_genesis: false,
        }
    }

    #[test]
    fn hashing_is_deterministic() {
        let payload = event("b1").canonical_json();
        let a = compute_hash(3, "2024-01-01T00:00:00Z", &payload, "abc");
        let b = compute_hash(3, "2024-01-01T00:00:00Z", &payload, "abc");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_eq!(a, a.to_lowercase());
    }

    #[test]
    fn any_field_change_alters_the_digest() {
        let payload = event("b1").canonical_json();
        let base = compute_hash(3, "2024-01-01T00:00:00Z", &payload, "abc");
        assert_ne!(base, compute_hash(4, "2024-01-01T00:00:00Z", &payload, "abc"));
        assert_ne!(base, compute_hash(3, "2024-01-01T00:00:01Z", &payload, "abc"));
        assert_ne!(
            base,
            compute_hash(3, "2024-01-01T00:00:00Z", &event("b2").canonical_json(), "abc")
        );
        assert_ne!(base, compute_hash(3, "2024-01-01T00:00:00Z", &payload, "abd"));
    }

    #[test]
    fn genesis_block_shape() {
        let g = Block::genesis();
        assert_eq!(g.position, 0);
        assert_eq!(g.previous_hash, "");
        assert!(g.payload.is_genesis);
        assert_eq!(g.recompute_hash(), g.hash);
    }

    #[test]
    fn next_block_links_to_its_predecessor() {
        let g = Block::genesis();
        let b = Block::next(&g, event("b1"));
        assert_eq!(b.position, 1);
        assert_eq!(b.previous_hash, g.hash);
        assert_eq!(b.recompute_hash(), b.hash);
        assert_eq!(b.payload.book_id, "b1");
    }

    #[test]
    fn payload_json_field_names_are_stable() {
        let json = event("b1").canonical_json();
        assert!(json.contains("\"bookid\""));
        assert!(json.contains("\"checkout_date\""));
        assert!(json.contains("\"is_genesis\""));
    }
}
