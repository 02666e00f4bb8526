// # Common Types
//
// Shared identifier aliases used across all PetraDB modules. Every
// subsystem refers to transactions and storage blocks through these
// aliases so the representation can be changed in one place.

/// Unique identifier for transactions
pub type TransactionId = u64;

/// Integer identifier of a storage block; the granularity of locking
pub type BlockAddress = u64;
