//! Error kinds shared by every component
//!
//! Each module keeps its own `thiserror` enum; [`ErrorKind`] is the coarse
//! classification callers branch on.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A transaction or block was rejected; ledger state is unchanged
    Validation,
    /// The wallet refused to build a request (funds, amount)
    Client,
    /// Malformed mnemonic or key material
    KeyDerivation,
    /// The ledger store failed; surfaced unchanged
    Store,
    /// Configuration file missing fields or holding invalid values
    Config,
    /// A long-running search was stopped by its caller
    Cancelled,
    /// Proof-of-work search ran out of nonces
    Exhausted,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Client => "client",
            ErrorKind::KeyDerivation => "key-derivation",
            ErrorKind::Store => "store",
            ErrorKind::Config => "config",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Exhausted => "exhausted",
        };
        f.write_str(name)
    }
}
