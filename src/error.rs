// LNP/BP Core Library implementing LNPBP specifications & standards
// Written in 2020-2022 by
//     Dr. Maxim Orlovsky <orlovsky@pandoracore.com>
//
// To the extent possible under law, the author(s) have dedicated all
// copyright and related and neighboring rights to this software to
// the public domain worldwide. This software is distributed without
// any warranty.
//
// You should have received a copy of the MIT License
// along with this software.
// If not, see <https://opensource.org/licenses/MIT>.

//! Error kinds used both to categorize the subprocess exit status reported
//! to the parent and for logging. There is no local recovery: every variant
//! here is fatal and terminates the process (§7).

use crate::wire::WireError;

/// Top-level error of the on-chain resolution engine. All three kinds
/// terminate the subprocess; the parent is expected to restart it from
/// persisted channel state rather than rely on in-process recovery.
#[derive(Clone, PartialEq, Eq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum Error {
    /// the parent delivered a malformed or unexpected message: {0}
    BadCommand(String),

    /// internal protocol invariant violated: {0}
    InternalError(String),

    /// key derivation or signature operation failed: {0}
    CryptoFailed(String),
}

impl Error {
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::InternalError(msg.into())
    }

    pub fn crypto(msg: impl Into<String>) -> Self {
        Error::CryptoFailed(msg.into())
    }

    pub fn bad_command(msg: impl Into<String>) -> Self {
        Error::BadCommand(msg.into())
    }
}

impl From<WireError> for Error {
    fn from(err: WireError) -> Self {
        Error::BadCommand(err.to_string())
    }
}

impl From<secp256k1::Error> for Error {
    fn from(err: secp256k1::Error) -> Self {
        Error::CryptoFailed(err.to_string())
    }
}
