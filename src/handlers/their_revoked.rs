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

//! §4.5 `TheirRevoked` handler. Penalty-transaction construction
//! (`handle_their_cheat`) is left unimplemented upstream; surfaced here as
//! a fatal internal error rather than invented (§9 open question), so a
//! revoked-commitment close fails loudly instead of silently forfeiting
//! the penalty.

use crate::error::Error;

pub fn handle_their_revoked(commit_num: u64) -> Result<(), Error> {
    Err(Error::internal(format!(
        "penalty-transaction construction for revoked commitment {} is not implemented \
         (handle_their_cheat, §9 open question)",
        commit_num
    )))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn revoked_close_is_a_fatal_surfaced_gap() {
        assert!(handle_their_revoked(42).is_err());
    }
}
