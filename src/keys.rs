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

//! BOLT-3 per-commitment key derivation (§3 "KeySet", §4.3/§4.4). The
//! script & signing primitives themselves are out of scope (§1); this
//! module supplies the small set of elliptic-curve operations BOLT-3 uses
//! to turn a basepoint plus a per-commitment point into the actual key used
//! in a given commitment transaction.

use bitcoin::hashes::{sha256, Hash, HashEngine};
use bitcoin::secp256k1::{PublicKey, Scalar, SecretKey, Secp256k1, Signing};

use crate::error::Error;

fn sha256_pubkeys(a: &PublicKey, b: &PublicKey) -> [u8; 32] {
    let mut engine = sha256::Hash::engine();
    engine.input(&a.serialize());
    engine.input(&b.serialize());
    sha256::Hash::from_engine(engine).into_inner()
}

/// `pubkey = basepoint + SHA256(per_commitment_point || basepoint) * G`
///
/// Used for `localpubkey`, `local_delayedpubkey`, `local_htlcpubkey` and
/// their remote counterparts.
pub fn derive_pubkey<C: Signing>(
    secp: &Secp256k1<C>,
    basepoint: &PublicKey,
    per_commitment_point: &PublicKey,
) -> Result<PublicKey, Error> {
    let hash = sha256_pubkeys(per_commitment_point, basepoint);
    let tweak_point = PublicKey::from_secret_key(
        secp,
        &SecretKey::from_slice(&hash).map_err(|e| Error::crypto(e.to_string()))?,
    );
    basepoint
        .combine(&tweak_point)
        .map_err(|e| Error::crypto(e.to_string()))
}

/// `privkey = basepoint_secret + SHA256(per_commitment_point || basepoint)`
pub fn derive_privkey<C: Signing>(
    secp: &Secp256k1<C>,
    basepoint_secret: &SecretKey,
    per_commitment_point: &PublicKey,
) -> Result<SecretKey, Error> {
    let basepoint = PublicKey::from_secret_key(secp, basepoint_secret);
    let hash = sha256_pubkeys(per_commitment_point, &basepoint);
    let tweak = Scalar::from_be_bytes(hash).map_err(|e| Error::crypto(e.to_string()))?;
    basepoint_secret
        .add_tweak(&tweak)
        .map_err(|e| Error::crypto(e.to_string()))
}

/// BOLT-3 `revocationpubkey`:
///
/// ```text
/// revocationpubkey = revocation_basepoint * SHA256(revocation_basepoint || per_commitment_point)
///                   + per_commitment_point * SHA256(per_commitment_point || revocation_basepoint)
/// ```
pub fn derive_revocation_pubkey<C: Signing>(
    secp: &Secp256k1<C>,
    revocation_basepoint: &PublicKey,
    per_commitment_point: &PublicKey,
) -> Result<PublicKey, Error> {
    let hash1 = sha256_pubkeys(revocation_basepoint, per_commitment_point);
    let scalar1 = Scalar::from_be_bytes(hash1).map_err(|e| Error::crypto(e.to_string()))?;
    let component1 = revocation_basepoint
        .mul_tweak(secp, &scalar1)
        .map_err(|e| Error::crypto(e.to_string()))?;

    let hash2 = sha256_pubkeys(per_commitment_point, revocation_basepoint);
    let scalar2 = Scalar::from_be_bytes(hash2).map_err(|e| Error::crypto(e.to_string()))?;
    let component2 = per_commitment_point
        .mul_tweak(secp, &scalar2)
        .map_err(|e| Error::crypto(e.to_string()))?;

    component1
        .combine(&component2)
        .map_err(|e| Error::crypto(e.to_string()))
}

/// BOLT-3 `revocationprivkey`, mirroring [`derive_revocation_pubkey`] in the
/// secret-key domain. Only meaningful when we hold
/// `per_commitment_secret` — i.e. for a revoked *counterparty* commitment,
/// which this engine does not yet construct a penalty transaction for
/// (§4.5, open question). Kept here because the operation itself is a
/// KeySet primitive independent of that open question.
pub fn derive_revocation_privkey<C: Signing>(
    secp: &Secp256k1<C>,
    revocation_basepoint_secret: &SecretKey,
    per_commitment_secret: &SecretKey,
) -> Result<SecretKey, Error> {
    let revocation_basepoint = PublicKey::from_secret_key(secp, revocation_basepoint_secret);
    let per_commitment_point = PublicKey::from_secret_key(secp, per_commitment_secret);

    let hash1 = sha256_pubkeys(&revocation_basepoint, &per_commitment_point);
    let scalar1 = Scalar::from_be_bytes(hash1).map_err(|e| Error::crypto(e.to_string()))?;
    let key1 = revocation_basepoint_secret
        .mul_tweak(&scalar1)
        .map_err(|e| Error::crypto(e.to_string()))?;

    let hash2 = sha256_pubkeys(&per_commitment_point, &revocation_basepoint);
    let scalar2 = Scalar::from_be_bytes(hash2).map_err(|e| Error::crypto(e.to_string()))?;
    let key2 = per_commitment_secret
        .mul_tweak(&scalar2)
        .map_err(|e| Error::crypto(e.to_string()))?;

    let key2_scalar =
        Scalar::from_be_bytes(key2.secret_bytes()).map_err(|e| Error::crypto(e.to_string()))?;
    key1.add_tweak(&key2_scalar)
        .map_err(|e| Error::crypto(e.to_string()))
}

/// Derives the per-commitment point for `commitment_number` from the 32-byte
/// channel commitment seed, by hashing down from a high starting index the
/// same way BOLT-3's shachain generator does, then converting the resulting
/// secret to its public point.
///
/// The seed itself is the `commitment_seed` handed to us in `onchain_init`
/// (§6); the per-commitment *secret* derivation (seed -> secret for index)
/// is the inverse operation of [`crate::shachain::Shachain`]'s storage: here
/// we are the *producer* of our own secrets, so we derive directly from the
/// seed rather than from previously-revealed values.
pub fn per_commitment_secret(seed: &[u8; 32], index: u64) -> [u8; 32] {
    let mut secret = *seed;
    for bit in (0..48).rev() {
        if index & (1 << bit) != 0 {
            secret[bit / 8] ^= 1 << (7 - bit % 8);
            secret = sha256::Hash::hash(&secret).into_inner();
        }
    }
    secret
}

pub fn per_commitment_point<C: Signing>(
    secp: &Secp256k1<C>,
    seed: &[u8; 32],
    index: u64,
) -> Result<PublicKey, Error> {
    let secret = per_commitment_secret(seed, index);
    let sk = SecretKey::from_slice(&secret).map_err(|e| Error::crypto(e.to_string()))?;
    Ok(PublicKey::from_secret_key(secp, &sk))
}

/// Index tagging which of our own basepoint secrets to derive from the
/// channel seed (§6 "channel seed"). `onchain_init` carries only
/// basepoints as public keys plus the seed itself; the seed is the single
/// root from which this engine re-derives whichever of our own private
/// basepoints a handler needs to sign with, mirroring how the commitment
/// seed already doubles as the root for per-commitment secrets.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum BasepointIndex {
    Revocation = 0,
    Payment = 1,
    DelayedPayment = 2,
    Htlc = 3,
}

/// Derives the secret key for one of our own basepoints from the channel
/// seed (see [`BasepointIndex`]).
pub fn derive_basepoint_secret(seed: &[u8; 32], index: BasepointIndex) -> Result<SecretKey, Error> {
    let mut engine = sha256::Hash::engine();
    engine.input(b"basepoint");
    engine.input(seed);
    engine.input(&[index as u8]);
    let hash = sha256::Hash::from_engine(engine);
    SecretKey::from_slice(&hash.into_inner()).map_err(|e| Error::crypto(e.to_string()))
}

/// Set of keys used by one side in one particular commitment transaction
/// (§3 "KeySet"). BOLT-3 names are kept verbatim as contract terms.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct KeySet {
    pub self_revocation_key: PublicKey,
    pub self_delayed_payment_key: PublicKey,
    pub self_payment_key: PublicKey,
    pub other_payment_key: PublicKey,
}

impl KeySet {
    /// Derives the full keyset for a commitment held by `self`, given our
    /// own basepoints, the counterparty's revocation basepoint (needed for
    /// the to-local script even though we can never exercise that path
    /// ourselves), and the per-commitment point for this commitment number.
    pub fn derive<C: Signing>(
        secp: &Secp256k1<C>,
        self_delayed_payment_basepoint: &PublicKey,
        self_payment_basepoint: &PublicKey,
        other_payment_basepoint: &PublicKey,
        other_revocation_basepoint: &PublicKey,
        per_commitment_point: &PublicKey,
    ) -> Result<Self, Error> {
        Ok(KeySet {
            self_revocation_key: derive_revocation_pubkey(
                secp,
                other_revocation_basepoint,
                per_commitment_point,
            )?,
            self_delayed_payment_key: derive_pubkey(
                secp,
                self_delayed_payment_basepoint,
                per_commitment_point,
            )?,
            self_payment_key: derive_pubkey(secp, self_payment_basepoint, per_commitment_point)?,
            other_payment_key: derive_pubkey(
                secp,
                other_payment_basepoint,
                per_commitment_point,
            )?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn secp() -> Secp256k1<secp256k1::All> {
        Secp256k1::new()
    }

    #[test]
    fn derive_pubkey_matches_privkey() {
        let secp = secp();
        let basepoint_secret = SecretKey::from_slice(&[0x11; 32]).unwrap();
        let basepoint = PublicKey::from_secret_key(&secp, &basepoint_secret);
        let per_commitment_secret = SecretKey::from_slice(&[0x22; 32]).unwrap();
        let per_commitment_point = PublicKey::from_secret_key(&secp, &per_commitment_secret);

        let pubkey = derive_pubkey(&secp, &basepoint, &per_commitment_point).unwrap();
        let privkey = derive_privkey(&secp, &basepoint_secret, &per_commitment_point).unwrap();
        assert_eq!(pubkey, PublicKey::from_secret_key(&secp, &privkey));
    }

    #[test]
    fn per_commitment_point_is_deterministic() {
        let secp = secp();
        let seed = [0x7au8; 32];
        let p1 = per_commitment_point(&secp, &seed, 41).unwrap();
        let p2 = per_commitment_point(&secp, &seed, 41).unwrap();
        assert_eq!(p1, p2);
        let p3 = per_commitment_point(&secp, &seed, 40).unwrap();
        assert_ne!(p1, p3);
    }

    #[test]
    fn derive_revocation_pubkey_matches_privkey() {
        let secp = secp();
        let revocation_basepoint_secret = SecretKey::from_slice(&[0x33; 32]).unwrap();
        let revocation_basepoint = PublicKey::from_secret_key(&secp, &revocation_basepoint_secret);
        let per_commitment_secret = SecretKey::from_slice(&[0x44; 32]).unwrap();
        let per_commitment_point = PublicKey::from_secret_key(&secp, &per_commitment_secret);

        let pubkey =
            derive_revocation_pubkey(&secp, &revocation_basepoint, &per_commitment_point).unwrap();
        let privkey =
            derive_revocation_privkey(&secp, &revocation_basepoint_secret, &per_commitment_secret).unwrap();
        assert_eq!(pubkey, PublicKey::from_secret_key(&secp, &privkey));
    }

    #[test]
    fn keyset_derive_matches_individual_derivations() {
        let secp = secp();
        let self_delayed = SecretKey::from_slice(&[0x51; 32]).unwrap();
        let self_payment = SecretKey::from_slice(&[0x52; 32]).unwrap();
        let other_payment = SecretKey::from_slice(&[0x53; 32]).unwrap();
        let other_revocation = SecretKey::from_slice(&[0x54; 32]).unwrap();
        let per_commitment_secret = SecretKey::from_slice(&[0x55; 32]).unwrap();
        let per_commitment_point = PublicKey::from_secret_key(&secp, &per_commitment_secret);

        let keyset = KeySet::derive(
            &secp,
            &PublicKey::from_secret_key(&secp, &self_delayed),
            &PublicKey::from_secret_key(&secp, &self_payment),
            &PublicKey::from_secret_key(&secp, &other_payment),
            &PublicKey::from_secret_key(&secp, &other_revocation),
            &per_commitment_point,
        )
        .unwrap();

        assert_eq!(
            keyset.self_delayed_payment_key,
            derive_pubkey(&secp, &PublicKey::from_secret_key(&secp, &self_delayed), &per_commitment_point).unwrap()
        );
        assert_eq!(
            keyset.other_payment_key,
            derive_pubkey(&secp, &PublicKey::from_secret_key(&secp, &other_payment), &per_commitment_point).unwrap()
        );
    }
}
