/*!
Key derivation and key confirmation.

HKDF-SHA256 expands the Diffie-Hellman output into the session key
schedule; HMAC-SHA256 binds the handshake transcript to the derived
master key.
*/

use crate::{
    constants::sizes,
    error::{Error, Result},
    security::constant_time::constant_time_eq,
};

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Derived 32-byte symmetric key, wiped on drop
pub type DerivedKey = Zeroizing<[u8; sizes::chacha::KEY_SIZE]>;

/// Expand `ikm` into `okm` under the given salt and info components
pub fn hkdf_expand(ikm: &[u8], salt: Option<&[u8]>, info: &[&[u8]], okm: &mut [u8]) -> Result<()> {
    let hkdf = Hkdf::<Sha256>::new(salt, ikm);
    hkdf.expand_multi_info(info, okm)
        .map_err(|e| Error::Crypto(format!("HKDF key derivation failed: {}", e)))
}

/// Derive a 32-byte key
pub fn derive_key(ikm: &[u8], salt: Option<&[u8]>, info: &[&[u8]]) -> Result<DerivedKey> {
    let mut okm = Zeroizing::new([0u8; sizes::chacha::KEY_SIZE]);
    hkdf_expand(ikm, salt, info, &mut okm[..])?;
    Ok(okm)
}

/// Derive a 32-bit value (session ids, initial sequence numbers)
pub fn derive_u32(ikm: &[u8], salt: Option<&[u8]>, info: &[&[u8]]) -> Result<u32> {
    let mut okm = [0u8; 4];
    hkdf_expand(ikm, salt, info, &mut okm)?;
    Ok(u32::from_be_bytes(okm))
}

/// HMAC-SHA256 over the concatenation of `parts`
pub fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> Result<[u8; sizes::MAC_SIZE]> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|_| Error::Crypto("HMAC key rejected".into()))?;
    for part in parts {
        mac.update(part);
    }
    let mut tag = [0u8; sizes::MAC_SIZE];
    tag.copy_from_slice(&mac.finalize().into_bytes());
    Ok(tag)
}

/// Check a key confirmation tag in constant time
pub fn verify_hmac(key: &[u8], parts: &[&[u8]], tag: &[u8]) -> Result<()> {
    let expected = hmac_sha256(key, parts)?;
    if constant_time_eq(&expected, tag) {
        Ok(())
    } else {
        Err(Error::AuthenticationFailed)
    }
}
