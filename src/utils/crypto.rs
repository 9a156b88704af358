// src/utils/crypto.rs
//! Cryptographic encoding helpers for Fabric identities.
//!
//! Fabric peers and the Fabric CA only accept ECDSA signatures whose `s`
//! value lies in the lower half of the curve order ("low-S"). `ring` does
//! not normalize, so signatures are rewritten here before they leave the
//! process.

use num_bigint::BigUint;
use once_cell::sync::Lazy;

/// Order `n` of the NIST P-256 group.
static P256_ORDER: Lazy<BigUint> = Lazy::new(|| {
    BigUint::parse_bytes(
        b"FFFFFFFF00000000FFFFFFFFFFFFFFFFBCE6FAADA7179E84F3B9CAC2FC632551",
        16,
    )
    .expect("P-256 order is a valid hex constant")
});

/// `n / 2`, the largest acceptable `s`.
static P256_HALF_ORDER: Lazy<BigUint> = Lazy::new(|| &*P256_ORDER >> 1u32);

/// Decodes the first PEM block with the given label into DER bytes.
///
/// # Arguments
/// * `pem` - PEM text, possibly containing other blocks
/// * `label` - Block label, e.g. `PRIVATE KEY` or `CERTIFICATE`
///
/// # Returns
/// - `Ok(der)` with the decoded body
/// - `Err(message)` if the block is missing or its body is not base64
pub fn pem_to_der(pem: &str, label: &str) -> Result<Vec<u8>, String> {
    let begin = format!("-----BEGIN {}-----", label);
    let end = format!("-----END {}-----", label);

    let start = pem
        .find(&begin)
        .map(|i| i + begin.len())
        .ok_or_else(|| format!("missing \"{}\" marker", begin))?;
    let stop = pem[start..]
        .find(&end)
        .map(|i| start + i)
        .ok_or_else(|| format!("missing \"{}\" marker", end))?;

    let body: String = pem[start..stop]
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    base64::decode(body).map_err(|e| format!("invalid base64 in PEM body: {}", e))
}

/// Rewrites a DER-encoded P-256 ECDSA signature into its low-S form.
///
/// # Arguments
/// * `signature` - ASN.1 `SEQUENCE { INTEGER r, INTEGER s }`
///
/// # Returns
/// DER signature with `s` replaced by `n - s` when `s > n/2`; unchanged
/// signatures are re-encoded canonically.
pub fn normalize_low_s(signature: &[u8]) -> Result<Vec<u8>, String> {
    let (r, mut s) = parse_der_signature(signature)?;
    if s > *P256_HALF_ORDER {
        s = &*P256_ORDER - &s;
    }
    Ok(encode_der_signature(&r, &s))
}

/// Whether `s` of a DER signature is already in the lower half of the order.
#[cfg(test)]
pub fn is_low_s(signature: &[u8]) -> Result<bool, String> {
    let (_, s) = parse_der_signature(signature)?;
    Ok(s <= *P256_HALF_ORDER)
}

fn parse_der_signature(signature: &[u8]) -> Result<(BigUint, BigUint), String> {
    // P-256 signatures never exceed 72 bytes, so only short-form lengths occur.
    if signature.len() < 8 || signature[0] != 0x30 || signature[1] & 0x80 != 0 {
        return Err("signature is not a short DER sequence".into());
    }
    if signature[1] as usize + 2 != signature.len() {
        return Err("signature length does not match its DER header".into());
    }
    let (r, rest) = read_der_integer(&signature[2..])?;
    let (s, rest) = read_der_integer(rest)?;
    if !rest.is_empty() {
        return Err("trailing bytes after DER signature".into());
    }
    Ok((r, s))
}

fn read_der_integer(input: &[u8]) -> Result<(BigUint, &[u8]), String> {
    if input.len() < 2 || input[0] != 0x02 || input[1] & 0x80 != 0 {
        return Err("expected a short DER integer".into());
    }
    let len = input[1] as usize;
    if len == 0 || input.len() < 2 + len {
        return Err("truncated DER integer".into());
    }
    Ok((BigUint::from_bytes_be(&input[2..2 + len]), &input[2 + len..]))
}

fn encode_der_integer(value: &BigUint, out: &mut Vec<u8>) {
    let mut bytes = value.to_bytes_be();
    if bytes[0] & 0x80 != 0 {
        bytes.insert(0, 0);
    }
    out.push(0x02);
    out.push(bytes.len() as u8);
    out.extend_from_slice(&bytes);
}

fn encode_der_signature(r: &BigUint, s: &BigUint) -> Vec<u8> {
    let mut body = Vec::with_capacity(70);
    encode_der_integer(r, &mut body);
    encode_der_integer(s, &mut body);

    let mut out = Vec::with_capacity(body.len() + 2);
    out.push(0x30);
    out.push(body.len() as u8);
    out.extend_from_slice(&body);
    out
}
