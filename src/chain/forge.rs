//! Local binary encoding of FA1.2 transfer batches.
//!
//! SECURITY: The node's `helpers/forge/operations` output is never signed
//! as-is. The batch is forged here as well and the two byte strings must
//! match exactly, so a lying node cannot get a different operation signed.

use num_bigint::BigUint;
use num_traits::Zero;

use crate::chain::tezos::TransferContent;
use crate::error::ChainError;

const BLOCK_HASH_PREFIX: [u8; 2] = [1, 52];
const TZ1_PREFIX: [u8; 3] = [6, 161, 159];
const TZ2_PREFIX: [u8; 3] = [6, 161, 161];
const TZ3_PREFIX: [u8; 3] = [6, 161, 164];
const KT1_PREFIX: [u8; 3] = [2, 90, 121];

const TRANSACTION_TAG: u8 = 0x6c;
const NAMED_ENTRYPOINT_TAG: u8 = 0xff;
const PRESENT: u8 = 0xff;

const MICHELINE_INT: u8 = 0x00;
const MICHELINE_STRING: u8 = 0x01;
const MICHELINE_PRIM_2_ARGS: u8 = 0x07;
const PRIM_PAIR: u8 = 0x07;

fn decode_checked(encoded: &str, prefix: &[u8], payload_len: usize) -> Result<Vec<u8>, ChainError> {
    let decoded = bs58::decode(encoded)
        .with_check(None)
        .into_vec()
        .map_err(|e| ChainError::Encoding(format!("{}: {}", encoded, e)))?;

    if decoded.len() != prefix.len() + payload_len || !decoded.starts_with(prefix) {
        return Err(ChainError::Encoding(format!("{}: unexpected prefix or length", encoded)));
    }
    Ok(decoded[prefix.len()..].to_vec())
}

/// Unsigned zarith: 7 bits per byte, little endian, high bit set on all but
/// the last byte
pub fn zarith(value: &BigUint) -> Vec<u8> {
    let mut out = Vec::new();
    let mut rest = value.clone();
    loop {
        let byte = low_bits(&rest, 0x7f);
        rest >>= 7usize;
        if rest.is_zero() {
            out.push(byte);
            return out;
        }
        out.push(byte | 0x80);
    }
}

fn low_bits(value: &BigUint, mask: u32) -> u8 {
    (value.iter_u32_digits().next().unwrap_or(0) & mask) as u8
}

/// Micheline `int` for a non-negative value: the first byte carries six
/// value bits and a (clear) sign bit, the rest continue as zarith
fn micheline_int(value: &BigUint) -> Vec<u8> {
    let mut out = vec![MICHELINE_INT];
    let first = low_bits(value, 0x3f);
    let rest = value >> 6usize;
    if rest.is_zero() {
        out.push(first);
    } else {
        out.push(first | 0x80);
        out.extend(zarith(&rest));
    }
    out
}

fn micheline_string(value: &str) -> Vec<u8> {
    let mut out = vec![MICHELINE_STRING];
    out.extend((value.len() as u32).to_be_bytes());
    out.extend(value.as_bytes());
    out
}

fn micheline_pair(left: Vec<u8>, right: Vec<u8>) -> Vec<u8> {
    let mut out = vec![MICHELINE_PRIM_2_ARGS, PRIM_PAIR];
    out.extend(left);
    out.extend(right);
    out
}

/// `Pair from (Pair to value)`
pub fn fa12_transfer_value(from: &str, to: &str, value: &BigUint) -> Vec<u8> {
    micheline_pair(
        micheline_string(from),
        micheline_pair(micheline_string(to), micheline_int(value)),
    )
}

/// 21-byte implicit account encoding
pub fn public_key_hash(address: &str) -> Result<Vec<u8>, ChainError> {
    let (tag, prefix) = match address.get(..3) {
        Some("tz1") => (0x00, TZ1_PREFIX),
        Some("tz2") => (0x01, TZ2_PREFIX),
        Some("tz3") => (0x02, TZ3_PREFIX),
        _ => return Err(ChainError::Encoding(format!("{}: not an implicit account", address))),
    };

    let mut out = vec![tag];
    out.extend(decode_checked(address, &prefix, 20)?);
    Ok(out)
}

/// 22-byte contract id encoding
pub fn contract_id(address: &str) -> Result<Vec<u8>, ChainError> {
    if address.starts_with("KT1") {
        let mut out = vec![0x01];
        out.extend(decode_checked(address, &KT1_PREFIX, 20)?);
        out.push(0x00);
        Ok(out)
    } else {
        let mut out = vec![0x00];
        out.extend(public_key_hash(address)?);
        Ok(out)
    }
}

fn forge_transfer(content: &TransferContent) -> Result<Vec<u8>, ChainError> {
    let mut out = vec![TRANSACTION_TAG];
    out.extend(public_key_hash(&content.source)?);
    for field in [content.fee, content.counter, content.gas_limit, content.storage_limit] {
        out.extend(zarith(&BigUint::from(field)));
    }
    // tez amount
    out.extend(zarith(&BigUint::zero()));
    out.extend(contract_id(&content.destination)?);

    out.push(PRESENT);
    out.push(NAMED_ENTRYPOINT_TAG);
    out.push(TransferContent::ENTRYPOINT.len() as u8);
    out.extend(TransferContent::ENTRYPOINT.as_bytes());

    let parameters = fa12_transfer_value(&content.source, &content.to, &content.value);
    out.extend((parameters.len() as u32).to_be_bytes());
    out.extend(parameters);
    Ok(out)
}

/// Unsigned operation bytes: branch followed by every content
pub fn forge_operation(branch: &str, contents: &[TransferContent]) -> Result<Vec<u8>, ChainError> {
    let mut out = decode_checked(branch, &BLOCK_HASH_PREFIX, 32)?;
    for content in contents {
        out.extend(forge_transfer(content)?);
    }
    Ok(out)
}

/// Refuse to continue unless the node forged exactly what was built locally
pub fn ensure_matches(local: &[u8], remote_hex: &str) -> Result<(), ChainError> {
    let remote = hex::decode(remote_hex.trim())
        .map_err(|e| ChainError::Rpc(format!("Node returned invalid forged bytes: {}", e)))?;

    if remote != local {
        return Err(ChainError::ForgeMismatch {
            local: hex::encode(local),
            remote: remote_hex.trim().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::keys::b58check_encode;
    use crate::chain::TezosSigner;

    const TOKEN: &str = "KT1JkoE42rrMBP9b2oDhbx6EUr26GcySZMUH";

    fn branch() -> String {
        b58check_encode(&BLOCK_HASH_PREFIX, &[0xab; 32])
    }

    fn content(source: &str) -> TransferContent {
        TransferContent {
            source: source.to_string(),
            fee: 1500,
            counter: 41,
            gas_limit: 8000,
            storage_limit: 257,
            destination: TOKEN.to_string(),
            to: "tz1VSUr8wwNhLAzempoch5d6hLRiTh8Cjcjb".to_string(),
            value: BigUint::from(1000u32),
        }
    }

    #[test]
    fn test_zarith_encoding() {
        let cases: [(u64, &str); 5] = [(0, "00"), (127, "7f"), (128, "8001"), (300, "ac02"), (8000, "c03e")];
        for (value, expected) in cases {
            assert_eq!(hex::encode(zarith(&BigUint::from(value))), expected, "value {}", value);
        }
    }

    #[test]
    fn test_micheline_int_keeps_sign_bit_clear() {
        assert_eq!(hex::encode(micheline_int(&BigUint::from(1u32))), "0001");
        assert_eq!(hex::encode(micheline_int(&BigUint::from(63u32))), "003f");
        assert_eq!(hex::encode(micheline_int(&BigUint::from(64u32))), "008001");
        assert_eq!(hex::encode(micheline_int(&BigUint::from(1000u32))), "00a80f");
    }

    #[test]
    fn test_address_encodings() {
        let signer = TezosSigner::from_seed([3u8; 32]);
        let pkh = public_key_hash(signer.public_key_hash()).unwrap();
        assert_eq!(pkh.len(), 21);
        assert_eq!(pkh[0], 0x00);
        assert_eq!(b58check_encode(&TZ1_PREFIX, &pkh[1..]), signer.public_key_hash());

        let contract = contract_id(TOKEN).unwrap();
        assert_eq!(contract.len(), 22);
        assert_eq!(contract[0], 0x01);
        assert_eq!(contract[21], 0x00);

        let implicit = contract_id(signer.public_key_hash()).unwrap();
        assert_eq!(implicit.len(), 22);
        assert_eq!(&implicit[1..], &pkh[..]);

        assert!(matches!(public_key_hash(TOKEN), Err(ChainError::Encoding(_))));
        assert!(matches!(contract_id("KT1notbase58"), Err(ChainError::Encoding(_))));
    }

    #[test]
    fn test_forged_transfer_layout() {
        let signer = TezosSigner::from_seed([3u8; 32]);
        let source = signer.public_key_hash().to_string();
        let transfer = content(&source);

        let forged = forge_operation(&branch(), &[transfer.clone(), transfer.clone()]).unwrap();
        assert_eq!(&forged[..32], &[0xab; 32]);

        let single = forge_transfer(&transfer).unwrap();
        assert_eq!(forged.len(), 32 + 2 * single.len());

        let expected_head = format!(
            "6c{}{}{}{}{}{}{}",
            hex::encode(public_key_hash(&source).unwrap()),
            "dc0b",   // fee 1500
            "29",     // counter 41
            "c03e",   // gas 8000
            "8102",   // storage 257
            "00",     // amount
            hex::encode(contract_id(TOKEN).unwrap()),
        );
        let encoded = hex::encode(&single);
        assert!(encoded.starts_with(&expected_head));

        let parameters = fa12_transfer_value(&source, &transfer.to, &transfer.value);
        let expected_tail = format!(
            "ffff08{}{:08x}{}",
            hex::encode("transfer"),
            parameters.len(),
            hex::encode(&parameters)
        );
        assert_eq!(&encoded[expected_head.len()..], expected_tail);
    }

    #[test]
    fn test_rejects_bad_branch() {
        let transfer = content("tz1VSUr8wwNhLAzempoch5d6hLRiTh8Cjcjb");
        assert!(matches!(
            forge_operation(TOKEN, &[transfer]),
            Err(ChainError::Encoding(_))
        ));
    }

    #[test]
    fn test_node_bytes_must_match_local_bytes() {
        let local = vec![0xde, 0xad, 0xbe, 0xef];
        assert!(ensure_matches(&local, "deadbeef").is_ok());
        assert!(ensure_matches(&local, "deadbeef\n").is_ok());
        assert!(matches!(
            ensure_matches(&local, "deadbeee"),
            Err(ChainError::ForgeMismatch { .. })
        ));
        assert!(matches!(ensure_matches(&local, "zz"), Err(ChainError::Rpc(_))));
    }
}
