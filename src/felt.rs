//! Starknet calldata helpers. Felts travel as 0x-prefixed hex strings.

use anyhow::{bail, Result};

use crate::abi;

pub fn from_u128(value: u128) -> String {
  format!("{value:#x}")
}

pub fn from_bool(value: bool) -> String {
  from_u128(u128::from(value))
}

/// A `u256` is two felts on Starknet: low 128 bits first.
pub fn split_u256(value: u128) -> [String; 2] {
  [from_u128(value), from_u128(0)]
}

pub fn split_word(word: &[u8; 32]) -> [String; 2] {
  let mut high = [0u8; 16];
  let mut low = [0u8; 16];
  high.copy_from_slice(&word[.. 16]);
  low.copy_from_slice(&word[16 ..]);
  [from_u128(u128::from_be_bytes(low)), from_u128(u128::from_be_bytes(high))]
}

/// Cairo short strings hold at most 31 ASCII bytes each.
pub fn short_string(value: &str) -> Result<String> {
  if !value.is_ascii() {
    bail!("short string {value} is not ascii");
  }
  if value.len() > 31 {
    bail!("short string {value} is longer than 31 characters");
  }
  if value.is_empty() {
    return Ok(from_u128(0));
  }
  Ok(format!("0x{}", hex::encode(value.as_bytes())))
}

/// Splits `value` into 31-byte short strings, prefixed with the array length.
pub fn string_array(value: &str) -> Result<Vec<String>> {
  if !value.is_ascii() {
    bail!("value {value} is not ascii");
  }
  let chunks: Vec<String> =
    value.as_bytes().chunks(31).map(|chunk| format!("0x{}", hex::encode(chunk))).collect();
  let mut out = Vec::with_capacity(chunks.len() + 1);
  out.push(from_u128(chunks.len() as u128));
  out.extend(chunks);
  Ok(out)
}

/// Prefixes `items` with their length, the calldata layout of `Array<felt252>`.
pub fn array(items: &[String]) -> Vec<String> {
  let mut out = Vec::with_capacity(items.len() + 1);
  out.push(from_u128(items.len() as u128));
  out.extend(items.iter().cloned());
  out
}

/// Keccak over the 32-byte words of `felts`, truncated to 250 bits so it is a valid felt.
pub fn hash_felts(felts: &[String]) -> Result<String> {
  let mut data = Vec::with_capacity(felts.len() * 32);
  for felt in felts {
    let bytes = abi::parse_hex(felt)?;
    if bytes.len() > 32 {
      bail!("felt {felt} is wider than 32 bytes");
    }
    data.extend(std::iter::repeat(0u8).take(32 - bytes.len()));
    data.extend(bytes);
  }
  let mut hash = abi::keccak256(&data);
  hash[0] &= 0x03;
  Ok(format!("0x{}", hex::encode(hash)))
}
