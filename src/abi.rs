//! Just enough of the Solidity ABI to build calldata for the space, authenticator and
//! execution contracts. Values above `u128::MAX` are passed as raw `Word`s.

use anyhow::{anyhow, Context, Result};
use sha3::{Digest, Keccak256};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
  Address([u8; 20]),
  Uint(u128),
  Word([u8; 32]),
  Bool(bool),
  Bytes(Vec<u8>),
  String(String),
  Array(Vec<Token>),
  Tuple(Vec<Token>),
}

impl Token {
  pub fn address(value: &str) -> Result<Token> {
    Ok(Token::Address(parse_address(value)?))
  }

  pub fn bytes_hex(value: &str) -> Result<Token> {
    Ok(Token::Bytes(parse_hex(value)?))
  }

  pub fn word_hex(value: &str) -> Result<Token> {
    let bytes = parse_hex(value)?;
    if bytes.len() > 32 {
      return Err(anyhow!("value {value} does not fit in 32 bytes"));
    }
    let mut word = [0u8; 32];
    word[32 - bytes.len() ..].copy_from_slice(&bytes);
    Ok(Token::Word(word))
  }

  fn is_dynamic(&self) -> bool {
    match self {
      Token::Bytes(_) | Token::String(_) | Token::Array(_) => true,
      Token::Tuple(items) => items.iter().any(Token::is_dynamic),
      _ => false,
    }
  }

  fn head_len(&self) -> usize {
    match self {
      Token::Tuple(items) if !self.is_dynamic() => items.iter().map(Token::head_len).sum(),
      _ => 32,
    }
  }
}

pub fn keccak256(data: &[u8]) -> [u8; 32] {
  Keccak256::digest(data).into()
}

pub fn selector(signature: &str) -> [u8; 4] {
  let hash = keccak256(signature.as_bytes());
  [hash[0], hash[1], hash[2], hash[3]]
}

pub fn parse_hex(value: &str) -> Result<Vec<u8>> {
  let body = value.strip_prefix("0x").unwrap_or(value);
  let padded = if body.len() % 2 == 1 { format!("0{body}") } else { body.to_string() };
  hex::decode(padded).with_context(|| format!("invalid hex value {value}"))
}

pub fn parse_address(value: &str) -> Result<[u8; 20]> {
  let bytes = parse_hex(value)?;
  bytes.try_into().map_err(|_| anyhow!("invalid evm address {value}"))
}

pub fn encode(tokens: &[Token]) -> Vec<u8> {
  let heads_len: usize = tokens.iter().map(Token::head_len).sum();
  let mut head = Vec::with_capacity(heads_len);
  let mut tail = Vec::new();

  for token in tokens {
    if token.is_dynamic() {
      head.extend(uint_word((heads_len + tail.len()) as u128));
      tail.extend(encode_token(token));
    } else {
      head.extend(encode_token(token));
    }
  }

  head.extend(tail);
  head
}

pub fn encode_hex(tokens: &[Token]) -> String {
  format!("0x{}", hex::encode(encode(tokens)))
}

/// Selector of `signature` followed by the encoded arguments, as a 0x-prefixed string.
pub fn encode_call(signature: &str, tokens: &[Token]) -> String {
  let mut data = selector(signature).to_vec();
  data.extend(encode(tokens));
  format!("0x{}", hex::encode(data))
}

fn encode_token(token: &Token) -> Vec<u8> {
  match token {
    Token::Address(address) => {
      let mut word = vec![0u8; 12];
      word.extend_from_slice(address);
      word
    }
    Token::Uint(value) => uint_word(*value).to_vec(),
    Token::Word(word) => word.to_vec(),
    Token::Bool(value) => uint_word(u128::from(*value)).to_vec(),
    Token::Bytes(bytes) => encode_bytes(bytes),
    Token::String(value) => encode_bytes(value.as_bytes()),
    Token::Array(items) => {
      let mut out = uint_word(items.len() as u128).to_vec();
      out.extend(encode(items));
      out
    }
    Token::Tuple(items) => encode(items),
  }
}

fn encode_bytes(bytes: &[u8]) -> Vec<u8> {
  let mut out = uint_word(bytes.len() as u128).to_vec();
  out.extend_from_slice(bytes);
  let padding = (32 - bytes.len() % 32) % 32;
  out.extend(std::iter::repeat(0u8).take(padding));
  out
}

fn uint_word(value: u128) -> [u8; 32] {
  let mut word = [0u8; 32];
  word[16 ..].copy_from_slice(&value.to_be_bytes());
  word
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_selector() {
    assert_eq!(hex::encode(selector("transfer(address,uint256)")), "a9059cbb");
    assert_eq!(hex::encode(selector("balanceOf(address)")), "70a08231");
  }

  #[test]
  fn test_encode_static() {
    let encoded = encode(&[Token::Uint(1), Token::Bool(true)]);
    assert_eq!(encoded.len(), 64);
    assert_eq!(encoded[31], 1);
    assert_eq!(encoded[63], 1);
  }

  #[test]
  fn test_encode_dynamic_bytes() {
    let encoded = encode(&[Token::Uint(7), Token::Bytes(vec![0xab, 0xcd])]);
    // head: uint, offset(64); tail: len(2), data padded
    assert_eq!(encoded.len(), 32 * 4);
    assert_eq!(encoded[63], 64);
    assert_eq!(encoded[95], 2);
    assert_eq!(&encoded[96 .. 98], &[0xab, 0xcd]);
  }

  #[test]
  fn test_encode_static_tuple_inline() {
    let address = Token::address("0x0000000000000000000000000000000000000001").unwrap();
    let encoded = encode(&[Token::Tuple(vec![address, Token::Uint(2)]), Token::Uint(3)]);
    assert_eq!(encoded.len(), 96);
    assert_eq!(encoded[31], 1);
    assert_eq!(encoded[63], 2);
    assert_eq!(encoded[95], 3);
  }

  #[test]
  fn test_encode_call_prefix() {
    let delegatee = Token::address("0x00000000000000000000000000000000000000ff").unwrap();
    let data = encode_call("delegate(address)", &[delegatee]);
    assert_eq!(&data[.. 10], "0x5c19a95c");
    assert_eq!(data.len(), 2 + 8 + 64);
  }

  #[test]
  fn test_parse_address_rejects_short() {
    assert!(parse_address("0x1234").is_err());
    assert!(Token::word_hex("0x01").is_ok());
  }
}
