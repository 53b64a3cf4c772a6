//! Minimal Solidity ABI codec.
//!
//! Covers what the installer sends and reads back: static words, `bytes`,
//! `string`, dynamic arrays and (possibly nested) tuples. Integers are capped
//! at 128 bits, which is enough for every value this tool produces.

use anyhow::{Context, Result, bail};
use sha3::{Digest, Keccak256};

use crate::primitives::{Address, H256};

const WORD: usize = 32;

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// First four bytes of the Keccak-256 of a canonical function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Topic 0 of an event with the given canonical signature.
pub fn event_topic(signature: &str) -> H256 {
    H256(keccak256(signature.as_bytes()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    Uint(u128),
    Bool(bool),
    FixedBytes(H256),
    Bytes(Vec<u8>),
    String(String),
    Array(Vec<Token>),
    Tuple(Vec<Token>),
}

impl Token {
    fn is_dynamic(&self) -> bool {
        match self {
            Token::Bytes(_) | Token::String(_) | Token::Array(_) => true,
            Token::Tuple(items) => items.iter().any(Token::is_dynamic),
            _ => false,
        }
    }

    fn head_size(&self) -> usize {
        match self {
            Token::Tuple(items) if !self.is_dynamic() => items.iter().map(Token::head_size).sum(),
            _ => WORD,
        }
    }

    /// Build a token from a textual parameter value and its ABI type name.
    pub fn parse(kind: &str, value: &str) -> Result<Token> {
        let value = value.trim();
        match kind {
            "address" => Ok(Token::Address(value.parse()?)),
            "bool" => match value {
                "true" => Ok(Token::Bool(true)),
                "false" => Ok(Token::Bool(false)),
                other => bail!("expected true or false, got '{}'", other),
            },
            "bytes32" => Ok(Token::FixedBytes(value.parse()?)),
            "string" => Ok(Token::String(value.to_string())),
            "bytes" => {
                let hex_part = value.strip_prefix("0x").unwrap_or(value);
                Ok(Token::Bytes(
                    hex::decode(hex_part).context("bytes value must be hex")?,
                ))
            }
            k if k.starts_with("uint") => {
                let bits: u32 = k[4..].parse().unwrap_or(256);
                let n: u128 = value
                    .parse()
                    .with_context(|| format!("'{}' is not an unsigned integer", value))?;
                if bits < 128 && n >> bits != 0 {
                    bail!("{} does not fit in {}", n, k);
                }
                Ok(Token::Uint(n))
            }
            other => bail!("unsupported ABI type '{}'", other),
        }
    }
}

fn uint_word(n: u128) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[16..].copy_from_slice(&n.to_be_bytes());
    word
}

fn encode_static(token: &Token, out: &mut Vec<u8>) {
    match token {
        Token::Address(a) => {
            out.extend_from_slice(&[0u8; 12]);
            out.extend_from_slice(a.as_bytes());
        }
        Token::Uint(n) => out.extend_from_slice(&uint_word(*n)),
        Token::Bool(b) => out.extend_from_slice(&uint_word(u128::from(*b))),
        Token::FixedBytes(h) => out.extend_from_slice(h.as_bytes()),
        Token::Tuple(items) => items.iter().for_each(|t| encode_static(t, out)),
        Token::Bytes(_) | Token::String(_) | Token::Array(_) => {
            unreachable!("dynamic token in static position")
        }
    }
}

fn encode_packed_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(&uint_word(bytes.len() as u128));
    out.extend_from_slice(bytes);
    let rem = bytes.len() % WORD;
    if rem != 0 {
        out.extend(std::iter::repeat_n(0u8, WORD - rem));
    }
}

fn encode_dynamic(token: &Token, out: &mut Vec<u8>) {
    match token {
        Token::Bytes(b) => encode_packed_bytes(b, out),
        Token::String(s) => encode_packed_bytes(s.as_bytes(), out),
        Token::Array(items) => {
            out.extend_from_slice(&uint_word(items.len() as u128));
            out.extend(encode(items));
        }
        Token::Tuple(items) => out.extend(encode(items)),
        _ => encode_static(token, out),
    }
}

/// ABI-encode a sequence of tokens as a tuple (what `abi.encode` produces).
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let head_len: usize = tokens.iter().map(Token::head_size).sum();
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        if token.is_dynamic() {
            head.extend_from_slice(&uint_word((head_len + tail.len()) as u128));
            encode_dynamic(token, &mut tail);
        } else {
            encode_static(token, &mut head);
        }
    }

    head.extend(tail);
    head
}

/// Calldata for a function call: selector followed by the encoded arguments.
pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut data = selector(signature).to_vec();
    data.extend(encode(args));
    data
}

/// Positional reader over ABI-encoded data.
///
/// Every accessor takes an absolute byte position. Head slot `i` of a
/// sequence starting at `base` lives at `base + 32 * i`; offsets stored in
/// head slots are relative to `base`.
pub struct AbiDecoder<'a> {
    data: &'a [u8],
}

impl<'a> AbiDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn word(&self, pos: usize) -> Result<&'a [u8]> {
        pos.checked_add(WORD)
            .and_then(|end| self.data.get(pos..end))
            .with_context(|| {
                format!(
                    "ABI data too short: need word at {}, have {} bytes",
                    pos,
                    self.data.len()
                )
            })
    }

    /// Saturates so that absurd positions fail the bounds check in `word`.
    pub fn slot(base: usize, index: usize) -> usize {
        base.saturating_add(WORD.saturating_mul(index))
    }

    pub fn uint(&self, pos: usize) -> Result<u128> {
        let word = self.word(pos)?;
        if word[..16].iter().any(|b| *b != 0) {
            bail!("integer at {} exceeds 128 bits", pos);
        }
        let mut buf = [0u8; 16];
        buf.copy_from_slice(&word[16..]);
        Ok(u128::from_be_bytes(buf))
    }

    pub fn usize(&self, pos: usize) -> Result<usize> {
        usize::try_from(self.uint(pos)?).context("ABI length does not fit in usize")
    }

    pub fn address(&self, pos: usize) -> Result<Address> {
        let word = self.word(pos)?;
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&word[12..]);
        Ok(Address(bytes))
    }

    pub fn h256(&self, pos: usize) -> Result<H256> {
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(self.word(pos)?);
        Ok(H256(bytes))
    }

    /// Absolute position of a dynamic member whose offset lives in `slot`.
    pub fn follow(&self, base: usize, slot: usize) -> Result<usize> {
        let offset = self.usize(slot)?;
        base.checked_add(offset)
            .filter(|pos| *pos <= self.data.len())
            .with_context(|| {
                format!(
                    "ABI offset {} at {} points past the end of {} bytes",
                    offset,
                    slot,
                    self.data.len()
                )
            })
    }

    /// `bytes` value whose length word starts at `pos`.
    pub fn bytes(&self, pos: usize) -> Result<Vec<u8>> {
        let len = self.usize(pos)?;
        let start = pos + WORD;
        start
            .checked_add(len)
            .and_then(|end| self.data.get(start..end))
            .map(<[u8]>::to_vec)
            .with_context(|| format!("ABI bytes at {} overrun the data", pos))
    }
}
