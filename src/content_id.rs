//! Content identifiers for tokenized posts
//!
//! A content identifier is the last path segment of a sharing link,
//! `https://<host>/content/<id>`. It is the unpadded base64url encoding of a
//! small nested record holding the network name and the token address:
//!
//! ```text
//! outer   := 0x12 <len> middle
//! middle  := 0x0a <len> payload
//! payload := 0x0a <len> network_utf8  0x12 <len> address_utf8
//! ```
//!
//! Every `<len>` is a single byte below 0x80. Decoding never panics: any
//! malformed layer yields `None`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::chain::Address;

/// Network literal written into every identifier
pub const NETWORK: &str = "base";

const TAG_FIRST: u8 = 0x0a;
const TAG_SECOND: u8 = 0x12;

/// Largest field a single-byte length prefix can describe
const MAX_FIELD_LEN: usize = 0x7f;

// network field + address field (42 bytes) + two wrapper headers must fit
const _: () = assert!(NETWORK.len() + 2 + 42 + 2 + 2 + 2 <= MAX_FIELD_LEN);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("field of {0} bytes does not fit a single-byte length prefix")]
    FieldTooLong(usize),
}

/// Decoded identifier contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRef {
    pub network: String,
    pub address: Address,
}

fn push_field(buf: &mut Vec<u8>, tag: u8, bytes: &[u8]) -> Result<(), CodecError> {
    if bytes.len() > MAX_FIELD_LEN {
        return Err(CodecError::FieldTooLong(bytes.len()));
    }
    buf.push(tag);
    buf.push(bytes.len() as u8);
    buf.extend_from_slice(bytes);
    Ok(())
}

/// Encode an address under an explicit network name.
pub fn encode_for_network(network: &str, address: &Address) -> Result<String, CodecError> {
    let address = address.to_string();

    let mut payload = Vec::with_capacity(network.len() + address.len() + 4);
    push_field(&mut payload, TAG_FIRST, network.as_bytes())?;
    push_field(&mut payload, TAG_SECOND, address.as_bytes())?;

    let mut middle = Vec::with_capacity(payload.len() + 2);
    push_field(&mut middle, TAG_FIRST, &payload)?;

    let mut outer = Vec::with_capacity(middle.len() + 2);
    push_field(&mut outer, TAG_SECOND, &middle)?;

    Ok(URL_SAFE_NO_PAD.encode(outer))
}

/// Encode a token address as a content identifier. Deterministic.
pub fn encode(address: &Address) -> String {
    encode_for_network(NETWORK, address)
        .expect("fixed network literal always fits single-byte length prefixes")
}

/// Split one `tag len bytes` field off the front of `buf`.
fn read_field(buf: &[u8], tag: u8) -> Option<(&[u8], &[u8])> {
    let (&found, rest) = buf.split_first()?;
    if found != tag {
        return None;
    }
    let (&len, rest) = rest.split_first()?;
    let len = usize::from(len);
    if len > MAX_FIELD_LEN || len > rest.len() {
        return None;
    }
    Some(rest.split_at(len))
}

/// Read a field that must span the whole buffer.
fn read_sole_field(buf: &[u8], tag: u8) -> Option<&[u8]> {
    match read_field(buf, tag)? {
        (body, []) => Some(body),
        _ => None,
    }
}

fn decode_base64(id: &str) -> Option<Vec<u8>> {
    let normalized: String = id
        .trim()
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    if normalized.is_empty() {
        return None;
    }
    URL_SAFE_NO_PAD.decode(normalized).ok()
}

/// Decode an identifier into its network and address.
pub fn decode_parts(id: &str) -> Option<ContentRef> {
    let bytes = decode_base64(id)?;
    let middle = read_sole_field(&bytes, TAG_SECOND)?;
    let payload = read_sole_field(middle, TAG_FIRST)?;

    let (network, rest) = read_field(payload, TAG_FIRST)?;
    let (address, rest) = read_field(rest, TAG_SECOND)?;
    if !rest.is_empty() {
        return None;
    }

    let network = std::str::from_utf8(network).ok()?;
    let address = std::str::from_utf8(address).ok()?;
    if !address.starts_with("0x") {
        return None;
    }
    let address = Address::parse(address).ok()?;

    Some(ContentRef {
        network: network.to_string(),
        address,
    })
}

/// Decode an identifier into its token address.
pub fn decode(id: &str) -> Option<Address> {
    decode_parts(id).map(|content| content.address)
}

/// Sharing link for a token on `host`.
pub fn content_url(host: &str, address: &Address) -> String {
    let host = host
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');
    format!("https://{host}/content/{}", encode(address))
}

/// Identifier segment of a `/content/<id>` link, if the URL has that shape.
pub fn id_from_url(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url.trim()).ok()?;
    let mut segments = parsed.path_segments()?.filter(|s| !s.is_empty());
    match (segments.next(), segments.next(), segments.next()) {
        (Some("content"), Some(id), None) => Some(id.to_string()),
        _ => None,
    }
}
