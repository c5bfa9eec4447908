// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Binary request and response encoding.
//!
//! All integers are big-endian.
//!
//! Request:
//!
//! ```text
//! u16 version | u16 count | count x attribute
//! attribute = u8 id length | id | u8 type tag | value
//! ```
//!
//! Response:
//!
//! ```text
//! u16 version | u8 effect | u16 error count | error count x message | u16 count | count x attribute
//! message = u16 length | UTF-8 text
//! ```
//!
//! A zero error count means the decision carries no status. An aggregated
//! status is written as one message per aggregated error.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use bytes::{Buf, BufMut};
use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use tracing::{instrument, trace};

use crate::error::{render_multiple, EvalError, WireError};
use crate::response::Effect;
use crate::types::{FlagsType, TypeRegistry};
use crate::value::{AttributeAssignment, AttributeValue, DomainName, StringSet};

pub const WIRE_VERSION: u16 = 1;

/// Value type tags.
pub mod tag {
	pub const BOOLEAN_FALSE: u8 = 0;
	pub const BOOLEAN_TRUE: u8 = 1;
	pub const STRING: u8 = 2;
	pub const INTEGER: u8 = 3;
	pub const FLOAT: u8 = 4;
	pub const IPV4_ADDRESS: u8 = 5;
	pub const IPV6_ADDRESS: u8 = 6;
	pub const IPV4_NETWORK: u8 = 7;
	pub const IPV6_NETWORK: u8 = 8;
	pub const DOMAIN: u8 = 9;
	pub const SET_OF_STRINGS: u8 = 10;
	pub const SET_OF_NETWORKS: u8 = 11;
	pub const SET_OF_DOMAINS: u8 = 12;
	pub const LIST_OF_STRINGS: u8 = 13;
	pub const FLAGS8: u8 = 14;
	pub const FLAGS16: u8 = 15;
	pub const FLAGS32: u8 = 16;
	pub const FLAGS64: u8 = 17;
}

const MAX_ID_LEN: usize = u8::MAX as usize;
const MAX_STRING_LEN: usize = u16::MAX as usize;
const MAX_COLLECTION_LEN: usize = u16::MAX as usize;

/// Size limits applied to wire traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireLimits {
	pub max_request_size: usize,
	pub max_attributes: usize,
	pub max_response_size: usize,
}

impl Default for WireLimits {
	fn default() -> Self {
		Self {
			max_request_size: 65536,
			max_attributes: 1024,
			max_response_size: 16384,
		}
	}
}

/// Encodes a request carrying the given attributes.
pub fn encode_request(attributes: &[(&str, AttributeValue)]) -> Result<Vec<u8>, WireError> {
	let mut buf = Vec::new();
	buf.put_u16(WIRE_VERSION);
	put_count(&mut buf, attributes.len())?;
	for (i, (id, value)) in attributes.iter().enumerate() {
		put_attribute(&mut buf, id, value).map_err(|e| e.at(i))?;
	}
	Ok(buf)
}

/// Decodes a whole request into its attributes.
pub fn decode_request(
	bytes: &[u8],
	registry: &TypeRegistry,
	limits: &WireLimits,
) -> Result<Vec<(String, AttributeValue)>, WireError> {
	let mut reader = RequestReader::new(bytes, registry, limits)?;
	let attributes = (0..reader.count())
		.map(|i| reader.next_attribute(i))
		.collect::<Result<Vec<_>, _>>()?;
	reader.finish()?;
	Ok(attributes)
}

/// Incremental request decoder.
///
/// The header is checked on construction; attributes are then read one at a
/// time in index order.
pub struct RequestReader<'a> {
	cursor: Cursor<'a>,
	count: usize,
	registry: &'a TypeRegistry,
}

impl<'a> RequestReader<'a> {
	pub fn new(
		bytes: &'a [u8],
		registry: &'a TypeRegistry,
		limits: &WireLimits,
	) -> Result<Self, WireError> {
		if bytes.len() > limits.max_request_size {
			return Err(WireError::RequestTooLarge {
				size: bytes.len(),
				limit: limits.max_request_size,
			});
		}

		let mut cursor = Cursor::new(bytes);
		let version = cursor.u16()?;
		if version != WIRE_VERSION {
			return Err(WireError::UnsupportedVersion(version));
		}

		let count = cursor.u16()? as usize;
		if count > limits.max_attributes {
			return Err(WireError::TooManyAttributes {
				count,
				limit: limits.max_attributes,
			});
		}

		Ok(Self {
			cursor,
			count,
			registry,
		})
	}

	/// Number of attributes announced by the header.
	pub fn count(&self) -> usize {
		self.count
	}

	/// Reads the next attribute. Errors name `index`.
	pub fn next_attribute(&mut self, index: usize) -> Result<(String, AttributeValue), WireError> {
		read_attribute(&mut self.cursor, self.registry).map_err(|e| e.at(index))
	}

	/// Checks that nothing follows the last attribute.
	pub fn finish(self) -> Result<(), WireError> {
		match self.cursor.remaining() {
			0 => Ok(()),
			n => Err(WireError::TrailingBytes(n)),
		}
	}
}

/// Response read back from the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedResponse {
	pub effect: Effect,
	/// Status message as rendered by the engine; aggregated when several
	/// errors were sent.
	pub status: Option<String>,
	/// Individual error messages in the order they were sent.
	pub errors: Vec<String>,
	pub obligations: Vec<(String, AttributeValue)>,
}

/// Decodes a marshaled response.
#[instrument(level = "trace", skip_all, fields(size = bytes.len()))]
pub fn decode_response(bytes: &[u8], registry: &TypeRegistry) -> Result<DecodedResponse, WireError> {
	let mut cursor = Cursor::new(bytes);
	let version = cursor.u16()?;
	if version != WIRE_VERSION {
		return Err(WireError::UnsupportedVersion(version));
	}

	let code = cursor.u8()?;
	let effect = Effect::from_code(code).ok_or(WireError::UnknownEffect(code))?;

	let error_count = cursor.u16()? as usize;
	let mut errors = Vec::with_capacity(error_count);
	for _ in 0..error_count {
		errors.push(cursor.string()?);
	}
	let status = match errors.as_slice() {
		[] => None,
		[single] => Some(single.clone()),
		many => Some(render_multiple(many)),
	};

	let count = cursor.u16()? as usize;
	let mut obligations = Vec::with_capacity(count);
	for i in 0..count {
		obligations.push(read_attribute(&mut cursor, registry).map_err(|e| e.at(i))?);
	}

	match cursor.remaining() {
		0 => Ok(DecodedResponse {
			effect,
			status,
			errors,
			obligations,
		}),
		n => Err(WireError::TrailingBytes(n)),
	}
}

/// Encodes a response. Obligations must already be literal values.
pub(crate) fn encode_response(
	effect: Effect,
	status: Option<&EvalError>,
	obligations: &[AttributeAssignment],
) -> Result<Vec<u8>, WireError> {
	let messages: Vec<String> = match status {
		None => Vec::new(),
		Some(EvalError::Multiple(errors)) => errors.iter().map(ToString::to_string).collect(),
		Some(err) => vec![err.to_string()],
	};

	let mut buf = Vec::new();
	buf.put_u16(WIRE_VERSION);
	buf.put_u8(effect.code());
	put_count(&mut buf, messages.len())?;
	for message in &messages {
		put_string(&mut buf, "status message", message)?;
	}
	put_count(&mut buf, obligations.len())?;

	for (i, obligation) in obligations.iter().enumerate() {
		let value = obligation
			.literal()
			.ok_or_else(|| WireError::UnsupportedValueType("expression".to_string()).at(i))?;
		put_attribute(&mut buf, obligation.id(), value).map_err(|e| e.at(i))?;
	}

	trace!(size = buf.len(), %effect, "response encoded");
	Ok(buf)
}

pub(crate) fn put_attribute(buf: &mut Vec<u8>, id: &str, value: &AttributeValue) -> Result<(), WireError> {
	if id.len() > MAX_ID_LEN {
		return Err(WireError::TooLong {
			what: "attribute id",
			len: id.len(),
			max: MAX_ID_LEN,
		});
	}
	buf.put_u8(id.len() as u8);
	buf.put_slice(id.as_bytes());
	put_value(buf, value)
}

fn put_value(buf: &mut Vec<u8>, value: &AttributeValue) -> Result<(), WireError> {
	match value {
		AttributeValue::Undefined => {
			return Err(WireError::UnsupportedValueType(value.ty().to_string()));
		}
		AttributeValue::Boolean(false) => buf.put_u8(tag::BOOLEAN_FALSE),
		AttributeValue::Boolean(true) => buf.put_u8(tag::BOOLEAN_TRUE),
		AttributeValue::String(s) => {
			buf.put_u8(tag::STRING);
			put_string(buf, "string", s)?;
		}
		AttributeValue::Integer(i) => {
			buf.put_u8(tag::INTEGER);
			buf.put_i64(*i);
		}
		AttributeValue::Float(x) => {
			buf.put_u8(tag::FLOAT);
			buf.put_f64(*x);
		}
		AttributeValue::Address(IpAddr::V4(a)) => {
			buf.put_u8(tag::IPV4_ADDRESS);
			buf.put_slice(&a.octets());
		}
		AttributeValue::Address(IpAddr::V6(a)) => {
			buf.put_u8(tag::IPV6_ADDRESS);
			buf.put_slice(&a.octets());
		}
		AttributeValue::Network(net) => put_network(buf, net),
		AttributeValue::Domain(d) => {
			buf.put_u8(tag::DOMAIN);
			put_string(buf, "domain", d.as_str())?;
		}
		AttributeValue::SetOfStrings(set) => {
			buf.put_u8(tag::SET_OF_STRINGS);
			put_count(buf, set.len())?;
			for s in set.iter() {
				put_string(buf, "string", s)?;
			}
		}
		AttributeValue::SetOfNetworks(nets) => {
			buf.put_u8(tag::SET_OF_NETWORKS);
			put_count(buf, nets.len())?;
			for net in nets {
				put_network(buf, net);
			}
		}
		AttributeValue::SetOfDomains(domains) => {
			buf.put_u8(tag::SET_OF_DOMAINS);
			put_count(buf, domains.len())?;
			for d in domains {
				put_string(buf, "domain", d.as_str())?;
			}
		}
		AttributeValue::ListOfStrings(list) => {
			buf.put_u8(tag::LIST_OF_STRINGS);
			put_count(buf, list.len())?;
			for s in list {
				put_string(buf, "string", s)?;
			}
		}
		AttributeValue::Flags { ty, bits } => put_flags(buf, ty, *bits)?,
	}
	Ok(())
}

fn put_network(buf: &mut Vec<u8>, net: &IpNet) {
	match net {
		IpNet::V4(n) => {
			buf.put_u8(tag::IPV4_NETWORK);
			buf.put_u8(n.prefix_len());
			buf.put_slice(&n.addr().octets());
		}
		IpNet::V6(n) => {
			buf.put_u8(tag::IPV6_NETWORK);
			buf.put_u8(n.prefix_len());
			buf.put_slice(&n.addr().octets());
		}
	}
}

fn put_flags(buf: &mut Vec<u8>, ty: &FlagsType, bits: u64) -> Result<(), WireError> {
	let name = ty.name();
	if name.len() > MAX_ID_LEN {
		return Err(WireError::TooLong {
			what: "flags type name",
			len: name.len(),
			max: MAX_ID_LEN,
		});
	}

	let tag = match ty.capacity() {
		8 => tag::FLAGS8,
		16 => tag::FLAGS16,
		32 => tag::FLAGS32,
		_ => tag::FLAGS64,
	};
	buf.put_u8(tag);
	buf.put_u8(name.len() as u8);
	buf.put_slice(name.as_bytes());

	match tag {
		tag::FLAGS8 => buf.put_u8(bits as u8),
		tag::FLAGS16 => buf.put_u16(bits as u16),
		tag::FLAGS32 => buf.put_u32(bits as u32),
		_ => buf.put_u64(bits),
	}
	Ok(())
}

fn put_string(buf: &mut Vec<u8>, what: &'static str, s: &str) -> Result<(), WireError> {
	if s.len() > MAX_STRING_LEN {
		return Err(WireError::TooLong {
			what,
			len: s.len(),
			max: MAX_STRING_LEN,
		});
	}
	buf.put_u16(s.len() as u16);
	buf.put_slice(s.as_bytes());
	Ok(())
}

fn put_count(buf: &mut Vec<u8>, n: usize) -> Result<(), WireError> {
	if n > MAX_COLLECTION_LEN {
		return Err(WireError::TooLong {
			what: "collection",
			len: n,
			max: MAX_COLLECTION_LEN,
		});
	}
	buf.put_u16(n as u16);
	Ok(())
}

fn read_attribute(
	cursor: &mut Cursor<'_>,
	registry: &TypeRegistry,
) -> Result<(String, AttributeValue), WireError> {
	let id_len = cursor.u8()? as usize;
	let id = cursor.utf8(id_len)?;
	let tag = cursor.u8()?;
	let value = read_value(cursor, tag, registry)?;
	Ok((id, value))
}

fn read_value(cursor: &mut Cursor<'_>, tag: u8, registry: &TypeRegistry) -> Result<AttributeValue, WireError> {
	let value = match tag {
		tag::BOOLEAN_FALSE => AttributeValue::Boolean(false),
		tag::BOOLEAN_TRUE => AttributeValue::Boolean(true),
		tag::STRING => AttributeValue::String(cursor.string()?),
		tag::INTEGER => AttributeValue::Integer(cursor.take(8)?.get_i64()),
		tag::FLOAT => AttributeValue::Float(cursor.take(8)?.get_f64()),
		tag::IPV4_ADDRESS => AttributeValue::Address(IpAddr::V4(cursor.ipv4()?)),
		tag::IPV6_ADDRESS => AttributeValue::Address(IpAddr::V6(cursor.ipv6()?)),
		tag::IPV4_NETWORK | tag::IPV6_NETWORK => AttributeValue::Network(read_network(cursor, tag)?),
		tag::DOMAIN => AttributeValue::Domain(read_domain(cursor)?),
		tag::SET_OF_STRINGS => {
			let n = cursor.u16()?;
			let mut set = StringSet::new();
			for _ in 0..n {
				set.insert(cursor.string()?);
			}
			AttributeValue::SetOfStrings(set)
		}
		tag::SET_OF_NETWORKS => {
			let n = cursor.u16()?;
			let mut nets = Vec::with_capacity(n as usize);
			for _ in 0..n {
				let tag = cursor.u8()?;
				nets.push(read_network(cursor, tag)?);
			}
			AttributeValue::SetOfNetworks(nets)
		}
		tag::SET_OF_DOMAINS => {
			let n = cursor.u16()?;
			let mut domains = Vec::with_capacity(n as usize);
			for _ in 0..n {
				domains.push(read_domain(cursor)?);
			}
			AttributeValue::SetOfDomains(domains)
		}
		tag::LIST_OF_STRINGS => {
			let n = cursor.u16()?;
			let mut list = Vec::with_capacity(n as usize);
			for _ in 0..n {
				list.push(cursor.string()?);
			}
			AttributeValue::ListOfStrings(list)
		}
		tag::FLAGS8 | tag::FLAGS16 | tag::FLAGS32 | tag::FLAGS64 => read_flags(cursor, tag, registry)?,
		other => return Err(WireError::UnknownTypeTag(other)),
	};
	Ok(value)
}

fn read_network(cursor: &mut Cursor<'_>, tag: u8) -> Result<IpNet, WireError> {
	match tag {
		tag::IPV4_NETWORK => {
			let prefix = cursor.u8()?;
			let addr = cursor.ipv4()?;
			Ipv4Net::new(addr, prefix)
				.map(IpNet::V4)
				.map_err(|_| WireError::InvalidPrefix(prefix))
		}
		tag::IPV6_NETWORK => {
			let prefix = cursor.u8()?;
			let addr = cursor.ipv6()?;
			Ipv6Net::new(addr, prefix)
				.map(IpNet::V6)
				.map_err(|_| WireError::InvalidPrefix(prefix))
		}
		other => Err(WireError::UnknownTypeTag(other)),
	}
}

fn read_domain(cursor: &mut Cursor<'_>) -> Result<DomainName, WireError> {
	let s = cursor.string()?;
	DomainName::parse(&s).ok_or(WireError::InvalidDomain(s))
}

fn read_flags(cursor: &mut Cursor<'_>, tag: u8, registry: &TypeRegistry) -> Result<AttributeValue, WireError> {
	let name_len = cursor.u8()? as usize;
	let name = cursor.utf8(name_len)?;
	let ty: Arc<FlagsType> = registry
		.flags(&name)
		.cloned()
		.ok_or_else(|| WireError::UnknownFlagsType(name.clone()))?;

	let (width, bits) = match tag {
		tag::FLAGS8 => (8, cursor.u8()? as u64),
		tag::FLAGS16 => (16, cursor.u16()? as u64),
		tag::FLAGS32 => (32, cursor.take(4)?.get_u32() as u64),
		_ => (64, cursor.take(8)?.get_u64()),
	};

	if width != ty.capacity() {
		return Err(WireError::FlagsWidthMismatch {
			name,
			expected: ty.capacity(),
			actual: width,
		});
	}

	if bits & !ty.mask() != 0 {
		return Err(WireError::InvalidFlagsValue { name, value: bits });
	}

	Ok(AttributeValue::Flags { ty, bits })
}

/// Bounds-checked reader over a byte slice that tracks its offset.
struct Cursor<'a> {
	buf: &'a [u8],
	pos: usize,
}

impl<'a> Cursor<'a> {
	fn new(buf: &'a [u8]) -> Self {
		Self { buf, pos: 0 }
	}

	fn remaining(&self) -> usize {
		self.buf.len() - self.pos
	}

	fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
		let remaining = self.remaining();
		if remaining < n {
			return Err(WireError::UnexpectedEnd {
				offset: self.pos,
				needed: n - remaining,
			});
		}
		let bytes = &self.buf[self.pos..self.pos + n];
		self.pos += n;
		Ok(bytes)
	}

	fn u8(&mut self) -> Result<u8, WireError> {
		Ok(self.take(1)?.get_u8())
	}

	fn u16(&mut self) -> Result<u16, WireError> {
		Ok(self.take(2)?.get_u16())
	}

	fn ipv4(&mut self) -> Result<Ipv4Addr, WireError> {
		Ok(Ipv4Addr::from(self.take(4)?.get_u32()))
	}

	fn ipv6(&mut self) -> Result<Ipv6Addr, WireError> {
		Ok(Ipv6Addr::from(self.take(16)?.get_u128()))
	}

	fn utf8(&mut self, len: usize) -> Result<String, WireError> {
		let bytes = self.take(len)?;
		std::str::from_utf8(bytes)
			.map(str::to_string)
			.map_err(|_| WireError::InvalidUtf8)
	}

	fn string(&mut self) -> Result<String, WireError> {
		let len = self.u16()? as usize;
		self.utf8(len)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::Type;
	use proptest::prelude::*;

	fn registry_with(t: &Type) -> TypeRegistry {
		let mut registry = TypeRegistry::new();
		registry.register(t.clone()).unwrap();
		registry
	}

	mod requests {
		use super::*;

		#[test]
		fn header_layout() {
			let bytes = encode_request(&[("a", AttributeValue::Boolean(true))]).unwrap();
			assert_eq!(bytes, vec![0, 1, 0, 1, 1, b'a', tag::BOOLEAN_TRUE]);
		}

		#[test]
		fn decodes_every_builtin_type() {
			let attributes = vec![
				("b", AttributeValue::Boolean(false)),
				("s", AttributeValue::string("text")),
				("i", AttributeValue::Integer(-42)),
				("f", AttributeValue::Float(1.5)),
				("a4", AttributeValue::Address("10.0.0.1".parse().unwrap())),
				("a6", AttributeValue::Address("2001:db8::1".parse().unwrap())),
				("n", AttributeValue::Network("10.0.0.0/8".parse().unwrap())),
				("d", AttributeValue::Domain(DomainName::parse("example.com").unwrap())),
				("ss", AttributeValue::set_of_strings(["x", "y"])),
				(
					"sn",
					AttributeValue::SetOfNetworks(vec![
						"192.0.2.0/24".parse().unwrap(),
						"2001:db8::/32".parse().unwrap(),
					]),
				),
				(
					"sd",
					AttributeValue::SetOfDomains(vec![DomainName::parse("example.org").unwrap()]),
				),
				(
					"ls",
					AttributeValue::ListOfStrings(vec!["x".to_string(), "x".to_string()]),
				),
			];
			let bytes = encode_request(&attributes).unwrap();
			let decoded = decode_request(&bytes, &TypeRegistry::new(), &WireLimits::default()).unwrap();

			let expected: Vec<(String, AttributeValue)> = attributes
				.into_iter()
				.map(|(id, v)| (id.to_string(), v))
				.collect();
			assert_eq!(decoded, expected);
		}

		#[test]
		fn flags_resolve_through_registry() {
			let t = Type::new_flags("perms", &["r", "w", "x"]).unwrap();
			let value = AttributeValue::flags(t.as_flags().unwrap(), &["r", "x"]).unwrap();
			let bytes = encode_request(&[("p", value.clone())]).unwrap();

			let decoded = decode_request(&bytes, &registry_with(&t), &WireLimits::default()).unwrap();
			assert_eq!(decoded[0].1, value);

			let err = decode_request(&bytes, &TypeRegistry::new(), &WireLimits::default()).unwrap_err();
			assert_eq!(
				err,
				WireError::UnknownFlagsType("perms".to_string()).at(0)
			);
		}

		#[test]
		fn flags_with_undefined_bits_are_rejected() {
			let t = Type::new_flags("perms", &["r", "w"]).unwrap();
			let mut bytes = Vec::new();
			bytes.put_u16(WIRE_VERSION);
			bytes.put_u16(1);
			bytes.put_u8(1);
			bytes.put_u8(b'p');
			bytes.put_u8(tag::FLAGS8);
			bytes.put_u8(5);
			bytes.put_slice(b"perms");
			bytes.put_u8(0b100);

			let err = decode_request(&bytes, &registry_with(&t), &WireLimits::default()).unwrap_err();
			assert_eq!(
				err,
				WireError::InvalidFlagsValue {
					name: "perms".to_string(),
					value: 4
				}
				.at(0)
			);
		}
	}

	mod malformed {
		use super::*;

		#[test]
		fn truncated_entry_names_its_index() {
			let mut bytes = encode_request(&[
				("a", AttributeValue::Boolean(true)),
				("b", AttributeValue::string("long value")),
			])
			.unwrap();
			bytes.truncate(bytes.len() - 3);

			let err = decode_request(&bytes, &TypeRegistry::new(), &WireLimits::default()).unwrap_err();
			match err {
				WireError::Attribute { index, source } => {
					assert_eq!(index, 1);
					assert!(matches!(*source, WireError::UnexpectedEnd { needed: 3, .. }));
				}
				other => panic!("expected attribute error, got {other:?}"),
			}
		}

		#[test]
		fn unknown_tag_and_version() {
			let bytes = vec![0, 1, 0, 1, 1, b'a', 200];
			assert_eq!(
				decode_request(&bytes, &TypeRegistry::new(), &WireLimits::default()).unwrap_err(),
				WireError::UnknownTypeTag(200).at(0)
			);

			let bytes = vec![0, 9, 0, 0];
			assert_eq!(
				decode_request(&bytes, &TypeRegistry::new(), &WireLimits::default()).unwrap_err(),
				WireError::UnsupportedVersion(9)
			);
		}

		#[test]
		fn trailing_bytes_are_rejected() {
			let mut bytes = encode_request(&[]).unwrap();
			bytes.push(0);
			assert_eq!(
				decode_request(&bytes, &TypeRegistry::new(), &WireLimits::default()).unwrap_err(),
				WireError::TrailingBytes(1)
			);
		}

		#[test]
		fn limits_are_enforced() {
			let bytes = encode_request(&[
				("a", AttributeValue::Boolean(true)),
				("b", AttributeValue::Boolean(true)),
			])
			.unwrap();

			let limits = WireLimits {
				max_attributes: 1,
				..WireLimits::default()
			};
			assert_eq!(
				decode_request(&bytes, &TypeRegistry::new(), &limits).unwrap_err(),
				WireError::TooManyAttributes { count: 2, limit: 1 }
			);

			let limits = WireLimits {
				max_request_size: 4,
				..WireLimits::default()
			};
			assert!(matches!(
				decode_request(&bytes, &TypeRegistry::new(), &limits),
				Err(WireError::RequestTooLarge { limit: 4, .. })
			));
		}

		#[test]
		fn invalid_prefix_and_domain() {
			let mut bytes = vec![0, 1, 0, 1, 1, b'n', tag::IPV4_NETWORK, 33];
			bytes.extend_from_slice(&[10, 0, 0, 0]);
			assert_eq!(
				decode_request(&bytes, &TypeRegistry::new(), &WireLimits::default()).unwrap_err(),
				WireError::InvalidPrefix(33).at(0)
			);

			let mut bytes = vec![0, 1, 0, 1, 1, b'd', tag::DOMAIN, 0, 4];
			bytes.extend_from_slice(b"a..b");
			assert_eq!(
				decode_request(&bytes, &TypeRegistry::new(), &WireLimits::default()).unwrap_err(),
				WireError::InvalidDomain("a..b".to_string()).at(0)
			);
		}

		#[test]
		fn undefined_values_cannot_be_encoded() {
			assert_eq!(
				encode_request(&[("u", AttributeValue::Undefined)]).unwrap_err(),
				WireError::UnsupportedValueType("undefined".to_string()).at(0)
			);
		}
	}

	mod responses {
		use super::*;

		#[test]
		fn ok_status_has_no_errors() {
			let bytes = encode_response(Effect::Permit, None, &[]).unwrap();
			assert_eq!(bytes, vec![0, 1, Effect::Permit.code(), 0, 0, 0, 0]);
		}

		#[test]
		fn single_error_is_counted_once() {
			let status = EvalError::AmbiguousMapping(2);
			let bytes = encode_response(Effect::Indeterminate, Some(&status), &[]).unwrap();

			let message = status.to_string();
			let mut expected = vec![0, 1, Effect::Indeterminate.code(), 0, 1];
			expected.extend_from_slice(&(message.len() as u16).to_be_bytes());
			expected.extend_from_slice(message.as_bytes());
			expected.extend_from_slice(&[0, 0]);
			assert_eq!(bytes, expected);

			let decoded = decode_response(&bytes, &TypeRegistry::new()).unwrap();
			assert_eq!(decoded.status, Some(message.clone()));
			assert_eq!(decoded.errors, vec![message]);
		}

		#[test]
		fn aggregated_status_sends_each_error() {
			let first = EvalError::MissingContentStore;
			let second = EvalError::AmbiguousMapping(3);
			let status = EvalError::Multiple(vec![first.clone(), second.clone()]);
			let bytes = encode_response(Effect::IndeterminateDP, Some(&status), &[]).unwrap();
			assert_eq!(&bytes[3..5], &[0, 2]);

			let decoded = decode_response(&bytes, &TypeRegistry::new()).unwrap();
			assert_eq!(decoded.errors, vec![first.to_string(), second.to_string()]);
			assert_eq!(decoded.status, Some(status.to_string()));
		}

		#[test]
		fn truncated_status_section_is_rejected() {
			let bytes = vec![0, 1, Effect::Deny.code(), 0, 2, 0, 1, b'x'];
			assert!(matches!(
				decode_response(&bytes, &TypeRegistry::new()),
				Err(WireError::UnexpectedEnd { .. })
			));
		}

		#[test]
		fn unknown_effect_is_rejected() {
			let bytes = vec![0, 1, 42, 0, 0, 0, 0];
			assert_eq!(
				decode_response(&bytes, &TypeRegistry::new()).unwrap_err(),
				WireError::UnknownEffect(42)
			);
		}
	}

	proptest! {
		#[test]
		fn strings_and_integers_survive_the_wire(s in "[a-zA-Z0-9 ]{0,64}", i in any::<i64>()) {
			let attributes = vec![("s", AttributeValue::string(s.clone())), ("i", AttributeValue::Integer(i))];
			let bytes = encode_request(&attributes).unwrap();
			let decoded = decode_request(&bytes, &TypeRegistry::new(), &WireLimits::default()).unwrap();
			prop_assert_eq!(&decoded[0].1, &AttributeValue::String(s));
			prop_assert_eq!(&decoded[1].1, &AttributeValue::Integer(i));
		}

		#[test]
		fn truncation_never_panics(cut in 0usize..40) {
			let bytes = encode_request(&[
				("s", AttributeValue::string("abcdef")),
				("n", AttributeValue::Network("10.1.0.0/16".parse().unwrap())),
				("l", AttributeValue::ListOfStrings(vec!["q".to_string()])),
			])
			.unwrap();
			let cut = cut.min(bytes.len() - 1);
			prop_assert!(decode_request(&bytes[..cut], &TypeRegistry::new(), &WireLimits::default()).is_err());
		}
	}
}
