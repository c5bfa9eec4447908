// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Typed attribute values and attribute assignments.

use std::collections::HashSet;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use ipnet::IpNet;

use crate::context::Context;
use crate::error::{EvalError, TypeError};
use crate::expression::Expression;
use crate::types::{FlagsType, Type};

const MAX_DOMAIN_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// A value tagged with its type.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
	Undefined,
	Boolean(bool),
	String(String),
	Integer(i64),
	Float(f64),
	Address(IpAddr),
	Network(IpNet),
	Domain(DomainName),
	SetOfStrings(StringSet),
	SetOfNetworks(Vec<IpNet>),
	SetOfDomains(Vec<DomainName>),
	ListOfStrings(Vec<String>),
	Flags { ty: Arc<FlagsType>, bits: u64 },
}

impl AttributeValue {
	pub fn string(s: impl Into<String>) -> Self {
		AttributeValue::String(s.into())
	}

	pub fn set_of_strings<S: Into<String>>(items: impl IntoIterator<Item = S>) -> Self {
		AttributeValue::SetOfStrings(items.into_iter().collect())
	}

	/// Builds a flags value with the named flags set.
	pub fn flags<S: AsRef<str>>(ty: &Arc<FlagsType>, flags: &[S]) -> Result<Self, TypeError> {
		let mut bits = 0u64;
		for flag in flags {
			let flag = flag.as_ref();
			let bit = ty.bit(flag).ok_or_else(|| TypeError::UnknownFlag {
				name: ty.name().to_string(),
				flag: flag.to_string(),
			})?;
			bits |= 1u64 << bit;
		}

		Ok(AttributeValue::Flags {
			ty: Arc::clone(ty),
			bits,
		})
	}

	pub fn ty(&self) -> Type {
		match self {
			AttributeValue::Undefined => Type::Undefined,
			AttributeValue::Boolean(_) => Type::Boolean,
			AttributeValue::String(_) => Type::String,
			AttributeValue::Integer(_) => Type::Integer,
			AttributeValue::Float(_) => Type::Float,
			AttributeValue::Address(_) => Type::Address,
			AttributeValue::Network(_) => Type::Network,
			AttributeValue::Domain(_) => Type::Domain,
			AttributeValue::SetOfStrings(_) => Type::SetOfStrings,
			AttributeValue::SetOfNetworks(_) => Type::SetOfNetworks,
			AttributeValue::SetOfDomains(_) => Type::SetOfDomains,
			AttributeValue::ListOfStrings(_) => Type::ListOfStrings,
			AttributeValue::Flags { ty, .. } => Type::Flags(Arc::clone(ty)),
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			AttributeValue::Boolean(b) => Some(*b),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			AttributeValue::String(s) => Some(s),
			_ => None,
		}
	}
}

impl fmt::Display for AttributeValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			AttributeValue::Undefined => f.write_str("undefined"),
			AttributeValue::Boolean(b) => write!(f, "{b}"),
			AttributeValue::String(s) => write!(f, "{s:?}"),
			AttributeValue::Integer(i) => write!(f, "{i}"),
			AttributeValue::Float(x) => write!(f, "{x}"),
			AttributeValue::Address(a) => write!(f, "{a}"),
			AttributeValue::Network(n) => write!(f, "{n}"),
			AttributeValue::Domain(d) => write!(f, "domain({d})"),
			AttributeValue::SetOfStrings(set) => write_list(f, set.iter().map(|s| format!("{s:?}"))),
			AttributeValue::SetOfNetworks(nets) => write_list(f, nets.iter().map(|n| n.to_string())),
			AttributeValue::SetOfDomains(domains) => {
				write_list(f, domains.iter().map(|d| d.to_string()))
			}
			AttributeValue::ListOfStrings(list) => write_list(f, list.iter().map(|s| format!("{s:?}"))),
			AttributeValue::Flags { ty, bits } => {
				let set = (0..ty.flags().len())
					.filter(|bit| *bits & (1u64 << *bit) != 0)
					.filter_map(|bit| ty.flag_name(bit))
					.map(str::to_string);
				write_list(f, set)
			}
		}
	}
}

fn write_list(f: &mut fmt::Formatter<'_>, items: impl Iterator<Item = String>) -> fmt::Result {
	let items: Vec<String> = items.collect();
	write!(f, "[{}]", items.join(", "))
}

/// Set of strings enumerated in insertion order.
#[derive(Debug, Clone, Default)]
pub struct StringSet {
	items: Vec<String>,
	members: HashSet<String>,
}

impl StringSet {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a string, returning false if it was already present.
	pub fn insert(&mut self, s: impl Into<String>) -> bool {
		let s = s.into();
		if !self.members.insert(s.clone()) {
			return false;
		}
		self.items.push(s);
		true
	}

	pub fn contains(&self, s: &str) -> bool {
		self.members.contains(s)
	}

	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.items.iter().map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}
}

impl PartialEq for StringSet {
	fn eq(&self, other: &Self) -> bool {
		self.items == other.items
	}
}

impl Eq for StringSet {}

impl<S: Into<String>> FromIterator<S> for StringSet {
	fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
		let mut set = StringSet::new();
		for s in iter {
			set.insert(s);
		}
		set
	}
}

/// A normalized (lowercase, no trailing dot) DNS name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomainName(String);

impl DomainName {
	/// Parses and normalizes a domain name. Returns `None` if it is not a valid name.
	pub fn parse(s: &str) -> Option<Self> {
		let name = s.strip_suffix('.').unwrap_or(s).to_ascii_lowercase();
		if name.is_empty() || name.len() > MAX_DOMAIN_LEN {
			return None;
		}

		let valid = name.split('.').all(|label| {
			!label.is_empty()
				&& label.len() <= MAX_LABEL_LEN
				&& !label.starts_with('-')
				&& !label.ends_with('-')
				&& label
					.bytes()
					.all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
		});

		valid.then_some(Self(name))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Returns true if this name equals `parent` or lies below it.
	pub fn is_subdomain_of(&self, parent: &DomainName) -> bool {
		match self.0.strip_suffix(parent.0.as_str()) {
			Some("") => true,
			Some(prefix) => prefix.ends_with('.'),
			None => false,
		}
	}
}

impl fmt::Display for DomainName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// A named value returned with a decision, computed from an expression.
#[derive(Debug, Clone)]
pub struct AttributeAssignment {
	id: String,
	expression: Expression,
}

impl AttributeAssignment {
	pub fn new(id: impl Into<String>, expression: Expression) -> Self {
		Self {
			id: id.into(),
			expression,
		}
	}

	/// Assignment of an already computed value.
	pub fn value(id: impl Into<String>, value: AttributeValue) -> Self {
		Self::new(id, Expression::Value(value))
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	pub fn expression(&self) -> &Expression {
		&self.expression
	}

	/// Returns the value if the assignment holds a literal.
	pub fn literal(&self) -> Option<&AttributeValue> {
		match &self.expression {
			Expression::Value(v) => Some(v),
			_ => None,
		}
	}

	/// Computes the assigned value. Failures name the assignment.
	pub fn evaluate(&self, ctx: &Context) -> Result<AttributeValue, EvalError> {
		self
			.expression
			.evaluate(ctx)
			.map_err(|e| EvalError::Obligation {
				id: self.id.clone(),
				source: Box::new(e),
			})
	}

	/// Computes the assigned value and returns it as a literal assignment.
	pub fn resolve(&self, ctx: &Context) -> Result<AttributeAssignment, EvalError> {
		if self.literal().is_some() {
			return Ok(self.clone());
		}
		let value = self.evaluate(ctx)?;
		Ok(Self::value(self.id.clone(), value))
	}
}

/// Resolves every assignment independently.
///
/// All failures are reported, aggregated in assignment order.
pub(crate) fn resolve_all(
	assignments: &[AttributeAssignment],
	ctx: &Context,
) -> Result<Vec<AttributeAssignment>, EvalError> {
	let mut resolved = Vec::with_capacity(assignments.len());
	let mut errors = Vec::new();
	for assignment in assignments {
		match assignment.resolve(ctx) {
			Ok(a) => resolved.push(a),
			Err(e) => errors.push(e),
		}
	}

	match EvalError::aggregate(errors) {
		Some(err) => Err(err),
		None => Ok(resolved),
	}
}
