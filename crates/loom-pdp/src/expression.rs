// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Expressions evaluated against a [`Context`].
//!
//! An expression is a literal, a designator that reads a request attribute,
//! a selector that reads local content, or a call to one of the built-in
//! functions. Every expression has a static result type and evaluates to a
//! value of that type or an [`EvalError`].

use crate::context::Context;
use crate::error::EvalError;
use crate::types::Type;
use crate::value::AttributeValue;

#[derive(Debug, Clone)]
pub enum Expression {
	Value(AttributeValue),
	Designator(Designator),
	Selector(Selector),
	Call(Box<Call>),
}

impl Expression {
	pub fn value(v: AttributeValue) -> Self {
		Expression::Value(v)
	}

	pub fn designator(id: impl Into<String>, ty: Type) -> Self {
		Expression::Designator(Designator::new(id, ty))
	}

	pub fn call(function: Function, args: Vec<Expression>) -> Self {
		Expression::Call(Box::new(Call { function, args }))
	}

	pub fn result_type(&self) -> Type {
		match self {
			Expression::Value(v) => v.ty(),
			Expression::Designator(d) => d.ty.clone(),
			Expression::Selector(s) => s.ty.clone(),
			Expression::Call(c) => c.function.result_type(),
		}
	}

	pub fn evaluate(&self, ctx: &Context) -> Result<AttributeValue, EvalError> {
		match self {
			Expression::Value(v) => Ok(v.clone()),
			Expression::Designator(d) => d.evaluate(ctx),
			Expression::Selector(s) => s.evaluate(ctx),
			Expression::Call(c) => c.evaluate(ctx),
		}
	}
}

/// Reads an attribute of the request by id and type.
#[derive(Debug, Clone)]
pub struct Designator {
	id: String,
	ty: Type,
}

impl Designator {
	pub fn new(id: impl Into<String>, ty: Type) -> Self {
		Self { id: id.into(), ty }
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	pub fn ty(&self) -> &Type {
		&self.ty
	}

	pub fn evaluate(&self, ctx: &Context) -> Result<AttributeValue, EvalError> {
		ctx.get(&self.id, &self.ty).cloned()
	}
}

/// Reads a value from local content by storage id, item id and key path.
#[derive(Debug, Clone)]
pub struct Selector {
	storage_id: String,
	item_id: String,
	path: Vec<Expression>,
	ty: Type,
}

impl Selector {
	pub fn new(
		storage_id: impl Into<String>,
		item_id: impl Into<String>,
		path: Vec<Expression>,
		ty: Type,
	) -> Self {
		Self {
			storage_id: storage_id.into(),
			item_id: item_id.into(),
			path,
			ty,
		}
	}

	pub fn evaluate(&self, ctx: &Context) -> Result<AttributeValue, EvalError> {
		let content = ctx.get_content(&self.storage_id, &self.item_id)?;

		let mut keys = Vec::with_capacity(self.path.len());
		for (i, key) in self.path.iter().enumerate() {
			match key.evaluate(ctx)? {
				AttributeValue::String(s) => keys.push(s),
				AttributeValue::Domain(d) => keys.push(d.as_str().to_string()),
				other => {
					return Err(EvalError::InvalidArgument {
						function: "selector",
						position: i,
						actual: other.ty().to_string(),
					})
				}
			}
		}

		let value = content.item.get(&keys).ok_or_else(|| EvalError::MissingContentKey {
			storage: self.storage_id.clone(),
			item: self.item_id.clone(),
			key: keys.join("/"),
		})?;

		if !self.ty.matches(&value.ty()) {
			return Err(EvalError::ContentTypeMismatch {
				storage: self.storage_id.clone(),
				item: self.item_id.clone(),
				expected: self.ty.to_string(),
				actual: value.ty().to_string(),
			});
		}

		Ok(value.clone())
	}
}

/// Built-in functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
	/// Equality of two values of matching type.
	Equal,
	/// Membership: container first, item second.
	Contains,
	/// Numeric `first > second`.
	Greater,
	Not,
	And,
	Or,
}

impl Function {
	pub fn name(&self) -> &'static str {
		match self {
			Function::Equal => "equal",
			Function::Contains => "contains",
			Function::Greater => "greater",
			Function::Not => "not",
			Function::And => "and",
			Function::Or => "or",
		}
	}

	pub fn result_type(&self) -> Type {
		Type::Boolean
	}

	fn arity(&self) -> Option<usize> {
		match self {
			Function::Equal | Function::Contains | Function::Greater => Some(2),
			Function::Not => Some(1),
			Function::And | Function::Or => None,
		}
	}
}

#[derive(Debug, Clone)]
pub struct Call {
	function: Function,
	args: Vec<Expression>,
}

impl Call {
	pub fn new(function: Function, args: Vec<Expression>) -> Self {
		Self { function, args }
	}

	pub fn function(&self) -> Function {
		self.function
	}

	pub fn evaluate(&self, ctx: &Context) -> Result<AttributeValue, EvalError> {
		self.evaluate_bool(ctx).map(AttributeValue::Boolean)
	}

	pub(crate) fn evaluate_bool(&self, ctx: &Context) -> Result<bool, EvalError> {
		let name = self.function.name();
		if let Some(expected) = self.function.arity() {
			if self.args.len() != expected {
				return Err(EvalError::ArgumentCount {
					function: name,
					expected,
					actual: self.args.len(),
				});
			}
		}

		match self.function {
			Function::Equal => {
				let first = self.args[0].evaluate(ctx)?;
				let second = self.args[1].evaluate(ctx)?;
				equal(name, &first, &second)
			}
			Function::Contains => {
				let container = self.args[0].evaluate(ctx)?;
				let item = self.args[1].evaluate(ctx)?;
				contains(name, &container, &item)
			}
			Function::Greater => {
				let first = self.args[0].evaluate(ctx)?;
				let second = self.args[1].evaluate(ctx)?;
				greater(name, &first, &second)
			}
			Function::Not => boolean_arg(name, 0, &self.args[0], ctx).map(|b| !b),
			Function::And => {
				for (i, arg) in self.args.iter().enumerate() {
					if !boolean_arg(name, i, arg, ctx)? {
						return Ok(false);
					}
				}
				Ok(true)
			}
			Function::Or => {
				for (i, arg) in self.args.iter().enumerate() {
					if boolean_arg(name, i, arg, ctx)? {
						return Ok(true);
					}
				}
				Ok(false)
			}
		}
	}
}

fn invalid(function: &'static str, position: usize, value: &AttributeValue) -> EvalError {
	EvalError::InvalidArgument {
		function,
		position,
		actual: value.ty().to_string(),
	}
}

fn boolean_arg(
	function: &'static str,
	position: usize,
	arg: &Expression,
	ctx: &Context,
) -> Result<bool, EvalError> {
	let value = arg.evaluate(ctx)?;
	value
		.as_bool()
		.ok_or_else(|| invalid(function, position, &value))
}

fn equal(
	function: &'static str,
	first: &AttributeValue,
	second: &AttributeValue,
) -> Result<bool, EvalError> {
	use AttributeValue as V;

	match (first, second) {
		(V::Boolean(a), V::Boolean(b)) => Ok(a == b),
		(V::String(a), V::String(b)) => Ok(a == b),
		(V::Integer(a), V::Integer(b)) => Ok(a == b),
		(V::Float(a), V::Float(b)) => Ok(a == b),
		(V::Integer(a), V::Float(b)) | (V::Float(b), V::Integer(a)) => Ok(*a as f64 == *b),
		(V::Address(a), V::Address(b)) => Ok(a == b),
		(V::Network(a), V::Network(b)) => Ok(a == b),
		(V::Domain(a), V::Domain(b)) => Ok(a == b),
		(V::SetOfStrings(a), V::SetOfStrings(b)) => {
			Ok(a.len() == b.len() && a.iter().all(|s| b.contains(s)))
		}
		(V::ListOfStrings(a), V::ListOfStrings(b)) => Ok(a == b),
		(V::Flags { ty: ta, bits: a }, V::Flags { ty: tb, bits: b }) if ta.flags() == tb.flags() => {
			Ok(a == b)
		}
		(a, _) if !is_comparable(a) => Err(invalid(function, 0, a)),
		(_, b) => Err(invalid(function, 1, b)),
	}
}

fn is_comparable(v: &AttributeValue) -> bool {
	!matches!(
		v,
		AttributeValue::Undefined | AttributeValue::SetOfNetworks(_) | AttributeValue::SetOfDomains(_)
	)
}

fn contains(
	function: &'static str,
	container: &AttributeValue,
	item: &AttributeValue,
) -> Result<bool, EvalError> {
	use AttributeValue as V;

	match (container, item) {
		(V::SetOfStrings(set), V::String(s)) => Ok(set.contains(s)),
		(V::ListOfStrings(list), V::String(s)) => Ok(list.iter().any(|x| x == s)),
		(V::String(haystack), V::String(needle)) => Ok(haystack.contains(needle.as_str())),
		(V::Network(net), V::Address(addr)) => Ok(net.contains(addr)),
		(V::SetOfNetworks(nets), V::Address(addr)) => Ok(nets.iter().any(|n| n.contains(addr))),
		(V::SetOfDomains(domains), V::Domain(d)) => {
			Ok(domains.iter().any(|parent| d.is_subdomain_of(parent)))
		}
		(V::Flags { ty, bits }, V::String(flag)) => {
			Ok(ty.bit(flag).map(|bit| bits & (1u64 << bit) != 0).unwrap_or(false))
		}
		(
			V::SetOfStrings(_)
			| V::ListOfStrings(_)
			| V::String(_)
			| V::Network(_)
			| V::SetOfNetworks(_)
			| V::SetOfDomains(_)
			| V::Flags { .. },
			other,
		) => Err(invalid(function, 1, other)),
		(other, _) => Err(invalid(function, 0, other)),
	}
}

fn greater(
	function: &'static str,
	first: &AttributeValue,
	second: &AttributeValue,
) -> Result<bool, EvalError> {
	use AttributeValue as V;

	match (first, second) {
		(V::Integer(a), V::Integer(b)) => Ok(a > b),
		(V::Float(a), V::Float(b)) => Ok(a > b),
		(V::Integer(a), V::Float(b)) => Ok((*a as f64) > *b),
		(V::Float(a), V::Integer(b)) => Ok(*a > (*b as f64)),
		(V::Integer(_) | V::Float(_), other) => Err(invalid(function, 1, other)),
		(other, _) => Err(invalid(function, 0, other)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::value::DomainName;

	fn empty() -> Context {
		Context::empty()
	}

	fn lit(v: AttributeValue) -> Expression {
		Expression::value(v)
	}

	fn eval(function: Function, args: Vec<Expression>) -> Result<bool, EvalError> {
		Call::new(function, args).evaluate_bool(&empty())
	}

	#[test]
	fn equal_compares_strings() {
		assert!(eval(
			Function::Equal,
			vec![lit(AttributeValue::string("a")), lit(AttributeValue::string("a"))]
		)
		.unwrap());
		assert!(!eval(
			Function::Equal,
			vec![lit(AttributeValue::string("a")), lit(AttributeValue::string("b"))]
		)
		.unwrap());
	}

	#[test]
	fn equal_rejects_mixed_types() {
		let err = eval(
			Function::Equal,
			vec![lit(AttributeValue::string("a")), lit(AttributeValue::Boolean(true))],
		)
		.unwrap_err();
		assert_eq!(
			err,
			EvalError::InvalidArgument {
				function: "equal",
				position: 1,
				actual: "boolean".to_string()
			}
		);
	}

	#[test]
	fn contains_checks_sets_networks_and_domains() {
		let set = AttributeValue::set_of_strings(["a", "b"]);
		assert!(eval(Function::Contains, vec![lit(set), lit(AttributeValue::string("b"))]).unwrap());

		let net = AttributeValue::Network("192.0.2.0/24".parse().unwrap());
		let addr = AttributeValue::Address("192.0.2.7".parse().unwrap());
		assert!(eval(Function::Contains, vec![lit(net), lit(addr)]).unwrap());

		let domains = AttributeValue::SetOfDomains(vec![DomainName::parse("example.com").unwrap()]);
		let d = AttributeValue::Domain(DomainName::parse("www.example.com").unwrap());
		assert!(eval(Function::Contains, vec![lit(domains), lit(d)]).unwrap());
	}

	#[test]
	fn contains_tests_flag_bits() {
		let t = Type::new_flags("perms", &["read", "write"]).unwrap();
		let v = AttributeValue::flags(t.as_flags().unwrap(), &["write"]).unwrap();
		assert!(eval(
			Function::Contains,
			vec![lit(v.clone()), lit(AttributeValue::string("write"))]
		)
		.unwrap());
		assert!(!eval(Function::Contains, vec![lit(v), lit(AttributeValue::string("read"))]).unwrap());
	}

	#[test]
	fn arity_is_checked() {
		let err = eval(Function::Not, vec![]).unwrap_err();
		assert_eq!(
			err,
			EvalError::ArgumentCount {
				function: "not",
				expected: 1,
				actual: 0
			}
		);
	}

	#[test]
	fn and_or_short_circuit() {
		let missing = Expression::designator("absent", Type::Boolean);
		assert!(!eval(
			Function::And,
			vec![lit(AttributeValue::Boolean(false)), missing.clone()]
		)
		.unwrap());
		assert!(eval(Function::Or, vec![lit(AttributeValue::Boolean(true)), missing]).unwrap());
	}

	#[test]
	fn designator_reports_missing_attribute() {
		let err = Expression::designator("x", Type::String)
			.evaluate(&empty())
			.unwrap_err();
		assert!(err.is_missing_attribute());
	}

	#[test]
	fn greater_compares_numbers() {
		assert!(eval(
			Function::Greater,
			vec![lit(AttributeValue::Integer(3)), lit(AttributeValue::Float(2.5))]
		)
		.unwrap());
	}
}
