// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Applicability predicates for rules and policies.
//!
//! A [`Target`] holds a conjunction of [`AnyOf`] clauses, each a disjunction
//! of [`AllOf`] clauses, each a conjunction of [`Match`]es. Evaluation stops
//! at the first decisive clause. A failing match never aborts evaluation: it
//! makes the target inapplicable and is reported as its status.

use tracing::trace;

use crate::context::Context;
use crate::error::EvalError;
use crate::expression::{Call, Expression, Function};

/// Result of evaluating a target.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetMatch {
	pub matched: bool,
	pub status: Option<EvalError>,
}

impl TargetMatch {
	fn matched() -> Self {
		Self {
			matched: true,
			status: None,
		}
	}

	fn no_match() -> Self {
		Self {
			matched: false,
			status: None,
		}
	}

	fn failed(status: EvalError) -> Self {
		Self {
			matched: false,
			status: Some(status),
		}
	}
}

/// A single boolean function call over two arguments.
#[derive(Debug, Clone)]
pub struct Match {
	call: Call,
}

impl Match {
	pub fn new(function: Function, first: Expression, second: Expression) -> Self {
		Self {
			call: Call::new(function, vec![first, second]),
		}
	}

	pub fn evaluate(&self, ctx: &Context) -> Result<bool, EvalError> {
		self.call.evaluate_bool(ctx)
	}
}

/// Conjunction of matches.
#[derive(Debug, Clone, Default)]
pub struct AllOf(Vec<Match>);

impl AllOf {
	pub fn new(matches: Vec<Match>) -> Self {
		Self(matches)
	}

	fn evaluate(&self, ctx: &Context) -> Result<bool, EvalError> {
		for m in &self.0 {
			if !m.evaluate(ctx)? {
				return Ok(false);
			}
		}
		Ok(true)
	}
}

/// Disjunction of conjunctions.
#[derive(Debug, Clone, Default)]
pub struct AnyOf(Vec<AllOf>);

impl AnyOf {
	pub fn new(all: Vec<AllOf>) -> Self {
		Self(all)
	}

	fn evaluate(&self, ctx: &Context) -> Result<bool, EvalError> {
		for all in &self.0 {
			if all.evaluate(ctx)? {
				return Ok(true);
			}
		}
		Ok(false)
	}
}

#[derive(Debug, Clone, Default)]
pub struct Target(Vec<AnyOf>);

impl Target {
	pub fn new(any: Vec<AnyOf>) -> Self {
		Self(any)
	}

	/// Target made of one clause with a single match.
	pub fn single(m: Match) -> Self {
		Self(vec![AnyOf::new(vec![AllOf::new(vec![m])])])
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Evaluates the target. An empty target always matches.
	///
	/// The first failing match ends evaluation with no match, and its error
	/// becomes the status.
	pub fn evaluate(&self, ctx: &Context) -> TargetMatch {
		for any in &self.0 {
			match any.evaluate(ctx) {
				Ok(true) => {}
				Ok(false) => return TargetMatch::no_match(),
				Err(e) => {
					trace!(error = %e, "target evaluation failed");
					return TargetMatch::failed(e);
				}
			}
		}
		TargetMatch::matched()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::WireError;
	use crate::types::Type;
	use crate::value::AttributeValue;

	fn ctx(pairs: Vec<(&str, AttributeValue)>) -> Context {
		Context::build(
			pairs.len(),
			|i| Ok::<_, WireError>((pairs[i].0.to_string(), pairs[i].1.clone())),
			None,
		)
		.unwrap()
	}

	fn string_equals(id: &str, value: &str) -> Match {
		Match::new(
			Function::Equal,
			Expression::designator(id, Type::String),
			Expression::value(AttributeValue::string(value)),
		)
	}

	#[test]
	fn empty_target_matches() {
		assert_eq!(Target::default().evaluate(&Context::empty()), TargetMatch::matched());
	}

	#[test]
	fn mismatch_has_no_status() {
		let target = Target::single(string_equals("x", "a"));
		let result = target.evaluate(&ctx(vec![("x", AttributeValue::string("b"))]));
		assert_eq!(result, TargetMatch::no_match());
	}

	#[test]
	fn absent_attribute_is_reported() {
		let target = Target::single(string_equals("x", "a"));
		let result = target.evaluate(&Context::empty());
		assert!(!result.matched);
		assert!(result.status.unwrap().is_missing_attribute());
	}

	#[test]
	fn mistyped_attribute_behaves_like_absent() {
		let target = Target::single(string_equals("x", "a"));
		let result = target.evaluate(&ctx(vec![("x", AttributeValue::Integer(1))]));
		assert!(!result.matched);
		assert_eq!(
			result.status,
			Some(EvalError::MissingAttribute {
				id: "x".to_string(),
				ty: "string".to_string()
			})
		);
	}

	#[test]
	fn any_of_short_circuits_on_first_true_clause() {
		let target = Target::new(vec![AnyOf::new(vec![
			AllOf::new(vec![string_equals("x", "a")]),
			AllOf::new(vec![string_equals("missing", "a")]),
		])]);
		let result = target.evaluate(&ctx(vec![("x", AttributeValue::string("a"))]));
		assert_eq!(result, TargetMatch::matched());
	}

	#[test]
	fn all_of_needs_every_match() {
		let target = Target::new(vec![AnyOf::new(vec![AllOf::new(vec![
			string_equals("x", "a"),
			string_equals("y", "b"),
		])])]);
		let ok = ctx(vec![
			("x", AttributeValue::string("a")),
			("y", AttributeValue::string("b")),
		]);
		let partial = ctx(vec![
			("x", AttributeValue::string("a")),
			("y", AttributeValue::string("c")),
		]);
		assert!(target.evaluate(&ok).matched);
		assert_eq!(target.evaluate(&partial), TargetMatch::no_match());
	}

	#[test]
	fn first_missing_attribute_wins() {
		let target = Target::new(vec![
			AnyOf::new(vec![AllOf::new(vec![string_equals("first", "a")])]),
			AnyOf::new(vec![AllOf::new(vec![string_equals("second", "a")])]),
		]);
		let status = target.evaluate(&Context::empty()).status.unwrap();
		assert_eq!(
			status,
			EvalError::MissingAttribute {
				id: "first".to_string(),
				ty: "string".to_string()
			}
		);
	}
}
