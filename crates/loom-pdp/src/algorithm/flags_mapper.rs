// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use tracing::trace;

use super::{first_applicable, find_by_id, index_by_id, on_default, on_error, CombiningAlgorithm};
use crate::context::Context;
use crate::error::{EvalError, PolicyError};
use crate::expression::Expression;
use crate::policy::Node;
use crate::response::Response;
use crate::types::FlagsType;
use crate::value::AttributeValue;

/// Dispatches on a flags value: every set bit picks the child named after
/// the flag at that bit.
///
/// Picked children are combined in ascending bit order by the sub-algorithm,
/// or first-applicable when none is configured.
#[derive(Debug, Clone)]
pub struct FlagsMapper {
	argument: Expression,
	flags: Arc<FlagsType>,
	default_id: Option<String>,
	error_id: Option<String>,
	algorithm: Option<Box<CombiningAlgorithm>>,
	slots: Vec<Option<Node>>,
	default: Option<Node>,
	error: Option<Node>,
}

impl FlagsMapper {
	/// Creates a mapper over `argument`, which must have a flags type.
	pub fn new(argument: Expression) -> Result<Self, PolicyError> {
		let ty = argument.result_type();
		let flags = ty
			.as_flags()
			.cloned()
			.ok_or_else(|| PolicyError::InvalidFlagsMapperArgument(ty.to_string()))?;

		Ok(Self {
			argument,
			slots: vec![None; flags.capacity() as usize],
			flags,
			default_id: None,
			error_id: None,
			algorithm: None,
			default: None,
			error: None,
		})
	}

	pub fn with_default(mut self, id: impl Into<String>) -> Self {
		self.default_id = Some(id.into());
		self
	}

	pub fn with_error(mut self, id: impl Into<String>) -> Self {
		self.error_id = Some(id.into());
		self
	}

	pub fn with_algorithm(mut self, algorithm: CombiningAlgorithm) -> Self {
		self.algorithm = Some(Box::new(algorithm));
		self
	}

	pub fn flags(&self) -> &Arc<FlagsType> {
		&self.flags
	}

	/// Child occupying the slot of `bit`, if any.
	pub fn slot(&self, bit: usize) -> Option<&Node> {
		self.slots.get(bit).and_then(Option::as_ref)
	}

	pub fn default_child(&self) -> Option<&Node> {
		self.default.as_ref()
	}

	pub fn error_child(&self) -> Option<&Node> {
		self.error.as_ref()
	}

	pub(crate) fn rebuild(&self, children: &[Node]) -> FlagsMapper {
		let mut slots = vec![None; self.flags.capacity() as usize];
		for child in children {
			if let Some(bit) = child.id().and_then(|id| self.flags.bit(id)) {
				slots[bit] = Some(child.clone());
			}
		}

		FlagsMapper {
			argument: self.argument.clone(),
			flags: Arc::clone(&self.flags),
			default_id: self.default_id.clone(),
			error_id: self.error_id.clone(),
			algorithm: self.algorithm.as_ref().map(|a| Box::new(a.rebuild(children))),
			slots,
			default: index_by_id(children, self.default_id.as_deref()),
			error: index_by_id(children, self.error_id.as_deref()),
		}
	}

	pub(super) fn combine(&self, ctx: &Context) -> Response {
		self.dispatch(ctx, |bit| self.slot(bit), self.default.as_ref(), self.error.as_ref())
	}

	pub(super) fn combine_within(&self, selected: &[Node], ctx: &Context) -> Response {
		let by_id = |id: Option<&str>| id.and_then(|id| find_by_id(selected, id));
		self.dispatch(
			ctx,
			|bit| by_id(self.flags.flag_name(bit)),
			by_id(self.default_id.as_deref()),
			by_id(self.error_id.as_deref()),
		)
	}

	fn dispatch<'n>(
		&self,
		ctx: &Context,
		find: impl Fn(usize) -> Option<&'n Node>,
		default: Option<&'n Node>,
		error: Option<&'n Node>,
	) -> Response {
		let bits = match self.argument.evaluate(ctx) {
			Ok(AttributeValue::Flags { bits, .. }) => bits,
			Ok(other) => {
				return on_error(
					error,
					EvalError::InvalidMapperArgument(other.ty().to_string()),
					ctx,
				)
			}
			Err(e) => {
				trace!(error = %e, "flags mapper argument unavailable");
				return on_error(error, e, ctx);
			}
		};

		let selected: Vec<Node> = (0..self.flags.flags().len())
			.filter(|bit| bits & (1u64 << bit) != 0)
			.filter_map(|bit| find(bit).cloned())
			.collect();

		if selected.is_empty() {
			return on_default(default, ctx);
		}

		match &self.algorithm {
			Some(algorithm) => algorithm.combine_selected(&selected, ctx),
			None => first_applicable::combine(&selected, ctx),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::algorithm::testing::*;
	use crate::response::Effect;
	use crate::rule::Rule;
	use crate::types::Type;

	fn perms() -> Type {
		Type::new_flags("perms", &["read", "write", "exec"]).unwrap()
	}

	fn mapper(children: &[Node]) -> FlagsMapper {
		FlagsMapper::new(Expression::designator("p", perms()))
			.unwrap()
			.rebuild(children)
	}

	fn request(flags: &[&str]) -> Context {
		let t = perms();
		ctx(vec![(
			"p",
			AttributeValue::flags(t.as_flags().unwrap(), flags).unwrap(),
		)])
	}

	#[test]
	fn rejects_non_flags_argument() {
		let err = FlagsMapper::new(Expression::designator("p", Type::String)).unwrap_err();
		assert!(matches!(err, PolicyError::InvalidFlagsMapperArgument(ref t) if t == "string"));
	}

	#[test]
	fn slots_follow_flag_positions() {
		let m = mapper(&[deny("exec"), permit("read"), permit("other")]);
		assert_eq!(m.slots.len(), 8);
		assert_eq!(m.slot(0).and_then(Node::id), Some("read"));
		assert!(m.slot(1).is_none());
		assert_eq!(m.slot(2).and_then(Node::id), Some("exec"));
	}

	#[test]
	fn evaluates_set_bits_in_ascending_order() {
		let m = mapper(&[deny("exec"), permit("read")]);
		let response = m.combine(&request(&["exec", "read"]));
		assert_eq!(decided_by(&response).as_deref(), Some("read"));
	}

	#[test]
	fn skips_inapplicable_picks() {
		let m = mapper(&[guarded(Rule::permit("read"), "absent"), deny("write")]);
		let response = m.combine(&request(&["read", "write"]));
		assert_eq!(response.effect, Effect::Deny);
	}

	#[test]
	fn no_applicable_bit_uses_default() {
		let children = [permit("read"), deny("fallback")];
		let plain = mapper(&children);
		assert_eq!(plain.combine(&request(&["write"])).effect, Effect::NotApplicable);

		let with_default = FlagsMapper::new(Expression::designator("p", perms()))
			.unwrap()
			.with_default("fallback")
			.rebuild(&children);
		assert_eq!(with_default.combine(&request(&[])).effect, Effect::Deny);
	}

	#[test]
	fn missing_argument_uses_error_or_is_indeterminate() {
		let children = [permit("read"), deny("oops")];
		let plain = mapper(&children);
		let response = plain.combine(&ctx(vec![]));
		assert_eq!(response.effect, Effect::Indeterminate);
		assert!(response.status.unwrap().is_missing_attribute());

		let with_error = FlagsMapper::new(Expression::designator("p", perms()))
			.unwrap()
			.with_error("oops")
			.rebuild(&children);
		assert_eq!(with_error.combine(&ctx(vec![])).effect, Effect::Deny);
	}

	#[test]
	fn sub_algorithm_combines_picks() {
		let m = FlagsMapper::new(Expression::designator("p", perms()))
			.unwrap()
			.with_algorithm(CombiningAlgorithm::DenyOverrides)
			.rebuild(&[permit("read"), deny("write")]);
		assert_eq!(m.combine(&request(&["read", "write"])).effect, Effect::Deny);
	}
}
