// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::BTreeMap;

use tracing::trace;

use super::{find_by_id, index_by_id, on_default, on_error, CombiningAlgorithm};
use crate::context::Context;
use crate::error::EvalError;
use crate::expression::Expression;
use crate::policy::Node;
use crate::response::Response;
use crate::value::AttributeValue;

/// Dispatches on the value of an expression, picking children by id.
///
/// A string or domain value picks one child. A set or list of strings picks
/// every matching child in enumeration order; more than one pick needs a
/// sub-algorithm to combine them.
#[derive(Debug, Clone)]
pub struct Mapper {
	argument: Expression,
	default_id: Option<String>,
	error_id: Option<String>,
	algorithm: Option<Box<CombiningAlgorithm>>,
	index: BTreeMap<String, Node>,
	default: Option<Node>,
	error: Option<Node>,
}

impl Mapper {
	pub fn new(argument: Expression) -> Self {
		Self {
			argument,
			default_id: None,
			error_id: None,
			algorithm: None,
			index: BTreeMap::new(),
			default: None,
			error: None,
		}
	}

	/// Child evaluated when the value names no child.
	pub fn with_default(mut self, id: impl Into<String>) -> Self {
		self.default_id = Some(id.into());
		self
	}

	/// Child evaluated when the value can't be computed or used.
	pub fn with_error(mut self, id: impl Into<String>) -> Self {
		self.error_id = Some(id.into());
		self
	}

	/// Algorithm combining the children picked by a multi-valued argument.
	pub fn with_algorithm(mut self, algorithm: CombiningAlgorithm) -> Self {
		self.algorithm = Some(Box::new(algorithm));
		self
	}

	pub fn argument(&self) -> &Expression {
		&self.argument
	}

	/// Ids currently reachable through the dispatch index.
	pub fn mapped_ids(&self) -> impl Iterator<Item = &str> {
		self.index.keys().map(String::as_str)
	}

	pub fn default_child(&self) -> Option<&Node> {
		self.default.as_ref()
	}

	pub fn error_child(&self) -> Option<&Node> {
		self.error.as_ref()
	}

	pub(crate) fn rebuild(&self, children: &[Node]) -> Mapper {
		let index = children
			.iter()
			.filter_map(|c| c.id().map(|id| (id.to_string(), c.clone())))
			.collect();

		Mapper {
			argument: self.argument.clone(),
			default_id: self.default_id.clone(),
			error_id: self.error_id.clone(),
			algorithm: self.algorithm.as_ref().map(|a| Box::new(a.rebuild(children))),
			index,
			default: index_by_id(children, self.default_id.as_deref()),
			error: index_by_id(children, self.error_id.as_deref()),
		}
	}

	pub(super) fn combine(&self, ctx: &Context) -> Response {
		self.dispatch(
			ctx,
			|id| self.index.get(id),
			self.default.as_ref(),
			self.error.as_ref(),
		)
	}

	pub(super) fn combine_within(&self, selected: &[Node], ctx: &Context) -> Response {
		let find = |id: Option<&str>| id.and_then(|id| find_by_id(selected, id));
		self.dispatch(
			ctx,
			|id| find_by_id(selected, id),
			find(self.default_id.as_deref()),
			find(self.error_id.as_deref()),
		)
	}

	fn dispatch<'n>(
		&self,
		ctx: &Context,
		find: impl Fn(&str) -> Option<&'n Node>,
		default: Option<&'n Node>,
		error: Option<&'n Node>,
	) -> Response {
		let value = match self.argument.evaluate(ctx) {
			Ok(v) => v,
			Err(e) => {
				trace!(error = %e, "mapper argument unavailable");
				return on_error(error, e, ctx);
			}
		};

		match &value {
			AttributeValue::String(s) => single(find(s.as_str()), default, ctx),
			AttributeValue::Domain(d) => single(find(d.as_str()), default, ctx),
			AttributeValue::SetOfStrings(set) => self.many(select(set.iter(), &find), default, error, ctx),
			AttributeValue::ListOfStrings(list) => {
				self.many(select(list.iter().map(String::as_str), &find), default, error, ctx)
			}
			other => on_error(
				error,
				EvalError::InvalidMapperArgument(other.ty().to_string()),
				ctx,
			),
		}
	}

	fn many(
		&self,
		selected: Vec<Node>,
		default: Option<&Node>,
		error: Option<&Node>,
		ctx: &Context,
	) -> Response {
		match (selected.len(), &self.algorithm) {
			(0, _) => on_default(default, ctx),
			(_, Some(algorithm)) => algorithm.combine_selected(&selected, ctx),
			(1, None) => selected[0].calculate(ctx),
			(n, None) => on_error(error, EvalError::AmbiguousMapping(n), ctx),
		}
	}
}

fn single(found: Option<&Node>, default: Option<&Node>, ctx: &Context) -> Response {
	match found {
		Some(node) => node.calculate(ctx),
		None => on_default(default, ctx),
	}
}

/// Children named by `ids`, once each, in the order the ids are given.
fn select<'s, 'n>(
	ids: impl Iterator<Item = &'s str>,
	find: impl Fn(&str) -> Option<&'n Node>,
) -> Vec<Node> {
	let mut selected: Vec<Node> = Vec::new();
	for id in ids {
		if selected.iter().any(|n| n.id() == Some(id)) {
			continue;
		}
		if let Some(node) = find(id) {
			selected.push(node.clone());
		}
	}
	selected
}
