// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Combining algorithms.
//!
//! A policy reduces the responses of its children to a single response with
//! one of these algorithms. The mapping algorithms keep a dispatch index over
//! the children, so every edit of the owning policy rebuilds the algorithm
//! through [`CombiningAlgorithm::rebuild`].

mod first_applicable;
mod flags_mapper;
mod mapper;
mod overrides;

pub use flags_mapper::FlagsMapper;
pub use mapper::Mapper;

use crate::context::Context;
use crate::error::EvalError;
use crate::policy::Node;
use crate::response::{Effect, Response};

#[derive(Debug, Clone, Default)]
pub enum CombiningAlgorithm {
	/// First child result other than NotApplicable.
	#[default]
	FirstApplicable,
	/// Any Deny wins, then Permit.
	DenyOverrides,
	/// Any Permit wins, then Deny.
	PermitOverrides,
	/// Children selected by the string value of an expression.
	Mapper(Mapper),
	/// Children selected by the set bits of a flags value.
	FlagsMapper(FlagsMapper),
}

impl CombiningAlgorithm {
	pub fn name(&self) -> &'static str {
		match self {
			CombiningAlgorithm::FirstApplicable => "first-applicable",
			CombiningAlgorithm::DenyOverrides => "deny-overrides",
			CombiningAlgorithm::PermitOverrides => "permit-overrides",
			CombiningAlgorithm::Mapper(_) => "mapper",
			CombiningAlgorithm::FlagsMapper(_) => "flags-mapper",
		}
	}

	/// Combines the responses of `children`, given in evaluation order.
	pub fn combine(&self, children: &[Node], ctx: &Context) -> Response {
		match self {
			CombiningAlgorithm::FirstApplicable => first_applicable::combine(children, ctx),
			CombiningAlgorithm::DenyOverrides => overrides::combine(children, ctx, Effect::Deny),
			CombiningAlgorithm::PermitOverrides => overrides::combine(children, ctx, Effect::Permit),
			CombiningAlgorithm::Mapper(m) => m.combine(ctx),
			CombiningAlgorithm::FlagsMapper(m) => m.combine(ctx),
		}
	}

	/// Combines children already selected by an enclosing mapper.
	///
	/// Mappers used this way dispatch only among `selected`.
	pub(crate) fn combine_selected(&self, selected: &[Node], ctx: &Context) -> Response {
		match self {
			CombiningAlgorithm::Mapper(m) => m.combine_within(selected, ctx),
			CombiningAlgorithm::FlagsMapper(m) => m.combine_within(selected, ctx),
			other => other.combine(selected, ctx),
		}
	}

	/// Returns the algorithm with its dispatch state rebuilt for `children`.
	pub(crate) fn rebuild(&self, children: &[Node]) -> CombiningAlgorithm {
		match self {
			CombiningAlgorithm::Mapper(m) => CombiningAlgorithm::Mapper(m.rebuild(children)),
			CombiningAlgorithm::FlagsMapper(m) => CombiningAlgorithm::FlagsMapper(m.rebuild(children)),
			other => other.clone(),
		}
	}
}

/// Evaluates the error child if one is configured, otherwise reports `status`.
fn on_error(error: Option<&Node>, status: EvalError, ctx: &Context) -> Response {
	match error {
		Some(node) => node.calculate(ctx),
		None => Response::indeterminate(status),
	}
}

/// Evaluates the default child if one is configured, otherwise NotApplicable.
fn on_default(default: Option<&Node>, ctx: &Context) -> Response {
	match default {
		Some(node) => node.calculate(ctx),
		None => Response::not_applicable(None),
	}
}

fn find_by_id<'n>(nodes: &'n [Node], id: &str) -> Option<&'n Node> {
	nodes.iter().find(|n| n.id() == Some(id))
}

fn index_by_id(children: &[Node], id: Option<&str>) -> Option<Node> {
	id.and_then(|id| find_by_id(children, id)).cloned()
}
