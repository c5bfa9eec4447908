// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use tracing::{instrument, trace};

use crate::context::Context;
use crate::response::{Effect, Response};
use crate::target::Target;
use crate::value::{resolve_all, AttributeAssignment};

/// Leaf of the policy tree.
///
/// A rule without an id is hidden: it evaluates normally but can't be
/// addressed by tree edits.
#[derive(Debug, Clone)]
pub struct Rule {
	ord: usize,
	id: Option<String>,
	target: Target,
	effect: Effect,
	obligations: Vec<AttributeAssignment>,
}

impl Rule {
	pub fn permit(id: impl Into<String>) -> Self {
		Self::with_effect(Some(id.into()), Effect::Permit)
	}

	pub fn deny(id: impl Into<String>) -> Self {
		Self::with_effect(Some(id.into()), Effect::Deny)
	}

	fn with_effect(id: Option<String>, effect: Effect) -> Self {
		Self {
			ord: 0,
			id,
			target: Target::default(),
			effect,
			obligations: Vec::new(),
		}
	}

	/// Drops the id, making the rule hidden.
	pub fn hidden(mut self) -> Self {
		self.id = None;
		self
	}

	pub fn with_target(mut self, target: Target) -> Self {
		self.target = target;
		self
	}

	pub fn with_obligation(mut self, obligation: AttributeAssignment) -> Self {
		self.obligations.push(obligation);
		self
	}

	pub fn ord(&self) -> usize {
		self.ord
	}

	pub fn id(&self) -> Option<&str> {
		self.id.as_deref()
	}

	pub fn is_hidden(&self) -> bool {
		self.id.is_none()
	}

	pub fn effect(&self) -> Effect {
		self.effect
	}

	pub fn target(&self) -> &Target {
		&self.target
	}

	pub fn obligations(&self) -> &[AttributeAssignment] {
		&self.obligations
	}

	pub(crate) fn with_ord(&self, ord: usize) -> Rule {
		Rule { ord, ..self.clone() }
	}

	/// Evaluates the rule.
	///
	/// An inapplicable target gives NotApplicable with the target's status.
	/// Otherwise the rule's effect is returned with its obligations computed,
	/// or Indeterminate if an obligation can't be computed.
	#[instrument(level = "trace", skip_all, fields(id = self.id.as_deref().unwrap_or("hidden")))]
	pub fn calculate(&self, ctx: &Context) -> Response {
		let m = self.target.evaluate(ctx);
		if !m.matched {
			return Response::not_applicable(m.status);
		}

		match resolve_all(&self.obligations, ctx) {
			Ok(obligations) => Response::new(self.effect, None, obligations),
			Err(e) => {
				trace!(error = %e, "rule obligation failed");
				Response::indeterminate(e)
			}
		}
	}
}
