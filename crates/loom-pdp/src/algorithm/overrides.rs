// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use tracing::trace;

use crate::context::Context;
use crate::error::EvalError;
use crate::policy::Node;
use crate::response::{Effect, Response};

/// Deny-overrides when `winner` is Deny, permit-overrides when it is Permit.
///
/// Every child is evaluated unless one returns `winner`. Obligations of all
/// children that returned the final decision are merged in order. An
/// indeterminate result carries the statuses of all indeterminate children.
pub(super) fn combine(children: &[Node], ctx: &Context, winner: Effect) -> Response {
	let loser = match winner {
		Effect::Deny => Effect::Permit,
		_ => Effect::Deny,
	};

	let mut loser_obligations = Vec::new();
	let mut loser_seen = false;
	let mut indeterminate_winner = false;
	let mut indeterminate_loser = false;
	let mut indeterminate_both = false;
	let mut errors: Vec<EvalError> = Vec::new();
	let mut first_status = None;

	for child in children {
		let response = child.calculate(ctx);
		match extended(child, response.effect) {
			e if e == winner => return response,
			e if e == loser => {
				loser_seen = true;
				loser_obligations.extend(response.obligations);
				continue;
			}
			Effect::NotApplicable => {
				if first_status.is_none() {
					first_status = response.status;
				}
				continue;
			}
			Effect::IndeterminateD if winner == Effect::Deny => indeterminate_winner = true,
			Effect::IndeterminateP if winner == Effect::Permit => indeterminate_winner = true,
			Effect::IndeterminateD | Effect::IndeterminateP => indeterminate_loser = true,
			_ => indeterminate_both = true,
		}
		errors.extend(response.status);
	}

	let effect = if indeterminate_both || (indeterminate_winner && (indeterminate_loser || loser_seen)) {
		Effect::IndeterminateDP
	} else if indeterminate_winner {
		indeterminate_of(winner)
	} else if loser_seen {
		return Response::new(loser, None, loser_obligations);
	} else if indeterminate_loser {
		indeterminate_of(loser)
	} else {
		return Response::not_applicable(first_status);
	};

	trace!(%effect, errors = errors.len(), "overrides result is indeterminate");
	Response::new(effect, EvalError::aggregate(errors), Vec::new())
}

/// Narrows a plain Indeterminate from a rule to the effect the rule would have had.
fn extended(child: &Node, effect: Effect) -> Effect {
	match (child, effect) {
		(Node::Rule(rule), Effect::Indeterminate) => indeterminate_of(rule.effect()),
		(_, Effect::Indeterminate) => Effect::IndeterminateDP,
		(_, other) => other,
	}
}

fn indeterminate_of(effect: Effect) -> Effect {
	match effect {
		Effect::Deny => Effect::IndeterminateD,
		Effect::Permit => Effect::IndeterminateP,
		_ => Effect::IndeterminateDP,
	}
}
