// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::context::Context;
use crate::policy::Node;
use crate::response::{Effect, Response};

/// Returns the first response that is not NotApplicable.
///
/// When every child is inapplicable the first status reported by any of
/// them is kept.
pub(super) fn combine(children: &[Node], ctx: &Context) -> Response {
	let mut status = None;
	for child in children {
		let response = child.calculate(ctx);
		if response.effect != Effect::NotApplicable {
			return response;
		}
		if status.is_none() {
			status = response.status;
		}
	}
	Response::not_applicable(status)
}
