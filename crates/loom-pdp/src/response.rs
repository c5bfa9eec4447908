// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Decisions and their wire encoding.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::context::Context;
use crate::error::{EvalError, WireError};
use crate::value::AttributeAssignment;
use crate::wire::{self, WireLimits};

/// Outcome of evaluating a rule or policy.
///
/// The extended indeterminate values say which decision could have been
/// reached had the failing branch evaluated: `D` for Deny, `P` for Permit
/// and `DP` for either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
	Deny,
	Permit,
	NotApplicable,
	Indeterminate,
	IndeterminateD,
	IndeterminateP,
	IndeterminateDP,
}

impl Effect {
	/// Wire code of the effect.
	pub fn code(&self) -> u8 {
		match self {
			Effect::Deny => 0,
			Effect::Permit => 1,
			Effect::NotApplicable => 2,
			Effect::Indeterminate => 3,
			Effect::IndeterminateD => 4,
			Effect::IndeterminateP => 5,
			Effect::IndeterminateDP => 6,
		}
	}

	pub fn from_code(code: u8) -> Option<Effect> {
		match code {
			0 => Some(Effect::Deny),
			1 => Some(Effect::Permit),
			2 => Some(Effect::NotApplicable),
			3 => Some(Effect::Indeterminate),
			4 => Some(Effect::IndeterminateD),
			5 => Some(Effect::IndeterminateP),
			6 => Some(Effect::IndeterminateDP),
			_ => None,
		}
	}

	pub fn is_indeterminate(&self) -> bool {
		matches!(
			self,
			Effect::Indeterminate | Effect::IndeterminateD | Effect::IndeterminateP | Effect::IndeterminateDP
		)
	}

	/// True for Permit and Deny, the effects that carry obligations.
	pub fn is_decision(&self) -> bool {
		matches!(self, Effect::Permit | Effect::Deny)
	}
}

impl fmt::Display for Effect {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			Effect::Deny => "Deny",
			Effect::Permit => "Permit",
			Effect::NotApplicable => "NotApplicable",
			Effect::Indeterminate => "Indeterminate",
			Effect::IndeterminateD => "Indeterminate{D}",
			Effect::IndeterminateP => "Indeterminate{P}",
			Effect::IndeterminateDP => "Indeterminate{DP}",
		};
		f.write_str(s)
	}
}

/// Effect, optional status and obligations of a decision.
#[derive(Debug, Clone)]
pub struct Response {
	pub effect: Effect,
	pub status: Option<EvalError>,
	pub obligations: Vec<AttributeAssignment>,
}

impl Response {
	pub fn new(effect: Effect, status: Option<EvalError>, obligations: Vec<AttributeAssignment>) -> Self {
		Self {
			effect,
			status,
			obligations,
		}
	}

	pub fn not_applicable(status: Option<EvalError>) -> Self {
		Self::new(Effect::NotApplicable, status, Vec::new())
	}

	pub fn indeterminate(status: EvalError) -> Self {
		Self::new(Effect::Indeterminate, Some(status), Vec::new())
	}

	/// Evaluates every obligation and folds failures into the status.
	///
	/// Obligations are evaluated independently. If any fails, a Permit or
	/// Deny turns into Indeterminate and no obligation is returned.
	fn resolve(&self, ctx: &Context) -> (Effect, Option<EvalError>, Vec<AttributeAssignment>) {
		let mut resolved = Vec::with_capacity(self.obligations.len());
		let mut errors: Vec<EvalError> = self.status.iter().cloned().collect();
		let mut failed = false;

		for obligation in &self.obligations {
			match obligation.resolve(ctx) {
				Ok(a) => resolved.push(a),
				Err(e) => {
					failed = true;
					errors.push(e);
				}
			}
		}

		let status = EvalError::aggregate(errors);
		if failed {
			warn!(effect = %self.effect, status = ?status, "obligation evaluation failed");
			let effect = if self.effect.is_decision() {
				Effect::Indeterminate
			} else {
				self.effect
			};
			return (effect, status, Vec::new());
		}

		(self.effect, status, resolved)
	}

	fn encode(&self, ctx: &Context) -> Result<Vec<u8>, WireError> {
		let (effect, status, obligations) = self.resolve(ctx);
		wire::encode_response(effect, status.as_ref(), &obligations)
	}

	/// Marshals the response into `buf`, returning the number of bytes written.
	///
	/// If the encoded response does not fit, nothing is written and
	/// [`WireError::BufferOverflow`] is returned.
	#[instrument(
		level = "debug",
		skip_all,
		fields(effect = %self.effect, obligations = self.obligations.len(), available = buf.len())
	)]
	pub fn marshal_to_buffer(&self, ctx: &Context, buf: &mut [u8]) -> Result<usize, WireError> {
		let encoded = self.encode(ctx)?;
		if encoded.len() > buf.len() {
			return Err(WireError::BufferOverflow {
				required: encoded.len(),
				available: buf.len(),
			});
		}

		buf[..encoded.len()].copy_from_slice(&encoded);
		debug!(size = encoded.len(), "response marshaled");
		Ok(encoded.len())
	}

	/// Marshals the response into a new buffer no larger than the configured limit.
	#[instrument(
		level = "debug",
		skip_all,
		fields(effect = %self.effect, obligations = self.obligations.len(), limit = limits.max_response_size)
	)]
	pub fn marshal(&self, ctx: &Context, limits: &WireLimits) -> Result<Vec<u8>, WireError> {
		let encoded = self.encode(ctx)?;
		if encoded.len() > limits.max_response_size {
			return Err(WireError::BufferOverflow {
				required: encoded.len(),
				available: limits.max_response_size,
			});
		}

		debug!(size = encoded.len(), "response marshaled");
		Ok(encoded)
	}
}
