// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wire codec limits.

use loom_pdp::WireLimits;
use serde::Deserialize;

/// Wire limits (runtime, fully resolved).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireConfig {
	pub max_request_size: usize,
	pub max_attributes: usize,
	pub max_response_size: usize,
}

impl Default for WireConfig {
	fn default() -> Self {
		WireLimits::default().into()
	}
}

impl WireConfig {
	pub fn to_limits(&self) -> WireLimits {
		WireLimits {
			max_request_size: self.max_request_size,
			max_attributes: self.max_attributes,
			max_response_size: self.max_response_size,
		}
	}
}

impl From<WireLimits> for WireConfig {
	fn from(limits: WireLimits) -> Self {
		Self {
			max_request_size: limits.max_request_size,
			max_attributes: limits.max_attributes,
			max_response_size: limits.max_response_size,
		}
	}
}

impl From<&WireConfig> for WireLimits {
	fn from(config: &WireConfig) -> Self {
		config.to_limits()
	}
}

/// Wire limits layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireConfigLayer {
	#[serde(default)]
	pub max_request_size: Option<usize>,
	#[serde(default)]
	pub max_attributes: Option<usize>,
	#[serde(default)]
	pub max_response_size: Option<usize>,
}

impl WireConfigLayer {
	pub fn merge(&mut self, other: WireConfigLayer) {
		if other.max_request_size.is_some() {
			self.max_request_size = other.max_request_size;
		}
		if other.max_attributes.is_some() {
			self.max_attributes = other.max_attributes;
		}
		if other.max_response_size.is_some() {
			self.max_response_size = other.max_response_size;
		}
	}

	pub fn finalize(self) -> WireConfig {
		let defaults = WireLimits::default();
		WireConfig {
			max_request_size: self.max_request_size.unwrap_or(defaults.max_request_size),
			max_attributes: self.max_attributes.unwrap_or(defaults.max_attributes),
			max_response_size: self.max_response_size.unwrap_or(defaults.max_response_size),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults_match_codec() {
		let config = WireConfigLayer::default().finalize();
		assert_eq!(config.max_request_size, 65536);
		assert_eq!(config.max_attributes, 1024);
		assert_eq!(config.max_response_size, 16384);
	}

	#[test]
	fn test_partial_override() {
		let layer = WireConfigLayer {
			max_attributes: Some(8),
			..Default::default()
		};
		let limits = layer.finalize().to_limits();
		assert_eq!(limits.max_attributes, 8);
		assert_eq!(limits.max_request_size, 65536);
	}
}
