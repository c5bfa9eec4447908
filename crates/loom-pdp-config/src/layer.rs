// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Partial configuration produced by each source.

use serde::Deserialize;

use crate::sections::{LoggingConfigLayer, WireConfigLayer};

/// One source's view of the configuration; unset fields defer to lower layers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PdpConfigLayer {
	#[serde(default)]
	pub wire: Option<WireConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

impl PdpConfigLayer {
	/// Overlays `other` on top of `self`.
	pub fn merge(&mut self, other: PdpConfigLayer) {
		merge_section(&mut self.wire, other.wire, WireConfigLayer::merge);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

fn merge_section<T>(base: &mut Option<T>, other: Option<T>, merge: fn(&mut T, T)) {
	match (base.as_mut(), other) {
		(Some(b), Some(o)) => merge(b, o),
		(None, Some(o)) => *base = Some(o),
		(_, None) => {}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn higher_layer_overrides_set_fields_only() {
		let mut base: PdpConfigLayer = toml::from_str(
			r#"
			[wire]
			max_request_size = 100
			max_attributes = 10
			"#,
		)
		.unwrap();
		let over: PdpConfigLayer = toml::from_str(
			r#"
			[wire]
			max_attributes = 20
			[logging]
			level = "debug"
			"#,
		)
		.unwrap();

		base.merge(over);
		let wire = base.wire.unwrap();
		assert_eq!(wire.max_request_size, Some(100));
		assert_eq!(wire.max_attributes, Some(20));
		assert_eq!(base.logging.unwrap().level.as_deref(), Some("debug"));
	}

	#[test]
	fn empty_layer_changes_nothing() {
		let mut base = PdpConfigLayer {
			wire: Some(WireConfigLayer {
				max_response_size: Some(512),
				..Default::default()
			}),
			logging: None,
		};
		base.merge(PdpConfigLayer::default());
		assert_eq!(base.wire.unwrap().max_response_size, Some(512));
		assert!(base.logging.is_none());
	}
}
