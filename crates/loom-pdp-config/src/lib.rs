// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for hosts embedding the Loom policy decision point.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Wire codec limits handed to [`loom_pdp::Context::from_wire`] and [`loom_pdp::Response::marshal`]
//! - Global tracing subscriber setup
//!
//! # Usage
//!
//! ```ignore
//! use loom_pdp_config::{init_logging, load_config};
//!
//! let config = load_config()?;
//! init_logging(&config.logging)?;
//! let limits = config.wire.to_limits();
//! ```

pub mod error;
pub mod layer;
pub mod logging;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::PdpConfigLayer;
pub use logging::{env_filter, init_logging};
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PdpConfig {
	pub wire: WireConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`LOOM_PDP_*`)
/// 2. Config file (`/etc/loom/pdp.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<PdpConfig, ConfigError> {
	let sources: Vec<Box<dyn ConfigSource>> = vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	];
	load_sources(sources)
}

/// Load configuration from environment only.
pub fn load_config_from_env() -> Result<PdpConfig, ConfigError> {
	let mut merged = PdpConfigLayer::default();
	merged.merge(EnvSource.load()?);
	finalize(merged)
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<PdpConfig, ConfigError> {
	let sources: Vec<Box<dyn ConfigSource>> = vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	];
	load_sources(sources)
}

fn load_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<PdpConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = PdpConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
fn finalize(layer: PdpConfigLayer) -> Result<PdpConfig, ConfigError> {
	let wire = layer.wire.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	validate_config(&wire)?;

	info!(
		max_request_size = wire.max_request_size,
		max_attributes = wire.max_attributes,
		max_response_size = wire.max_response_size,
		log_level = %logging.level,
		log_format = %logging.format,
		"PDP configuration loaded"
	);

	Ok(PdpConfig { wire, logging })
}

fn validate_config(wire: &WireConfig) -> Result<(), ConfigError> {
	let limits = [
		("wire.max_request_size", wire.max_request_size),
		("wire.max_attributes", wire.max_attributes),
		("wire.max_response_size", wire.max_response_size),
	];
	if let Some((name, _)) = limits.iter().find(|(_, v)| *v == 0) {
		return Err(ConfigError::Validation(format!("{name} must be greater than zero")));
	}

	// An empty response still carries version, effect, error count and obligation count.
	if wire.max_response_size < 7 {
		return Err(ConfigError::Validation(format!(
			"wire.max_response_size {} can't hold an empty response",
			wire.max_response_size
		)));
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use std::io::Write;

	#[test]
	fn test_defaults() {
		let config = finalize(PdpConfigLayer::default()).unwrap();
		assert_eq!(config, PdpConfig::default());
		assert_eq!(config.wire.to_limits(), loom_pdp::WireLimits::default());
	}

	#[test]
	fn test_zero_limit_rejected() {
		let layer = PdpConfigLayer {
			wire: Some(WireConfigLayer {
				max_attributes: Some(0),
				..Default::default()
			}),
			logging: None,
		};
		let err = finalize(layer).unwrap_err();
		assert!(err.to_string().contains("wire.max_attributes"));
	}

	#[test]
	fn test_tiny_response_buffer_rejected() {
		let wire = WireConfig {
			max_response_size: 6,
			..Default::default()
		};
		assert!(matches!(validate_config(&wire), Err(ConfigError::Validation(_))));
	}

	#[test]
	fn test_file_values_applied() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(
			file,
			"[wire]\nmax_attributes = 32\n\n[logging]\nlevel = \"loom_pdp=debug\""
		)
		.unwrap();

		let sources: Vec<Box<dyn ConfigSource>> = vec![
			Box::new(TomlSource::new(file.path())),
			Box::new(DefaultsSource),
		];
		let config = load_sources(sources).unwrap();
		assert_eq!(config.wire.max_attributes, 32);
		assert_eq!(config.wire.max_request_size, 65536);
		assert_eq!(config.logging.level, "loom_pdp=debug");
	}

	#[test]
	fn test_invalid_file_fails_load() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[wire]\nmax_attributes = \"many\"").unwrap();

		let sources: Vec<Box<dyn ConfigSource>> = vec![Box::new(TomlSource::new(file.path()))];
		let err = load_sources(sources).unwrap_err();
		assert!(matches!(err, ConfigError::TomlParse { .. }));
	}

	proptest! {
		#[test]
		fn nonzero_limits_survive_finalize(
			request in 1usize..1_000_000,
			attributes in 1usize..10_000,
			response in 7usize..1_000_000,
		) {
			let layer = PdpConfigLayer {
				wire: Some(WireConfigLayer {
					max_request_size: Some(request),
					max_attributes: Some(attributes),
					max_response_size: Some(response),
				}),
				logging: None,
			};
			let limits = finalize(layer).unwrap().wire.to_limits();
			prop_assert_eq!(limits.max_request_size, request);
			prop_assert_eq!(limits.max_attributes, attributes);
			prop_assert_eq!(limits.max_response_size, response);
		}
	}
}
