// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Policy decision point for the Loom access-control layer.
//!
//! Given a request described by typed attributes, the engine walks a tree of
//! rules and policies and answers with an [`Effect`], an optional status and
//! the obligations attached to the decision.
//!
//! # Overview
//!
//! - [`Type`] and [`FlagsType`]: built-in value types and runtime-defined bit sets
//! - [`Context`]: immutable request attributes, built from a decoder or from wire bytes
//! - [`Target`]: applicability predicate; a missing attribute is a soft failure
//! - [`Rule`] and [`Policy`]: the persistent tree with copy-on-write edits
//! - [`CombiningAlgorithm`]: first-applicable, overrides and attribute mappers
//! - [`Response`]: the decision and its binary encoding
//!
//! # Example
//!
//! ```
//! use loom_pdp::{
//!     AttributeAssignment, AttributeValue, Context, Effect, Expression, Function, Match,
//!     Policy, Rule, Target, Type, TypeRegistry, WireLimits,
//! };
//!
//! let rule = Rule::permit("admins")
//!     .with_target(Target::single(Match::new(
//!         Function::Equal,
//!         Expression::designator("role", Type::String),
//!         Expression::value(AttributeValue::string("admin")),
//!     )))
//!     .with_obligation(AttributeAssignment::value("audit", AttributeValue::Boolean(true)));
//! let policy = Policy::rules("access").child(rule).build().unwrap();
//!
//! let request = loom_pdp::encode_request(&[("role", AttributeValue::string("admin"))]).unwrap();
//! let limits = WireLimits::default();
//! let ctx = Context::from_wire(&request, &TypeRegistry::new(), &limits, None).unwrap();
//!
//! let response = policy.calculate(&ctx);
//! assert_eq!(response.effect, Effect::Permit);
//! assert_eq!(response.obligations.len(), 1);
//!
//! let bytes = response.marshal(&ctx, &limits).unwrap();
//! let decoded = loom_pdp::decode_response(&bytes, &TypeRegistry::new()).unwrap();
//! assert_eq!(decoded.effect, Effect::Permit);
//! ```

pub mod algorithm;
pub mod content;
pub mod context;
pub mod error;
pub mod expression;
pub mod policy;
pub mod response;
pub mod rule;
pub mod storage;
pub mod target;
pub mod types;
pub mod value;
pub mod wire;

pub use algorithm::{CombiningAlgorithm, FlagsMapper, Mapper};
pub use content::{ContentItem, ContentNode, ContentRef, ContentStore, LocalContent, LocalContentStorage};
pub use context::Context;
pub use error::{EvalError, PolicyError, Result, TypeError, WireError};
pub use expression::{Call, Designator, Expression, Function, Selector};
pub use policy::{Node, NodeKind, Policy, PolicyBuilder};
pub use response::{Effect, Response};
pub use rule::Rule;
pub use storage::PolicyStorage;
pub use target::{AllOf, AnyOf, Match, Target, TargetMatch};
pub use types::{FlagsType, Signature, Type, TypeRegistry, TypeSet, BUILTIN_TYPES, MAX_FLAGS};
pub use value::{AttributeAssignment, AttributeValue, DomainName, StringSet};
pub use wire::{decode_request, decode_response, encode_request, DecodedResponse, RequestReader, WireLimits};
