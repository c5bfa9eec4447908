// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Attribute types.
//!
//! The engine knows a fixed set of built-in types plus any number of
//! [`FlagsType`]s defined at runtime. Built-in types are compared by
//! identity; flags types are compared structurally by their ordered flag
//! names, so two independently declared types with the same flags are
//! interchangeable during evaluation.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::TypeError;

/// Maximum number of flags a single flags type can hold.
pub const MAX_FLAGS: usize = 64;

/// Type of an attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
	Undefined,
	Boolean,
	String,
	Integer,
	Float,
	Address,
	Network,
	Domain,
	SetOfStrings,
	SetOfNetworks,
	SetOfDomains,
	ListOfStrings,
	Flags(Arc<FlagsType>),
}

/// All built-in types in declaration order.
pub static BUILTIN_TYPES: [Type; 12] = [
	Type::Undefined,
	Type::Boolean,
	Type::String,
	Type::Integer,
	Type::Float,
	Type::Address,
	Type::Network,
	Type::Domain,
	Type::SetOfStrings,
	Type::SetOfNetworks,
	Type::SetOfDomains,
	Type::ListOfStrings,
];

impl Type {
	/// Creates a new flags type. See [`FlagsType::new`].
	pub fn new_flags<S: AsRef<str>>(name: &str, flags: &[S]) -> Result<Type, TypeError> {
		FlagsType::new(name, flags).map(|t| Type::Flags(Arc::new(t)))
	}

	/// Lowercase key identifying the type. Flags types use their declared name.
	pub fn key(&self) -> &str {
		match self {
			Type::Undefined => "undefined",
			Type::Boolean => "boolean",
			Type::String => "string",
			Type::Integer => "integer",
			Type::Float => "float",
			Type::Address => "address",
			Type::Network => "network",
			Type::Domain => "domain",
			Type::SetOfStrings => "set of strings",
			Type::SetOfNetworks => "set of networks",
			Type::SetOfDomains => "set of domains",
			Type::ListOfStrings => "list of strings",
			Type::Flags(t) => t.name(),
		}
	}

	/// Resolves a built-in type by key, ignoring case.
	pub fn from_key(key: &str) -> Option<Type> {
		let key = key.to_lowercase();
		BUILTIN_TYPES.iter().find(|t| t.key() == key).cloned()
	}

	pub fn is_builtin(&self) -> bool {
		!matches!(self, Type::Flags(_))
	}

	pub fn as_flags(&self) -> Option<&Arc<FlagsType>> {
		match self {
			Type::Flags(t) => Some(t),
			_ => None,
		}
	}

	/// Returns true if a value of `other` can stand where `self` is expected.
	pub fn matches(&self, other: &Type) -> bool {
		match (self, other) {
			(Type::Flags(a), Type::Flags(b)) => a.flags == b.flags,
			(Type::Flags(_), _) | (_, Type::Flags(_)) => false,
			(a, b) => a == b,
		}
	}
}

impl fmt::Display for Type {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.key())
	}
}

/// A bit-set type defined by an ordered list of flag names.
///
/// Each flag owns the bit at its declaration index. The capacity is the
/// smallest of 8, 16, 32 or 64 bits that fits all flags.
#[derive(Debug, Clone)]
pub struct FlagsType {
	name: String,
	flags: Vec<String>,
	bits: HashMap<String, usize>,
	capacity: u32,
}

impl FlagsType {
	pub fn new<S: AsRef<str>>(name: &str, flags: &[S]) -> Result<Self, TypeError> {
		if Type::from_key(name).is_some() {
			return Err(TypeError::DuplicatesBuiltinType(name.to_string()));
		}

		if flags.is_empty() {
			return Err(TypeError::NoFlagsDefined(name.to_string()));
		}

		if flags.len() > MAX_FLAGS {
			return Err(TypeError::TooManyFlagsDefined {
				name: name.to_string(),
				count: flags.len(),
			});
		}

		let mut bits = HashMap::with_capacity(flags.len());
		for (i, flag) in flags.iter().enumerate() {
			let flag = flag.as_ref();
			if bits.insert(flag.to_string(), i).is_some() {
				return Err(TypeError::DuplicateFlagName {
					name: name.to_string(),
					flag: flag.to_string(),
				});
			}
		}

		let capacity = match flags.len() {
			0..=8 => 8,
			9..=16 => 16,
			17..=32 => 32,
			_ => 64,
		};

		Ok(Self {
			name: name.to_string(),
			flags: flags.iter().map(|f| f.as_ref().to_string()).collect(),
			bits,
			capacity,
		})
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn flags(&self) -> &[String] {
		&self.flags
	}

	/// Bit width of values of this type: 8, 16, 32 or 64.
	pub fn capacity(&self) -> u32 {
		self.capacity
	}

	/// Bit position of the named flag.
	pub fn bit(&self, flag: &str) -> Option<usize> {
		self.bits.get(flag).copied()
	}

	pub fn flag_name(&self, bit: usize) -> Option<&str> {
		self.flags.get(bit).map(String::as_str)
	}

	/// Mask with a bit set for every defined flag.
	pub fn mask(&self) -> u64 {
		if self.flags.len() == MAX_FLAGS {
			u64::MAX
		} else {
			(1u64 << self.flags.len()) - 1
		}
	}
}

impl PartialEq for FlagsType {
	fn eq(&self, other: &Self) -> bool {
		self.name == other.name && self.flags == other.flags
	}
}

impl Eq for FlagsType {}

impl Hash for FlagsType {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.name.hash(state);
		self.flags.hash(state);
	}
}

/// Ordered list of argument types, as used for function signatures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature(Vec<Type>);

impl Signature {
	pub fn new(types: impl IntoIterator<Item = Type>) -> Self {
		Self(types.into_iter().collect())
	}

	pub fn types(&self) -> &[Type] {
		&self.0
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl fmt::Display for Signature {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write_type_list(f, &self.0)
	}
}

/// Set of types kept sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeSet(Vec<Type>);

impl TypeSet {
	pub fn new(types: impl IntoIterator<Item = Type>) -> Self {
		let mut set = Self::default();
		for t in types {
			set.insert(t);
		}
		set
	}

	pub fn insert(&mut self, t: Type) {
		if let Err(pos) = self.position(&t) {
			self.0.insert(pos, t);
		}
	}

	pub fn contains(&self, t: &Type) -> bool {
		self.position(t).is_ok()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &Type> {
		self.0.iter()
	}

	fn position(&self, t: &Type) -> Result<usize, usize> {
		let flags = |t: &Type| t.as_flags().map(|f| f.flags().to_vec());
		self
			.0
			.binary_search_by(|entry| entry.key().cmp(t.key()).then_with(|| flags(entry).cmp(&flags(t))))
	}
}

impl fmt::Display for TypeSet {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write_type_list(f, &self.0)
	}
}

fn write_type_list(f: &mut fmt::Formatter<'_>, types: &[Type]) -> fmt::Result {
	if types.is_empty() {
		return f.write_str("empty");
	}

	for (i, t) in types.iter().enumerate() {
		if i > 0 {
			f.write_str(", ")?;
		}
		write!(f, "\"{}\"", t.key())?;
	}
	Ok(())
}

/// Registry of custom types known to a decoder, looked up by name.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
	types: HashMap<String, Type>,
}

impl TypeRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a custom type under its key.
	pub fn register(&mut self, t: Type) -> Result<(), TypeError> {
		if t.is_builtin() {
			return Err(TypeError::DuplicatesBuiltinType(t.key().to_string()));
		}

		let key = t.key().to_string();
		if self.types.contains_key(&key) {
			return Err(TypeError::DuplicateCustomType(key));
		}

		self.types.insert(key, t);
		Ok(())
	}

	/// Resolves a built-in type by key, or a registered custom type by name.
	pub fn get(&self, key: &str) -> Result<Type, TypeError> {
		if let Some(t) = Type::from_key(key) {
			return Ok(t);
		}

		self
			.types
			.get(key)
			.cloned()
			.ok_or_else(|| TypeError::UnknownType(key.to_string()))
	}

	pub fn flags(&self, name: &str) -> Option<&Arc<FlagsType>> {
		self.types.get(name).and_then(Type::as_flags)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn names(n: usize) -> Vec<String> {
		(0..n).map(|i| format!("f{i:02}")).collect()
	}

	mod flags_type {
		use super::*;

		#[test]
		fn rejects_builtin_name_ignoring_case() {
			let err = FlagsType::new("Set Of Strings", &["a"]).unwrap_err();
			assert_eq!(
				err,
				TypeError::DuplicatesBuiltinType("Set Of Strings".to_string())
			);
		}

		#[test]
		fn rejects_empty_flags() {
			let err = FlagsType::new("perms", &[] as &[&str]).unwrap_err();
			assert_eq!(err, TypeError::NoFlagsDefined("perms".to_string()));
		}

		#[test]
		fn rejects_more_than_64_flags() {
			let err = FlagsType::new("big", &names(65)).unwrap_err();
			assert_eq!(
				err,
				TypeError::TooManyFlagsDefined {
					name: "big".to_string(),
					count: 65
				}
			);
		}

		#[test]
		fn rejects_duplicate_flag_names() {
			let err = FlagsType::new("perms", &["read", "write", "read"]).unwrap_err();
			assert_eq!(
				err,
				TypeError::DuplicateFlagName {
					name: "perms".to_string(),
					flag: "read".to_string()
				}
			);
		}

		#[test]
		fn flag_names_are_case_sensitive() {
			let t = FlagsType::new("perms", &["read", "Read"]).unwrap();
			assert_eq!(t.bit("read"), Some(0));
			assert_eq!(t.bit("Read"), Some(1));
		}

		#[test]
		fn unknown_flag_has_no_bit() {
			let t = FlagsType::new("perms", &["read", "write"]).unwrap();
			assert_eq!(t.bit("exec"), None);
			assert_eq!(t.flag_name(1), Some("write"));
			assert_eq!(t.flag_name(2), None);
		}

		#[test]
		fn full_mask_for_64_flags() {
			let t = FlagsType::new("big", &names(64)).unwrap();
			assert_eq!(t.capacity(), 64);
			assert_eq!(t.mask(), u64::MAX);
		}
	}

	mod matching {
		use super::*;

		#[test]
		fn flags_match_by_structure_not_name() {
			let a = Type::new_flags("a", &["x", "y"]).unwrap();
			let b = Type::new_flags("b", &["x", "y"]).unwrap();
			assert!(a.matches(&b));
			assert_ne!(a, b);
		}

		#[test]
		fn flags_with_different_sequences_do_not_match() {
			let a = Type::new_flags("a", &["x", "y"]).unwrap();
			let b = Type::new_flags("b", &["y", "x"]).unwrap();
			let c = Type::new_flags("c", &["x", "y", "z"]).unwrap();
			assert!(!a.matches(&b));
			assert!(!a.matches(&c));
		}

		#[test]
		fn flags_never_match_builtins() {
			let a = Type::new_flags("a", &["x"]).unwrap();
			for builtin in BUILTIN_TYPES.iter() {
				assert!(!a.matches(builtin));
				assert!(!builtin.matches(&a));
			}
		}

		#[test]
		fn builtins_match_only_themselves() {
			assert!(Type::String.matches(&Type::String));
			assert!(!Type::String.matches(&Type::Domain));
		}
	}

	mod rendering {
		use super::*;

		#[test]
		fn empty_signature_and_set() {
			assert_eq!(Signature::default().to_string(), "empty");
			assert_eq!(TypeSet::default().to_string(), "empty");
		}

		#[test]
		fn signature_keeps_call_order() {
			let sig = Signature::new([Type::String, Type::Boolean]);
			assert_eq!(sig.to_string(), "\"string\", \"boolean\"");
		}

		#[test]
		fn type_set_sorts_and_deduplicates() {
			let set = TypeSet::new([Type::String, Type::Boolean, Type::String]);
			assert_eq!(set.len(), 2);
			assert_eq!(set.to_string(), "\"boolean\", \"string\"");
			assert!(set.contains(&Type::Boolean));
			assert!(!set.contains(&Type::Integer));
		}
	}

	mod registry {
		use super::*;

		#[test]
		fn resolves_builtins_and_registered_flags() {
			let mut registry = TypeRegistry::new();
			registry
				.register(Type::new_flags("perms", &["read"]).unwrap())
				.unwrap();

			assert_eq!(registry.get("Boolean").unwrap(), Type::Boolean);
			assert!(registry.flags("perms").is_some());
			assert_eq!(
				registry.get("other").unwrap_err(),
				TypeError::UnknownType("other".to_string())
			);
		}

		#[test]
		fn rejects_duplicate_registration() {
			let mut registry = TypeRegistry::new();
			registry
				.register(Type::new_flags("perms", &["read"]).unwrap())
				.unwrap();
			let err = registry
				.register(Type::new_flags("perms", &["write"]).unwrap())
				.unwrap_err();
			assert_eq!(err, TypeError::DuplicateCustomType("perms".to_string()));
		}
	}

	proptest! {
		#[test]
		fn capacity_is_smallest_fitting_width(k in 1usize..=64) {
			let t = FlagsType::new("t", &names(k)).unwrap();
			let expected = if k <= 8 { 8 } else if k <= 16 { 16 } else if k <= 32 { 32 } else { 64 };
			prop_assert_eq!(t.capacity(), expected);
		}

		#[test]
		fn bit_is_declaration_index(k in 1usize..=64, pick in 0usize..64) {
			let flags = names(k);
			let t = FlagsType::new("t", &flags).unwrap();
			let i = pick % k;
			prop_assert_eq!(t.bit(&flags[i]), Some(i));
			prop_assert_eq!(t.bit("missing"), None);
		}
	}
}
