//! Declarative helpers for the closed string vocabularies used by records.

/// Declares a fieldless enum whose variants serialize as fixed snake_case
/// strings, together with `as_str`, `ALL`, `Display` and `FromStr`.
///
/// Parsing an unknown string yields a [`crate::ParseEnumError`] naming the
/// vocabulary, so a status outside the allowed set can never be constructed.
macro_rules! string_enum {
	(
		$(#[$meta:meta])*
		pub enum $name:ident ($kind:literal) {
			$( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
		}
	) => {
		$(#[$meta])*
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
		pub enum $name {
			$( $(#[$vmeta])* #[serde(rename = $text)] $variant ),+
		}

		impl $name {
			/// Every variant, in declaration order.
			pub const ALL: &'static [$name] = &[$($name::$variant),+];

			/// Returns the wire representation of this variant.
			pub fn as_str(&self) -> &'static str {
				match self {
					$($name::$variant => $text),+
				}
			}
		}

		impl std::fmt::Display for $name {
			fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
				f.write_str(self.as_str())
			}
		}

		impl std::str::FromStr for $name {
			type Err = crate::ParseEnumError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				match s {
					$($text => Ok($name::$variant),)+
					other => Err(crate::ParseEnumError {
						kind: $kind,
						value: other.to_string(),
					}),
				}
			}
		}
	};
}

/// Implements [`crate::Entity`] for a record type holding a flattened
/// `meta: RecordMeta` field.
macro_rules! entity {
	($ty:ty, $key:expr) => {
		impl crate::Entity for $ty {
			const KEY: crate::StorageKey = $key;

			fn meta(&self) -> &crate::RecordMeta {
				&self.meta
			}

			fn meta_mut(&mut self) -> &mut crate::RecordMeta {
				&mut self.meta
			}
		}
	};
}
