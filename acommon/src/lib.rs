//! Shared utilities and strongly-typed common values for workspace crates.
//!
//! ```rust
//! use acommon::{CancellationController, GenerationOptions, MessageId, SessionId};
//!
//! let session = SessionId::from("session-1");
//! let message = MessageId::new("message-1");
//! let options = GenerationOptions::default().with_temperature(0.7).enable_streaming();
//! let controller = CancellationController::new();
//!
//! assert_eq!(session.as_str(), "session-1");
//! assert_eq!(message.to_string(), "message-1");
//! assert!(options.stream);
//! assert!(!controller.token().is_aborted());
//! ```

pub mod cancel;

pub mod future {
    //! Shared async future aliases.
    //!
    //! ```rust
    //! use acommon::BoxFuture;
    //!
    //! fn str_len<'a>(value: &'a str) -> BoxFuture<'a, usize> {
    //!     Box::pin(async move { value.len() })
    //! }
    //!
    //! let _future = str_len("hello");
    //! ```

    use std::future::Future;
    use std::pin::Pin;

    pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
}

pub mod context {
    //! Cross-crate identifier newtypes.
    //!
    //! ```rust
    //! use acommon::{MessageId, SessionId};
    //!
    //! let session = SessionId::new("session-42");
    //! let message = MessageId::from("message-42");
    //!
    //! assert_eq!(session.to_string(), "session-42");
    //! assert_eq!(message.as_str(), "message-42");
    //! ```

    use std::fmt::{Display, Formatter};

    use serde::{Deserialize, Serialize};

    macro_rules! string_id {
        ($(#[$meta:meta])* $name:ident) => {
            $(#[$meta])*
            #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(String);

            impl $name {
                pub fn new(value: impl Into<String>) -> Self {
                    Self(value.into())
                }

                pub fn as_str(&self) -> &str {
                    self.0.as_str()
                }
            }

            impl Display for $name {
                fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                    f.write_str(&self.0)
                }
            }

            impl From<String> for $name {
                fn from(value: String) -> Self {
                    Self(value)
                }
            }

            impl From<&str> for $name {
                fn from(value: &str) -> Self {
                    Self(value.to_string())
                }
            }

            impl AsRef<str> for $name {
                fn as_ref(&self) -> &str {
                    self.as_str()
                }
            }
        };
    }

    string_id!(
        /// Identifies one chat session in a session store.
        SessionId
    );

    string_id!(
        /// Identifies one message inside a chat session.
        MessageId
    );
}

pub mod model {
    //! Shared generation settings used by request types.
    //!
    //! ```rust
    //! use acommon::GenerationOptions;
    //!
    //! let options = GenerationOptions::default()
    //!     .with_temperature(0.3)
    //!     .with_max_tokens(512);
    //!
    //! assert_eq!(options.temperature, Some(0.3));
    //! assert_eq!(options.max_tokens, Some(512));
    //! assert!(!options.stream);
    //! ```

    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    pub struct GenerationOptions {
        pub temperature: Option<f32>,
        pub max_tokens: Option<u32>,
        pub stream: bool,
    }

    impl GenerationOptions {
        pub fn with_temperature(mut self, temperature: f32) -> Self {
            self.temperature = Some(temperature);
            self
        }

        pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
            self.max_tokens = Some(max_tokens);
            self
        }

        pub fn with_streaming(mut self, stream: bool) -> Self {
            self.stream = stream;
            self
        }

        pub fn enable_streaming(self) -> Self {
            self.with_streaming(true)
        }
    }
}

pub mod registry {
    //! Generic registry map wrapper used by keyed runtime stores.
    //!
    //! ```rust
    //! use acommon::Registry;
    //!
    //! let mut registry = Registry::new();
    //! registry.insert("alpha".to_string(), 1_u32);
    //!
    //! assert_eq!(registry.get("alpha"), Some(&1));
    //! assert!(registry.contains_key("alpha"));
    //! ```

    use std::borrow::Borrow;
    use std::collections::HashMap;
    use std::hash::Hash;

    #[derive(Debug, Clone)]
    pub struct Registry<K, V> {
        items: HashMap<K, V>,
    }

    impl<K, V> Default for Registry<K, V>
    where
        K: Eq + Hash,
    {
        fn default() -> Self {
            Self {
                items: HashMap::new(),
            }
        }
    }

    impl<K, V> Registry<K, V>
    where
        K: Eq + Hash,
    {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&mut self, key: K, value: V) -> Option<V> {
            self.items.insert(key, value)
        }

        pub fn get<Q>(&self, key: &Q) -> Option<&V>
        where
            K: Borrow<Q>,
            Q: Eq + Hash + ?Sized,
        {
            self.items.get(key)
        }

        pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
        where
            K: Borrow<Q>,
            Q: Eq + Hash + ?Sized,
        {
            self.items.get_mut(key)
        }

        pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
        where
            K: Borrow<Q>,
            Q: Eq + Hash + ?Sized,
        {
            self.items.remove(key)
        }

        pub fn contains_key<Q>(&self, key: &Q) -> bool
        where
            K: Borrow<Q>,
            Q: Eq + Hash + ?Sized,
        {
            self.items.contains_key(key)
        }

        pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
            self.items.iter()
        }

        pub fn len(&self) -> usize {
            self.items.len()
        }

        pub fn is_empty(&self) -> bool {
            self.items.is_empty()
        }
    }
}

pub use cancel::{CancellationController, CancellationToken};
pub use context::{MessageId, SessionId};
pub use future::BoxFuture;
pub use model::GenerationOptions;
pub use registry::Registry;

#[cfg(test)]
mod tests {
    use super::{GenerationOptions, MessageId, Registry, SessionId};

    #[test]
    fn id_newtypes_round_trip_strings() {
        let session = SessionId::new("session-1");
        let message = MessageId::from("message-1");

        assert_eq!(session.as_str(), "session-1");
        assert_eq!(message.as_str(), "message-1");
        assert_eq!(session.to_string(), "session-1");
        assert_eq!(message.to_string(), "message-1");
    }

    #[test]
    fn generation_options_builder_helpers_set_values() {
        let options = GenerationOptions::default()
            .with_temperature(0.3)
            .with_max_tokens(123)
            .enable_streaming();

        assert_eq!(options.temperature, Some(0.3));
        assert_eq!(options.max_tokens, Some(123));
        assert!(options.stream);
    }

    #[test]
    fn generic_registry_basic_lifecycle() {
        let mut registry = Registry::new();
        assert!(registry.is_empty());

        registry.insert("alpha".to_string(), 1_u32);
        assert_eq!(registry.get("alpha"), Some(&1));
        assert!(registry.contains_key("alpha"));
        if let Some(value) = registry.get_mut("alpha") {
            *value += 1;
        }
        assert_eq!(registry.get("alpha"), Some(&2));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.iter().count(), 1);

        let removed = registry.remove("alpha");
        assert_eq!(removed, Some(2));
        assert!(registry.is_empty());
    }
}
