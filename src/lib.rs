//! Request-scoped context values with typed getters and setters.
//!
//! ```
//! use request_context::{make_context, RequestScope};
//!
//! let (user_id, set_user_id) = make_context::<u64>("userId");
//!
//! let mut scope = RequestScope::new();
//! assert!(user_id.get(&scope).is_err());
//! set_user_id.set(&mut scope, 42);
//! assert_eq!(user_id.get(&scope), Ok(&42));
//!
//! // next request starts empty
//! let scope = RequestScope::new();
//! assert!(user_id.get(&scope).is_err());
//! ```

pub mod errors;
pub mod context;
pub mod scope;

pub use context::{make_context, ContextGetter, ContextId, ContextKey, ContextSetter};
pub use errors::{ContextError, Result};
pub use scope::{RequestScope, ScopeId, ScopeSnapshot};
