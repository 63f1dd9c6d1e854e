/// A type-erased error, used as the escape hatch when a leaf error type
/// would otherwise have to grow a catch-all variant for every driver crate's
/// own error type.
///
/// Mirrors `dozer_types::errors::internal::BoxedError` in spirit: callers
/// that need structure should match on the concrete leaf error type before
/// it gets boxed, not downcast this.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;
