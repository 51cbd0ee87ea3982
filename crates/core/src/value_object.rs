//! Value object trait: equality by value, not identity.
//!
//! Value objects are defined entirely by their attribute values. Two value
//! objects with the same values are considered equal, and they are immutable:
//! to "modify" one, build a new one.

/// Marker trait for value objects.
///
/// - **Value Object**: no identity (two with the same values are equal).
/// - **Entity**: has identity (two entities with the same ID are the same entity).
///
/// Example: a temperature range of 2–8 °C is a value object; a refrigerator
/// with that range is an entity.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
