//! Declarative field-resolution engine.
//!
//! A [`Schema`] declares the named fields a family of scrapers computes
//! from a source document: each field has a resolver closure, an
//! optional/required flag, and optionally a guard deciding whether the
//! resolver runs at all. A [`Scraper`] is one evaluation of a schema
//! against one document; constructing it attempts *every* field and
//! either yields a fully resolved instance or fails with a single
//! aggregate error listing every failing field.
//!
//! Schemas are immutable and cheaply shared (`Arc`); a derived schema is
//! built with [`Schema::extending`], which copies the parent's fields and
//! lets the child add fields or override same-named ones.
//!
//! # Examples
//!
//! ```
//! use gleaner::scraper::{Schema, Scraper, Value};
//! use gleaner::error::ResolveError;
//!
//! let schema = Schema::<String>::builder()
//!   .field("salutation", |s| {
//!     let text = s.source().clone();
//!     ["hello", "good morning"]
//!       .iter()
//!       .find(|w| text.to_lowercase().starts_with(**w))
//!       .map(|w| Value::String(w.to_string()))
//!       .ok_or_else(|| ResolveError::NotFound("no salutation".into()))
//!   })
//!   .optional_field("recipient", |s| {
//!     let text = s.source().clone();
//!     Ok(text.split_whitespace().nth(1).map(Value::from).unwrap_or(Value::Null))
//!   })
//!   .build();
//!
//! let scraper = Scraper::new(schema.clone(), "Hello World!".to_string()).unwrap();
//! assert_eq!(*scraper.value("salutation").unwrap(), "hello");
//!
//! assert!(Scraper::new(schema, "Hey!".to_string()).is_err());
//! ```

use std::{collections::HashMap, sync::Arc};

use crate::error::ResolveError;

/// One schema evaluation against one source document.
mod instance;

pub use self::instance::Scraper;

/// Dynamic value type for scraped fields.
pub type Value = serde_json::Value;

/// What a field resolver returns: a value, or one of the closed set of
/// resolution failures.
pub type ResolveResult = core::result::Result<Value, ResolveError>;

/// A field resolver: computes a value from the (mutably borrowed)
/// scraper instance, which allows memoized cross-field access through
/// [`Scraper::get`].
pub type Resolver<D> = Arc<dyn Fn(&mut Scraper<D>) -> ResolveResult + Send + Sync>;

/// A guard predicate evaluated against the instance.
pub type Predicate<D> =
  Arc<dyn Fn(&mut Scraper<D>) -> core::result::Result<bool, ResolveError> + Send + Sync>;

/// Truthiness used by guards built from other fields: everything except
/// `null` and `false` counts as true.
pub fn truthy(value: &Value) -> bool { !matches!(value, Value::Null | Value::Bool(false)) }

/// Conditional evaluation of a field.
///
/// A skipped field resolves to `null` without running its resolver, even
/// when the field is required; skipping is not a failure.
pub enum Guard<D> {
  /// Evaluate the field only when the predicate holds.
  If(Predicate<D>),
  /// Evaluate the field only when the predicate does not hold.
  Unless(Predicate<D>),
}

impl<D> Guard<D> {
  /// Guard that evaluates the field only when `predicate` returns true.
  pub fn when<F>(predicate: F) -> Self
  where F: Fn(&mut Scraper<D>) -> core::result::Result<bool, ResolveError> + Send + Sync + 'static
  {
    Guard::If(Arc::new(predicate))
  }

  /// Guard that skips the field when `predicate` returns true.
  pub fn unless<F>(predicate: F) -> Self
  where F: Fn(&mut Scraper<D>) -> core::result::Result<bool, ResolveError> + Send + Sync + 'static
  {
    Guard::Unless(Arc::new(predicate))
  }

  /// Guard that evaluates the field only when another field resolves to a
  /// truthy value.
  pub fn when_field(name: impl Into<String>) -> Self
  where D: 'static {
    let name = name.into();
    Guard::when(move |scraper| Ok(truthy(&scraper.get(&name)?)))
  }

  /// Whether this guard rules the field out for the given instance.
  pub(crate) fn should_skip(
    &self,
    scraper: &mut Scraper<D>,
  ) -> core::result::Result<bool, ResolveError> {
    match self {
      Guard::If(predicate) => Ok(!predicate(scraper)?),
      Guard::Unless(predicate) => predicate(scraper),
    }
  }
}

impl<D> Clone for Guard<D> {
  fn clone(&self) -> Self {
    match self {
      Guard::If(p) => Guard::If(p.clone()),
      Guard::Unless(p) => Guard::Unless(p.clone()),
    }
  }
}

/// Declaration of a single field: name, resolver, optionality, guard.
pub struct FieldSpec<D> {
  name:     String,
  resolver: Resolver<D>,
  optional: bool,
  guard:    Option<Guard<D>>,
}

impl<D> FieldSpec<D> {
  /// Declares a required, unguarded field.
  pub fn new<F>(name: impl Into<String>, resolver: F) -> Self
  where F: Fn(&mut Scraper<D>) -> ResolveResult + Send + Sync + 'static {
    Self { name: name.into(), resolver: Arc::new(resolver), optional: false, guard: None }
  }

  /// Marks the field optional: a `null` resolution is tolerated.
  pub fn optional(mut self) -> Self {
    self.optional = true;
    self
  }

  /// Attaches a guard controlling whether the resolver runs.
  pub fn guard(mut self, guard: Guard<D>) -> Self {
    self.guard = Some(guard);
    self
  }

  /// The declared field name.
  pub fn name(&self) -> &str { &self.name }

  /// Whether a `null` resolution is tolerated.
  pub(crate) fn is_optional(&self) -> bool { self.optional }

  /// The attached guard, if any.
  pub(crate) fn guard_ref(&self) -> Option<&Guard<D>> { self.guard.as_ref() }

  /// The resolver closure.
  pub(crate) fn resolver(&self) -> &Resolver<D> { &self.resolver }
}

impl<D> Clone for FieldSpec<D> {
  fn clone(&self) -> Self {
    Self {
      name:     self.name.clone(),
      resolver: self.resolver.clone(),
      optional: self.optional,
      guard:    self.guard.clone(),
    }
  }
}

impl<D> std::fmt::Debug for FieldSpec<D> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("FieldSpec")
      .field("name", &self.name)
      .field("optional", &self.optional)
      .field("guarded", &self.guard.is_some())
      .finish()
  }
}

/// Immutable registry of the fields a scraper family computes.
///
/// Built once per scraper type via [`Schema::builder`] or
/// [`Schema::extending`]; the effective field set is merged at build
/// time, last declaration winning per name.
#[derive(Debug)]
pub struct Schema<D> {
  fields: Vec<FieldSpec<D>>,
  index:  HashMap<String, usize>,
}

impl<D> Schema<D> {
  /// Starts an empty schema.
  pub fn builder() -> SchemaBuilder<D> { SchemaBuilder { fields: Vec::new() } }

  /// Starts a schema that inherits every field of `parent`.
  ///
  /// Fields declared afterwards with an already-present name override the
  /// inherited declaration.
  pub fn extending(parent: &Schema<D>) -> SchemaBuilder<D> {
    SchemaBuilder { fields: parent.fields.clone() }
  }

  /// The declared field names, in declaration order.
  pub fn field_names(&self) -> Vec<String> {
    self.fields.iter().map(|spec| spec.name.clone()).collect()
  }

  /// Whether a field with this name is declared.
  pub fn declares(&self, name: &str) -> bool { self.index.contains_key(name) }

  /// Looks up the declaration for `name`.
  pub(crate) fn spec(&self, name: &str) -> Option<&FieldSpec<D>> {
    self.index.get(name).map(|&i| &self.fields[i])
  }
}

/// Accumulates field declarations for a [`Schema`].
pub struct SchemaBuilder<D> {
  fields: Vec<FieldSpec<D>>,
}

impl<D> SchemaBuilder<D> {
  /// Declares a required field with the given resolver.
  pub fn field<F>(self, name: impl Into<String>, resolver: F) -> Self
  where F: Fn(&mut Scraper<D>) -> ResolveResult + Send + Sync + 'static {
    self.declare(FieldSpec::new(name, resolver))
  }

  /// Declares an optional field with the given resolver.
  pub fn optional_field<F>(self, name: impl Into<String>, resolver: F) -> Self
  where F: Fn(&mut Scraper<D>) -> ResolveResult + Send + Sync + 'static {
    self.declare(FieldSpec::new(name, resolver).optional())
  }

  /// Declares a field from a full [`FieldSpec`], replacing any earlier
  /// declaration with the same name.
  pub fn declare(mut self, spec: FieldSpec<D>) -> Self {
    match self.fields.iter().position(|f| f.name == spec.name) {
      Some(i) => self.fields[i] = spec,
      None => self.fields.push(spec),
    }
    self
  }

  /// Freezes the declarations into a shareable schema.
  pub fn build(self) -> Arc<Schema<D>> {
    let index =
      self.fields.iter().enumerate().map(|(i, spec)| (spec.name.clone(), i)).collect();
    Arc::new(Schema { fields: self.fields, index })
  }
}
