//! Records - structured types and lazily-initialized members
//!
//! A deferred name cannot become a member of a record *type*: there is no
//! live instance whose slot could be rebound once the proxy resolves, so the
//! builder rejects it. Live instances can instead carry a [`LazyMember`]
//! that resolves on first read and caches the value.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};

use crate::binding::Proxy;
use crate::context::ResolutionContext;
use crate::error::{DeferError, Result};
use crate::loader::Artifact;
use crate::scope::{Bound, LazyCell};

/// Immutable record type with default member values
#[derive(Debug, Clone)]
pub struct RecordType {
    name: Arc<str>,
    members: IndexMap<String, Artifact>,
}

impl RecordType {
    pub fn builder(name: impl Into<Arc<str>>) -> RecordTypeBuilder {
        RecordTypeBuilder {
            name: name.into(),
            members: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn member(&self, name: &str) -> Option<&Artifact> {
        self.members.get(name)
    }

    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    /// New live instance seeded with the type's member values
    pub fn instantiate(self: &Arc<Self>) -> RecordInstance {
        let fields = self
            .members
            .iter()
            .map(|(name, value)| (name.clone(), Field::Value(Arc::clone(value))))
            .collect();
        RecordInstance {
            ty: Arc::clone(self),
            fields: RwLock::new(fields),
        }
    }
}

#[derive(Debug)]
pub struct RecordTypeBuilder {
    name: Arc<str>,
    members: IndexMap<String, Artifact>,
}

impl RecordTypeBuilder {
    /// Add a member; a deferred (proxy) value is a usage error
    pub fn member(mut self, name: impl Into<String>, value: impl Into<Bound>) -> Result<Self> {
        let name = name.into();
        match value.into() {
            Bound::Value(value) => {
                self.members.insert(name, value);
                Ok(self)
            }
            Bound::Proxy(proxy) => Err(DeferError::UnsupportedBindingContext {
                record: self.name.to_string(),
                member: name,
                target: proxy.qualified_name(),
            }),
        }
    }

    pub fn build(self) -> Arc<RecordType> {
        Arc::new(RecordType {
            name: self.name,
            members: self.members,
        })
    }
}

#[derive(Clone)]
enum Field {
    Value(Artifact),
    Lazy(Arc<LazyMember>),
}

/// Live record instance
pub struct RecordInstance {
    ty: Arc<RecordType>,
    fields: RwLock<IndexMap<String, Field>>,
}

impl RecordInstance {
    pub fn record_type(&self) -> &Arc<RecordType> {
        &self.ty
    }

    /// Install a lazily-resolved member backed by `proxy`
    pub fn attach_lazy(&self, name: impl Into<String>, proxy: Proxy) -> Arc<LazyMember> {
        let name = name.into();
        let member = Arc::new(LazyMember::new(name.clone(), Arc::clone(&self.ty.name), proxy));
        self.fields
            .write()
            .insert(name, Field::Lazy(Arc::clone(&member)));
        member
    }

    /// Read a member; a lazy member resolves on first read
    pub fn get(&self, name: &str, ctx: &ResolutionContext) -> Result<Artifact> {
        let field = self.fields.read().get(name).cloned();
        match field {
            Some(Field::Value(value)) => Ok(value),
            Some(Field::Lazy(member)) => member.value(ctx),
            None => Err(self.not_found(name)),
        }
    }

    /// Assign a member; a lazy member is overridden without resolving
    pub fn set(&self, name: impl Into<String>, value: Artifact) {
        let name = name.into();
        let mut fields = self.fields.write();
        match fields.get(&name) {
            Some(Field::Lazy(member)) => member.set(value),
            _ => {
                fields.insert(name, Field::Value(value));
            }
        }
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        let mut fields = self.fields.write();
        match fields.get(name) {
            Some(Field::Lazy(member)) => member.delete(),
            Some(Field::Value(_)) => {
                fields.shift_remove(name);
                Ok(())
            }
            None => Err(self.not_found(name)),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.read().contains_key(name)
    }

    fn not_found(&self, name: &str) -> DeferError {
        DeferError::NameNotFound {
            name: name.to_string(),
            scope: self.ty.name.to_string(),
        }
    }
}

impl fmt::Debug for RecordInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.fields.read().keys().cloned().collect();
        f.debug_struct("RecordInstance")
            .field("type", &self.ty.name)
            .field("fields", &names)
            .finish()
    }
}

#[derive(Debug, Clone)]
enum MemberState {
    Unresolved,
    Value(Artifact),
    Deleted,
}

/// Lazily-initialized property with single-resolution semantics
pub struct LazyMember {
    name: String,
    owner: Arc<str>,
    proxy: Proxy,
    state: Mutex<MemberState>,
}

impl LazyMember {
    fn new(name: String, owner: Arc<str>, proxy: Proxy) -> Self {
        Self {
            name,
            owner,
            proxy,
            state: Mutex::new(MemberState::Unresolved),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    /// Resolve (once) and return the cached value
    pub fn value(&self, ctx: &ResolutionContext) -> Result<Artifact> {
        match &*self.state.lock() {
            MemberState::Value(value) => return Ok(Arc::clone(value)),
            MemberState::Deleted => return Err(self.deleted()),
            MemberState::Unresolved => {}
        }

        // Lock released while the proxy resolves
        let resolved = self.proxy.resolve(ctx)?;

        let mut state = self.state.lock();
        match &*state {
            MemberState::Unresolved => {
                *state = MemberState::Value(Arc::clone(&resolved));
                Ok(resolved)
            }
            MemberState::Value(value) => Ok(Arc::clone(value)),
            MemberState::Deleted => Err(self.deleted()),
        }
    }

    /// Override without resolving
    pub fn set(&self, value: Artifact) {
        *self.state.lock() = MemberState::Value(value);
    }

    pub fn delete(&self) -> Result<()> {
        let mut state = self.state.lock();
        if matches!(*state, MemberState::Deleted) {
            return Err(self.deleted());
        }
        *state = MemberState::Deleted;
        Ok(())
    }

    fn deleted(&self) -> DeferError {
        DeferError::NameNotFound {
            name: self.name.clone(),
            scope: self.owner.to_string(),
        }
    }
}

impl LazyCell for LazyMember {
    fn get(&self, ctx: &ResolutionContext) -> Result<Bound> {
        self.value(ctx).map(Bound::Value)
    }

    fn is_resolved(&self) -> bool {
        matches!(*self.state.lock(), MemberState::Value(_))
    }
}

impl fmt::Debug for LazyMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyMember")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("state", &*self.state.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{AttributeChain, BindingRequest, SourceLocation};
    use crate::loader::Resolver;
    use crate::scope::Scope;
    use crate::test_fixtures::{sample_loader, StaticLoader};
    use serde_json::json;

    fn proxy_for(loader: Arc<StaticLoader>, target: &str) -> (Scope, Proxy) {
        let resolver = Arc::new(Resolver::new(loader));
        let scope = Scope::new("app", Arc::clone(&resolver));
        let request = BindingRequest::new(
            target,
            AttributeChain::new(),
            &scope,
            SourceLocation::new("src/app.rs", 5),
        );
        let proxy = Proxy::new(request, None, None, resolver);
        (scope, proxy)
    }

    #[test]
    fn builder_rejects_deferred_members() {
        let (_scope, proxy) = proxy_for(Arc::new(sample_loader()), "pkg");
        let err = RecordType::builder("Settings")
            .member("version", json!("1.0"))
            .unwrap()
            .member("pkg", proxy)
            .unwrap_err();

        assert!(matches!(err, DeferError::UnsupportedBindingContext { .. }));
        assert!(err.to_string().contains("binding context not supported"));
    }

    #[test]
    fn instance_starts_with_type_members() {
        let ty = RecordType::builder("Settings")
            .member("debug", json!(false))
            .unwrap()
            .build();
        let instance = ty.instantiate();

        let debug = instance.get("debug", &ResolutionContext::new()).unwrap();
        assert_eq!(*debug, json!(false));
        assert_eq!(ty.member_names().collect::<Vec<_>>(), vec!["debug"]);
    }

    #[test]
    fn lazy_member_resolves_once() {
        let loader = Arc::new(sample_loader());
        let (_scope, proxy) = proxy_for(Arc::clone(&loader), "pkg");
        let instance = RecordType::builder("Holder").build().instantiate();
        let member = instance.attach_lazy("pkg", proxy);
        let ctx = ResolutionContext::new();

        assert!(!member.is_resolved());
        let first = instance.get("pkg", &ctx).unwrap();
        let second = instance.get("pkg", &ctx).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(member.is_resolved());
        assert_eq!(loader.call_count("pkg"), 1);
    }

    #[test]
    fn lazy_member_set_overrides_without_resolving() {
        let loader = Arc::new(sample_loader());
        let (_scope, proxy) = proxy_for(Arc::clone(&loader), "pkg");
        let instance = RecordType::builder("Holder").build().instantiate();
        instance.attach_lazy("pkg", proxy);

        instance.set("pkg", Arc::new(json!("override")));
        let value = instance.get("pkg", &ResolutionContext::new()).unwrap();

        assert_eq!(*value, json!("override"));
        assert_eq!(loader.call_count("pkg"), 0);
    }

    #[test]
    fn lazy_member_get_after_delete_fails() {
        let (_scope, proxy) = proxy_for(Arc::new(sample_loader()), "pkg");
        let instance = RecordType::builder("Holder").build().instantiate();
        instance.attach_lazy("pkg", proxy);

        instance.delete("pkg").unwrap();
        let err = instance.get("pkg", &ResolutionContext::new()).unwrap_err();
        assert!(matches!(err, DeferError::NameNotFound { .. }));
        assert!(instance.delete("pkg").is_err());
    }

    #[test]
    fn plain_fields_set_and_delete() {
        let instance = RecordType::builder("Holder").build().instantiate();
        instance.set("x", Arc::new(json!(1)));
        assert!(instance.contains("x"));
        instance.delete("x").unwrap();
        assert!(!instance.contains("x"));
        assert!(instance.delete("x").is_err());
    }
}
