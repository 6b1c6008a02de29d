use super::{
    AccessLogSubscription, Listener, ResourceKind, ResourceMeta, Rule, Service, ServiceNetwork,
    TargetGroup, Targets,
};
use crate::error::{Error, Result};
use std::{collections::BTreeMap, fmt};

/// Names the Kubernetes object a stack was built from.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StackId {
    pub namespace: String,
    pub name: String,
}

/// The desired-state graph for one reconciliation pass.
///
/// The engine reads specs and writes back statuses; it never adds or removes resources.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Stack {
    id: StackId,
    resources: BTreeMap<String, Resource>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Resource {
    ServiceNetwork(ServiceNetwork),
    Service(Service),
    Listener(Listener),
    Rule(Rule),
    TargetGroup(TargetGroup),
    Targets(Targets),
    AccessLogSubscription(AccessLogSubscription),
}

/// A typed view of one [`Resource`] variant.
pub trait StackResource: Sized + Into<Resource> {
    const KIND: ResourceKind;

    fn meta(&self) -> &ResourceMeta;

    fn from_resource(resource: &Resource) -> Option<&Self>;

    fn from_resource_mut(resource: &mut Resource) -> Option<&mut Self>;
}

// === impl StackId ===

impl StackId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl Default for StackId {
    fn default() -> Self {
        Self::new("default", "default")
    }
}

impl fmt::Display for StackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

// === impl Stack ===

impl Stack {
    pub fn new(id: StackId) -> Self {
        Self {
            id,
            resources: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &StackId {
        &self.id
    }

    /// Adds a resource, rejecting duplicate IDs and metadata whose kind disagrees with the
    /// resource's type.
    pub fn add(&mut self, resource: impl Into<Resource>) -> Result<()> {
        let resource = resource.into();
        let ResourceMeta { kind, id } = resource.meta().clone();
        if kind != resource.kind() {
            return Err(Error::KindMismatch {
                id,
                expected: resource.kind(),
                found: kind,
            });
        }
        if self.resources.contains_key(&id) {
            return Err(Error::DuplicateResource(id));
        }
        self.resources.insert(id, resource);
        Ok(())
    }

    /// Lists all resources of kind `R`, ordered by ID.
    pub fn list<'a, R: StackResource + 'a>(&'a self) -> impl Iterator<Item = &'a R> + 'a {
        self.resources.values().filter_map(R::from_resource)
    }

    /// The IDs of all resources of kind `R`, ordered.
    pub fn ids<R: StackResource>(&self) -> Vec<String> {
        self.list::<R>().map(|r| r.meta().id.clone()).collect()
    }

    pub fn get<R: StackResource>(&self, id: &str) -> Result<&R> {
        let resource = self
            .resources
            .get(id)
            .ok_or_else(|| Error::not_found(format!("{} {id} in stack {}", R::KIND, self.id)))?;
        R::from_resource(resource).ok_or_else(|| Error::KindMismatch {
            id: id.to_string(),
            expected: R::KIND,
            found: resource.kind(),
        })
    }

    pub fn get_mut<R: StackResource>(&mut self, id: &str) -> Result<&mut R> {
        let resource = self
            .resources
            .get_mut(id)
            .ok_or_else(|| Error::not_found(format!("{} {id} in stack {}", R::KIND, self.id)))?;
        let found = resource.kind();
        R::from_resource_mut(resource).ok_or_else(|| Error::KindMismatch {
            id: id.to_string(),
            expected: R::KIND,
            found,
        })
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

// === impl Resource ===

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::ServiceNetwork(_) => ResourceKind::ServiceNetwork,
            Self::Service(_) => ResourceKind::Service,
            Self::Listener(_) => ResourceKind::Listener,
            Self::Rule(_) => ResourceKind::Rule,
            Self::TargetGroup(_) => ResourceKind::TargetGroup,
            Self::Targets(_) => ResourceKind::Targets,
            Self::AccessLogSubscription(_) => ResourceKind::AccessLogSubscription,
        }
    }

    pub fn meta(&self) -> &ResourceMeta {
        match self {
            Self::ServiceNetwork(r) => &r.meta,
            Self::Service(r) => &r.meta,
            Self::Listener(r) => &r.meta,
            Self::Rule(r) => &r.meta,
            Self::TargetGroup(r) => &r.meta,
            Self::Targets(r) => &r.meta,
            Self::AccessLogSubscription(r) => &r.meta,
        }
    }
}

macro_rules! stack_resource {
    ($($ty:ident),+ $(,)?) => {
        $(
            impl StackResource for $ty {
                const KIND: ResourceKind = ResourceKind::$ty;

                fn meta(&self) -> &ResourceMeta {
                    &self.meta
                }

                fn from_resource(resource: &Resource) -> Option<&Self> {
                    match resource {
                        Resource::$ty(r) => Some(r),
                        _ => None,
                    }
                }

                fn from_resource_mut(resource: &mut Resource) -> Option<&mut Self> {
                    match resource {
                        Resource::$ty(r) => Some(r),
                        _ => None,
                    }
                }
            }

            impl From<$ty> for Resource {
                fn from(r: $ty) -> Self {
                    Resource::$ty(r)
                }
            }
        )+
    };
}

stack_resource!(
    ServiceNetwork,
    Service,
    Listener,
    Rule,
    TargetGroup,
    Targets,
    AccessLogSubscription,
);
