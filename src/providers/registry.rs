//! Provider lookup by requirement kind.
//!
//! The registry is built explicitly and passed to the engine; there is no
//! global instance. Built-in providers are registered by [`ProviderRegistry::new`],
//! and extension kinds can be added before a run starts.

use std::collections::{BTreeMap, HashMap};

use super::{
    CondaManager, DownloadProvider, EnvSpecProvider, EnvVarProvider, EnvironmentManager, Fetch,
    HttpFetcher, Provider, ServiceProvider,
};
use crate::requirements::{Requirement, ServiceType};

/// Kind name to provider, plus the known service types.
pub struct ProviderRegistry {
    providers: HashMap<String, Box<dyn Provider>>,
    service_types: BTreeMap<String, ServiceType>,
}

impl ProviderRegistry {
    /// A registry with no providers and no service types.
    pub fn empty() -> Self {
        Self {
            providers: HashMap::new(),
            service_types: BTreeMap::new(),
        }
    }

    /// A registry with the built-in providers, downloading over HTTP.
    pub fn new(manager: Box<dyn EnvironmentManager>) -> anyhow::Result<Self> {
        Ok(Self::with_fetcher(manager, Box::new(HttpFetcher::new()?)))
    }

    /// The built-in providers with environments managed by conda.
    pub fn with_conda() -> anyhow::Result<Self> {
        Self::new(Box::new(CondaManager::new()))
    }

    /// A registry with the built-in providers and a custom download source.
    pub fn with_fetcher(manager: Box<dyn EnvironmentManager>, fetcher: Box<dyn Fetch>) -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(EnvVarProvider::new()));
        registry.register(Box::new(EnvSpecProvider::new(manager)));
        registry.register(Box::new(DownloadProvider::new(fetcher)));
        registry.register(Box::new(ServiceProvider::new()));
        registry.register_service_type(ServiceType::redis());
        registry
    }

    /// Register a provider under its kind name, replacing any previous one.
    pub fn register(&mut self, provider: Box<dyn Provider>) {
        let kind = provider.kind().to_string();
        tracing::debug!("Registering provider for '{}'", kind);
        self.providers.insert(kind, provider);
    }

    /// The provider for a requirement's kind.
    pub fn provider_for(&self, requirement: &Requirement) -> Option<&dyn Provider> {
        self.provider_for_kind(requirement.kind_name())
    }

    /// The provider registered under `kind`.
    pub fn provider_for_kind(&self, kind: &str) -> Option<&dyn Provider> {
        self.providers.get(kind).map(|p| p.as_ref())
    }

    /// Registered kind names, sorted.
    pub fn known_kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Add a service type that project files can name.
    pub fn register_service_type(&mut self, service_type: ServiceType) {
        self.service_types
            .insert(service_type.name.clone(), service_type);
    }

    /// Look up a service type by name.
    pub fn service_type(&self, name: &str) -> Option<&ServiceType> {
        self.service_types.get(name)
    }

    /// All service types, sorted by name.
    pub fn list_service_types(&self) -> Vec<&ServiceType> {
        self.service_types.values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ConfigChoice, ProvideContext, StatusContext, UnprovideContext};
    use crate::requirements::{RequirementStatus, Status};

    struct VaultProvider;

    impl Provider for VaultProvider {
        fn kind(&self) -> &str {
            "vault"
        }

        fn check_status(
            &self,
            requirement: &Requirement,
            _ctx: &StatusContext<'_>,
        ) -> RequirementStatus {
            RequirementStatus::satisfied(requirement, "sealed")
        }

        fn configuration_choices(&self, _status: &RequirementStatus) -> Vec<ConfigChoice> {
            Vec::new()
        }

        fn provide(
            &self,
            _ctx: &mut ProvideContext<'_>,
            status: &RequirementStatus,
        ) -> RequirementStatus {
            status.clone()
        }

        fn unprovide(&self, _ctx: &mut UnprovideContext<'_>, _status: &RequirementStatus) -> Status {
            Status::success("ok")
        }
    }

    #[test]
    fn builtins_are_registered() {
        let registry = ProviderRegistry::with_conda().unwrap();
        assert_eq!(
            registry.known_kinds(),
            vec!["download", "env_spec", "env_var", "service"]
        );
        assert!(registry.service_type("redis").is_some());
    }

    #[test]
    fn empty_registry_has_nothing() {
        let registry = ProviderRegistry::empty();
        assert!(registry.known_kinds().is_empty());
        assert!(registry
            .provider_for(&Requirement::env_var("FOO"))
            .is_none());
    }

    #[test]
    fn custom_kind_dispatches_to_registered_provider() {
        let mut registry = ProviderRegistry::with_conda().unwrap();
        let requirement = Requirement::custom("vault", "TOKEN");
        assert!(registry.provider_for(&requirement).is_none());

        registry.register(Box::new(VaultProvider));

        let provider = registry.provider_for(&requirement).unwrap();
        assert_eq!(provider.kind(), "vault");
    }

    #[test]
    fn register_replaces_by_kind() {
        let mut registry = ProviderRegistry::empty();
        registry.register(Box::new(VaultProvider));
        registry.register(Box::new(VaultProvider));
        assert_eq!(registry.known_kinds(), vec!["vault"]);
    }

    #[test]
    fn service_types_are_listed_by_name() {
        let mut registry = ProviderRegistry::with_conda().unwrap();
        let mut memcached = ServiceType::redis();
        memcached.name = "memcached".to_string();
        memcached.title = "Memcached".to_string();
        registry.register_service_type(memcached);

        let names: Vec<&str> = registry
            .list_service_types()
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["memcached", "redis"]);
    }
}
