//! Value resolution.
//!
//! A [`Resolver`] walks value sources against one graph and one secret store,
//! memoizing each resource's value for the lifetime of the resolver. Two modes
//! exist: `Runtime` produces the real values injected into launched resources;
//! `Display` produces what exported views show, redacting secret parameters
//! without reading them and rendering deferred values as placeholders.

use std::collections::HashMap;

use conductor_core::{ResourceKind, ResourceName, SecretStore};
use indexmap::IndexMap;

use crate::error::{ModelError, ModelResult};
use crate::graph::ResourceGraph;
use crate::reference::{self, ReferenceEnvironment};
use crate::relationship::RelationshipKind;
use crate::resource::{ParameterSource, Resource, ResourceSpec};
use crate::telemetry::OtlpProtocol;
use crate::value::{REDACTED, Resolved, SecretValue, ValueSource};

pub(crate) const UNSET: &str = "parameter has neither a value nor a configuration key";

/// What the resolved values are for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Real values for injection.
    Runtime,
    /// Values as exported views show them.
    Display,
}

/// Memoizing resolver over one graph.
pub struct Resolver<'g> {
    graph: &'g ResourceGraph,
    secrets: &'g dyn SecretStore,
    mode: ResolveMode,
    cache: HashMap<ResourceName, Resolved>,
    stack: Vec<ResourceName>,
}

impl<'g> Resolver<'g> {
    /// A resolver with an empty cache.
    #[must_use]
    pub fn new(graph: &'g ResourceGraph, secrets: &'g dyn SecretStore, mode: ResolveMode) -> Self {
        Self {
            graph,
            secrets,
            mode,
            cache: HashMap::new(),
            stack: Vec::new(),
        }
    }

    /// Resolve one value source.
    pub fn resolve(&mut self, source: &ValueSource) -> ModelResult<Resolved> {
        match source {
            ValueSource::Literal(value) => Ok(Resolved::Plain(value.clone())),
            ValueSource::Parameter(name) => self.value_of(name, ResourceKind::Parameter),
            ValueSource::ConnectionString(name) => {
                self.value_of(name, ResourceKind::ConnectionString)
            }
            ValueSource::ExternalServiceUrl(name) => {
                self.value_of(name, ResourceKind::ExternalService)
            }
        }
    }

    fn value_of(&mut self, name: &ResourceName, expected: ResourceKind) -> ModelResult<Resolved> {
        let actual = self.lookup(name)?.kind();
        if actual != expected {
            return Err(ModelError::KindMismatch {
                name: name.clone(),
                expected: kind_name(expected),
                actual,
            });
        }
        self.value(name)
    }

    fn lookup(&self, name: &ResourceName) -> ModelResult<Resource> {
        self.graph
            .resource(name.as_str())
            .ok_or_else(|| ModelError::NotFound(name.to_string()))
    }

    /// The value of a parameter, connection string or external service.
    ///
    /// A connection string's redirection chain is followed to its terminal
    /// resource. Revisiting a resource on the current chain fails with
    /// [`ModelError::RedirectionCycle`] and yields no value.
    pub fn value(&mut self, name: &ResourceName) -> ModelResult<Resolved> {
        if let Some(hit) = self.cache.get(name) {
            return Ok(hit.clone());
        }
        if let Some(pos) = self.stack.iter().position(|seen| seen == name) {
            let mut chain = self.stack[pos..].to_vec();
            chain.push(name.clone());
            return Err(ModelError::RedirectionCycle { chain });
        }

        let resource = self.lookup(name)?;
        self.stack.push(name.clone());
        let result = self.compute(&resource);
        self.stack.pop();

        if let Ok(value) = &result {
            self.cache.insert(name.clone(), value.clone());
        }
        result
    }

    fn compute(&mut self, resource: &Resource) -> ModelResult<Resolved> {
        let name = &resource.name;
        match &resource.spec {
            ResourceSpec::Parameter { source, secret, .. } => self.parameter(name, source, *secret),
            ResourceSpec::ConnectionString {
                value, redirect, ..
            } => {
                if let Some(target) = redirect {
                    self.redirect_target(name, target)?;
                    return self.value(target);
                }
                if let Some(value) = value {
                    return self.resolve(value);
                }
                let key = format!("ConnectionStrings:{name}");
                match self.secrets.get(&key) {
                    Some(value) => Ok(Resolved::Plain(value)),
                    None if self.mode == ResolveMode::Display => {
                        Ok(placeholder(name, "connectionString"))
                    }
                    None => Err(ModelError::unresolved(
                        name,
                        format!("no value and configuration key `{key}` is not set"),
                    )),
                }
            }
            ResourceSpec::ExternalService { url } => self.resolve(url),
            other => Err(ModelError::unresolved(
                name,
                format!("a {} has no value", other.kind()),
            )),
        }
    }

    fn redirect_target(&self, name: &ResourceName, target: &ResourceName) -> ModelResult<()> {
        let reason = match self.graph.resource(target.as_str()) {
            None => "redirection target does not exist",
            Some(r) if r.kind() != ResourceKind::ConnectionString => {
                "redirection target is not a connection string"
            }
            Some(_) => return Ok(()),
        };
        Err(ModelError::InvalidReference {
            resource: name.clone(),
            target: target.clone(),
            reason: reason.into(),
        })
    }

    fn parameter(
        &self,
        name: &ResourceName,
        source: &ParameterSource,
        secret: bool,
    ) -> ModelResult<Resolved> {
        let display = self.mode == ResolveMode::Display;
        if secret && display {
            return Ok(Resolved::Secret(SecretValue::new(REDACTED)));
        }
        match source {
            ParameterSource::Value(value) => Ok(Resolved::new(value.clone(), secret)),
            ParameterSource::Configuration(key) => match self.secrets.get(key) {
                Some(value) => Ok(Resolved::new(value, secret)),
                None if display => Ok(placeholder(name, "value")),
                None => Err(ModelError::unresolved(
                    name,
                    format!("configuration key `{key}` is not set"),
                )),
            },
            ParameterSource::Withheld if display => Ok(placeholder(name, "value")),
            ParameterSource::Withheld => Err(ModelError::unresolved(
                name,
                "value was withheld from the snapshot",
            )),
            ParameterSource::Unset => Err(ModelError::unresolved(name, UNSET)),
        }
    }

    /// The environment of a process or container: OTLP exporter variables
    /// first, then variables injected by references as the resource's
    /// [`ReferenceEnvironment`] allows, then endpoint port variables, then
    /// explicit variables, each overriding the previous on the same name.
    pub fn environment(&mut self, name: &ResourceName) -> ModelResult<IndexMap<String, Resolved>> {
        let resource = self.lookup(name)?;
        let flags = resource.reference_environment;
        let mut env = IndexMap::new();

        if let Some(protocol) = resource.otlp {
            self.inject_otlp(name, protocol, &mut env);
        }

        let targets: Vec<ResourceName> = self
            .graph
            .relationships()
            .iter()
            .filter(|e| e.from == *name && e.kind == RelationshipKind::References)
            .map(|e| e.to.clone())
            .collect();
        for target in targets {
            self.inject_reference(&target, flags, &mut env)?;
        }
        if flags.contains(ReferenceEnvironment::SERVICE_DISCOVERY) {
            for (service, url) in &resource.service_uris {
                env.insert(
                    format!("services__{service}__default__0"),
                    Resolved::Plain(url.clone()),
                );
            }
        }

        for endpoint in resource.endpoints.iter() {
            if let (Some(var), Some(port)) = (&endpoint.env, endpoint.target_port.or(endpoint.port)) {
                env.insert(var.clone(), Resolved::Plain(port.to_string()));
            }
        }

        for (var, source) in &resource.env {
            env.insert(var.clone(), self.resolve(source)?);
        }
        Ok(env)
    }

    fn inject_otlp(
        &self,
        name: &ResourceName,
        protocol: OtlpProtocol,
        env: &mut IndexMap<String, Resolved>,
    ) {
        let endpoint = self
            .secrets
            .get(protocol.endpoint_key())
            .unwrap_or_else(|| protocol.default_endpoint().to_string());
        env.insert("OTEL_EXPORTER_OTLP_ENDPOINT".into(), Resolved::Plain(endpoint));
        env.insert(
            "OTEL_EXPORTER_OTLP_PROTOCOL".into(),
            Resolved::Plain(protocol.as_str().into()),
        );
        env.insert("OTEL_SERVICE_NAME".into(), Resolved::Plain(name.to_string()));
    }

    fn inject_reference(
        &mut self,
        target: &ResourceName,
        flags: ReferenceEnvironment,
        env: &mut IndexMap<String, Resolved>,
    ) -> ModelResult<()> {
        let resource = self.lookup(target)?;
        match &resource.spec {
            ResourceSpec::ConnectionString { env_var, .. } => {
                if flags.contains(ReferenceEnvironment::CONNECTION_STRING) {
                    let var = env_var
                        .clone()
                        .unwrap_or_else(|| format!("ConnectionStrings__{target}"));
                    env.insert(var, self.value(target)?);
                }
            }
            ResourceSpec::ExternalService { .. } => {
                if flags.contains(ReferenceEnvironment::SERVICE_DISCOVERY) {
                    env.insert(format!("services__{target}__default__0"), self.value(target)?);
                }
            }
            ResourceSpec::Process(_)
            | ResourceSpec::BuiltContainer { .. }
            | ResourceSpec::PrebuiltContainer(_) => {
                for endpoint in resource.endpoints.iter() {
                    let Some(url) = endpoint.url() else {
                        continue;
                    };
                    let endpoint_name = endpoint.effective_name();
                    if flags.contains(ReferenceEnvironment::SERVICE_DISCOVERY) {
                        env.insert(
                            format!("services__{target}__{endpoint_name}__0"),
                            Resolved::Plain(url.clone()),
                        );
                    }
                    if flags.contains(ReferenceEnvironment::ENDPOINTS) {
                        env.insert(
                            reference::endpoint_variable(target.as_str(), &endpoint_name),
                            Resolved::Plain(url),
                        );
                    }
                }
            }
            ResourceSpec::Parameter { .. } | ResourceSpec::CertificateAuthorityCollection(_) => {}
        }
        Ok(())
    }

    /// Resolved command-line arguments.
    pub fn args(&mut self, name: &ResourceName) -> ModelResult<Vec<Resolved>> {
        let resource = self.lookup(name)?;
        resource.args.iter().map(|arg| self.resolve(arg)).collect()
    }

    /// Resolved build arguments and build secrets of a built container.
    pub fn build_inputs(
        &mut self,
        name: &ResourceName,
    ) -> ModelResult<(IndexMap<String, Resolved>, IndexMap<String, Resolved>)> {
        let resource = self.lookup(name)?;
        let ResourceSpec::BuiltContainer { build, .. } = &resource.spec else {
            return Ok((IndexMap::new(), IndexMap::new()));
        };
        let mut args = IndexMap::new();
        for (arg, source) in &build.build_args {
            args.insert(arg.clone(), self.resolve(source)?);
        }
        let mut secrets = IndexMap::new();
        for (id, parameter) in &build.build_secrets {
            let value = self.value_of(parameter, ResourceKind::Parameter)?;
            let value = match value {
                Resolved::Plain(plain) => Resolved::new(plain, true),
                secret => secret,
            };
            secrets.insert(id.clone(), value);
        }
        Ok((args, secrets))
    }
}

fn placeholder(name: &ResourceName, field: &str) -> Resolved {
    Resolved::Plain(format!("{{{name}.{field}}}"))
}

pub(crate) fn kind_name(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Process => "process",
        ResourceKind::BuiltContainer => "built_container",
        ResourceKind::PrebuiltContainer => "prebuilt_container",
        ResourceKind::ExternalService => "external_service",
        ResourceKind::ConnectionString => "connection_string",
        ResourceKind::Parameter => "parameter",
        ResourceKind::CertificateAuthorityCollection => "certificate_authority_collection",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::EndpointSpec;
    use crate::graph::GraphHandle;
    use conductor_core::NoSecrets;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap as Store;

    fn n(s: &str) -> ResourceName {
        ResourceName::new(s).unwrap()
    }

    #[test]
    fn redirection_chain_resolves_terminal_value() {
        let graph = GraphHandle::new();
        let terminal = graph
            .add_connection_string("c3")
            .unwrap()
            .with_connection_string_value("Host=db;Port=5432");
        let c2 = graph
            .add_connection_string("c2")
            .unwrap()
            .with_connection_string_redirection(&terminal)
            .unwrap();
        graph
            .add_connection_string("c1")
            .unwrap()
            .with_connection_string_redirection(&c2)
            .unwrap();

        let g = graph.read();
        let mut resolver = Resolver::new(&g, &NoSecrets, ResolveMode::Runtime);
        assert_eq!(resolver.value(&n("c1")).unwrap().expose(), "Host=db;Port=5432");
    }

    #[test]
    fn redirection_cycle_yields_no_value() {
        let graph = GraphHandle::new();
        let a = graph.add_connection_string("a").unwrap();
        let b = graph.add_connection_string("b").unwrap();
        let a = a.with_connection_string_redirection(&b).unwrap();
        b.with_connection_string_redirection(&a).unwrap();

        let g = graph.read();
        let mut resolver = Resolver::new(&g, &NoSecrets, ResolveMode::Runtime);
        let err = resolver.value(&n("a")).unwrap_err();
        assert_eq!(
            err,
            ModelError::RedirectionCycle {
                chain: vec![n("a"), n("b"), n("a")]
            }
        );
        assert!(resolver.cache.is_empty());
    }

    #[test]
    fn secret_parameter_is_real_at_runtime_and_redacted_for_display() {
        let graph = GraphHandle::new();
        graph.add_parameter("pw", "hunter2").unwrap().secret();
        let g = graph.read();

        let runtime = Resolver::new(&g, &NoSecrets, ResolveMode::Runtime)
            .value(&n("pw"))
            .unwrap();
        assert!(runtime.is_secret());
        assert_eq!(runtime.expose(), "hunter2");

        let display = Resolver::new(&g, &NoSecrets, ResolveMode::Display)
            .value(&n("pw"))
            .unwrap();
        assert_eq!(display.expose(), REDACTED);
    }

    #[test]
    fn configuration_backed_values_come_from_the_store() {
        let graph = GraphHandle::new();
        graph
            .add_parameter_from_configuration("token", "Parameters:token")
            .unwrap();
        graph.add_connection_string("db").unwrap();
        let g = graph.read();

        let mut store = Store::new();
        store.insert("Parameters:token".to_string(), "abc".to_string());
        store.insert("ConnectionStrings:db".to_string(), "Host=db".to_string());

        let mut resolver = Resolver::new(&g, &store, ResolveMode::Runtime);
        assert_eq!(resolver.value(&n("token")).unwrap().expose(), "abc");
        assert_eq!(resolver.value(&n("db")).unwrap().expose(), "Host=db");

        let mut empty = Resolver::new(&g, &NoSecrets, ResolveMode::Runtime);
        assert!(matches!(
            empty.value(&n("token")),
            Err(ModelError::UnresolvedReference { .. })
        ));
        let mut display = Resolver::new(&g, &NoSecrets, ResolveMode::Display);
        assert_eq!(display.value(&n("token")).unwrap().expose(), "{token.value}");
        assert_eq!(
            display.value(&n("db")).unwrap().expose(),
            "{db.connectionString}"
        );
    }

    #[test]
    fn unset_parameter_fails_in_both_modes() {
        let graph = GraphHandle::new();
        graph.add_parameter_unset("region").unwrap();
        let g = graph.read();
        for mode in [ResolveMode::Runtime, ResolveMode::Display] {
            let err = Resolver::new(&g, &NoSecrets, mode)
                .value(&n("region"))
                .unwrap_err();
            assert!(matches!(err, ModelError::UnresolvedReference { .. }));
        }
    }

    #[test]
    fn references_inject_conventional_variables() {
        let graph = GraphHandle::new();
        let db = graph
            .add_connection_string("db")
            .unwrap()
            .with_connection_string_value("Host=db")
            .with_connection_string_env("DATABASE_URL");
        let cache = graph
            .add_connection_string("cache")
            .unwrap()
            .with_connection_string_value("redis:6379");
        let search = graph
            .add_external_service("search", "https://search.example.com/")
            .unwrap();
        let catalog = graph
            .add_executable("catalog", "catalog", ".")
            .unwrap()
            .with_http_endpoint(Some(5100))
            .unwrap();
        graph
            .add_executable("api", "api", ".")
            .unwrap()
            .with_reference(&db)
            .unwrap()
            .with_reference(&cache)
            .unwrap()
            .with_reference(&search)
            .unwrap()
            .with_reference(&catalog)
            .unwrap()
            .with_endpoint(EndpointSpec::http().target_port(8080).env("PORT"))
            .unwrap()
            .with_environment("DATABASE_URL", "override");

        let g = graph.read();
        let env = Resolver::new(&g, &NoSecrets, ResolveMode::Runtime)
            .environment(&n("api"))
            .unwrap();
        let rendered: Vec<(&str, &str)> = env
            .iter()
            .map(|(k, v)| (k.as_str(), v.expose()))
            .collect();
        assert_eq!(
            rendered,
            vec![
                ("DATABASE_URL", "override"),
                ("ConnectionStrings__cache", "redis:6379"),
                ("services__search__default__0", "https://search.example.com/"),
                ("services__catalog__http__0", "http://localhost:5100"),
                ("CATALOG_HTTP", "http://localhost:5100"),
                ("PORT", "8080"),
            ]
        );
    }

    fn rendered_environment(graph: &GraphHandle, name: &str, secrets: &dyn SecretStore) -> Vec<(String, String)> {
        let g = graph.read();
        Resolver::new(&g, secrets, ResolveMode::Runtime)
            .environment(&n(name))
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.expose().to_owned()))
            .collect()
    }

    fn pairs(expected: &[(&str, &str)]) -> Vec<(String, String)> {
        expected
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn reference_environment_selects_injected_variables() {
        let graph = GraphHandle::new();
        let db = graph.add_connection_string("db").unwrap();
        let catalog = graph
            .add_executable("catalog", "catalog", ".")
            .unwrap()
            .with_http_endpoint(Some(5100))
            .unwrap();
        let api = graph
            .add_executable("api", "api", ".")
            .unwrap()
            .with_reference(&db)
            .unwrap()
            .with_reference(&catalog)
            .unwrap()
            .with_reference_uri("payments", "https://pay.example.com/")
            .unwrap()
            .with_reference_environment(ReferenceEnvironment::ENDPOINTS);

        // the unset connection string is never read
        assert_eq!(
            rendered_environment(&graph, "api", &NoSecrets),
            pairs(&[("CATALOG_HTTP", "http://localhost:5100")])
        );

        api.with_reference_environment(ReferenceEnvironment::SERVICE_DISCOVERY);
        assert_eq!(
            rendered_environment(&graph, "api", &NoSecrets),
            pairs(&[
                ("services__catalog__http__0", "http://localhost:5100"),
                ("services__payments__default__0", "https://pay.example.com/"),
            ])
        );
    }

    #[test]
    fn disabled_reference_environment_injects_nothing() {
        let graph = GraphHandle::new();
        let db = graph
            .add_connection_string("db")
            .unwrap()
            .with_connection_string_value("Host=db");
        graph
            .add_executable("api", "api", ".")
            .unwrap()
            .with_reference(&db)
            .unwrap()
            .with_reference_environment(ReferenceEnvironment::empty())
            .with_environment("MODE", "dev");
        assert_eq!(
            rendered_environment(&graph, "api", &NoSecrets),
            pairs(&[("MODE", "dev")])
        );
    }

    #[test]
    fn uri_reference_is_injected_as_a_service() {
        let graph = GraphHandle::new();
        graph
            .add_executable("api", "api", ".")
            .unwrap()
            .with_reference_uri("payments", "https://pay.example.com/")
            .unwrap()
            .with_reference_uri("payments", "https://pay-v2.example.com/")
            .unwrap();
        assert_eq!(
            rendered_environment(&graph, "api", &NoSecrets),
            pairs(&[("services__payments__default__0", "https://pay-v2.example.com/")])
        );
    }

    #[test]
    fn otlp_exporter_defaults_to_the_local_collector() {
        let graph = GraphHandle::new();
        graph
            .add_executable("api", "api", ".")
            .unwrap()
            .with_otlp_exporter(OtlpProtocol::Grpc);
        assert_eq!(
            rendered_environment(&graph, "api", &NoSecrets),
            pairs(&[
                ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://localhost:4317"),
                ("OTEL_EXPORTER_OTLP_PROTOCOL", "grpc"),
                ("OTEL_SERVICE_NAME", "api"),
            ])
        );
    }

    #[test]
    fn otlp_endpoint_comes_from_configuration_and_explicit_variables_win() {
        let graph = GraphHandle::new();
        graph
            .add_container("web", "nginx")
            .unwrap()
            .with_otlp_exporter(OtlpProtocol::HttpProtobuf)
            .with_environment("OTEL_SERVICE_NAME", "frontend");
        let secrets = Store::from([(
            "Otlp:HttpEndpoint".to_owned(),
            "http://collector:4318".to_owned(),
        )]);
        assert_eq!(
            rendered_environment(&graph, "web", &secrets),
            pairs(&[
                ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://collector:4318"),
                ("OTEL_EXPORTER_OTLP_PROTOCOL", "http/protobuf"),
                ("OTEL_SERVICE_NAME", "frontend"),
            ])
        );
    }

    #[test]
    fn wrong_kind_reference_is_a_mismatch() {
        let graph = GraphHandle::new();
        graph.add_parameter("pw", "x").unwrap();
        let g = graph.read();
        let err = Resolver::new(&g, &NoSecrets, ResolveMode::Runtime)
            .resolve(&ValueSource::ConnectionString(n("pw")))
            .unwrap_err();
        assert!(matches!(err, ModelError::KindMismatch { expected: "connection_string", .. }));
    }
}
