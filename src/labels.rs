// ABOUTME: Builds the container label map read by the reverse proxy.
// ABOUTME: Ownership labels always; routers, TLS, and redirect only for routed services.

use std::collections::BTreeMap;

use crate::config::ProxyConfig;
use crate::model::{Domain, Service};

pub const SERVICE_ID_LABEL: &str = "keel.service-id";
pub const PROJECT_ID_LABEL: &str = "keel.project-id";
pub const MANAGED_LABEL: &str = "keel.managed";

/// Backend port the proxy forwards to.
// TODO: derive from the service's first port mapping once ports carry a "routed" flag.
const BACKEND_PORT: &str = "80";

/// Compute the labels for a service's workload.
///
/// The output depends only on the service, the *set* of domains, and the proxy
/// settings: domains are ordered by hostname before the host rule is built, and
/// every router, middleware, and backend name comes from the service slug.
pub fn build_labels(
    service: &Service,
    domains: &[Domain],
    proxy: &ProxyConfig,
) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(SERVICE_ID_LABEL.to_string(), service.id.to_string());
    labels.insert(PROJECT_ID_LABEL.to_string(), service.project_id.to_string());
    labels.insert(MANAGED_LABEL.to_string(), "true".to_string());

    if !proxy.enabled || domains.is_empty() {
        return labels;
    }

    let mut hostnames: Vec<&str> = domains.iter().map(|d| d.hostname.as_str()).collect();
    hostnames.sort_unstable();
    hostnames.dedup();
    let host_rule = hostnames
        .iter()
        .map(|h| format!("Host(`{}`)", h))
        .collect::<Vec<_>>()
        .join(" || ");

    let router = format!("{}-{}", proxy.router_prefix, service.slug);
    let backend = router.clone();
    let has_ssl = domains.iter().any(|d| d.ssl_enabled);
    let has_auto_ssl = domains.iter().any(|d| d.ssl_enabled && d.ssl_auto);

    let mut set = |key: String, value: &str| {
        labels.insert(key, value.to_string());
    };

    set("traefik.enable".to_string(), "true");

    set(format!("traefik.http.routers.{router}.rule"), &host_rule);
    set(
        format!("traefik.http.routers.{router}.entrypoints"),
        &proxy.entrypoint,
    );
    set(format!("traefik.http.routers.{router}.service"), &backend);

    if has_ssl {
        let secure = format!("{router}-secure");
        set(format!("traefik.http.routers.{secure}.rule"), &host_rule);
        set(
            format!("traefik.http.routers.{secure}.entrypoints"),
            &proxy.secure_entrypoint,
        );
        set(format!("traefik.http.routers.{secure}.tls"), "true");
        set(format!("traefik.http.routers.{secure}.service"), &backend);
        if has_auto_ssl {
            set(
                format!("traefik.http.routers.{secure}.tls.certresolver"),
                &proxy.cert_resolver,
            );
        }

        let redirect = format!("{router}-redirect");
        set(format!("traefik.http.routers.{router}.middlewares"), &redirect);
        set(
            format!("traefik.http.middlewares.{redirect}.redirectscheme.scheme"),
            "https",
        );
        set(
            format!("traefik.http.middlewares.{redirect}.redirectscheme.permanent"),
            "true",
        );
    }

    set(
        format!("traefik.http.services.{backend}.loadbalancer.server.port"),
        BACKEND_PORT,
    );

    labels
}
