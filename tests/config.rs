// ABOUTME: Integration tests for configuration parsing, discovery, and overrides.
// ABOUTME: Uses temp dirs for discovery and temp-env for environment overrides.

use keel::config::*;
use keel::error::Error;
use keel::runtime::RuntimeMode;
use secrecy::ExposeSecret;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

mod parsing {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        assert_eq!(config.runtime.mode, RuntimeMode::SingleHost);
        assert_eq!(config.runtime.socket_path(), "/var/run/docker.sock");
        assert!(config.proxy.enabled);
        assert_eq!(config.proxy.network, "keel_traefik");
        assert_eq!(config.deploy.max_concurrent, 4);
        assert_eq!(config.state, PathBuf::from("keel-state.json"));
        assert_eq!(config.log_level, "info");
        assert!(config.actor.is_none());
    }

    #[test]
    fn parse_full_config() {
        let yaml = r#"
runtime:
  mode: cluster
  socket: /run/user/1000/docker.sock
  stop_timeout: 30s
proxy:
  enabled: true
  network: edge
  entrypoint: http
  secure_entrypoint: https
  cert_resolver: le
  router_prefix: acme
encryption:
  key: correct horse battery staple
deploy:
  max_concurrent: 2
state: /var/lib/keel/state.json
actor: 6f1c8d2e-8a4b-4c3e-9f7a-2b5d1e0c9a8f
log_level: debug
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.runtime.mode, RuntimeMode::Cluster);
        assert_eq!(config.runtime.socket_path(), "/run/user/1000/docker.sock");
        assert_eq!(config.runtime.stop_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.proxy.network, "edge");
        assert_eq!(config.proxy.router_prefix, "acme");
        assert_eq!(config.deploy.max_concurrent, 2);
        assert!(config.actor.is_some());
        assert_eq!(
            config.encryption.resolve_key().unwrap().expose_secret(),
            "correct horse battery staple"
        );
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let err = Config::from_yaml("deploy:\n  max_concurrent: 0\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn enabled_proxy_needs_a_network() {
        let err = Config::from_yaml("proxy:\n  network: \"\"\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert!(Config::from_yaml("proxy:\n  enabled: false\n  network: \"\"\n").is_ok());
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(Config::from_yaml("runtime:\n  mode: swarmish\n").is_err());
    }

    #[test]
    fn missing_key_is_reported() {
        let config = Config::from_yaml("{}").unwrap();
        assert!(matches!(
            config.encryption.resolve_key(),
            Err(Error::InvalidConfig(_))
        ));
    }
}

mod env_values {
    use super::*;

    #[test]
    fn key_from_env() {
        let config = Config::from_yaml("encryption:\n  key:\n    env: KEEL_TEST_KEY\n").unwrap();
        temp_env::with_var("KEEL_TEST_KEY", Some("from-env"), || {
            assert_eq!(
                config.encryption.resolve_key().unwrap().expose_secret(),
                "from-env"
            );
        });
    }

    #[test]
    fn key_from_env_default() {
        let yaml = "encryption:\n  key:\n    env: KEEL_TEST_KEY_UNSET\n    default: fallback\n";
        let config = Config::from_yaml(yaml).unwrap();
        temp_env::with_var_unset("KEEL_TEST_KEY_UNSET", || {
            assert_eq!(
                config.encryption.resolve_key().unwrap().expose_secret(),
                "fallback"
            );
        });
    }

    #[test]
    fn missing_env_var_is_an_error() {
        let config =
            Config::from_yaml("encryption:\n  key:\n    env: KEEL_TEST_KEY_MISSING\n").unwrap();
        temp_env::with_var_unset("KEEL_TEST_KEY_MISSING", || {
            assert!(matches!(
                config.encryption.resolve_key(),
                Err(Error::MissingEnvVar(var)) if var == "KEEL_TEST_KEY_MISSING"
            ));
        });
    }
}

mod overrides {
    use super::*;

    const OVERRIDE_VARS: [&str; 3] = ["DOCKER_HOST", "TRAEFIK_ENABLED", "TRAEFIK_NETWORK"];

    fn with_overrides<F: FnOnce()>(vars: &[(&str, &str)], f: F) {
        let pairs: Vec<(&str, Option<&str>)> = OVERRIDE_VARS
            .iter()
            .map(|name| {
                let value = vars.iter().find(|(k, _)| k == name).map(|(_, v)| *v);
                (*name, value)
            })
            .collect();
        temp_env::with_vars(pairs, f);
    }

    #[test]
    fn docker_host_sets_socket() {
        with_overrides(&[("DOCKER_HOST", "unix:///tmp/docker.sock")], || {
            let mut config = Config::default();
            config.apply_env_overrides().unwrap();
            assert_eq!(config.runtime.socket_path(), "/tmp/docker.sock");
        });
    }

    #[test]
    fn tcp_docker_host_is_ignored() {
        with_overrides(&[("DOCKER_HOST", "tcp://10.0.0.1:2375")], || {
            let mut config = Config::default();
            config.apply_env_overrides().unwrap();
            assert_eq!(config.runtime.socket_path(), "/var/run/docker.sock");
        });
    }

    #[test]
    fn traefik_variables_adjust_proxy() {
        with_overrides(
            &[("TRAEFIK_ENABLED", "false"), ("TRAEFIK_NETWORK", "edge")],
            || {
                let mut config = Config::default();
                config.apply_env_overrides().unwrap();
                assert!(!config.proxy.enabled);
                assert_eq!(config.proxy.network, "edge");
            },
        );
    }

    #[test]
    fn invalid_traefik_enabled_is_rejected() {
        with_overrides(&[("TRAEFIK_ENABLED", "maybe")], || {
            let mut config = Config::default();
            assert!(matches!(
                config.apply_env_overrides(),
                Err(Error::InvalidConfig(_))
            ));
        });
    }
}

mod discovery {
    use super::*;

    #[test]
    fn finds_keel_yml() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("keel.yml"), "log_level: debug\n").unwrap();
        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn finds_dot_keel_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".keel")).unwrap();
        fs::write(dir.path().join(".keel/config.yml"), "log_level: trace\n").unwrap();
        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.log_level, "trace");
    }

    #[test]
    fn state_path_is_relative_to_config_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("keel.yaml"), "state: data/state.json\n").unwrap();
        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.state, dir.path().join("data/state.json"));
    }

    #[test]
    fn missing_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::discover(dir.path()),
            Err(Error::ConfigNotFound(_))
        ));
    }

    #[test]
    fn init_writes_loadable_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = init_config(dir.path(), false).unwrap();
        assert!(Config::load(&path).is_ok());
        assert!(matches!(
            init_config(dir.path(), false),
            Err(Error::AlreadyExists(_))
        ));
        assert!(init_config(dir.path(), true).is_ok());
    }
}
