// ABOUTME: Config scaffolding for new installations.
// ABOUTME: Writes a commented keel.yml with every section at its default.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

use super::CONFIG_FILENAME;

const TEMPLATE: &str = r#"# keel configuration
runtime:
  # single-host runs one container per service; cluster runs replicated services
  mode: single-host
  socket: /var/run/docker.sock
  # stop_timeout: 10s

proxy:
  enabled: true
  network: keel_traefik
  entrypoint: web
  secure_entrypoint: websecure
  cert_resolver: letsencrypt
  router_prefix: keel

encryption:
  # Any non-empty passphrase; keep it out of the file with an env reference.
  key:
    env: KEEL_ENCRYPTION_KEY

deploy:
  max_concurrent: 4

state: keel-state.json
log_level: info
"#;

/// Write a template config into `dir`, refusing to overwrite unless `force`.
pub fn init_config(dir: &Path, force: bool) -> Result<PathBuf> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    std::fs::write(&config_path, TEMPLATE)?;
    tracing::info!(path = %config_path.display(), "wrote configuration template");

    Ok(config_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn template_parses_as_config() {
        let config = Config::from_yaml(TEMPLATE).unwrap();
        assert!(config.proxy.enabled);
        assert_eq!(config.deploy.max_concurrent, 4);
        assert!(config.encryption.key.is_some());
    }
}
