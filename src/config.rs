//! 运行配置：默认值 < TOML 文件 < 命令行参数
//!
//! `Configuration` is built once in `main` and shared read-only with every
//! checker for the rest of the run.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::cli::Cli;
use crate::utils::{DiagError, Result};

pub const DEFAULT_CONTAINER: &str = "app";
pub const DEFAULT_HOST_PORT: u16 = 4000;
pub const DEFAULT_PRODUCTION_HOST: &str = "service.example.com";
pub const DEFAULT_SERVICE_PROCESS: &str = "node";
pub const DEFAULT_TAIL_LINES: usize = 20;
pub const DEFAULT_LOCAL_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_DEADLINE_SECS: u64 = 60;
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 15;

const DEFAULT_ACCESS_LOG: &str = "/var/log/nginx/access.log";
const DEFAULT_ERROR_LOG: &str = "/var/log/nginx/error.log";

// ── 数据结构 ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeTarget {
    pub label: String,
    pub url: String,
    pub timeout_ms: u64,
}

impl ProbeTarget {
    pub fn new(label: &str, url: String, timeout_ms: u64) -> Self {
        Self { label: label.to_string(), url, timeout_ms }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogPaths {
    #[serde(default)]
    pub service: Vec<String>,
    #[serde(default)]
    pub proxy_access: Vec<String>,
    #[serde(default)]
    pub proxy_error: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Configuration {
    pub container_name: String,
    pub host_port: u16,
    pub service_port: u16,
    pub production_host: String,
    pub service_process: String,
    pub log_paths: LogPaths,
    pub tail_lines: usize,
    pub targets: Vec<ProbeTarget>,
    pub accelerator: bool,
    pub concurrency: usize,
    pub deadline: Option<Duration>,
    pub command_timeout: Duration,
}

/// TOML 文件格式，所有字段可选
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub container_name: Option<String>,
    pub host_port: Option<u16>,
    pub service_port: Option<u16>,
    pub production_host: Option<String>,
    pub service_process: Option<String>,
    pub log_paths: Option<LogPaths>,
    pub tail_lines: Option<usize>,
    pub local_timeout_ms: Option<u64>,
    pub remote_timeout_ms: Option<u64>,
    pub concurrency: Option<usize>,
    pub deadline_secs: Option<u64>,
    pub command_timeout_secs: Option<u64>,
    pub accelerator: Option<bool>,
    pub targets: Option<Vec<ProbeTarget>>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            DiagError::ConfigInvalid(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&contents)
            .map_err(|e| DiagError::ConfigInvalid(format!("{}: {}", path.display(), e)))
    }

    pub fn parse(contents: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}

// ── 构建 ────────────────────────────────────────────────────────────────────

impl Default for Configuration {
    fn default() -> Self {
        Self::resolve(FileConfig::default(), &Overrides::default())
    }
}

/// 命令行层的覆盖项，None 表示未指定
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub container_name: Option<String>,
    pub host_port: Option<u16>,
    pub service_port: Option<u16>,
    pub production_host: Option<String>,
    pub service_process: Option<String>,
    pub service_logs: Vec<String>,
    pub access_logs: Vec<String>,
    pub error_logs: Vec<String>,
    pub tail_lines: Option<usize>,
    pub concurrency: Option<usize>,
    pub deadline_secs: Option<u64>,
    pub no_accelerator: bool,
}

impl From<&Cli> for Overrides {
    fn from(cli: &Cli) -> Self {
        Self {
            container_name: cli.container.clone(),
            host_port: cli.host_port,
            service_port: cli.service_port,
            production_host: cli.production_host.clone(),
            service_process: cli.service_process.clone(),
            service_logs: cli.service_log.clone(),
            access_logs: cli.access_log.clone(),
            error_logs: cli.error_log.clone(),
            tail_lines: cli.tail_lines,
            concurrency: cli.concurrency,
            deadline_secs: cli.deadline_secs,
            no_accelerator: cli.no_accelerator,
        }
    }
}

impl Configuration {
    /// 从命令行构建：读取可选的配置文件，再叠加参数，最后校验
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        let config = Self::resolve(file, &Overrides::from(cli));
        config.validate()?;
        Ok(config)
    }

    pub fn resolve(file: FileConfig, ov: &Overrides) -> Self {
        let host_port = ov.host_port.or(file.host_port).unwrap_or(DEFAULT_HOST_PORT);
        let service_port = ov.service_port.or(file.service_port).unwrap_or(host_port);
        let production_host = ov.production_host.clone()
            .or(file.production_host)
            .unwrap_or_else(|| DEFAULT_PRODUCTION_HOST.to_string());

        let file_logs = file.log_paths.unwrap_or_else(|| LogPaths {
            service: vec![],
            proxy_access: vec![DEFAULT_ACCESS_LOG.to_string()],
            proxy_error: vec![DEFAULT_ERROR_LOG.to_string()],
        });
        let log_paths = LogPaths {
            service: pick_paths(&ov.service_logs, file_logs.service),
            proxy_access: pick_paths(&ov.access_logs, file_logs.proxy_access),
            proxy_error: pick_paths(&ov.error_logs, file_logs.proxy_error),
        };

        let local_ms = file.local_timeout_ms.unwrap_or(DEFAULT_LOCAL_TIMEOUT_MS);
        let remote_ms = file.remote_timeout_ms.unwrap_or(DEFAULT_REMOTE_TIMEOUT_MS);
        let targets = file.targets
            .unwrap_or_else(|| default_targets(host_port, &production_host, local_ms, remote_ms));

        let deadline_secs = ov.deadline_secs.or(file.deadline_secs).unwrap_or(DEFAULT_DEADLINE_SECS);

        Self {
            container_name: ov.container_name.clone()
                .or(file.container_name)
                .unwrap_or_else(|| DEFAULT_CONTAINER.to_string()),
            host_port,
            service_port,
            production_host,
            service_process: ov.service_process.clone()
                .or(file.service_process)
                .unwrap_or_else(|| DEFAULT_SERVICE_PROCESS.to_string()),
            log_paths,
            tail_lines: ov.tail_lines.or(file.tail_lines).unwrap_or(DEFAULT_TAIL_LINES),
            targets,
            accelerator: !ov.no_accelerator && file.accelerator.unwrap_or(true),
            concurrency: ov.concurrency.or(file.concurrency).unwrap_or(DEFAULT_CONCURRENCY),
            deadline: (deadline_secs > 0).then(|| Duration::from_secs(deadline_secs)),
            command_timeout: Duration::from_secs(
                file.command_timeout_secs.unwrap_or(DEFAULT_COMMAND_TIMEOUT_SECS),
            ),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.container_name.trim().is_empty() {
            return Err(invalid("container name must not be empty"));
        }
        if self.tail_lines == 0 {
            return Err(invalid("tail_lines must be positive"));
        }
        if self.concurrency == 0 {
            return Err(invalid("concurrency must be at least 1"));
        }
        if self.command_timeout.is_zero() {
            return Err(invalid("command_timeout_secs must be positive"));
        }
        if self.service_process.trim().is_empty() {
            return Err(invalid("service process name must not be empty"));
        }

        let mut seen: Vec<&str> = Vec::with_capacity(self.targets.len());
        for t in &self.targets {
            if t.label.trim().is_empty() {
                return Err(invalid(format!("target with url {} has an empty label", t.url)));
            }
            if seen.contains(&t.label.as_str()) {
                return Err(invalid(format!("duplicate target label: {}", t.label)));
            }
            seen.push(&t.label);
            if crate::check::builtin_names().any(|name| name == t.label) {
                return Err(invalid(format!("target label {} is reserved for a built-in check", t.label)));
            }

            if t.timeout_ms == 0 {
                return Err(invalid(format!("target {}: timeout_ms must be positive", t.label)));
            }
            let url = Url::parse(&t.url)
                .map_err(|e| invalid(format!("target {}: malformed url {:?}: {}", t.label, t.url, e)))?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(invalid(format!(
                    "target {}: unsupported scheme {:?}", t.label, url.scheme()
                )));
            }
        }
        Ok(())
    }
}

// ── 工具 ────────────────────────────────────────────────────────────────────

pub fn default_targets(port: u16, production_host: &str, local_ms: u64, remote_ms: u64) -> Vec<ProbeTarget> {
    vec![
        ProbeTarget::new("Host Root", format!("http://localhost:{}/", port), local_ms),
        ProbeTarget::new("Host API", format!("http://localhost:{}/api", port), local_ms),
        ProbeTarget::new("Production Root", format!("https://{}/", production_host), remote_ms),
        ProbeTarget::new("Production API", format!("https://{}/api", production_host), remote_ms),
    ]
}

/// 命令行给出的路径优先；去重但保留首次出现的顺序
fn pick_paths(cli: &[String], file: Vec<String>) -> Vec<String> {
    let source = if cli.is_empty() { file } else { cli.to_vec() };
    let mut out: Vec<String> = Vec::with_capacity(source.len());
    for p in source {
        let p = p.trim().to_string();
        if !p.is_empty() && !out.contains(&p) {
            out.push(p);
        }
    }
    out
}

fn invalid(msg: impl Into<String>) -> DiagError {
    DiagError::ConfigInvalid(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_produce_canonical_targets() {
        let config = Configuration::default();
        config.validate().unwrap();

        assert_eq!(config.container_name, "app");
        assert_eq!(config.host_port, 4000);
        assert_eq!(config.service_port, 4000);
        assert_eq!(config.tail_lines, 20);
        let labels: Vec<&str> = config.targets.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, ["Host Root", "Host API", "Production Root", "Production API"]);
        assert_eq!(config.targets[0].url, "http://localhost:4000/");
        assert_eq!(config.targets[0].timeout_ms, 5_000);
        assert_eq!(config.targets[3].url, "https://service.example.com/api");
        assert_eq!(config.targets[3].timeout_ms, 10_000);
        assert_eq!(config.log_paths.proxy_access, ["/var/log/nginx/access.log"]);
    }

    #[test]
    fn cli_overrides_win_over_file() {
        let file = FileConfig::parse(
            r#"
            container_name = "from-file"
            host_port = 8080
            production_host = "prod.internal"
            "#,
        ).unwrap();
        let ov = Overrides {
            container_name: Some("from-cli".into()),
            ..Default::default()
        };
        let config = Configuration::resolve(file, &ov);

        assert_eq!(config.container_name, "from-cli");
        assert_eq!(config.host_port, 8080);
        assert_eq!(config.targets[1].url, "http://localhost:8080/api");
        assert_eq!(config.targets[2].url, "https://prod.internal/");
    }

    #[test]
    fn log_paths_are_deduplicated_in_order() {
        let ov = Overrides {
            access_logs: vec!["/b".into(), "/a".into(), "/b".into(), " ".into()],
            ..Default::default()
        };
        let config = Configuration::resolve(FileConfig::default(), &ov);
        assert_eq!(config.log_paths.proxy_access, ["/b", "/a"]);
        assert_eq!(config.log_paths.proxy_error, ["/var/log/nginx/error.log"]);
    }

    #[test]
    fn malformed_target_url_is_rejected() {
        let mut config = Configuration::default();
        config.targets.push(ProbeTarget::new("Broken", "not a url".into(), 1000));
        match config.validate() {
            Err(DiagError::ConfigInvalid(msg)) => assert!(msg.contains("Broken"), "{}", msg),
            other => panic!("expected ConfigInvalid, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_labels_and_zero_bounds_are_rejected() {
        let mut config = Configuration::default();
        config.targets[1].label = "Host Root".into();
        assert!(matches!(config.validate(), Err(DiagError::ConfigInvalid(_))));

        let mut config = Configuration::default();
        config.tail_lines = 0;
        assert!(matches!(config.validate(), Err(DiagError::ConfigInvalid(_))));

        let mut config = Configuration::default();
        config.container_name = "  ".into();
        assert!(matches!(config.validate(), Err(DiagError::ConfigInvalid(_))));
    }

    #[test]
    fn target_label_cannot_shadow_a_builtin_check() {
        for label in ["Service Logs", "Container Status", "Accelerator"] {
            let mut config = Configuration::default();
            config.targets = vec![ProbeTarget::new(label, "http://localhost:4000/health".into(), 500)];
            match config.validate() {
                Err(DiagError::ConfigInvalid(msg)) => assert!(msg.contains("reserved"), "{}", msg),
                other => panic!("expected ConfigInvalid for {}, got {:?}", label, other),
            }
        }

        let mut config = Configuration::default();
        config.targets = vec![ProbeTarget::new("Service Health", "http://localhost:4000/health".into(), 500)];
        config.validate().unwrap();
    }

    #[test]
    fn zero_deadline_disables_it() {
        let ov = Overrides { deadline_secs: Some(0), ..Default::default() };
        let config = Configuration::resolve(FileConfig::default(), &ov);
        assert!(config.deadline.is_none());
    }

    #[test]
    fn explicit_targets_load_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
            accelerator = false

            [[targets]]
            label = "Health"
            url = "http://127.0.0.1:9000/health"
            timeout_ms = 250
            "#
        ).unwrap();

        let file = FileConfig::load(f.path()).unwrap();
        let config = Configuration::resolve(file, &Overrides::default());
        config.validate().unwrap();
        assert!(!config.accelerator);
        assert_eq!(config.targets, vec![ProbeTarget::new(
            "Health", "http://127.0.0.1:9000/health".into(), 250,
        )]);
    }

    #[test]
    fn unknown_file_keys_are_a_config_error() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "contianer_name = \"typo\"").unwrap();
        assert!(matches!(FileConfig::load(f.path()), Err(DiagError::ConfigInvalid(_))));
    }
}
