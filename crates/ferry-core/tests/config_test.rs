use std::time::Duration;

use ferry_core::{BuildInfo, FerryConfig, TemplateConfiguration};
use tempfile::TempDir;

#[test]
fn load_returns_defaults_when_no_config_file() {
    let tmp = TempDir::new().unwrap();
    let config = FerryConfig::load(tmp.path()).unwrap();

    assert!(config.project.organisation.is_none());
    assert!(config.project.name.is_none());
    assert_eq!(config.registry.host, "quay.io");
    assert_eq!(config.release.changelog, "CHANGELOG.md");
    assert_eq!(config.release.version_file, "pkg/project/project.go");
    assert_eq!(config.release.assets_dir, "dist");
    assert_eq!(config.release.charts_dir, "helm");
    assert_eq!(config.release.channels, vec!["beta"]);
    assert_eq!(config.installation.kubernetes.cluster_domain, "cluster.local");
    assert_eq!(
        config.installation.monitoring.alert_interval,
        Duration::from_secs(60)
    );
}

#[test]
fn load_parses_full_config() {
    let tmp = TempDir::new().unwrap();
    let toml = r#"
[project]
organisation = "acme"
name = "widget"

[registry]
host = "registry.example.com"
organisation = "acme-images"
username = "robot"

[release]
changelog = "docs/CHANGELOG.md"
version_file = "internal/version.go"
assets_dir = "out"
charts_dir = "charts"
channels = ["beta", "stable"]

[installation]
name = "ginger"

[installation.api]
address = "https://api.ginger.example.com"
public_address = "https://api.example.com"

[installation.kubernetes]
api_address = "https://k8s.ginger.example.com"
ingress_class = "nginx"

[installation.monitoring]
prometheus_address = "http://prometheus:9090"
alert_interval = "5m"
testing_interval = "1h30m"
"#;
    std::fs::write(tmp.path().join("ferry.toml"), toml).unwrap();

    let config = FerryConfig::load(tmp.path()).unwrap();

    assert_eq!(config.project.organisation.as_deref(), Some("acme"));
    assert_eq!(config.project.name.as_deref(), Some("widget"));
    assert_eq!(config.registry.host, "registry.example.com");
    assert_eq!(config.registry.organisation.as_deref(), Some("acme-images"));
    assert_eq!(config.registry.username.as_deref(), Some("robot"));
    assert_eq!(config.release.changelog, "docs/CHANGELOG.md");
    assert_eq!(config.release.channels, vec!["beta", "stable"]);
    assert_eq!(config.installation.name, "ginger");
    assert_eq!(config.installation.api.public_address, "https://api.example.com");
    assert_eq!(config.installation.kubernetes.ingress_class, "nginx");
    assert_eq!(config.installation.kubernetes.cluster_domain, "cluster.local");
    assert_eq!(
        config.installation.monitoring.alert_interval,
        Duration::from_secs(300)
    );
    assert_eq!(
        config.installation.monitoring.testing_interval,
        Duration::from_secs(5400)
    );
}

#[test]
fn load_fails_on_invalid_toml() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("ferry.toml"), "[project\nname = ").unwrap();

    let err = FerryConfig::load(tmp.path()).unwrap_err();
    assert!(matches!(err, ferry_core::Error::ConfigParse { .. }));
}

#[test]
fn load_fails_on_invalid_duration() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("ferry.toml"),
        "[installation.monitoring]\nalert_interval = \"soon\"\n",
    )
    .unwrap();

    assert!(FerryConfig::load(tmp.path()).is_err());
}

#[test]
fn template_configuration_serialises_with_template_field_names() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("ferry.toml"),
        "[installation]\nname = \"ginger\"\n[installation.monitoring]\nalert_interval = \"5m\"\n",
    )
    .unwrap();
    let config = FerryConfig::load(tmp.path()).unwrap();

    let context = TemplateConfiguration {
        build_info: BuildInfo {
            sha: "abc".to_owned(),
            branch: "main".to_owned(),
            tag: Some("v1.0.0".to_owned()),
            version: "1.0.0".to_owned(),
        },
        installation: config.installation,
    };
    let rendered = toml::to_string(&context).unwrap();

    assert!(rendered.contains("SHA = \"abc\""));
    assert!(rendered.contains("Tag = \"v1.0.0\""));
    assert!(rendered.contains("Name = \"ginger\""));
    assert!(rendered.contains("AlertInterval = \"5m0s\""));
}

