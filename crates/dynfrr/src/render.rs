//! FRR configuration rendering.
//!
//! Templates are Go `text/template` documents evaluated at runtime with
//! `gtmpl`. The configuration is exposed through its serialized field
//! names (`{{ .Cluster.Name }}`, `{{ range .APIVips }}`); unset optional
//! fields are nil, so `{{ if .APIVip }}` is false rather than an error.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use gtmpl_value::Value;
use runtimecfg_common::RuntimecfgError;
use serde::Serialize;

/// Render `template` against `config` and write the result to `output`.
///
/// The file is replaced atomically so FRR never reads a partial config.
pub fn render_file(
    output: &Path,
    template: &Path,
    config: &impl Serialize,
) -> Result<(), RuntimecfgError> {
    let source = std::fs::read_to_string(template).map_err(|e| {
        RuntimecfgError::Render(format!("failed to read template {}: {e}", template.display()))
    })?;

    let rendered = render(&source, config)?;

    let dir = match output.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let write_err = |e: std::io::Error| {
        RuntimecfgError::Render(format!("failed to write {}: {e}", output.display()))
    };
    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    file.write_all(rendered.as_bytes()).map_err(write_err)?;
    file.persist(output).map_err(|e| write_err(e.error))?;

    tracing::info!(
        template = %template.display(),
        output = %output.display(),
        "Rendered FRR configuration"
    );

    Ok(())
}

/// Render template source against the serialized form of `config`
pub fn render(source: &str, config: &impl Serialize) -> Result<String, RuntimecfgError> {
    let data = serde_json::to_value(config)
        .map_err(|e| RuntimecfgError::Render(format!("failed to serialize config: {e}")))?;

    gtmpl::template(source, to_template_value(data))
        .map_err(|e| RuntimecfgError::Render(format!("failed to render template: {e}")))
}

/// Objects become template objects, so a missing field is an error while a
/// present `null` is nil
fn to_template_value(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Nil,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Value::from(u)
            } else if let Some(i) = n.as_i64() {
                Value::from(i)
            } else {
                Value::from(n.as_f64().unwrap_or_default())
            }
        }
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => {
            Value::Array(items.into_iter().map(to_template_value).collect())
        }
        serde_json::Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, to_template_value(v)))
                .collect::<HashMap<_, _>>(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runtimecfg_common::{ClusterConfig, ClusterInfo};
    use serde_json::json;

    fn sample_config() -> ClusterConfig {
        ClusterConfig {
            cluster: ClusterInfo {
                name: "ostest".to_string(),
                domain: "ostest.example.com".to_string(),
                ..Default::default()
            },
            api_vips: vec!["192.168.111.5".parse().unwrap()],
            api_vip: Some("192.168.111.5".parse().unwrap()),
            ..Default::default()
        }
    }

    #[test]
    fn test_field_substitution() {
        let out = render("hostname {{ .Cluster.Name }}\n", &sample_config()).unwrap();
        assert_eq!(out, "hostname ostest\n");
    }

    #[test]
    fn test_range_with_root_reference() {
        let source = "{{ range .Vips }}ip {{ . }} via {{ $.Gw }}\n{{ end }}";
        let data = json!({"Vips": ["10.0.0.1", "10.0.0.2"], "Gw": "gw"});
        assert_eq!(
            render(source, &data).unwrap(),
            "ip 10.0.0.1 via gw\nip 10.0.0.2 via gw\n"
        );
    }

    #[test]
    fn test_if_else_and_trim_markers() {
        let source = "a\n{{- if .Vip }} vip={{ .Vip }}{{ else }} none{{ end -}}\n b";
        assert_eq!(render(source, &json!({"Vip": "1.2.3.4"})).unwrap(), "a vip=1.2.3.4b");
        assert_eq!(render(source, &json!({"Vip": null})).unwrap(), "a noneb");
    }

    #[test]
    fn test_unset_vips_are_false() {
        let source = "{{ if .APIVip }}vip {{ .APIVip }}{{ end }}\n\
                      {{ if .IngressVip }}ingress {{ .IngressVip }}{{ else }}no ingress{{ end }}\n";
        let out = render(source, &ClusterConfig::default()).unwrap();
        assert_eq!(out, "\nno ingress\n");
    }

    #[test]
    fn test_builtin_functions() {
        let out = render("{{ len .APIVips }} vip(s)", &sample_config()).unwrap();
        assert_eq!(out, "1 vip(s)");
    }

    #[test]
    fn test_comment_is_dropped() {
        assert_eq!(render("x{{/* note */}}y", &json!({})).unwrap(), "xy");
    }

    #[test]
    fn test_unknown_field_fails() {
        let err = render("{{ .Missing }}", &sample_config()).unwrap_err();
        assert!(matches!(err, RuntimecfgError::Render(_)));
    }

    #[test]
    fn test_malformed_template_fails() {
        assert!(render("{{ range .APIVips }}body", &sample_config()).is_err());
        assert!(render("{{ end }}", &sample_config()).is_err());
    }

    #[test]
    fn test_render_file_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("frr.conf.tmpl");
        let output = dir.path().join("frr.conf");
        std::fs::write(
            &template,
            "! {{ .Cluster.Domain }}\n{{ range .APIVips }}network {{ . }}/32\n{{ end }}",
        )
        .unwrap();

        render_file(&output, &template, &sample_config()).unwrap();
        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "! ostest.example.com\nnetwork 192.168.111.5/32\n"
        );
    }

    #[test]
    fn test_render_file_without_vips() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("frr.conf.tmpl");
        let output = dir.path().join("frr.conf");
        std::fs::write(
            &template,
            "router bgp\n{{- if .APIVip }}\n network {{ .APIVip }}/32\n{{- end }}\n",
        )
        .unwrap();

        render_file(&output, &template, &ClusterConfig::default()).unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "router bgp\n");
    }

    #[test]
    fn test_render_file_missing_template() {
        let dir = tempfile::tempdir().unwrap();
        let err = render_file(
            &dir.path().join("out"),
            &dir.path().join("missing.tmpl"),
            &ClusterConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err.stage(), "render");
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_render_file_unwritable_output_is_render_stage() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("frr.conf.tmpl");
        std::fs::write(&template, "static\n").unwrap();

        let err = render_file(
            &dir.path().join("missing-dir").join("frr.conf"),
            &template,
            &ClusterConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err.stage(), "render");
    }
}
