//! Seed schemas for the built-in resource kinds.

use super::schema::{ObjectSchema, Schema, StringFormat};

const SERVICE_TYPES: &[&str] = &["ClusterIP", "NodePort", "LoadBalancer", "ExternalName"];
const PROTOCOLS: &[&str] = &["TCP", "UDP", "SCTP"];
const RESTART_POLICIES: &[&str] = &["Always", "OnFailure", "Never"];
const JOB_RESTART_POLICIES: &[&str] = &["OnFailure", "Never"];
const PULL_POLICIES: &[&str] = &["Always", "IfNotPresent", "Never"];
const DEPLOYMENT_STRATEGIES: &[&str] = &["RollingUpdate", "Recreate"];
const ACCESS_MODES: &[&str] = &["ReadWriteOnce", "ReadOnlyMany", "ReadWriteMany", "ReadWriteOncePod"];
const PATH_TYPES: &[&str] = &["Exact", "Prefix", "ImplementationSpecific"];
const CONCURRENCY_POLICIES: &[&str] = &["Allow", "Forbid", "Replace"];

const CONFIGMAP_DATA: &[&str] = &["data", "binaryData"];
const SECRET_DATA: &[&str] = &["data", "stringData"];
const INGRESS_ROUTES: &[&str] = &["rules", "defaultBackend"];

/// A built-in kind and its schema.
pub struct KindSchema {
    pub group: &'static str,
    pub version: &'static str,
    pub kind: &'static str,
    pub schema: Schema,
}

fn string() -> Schema {
    Schema::String {
        allowed: None,
        format: None,
    }
}

fn one_of(allowed: &'static [&'static str]) -> Schema {
    Schema::String {
        allowed: Some(allowed),
        format: None,
    }
}

fn formatted(format: StringFormat) -> Schema {
    Schema::String {
        allowed: None,
        format: Some(format),
    }
}

fn int_min(min: i64) -> Schema {
    Schema::Integer {
        min: Some(min),
        max: None,
    }
}

fn port() -> Schema {
    Schema::Integer {
        min: Some(1),
        max: Some(65535),
    }
}

fn array(items: Schema, min_items: usize) -> Schema {
    Schema::Array {
        items: Box::new(items),
        min_items,
    }
}

fn map_of(values: Schema) -> Schema {
    Schema::Map(Box::new(values))
}

fn object(properties: Vec<(&'static str, Schema)>, required: Vec<&'static str>) -> Schema {
    Schema::Object(ObjectSchema {
        properties,
        required,
        any_of: Vec::new(),
        recommended: Vec::new(),
    })
}

fn object_any_of(
    properties: Vec<(&'static str, Schema)>,
    required: Vec<&'static str>,
    any_of: &'static [&'static str],
) -> Schema {
    Schema::Object(ObjectSchema {
        properties,
        required,
        any_of: vec![any_of],
        recommended: Vec::new(),
    })
}

fn metadata(name_format: StringFormat) -> Schema {
    object(
        vec![
            ("name", formatted(name_format)),
            ("namespace", formatted(StringFormat::Dns1123Label)),
            ("labels", map_of(string())),
            ("annotations", map_of(string())),
        ],
        vec!["name"],
    )
}

fn template_metadata() -> Schema {
    object(
        vec![("labels", map_of(string())), ("annotations", map_of(string()))],
        vec![],
    )
}

fn container() -> Schema {
    object(
        vec![
            ("name", formatted(StringFormat::Dns1123Label)),
            ("image", string()),
            ("imagePullPolicy", one_of(PULL_POLICIES)),
            ("command", array(string(), 0)),
            ("args", array(string(), 0)),
            (
                "ports",
                array(
                    object(
                        vec![
                            ("containerPort", port()),
                            ("hostPort", port()),
                            ("protocol", one_of(PROTOCOLS)),
                            ("name", string()),
                        ],
                        vec!["containerPort"],
                    ),
                    0,
                ),
            ),
            (
                "env",
                array(object(vec![("name", string()), ("value", string())], vec!["name"]), 0),
            ),
        ],
        vec!["name", "image"],
    )
}

fn pod_spec(restart_policies: &'static [&'static str]) -> Schema {
    object(
        vec![
            ("containers", array(container(), 1)),
            ("initContainers", array(container(), 0)),
            ("restartPolicy", one_of(restart_policies)),
            ("serviceAccountName", string()),
            ("automountServiceAccountToken", Schema::Boolean),
            ("hostNetwork", Schema::Boolean),
        ],
        vec!["containers"],
    )
}

fn pod_template(restart_policies: &'static [&'static str]) -> Schema {
    object(
        vec![
            ("metadata", template_metadata()),
            ("spec", pod_spec(restart_policies)),
        ],
        vec!["spec"],
    )
}

fn label_selector() -> Schema {
    object(
        vec![
            ("matchLabels", map_of(string())),
            ("matchExpressions", array(Schema::Any, 0)),
        ],
        vec![],
    )
}

/// Top-level resource with standard metadata and the given extra properties.
fn resource(
    mut properties: Vec<(&'static str, Schema)>,
    mut required: Vec<&'static str>,
) -> Schema {
    properties.insert(0, ("metadata", metadata(StringFormat::Dns1123Subdomain)));
    required.insert(0, "metadata");
    object(properties, required)
}

fn deployment() -> Schema {
    resource(
        vec![(
            "spec",
            object(
                vec![
                    ("replicas", int_min(0)),
                    ("selector", label_selector()),
                    ("template", pod_template(RESTART_POLICIES)),
                    ("minReadySeconds", int_min(0)),
                    ("revisionHistoryLimit", int_min(0)),
                    ("strategy", object(vec![("type", one_of(DEPLOYMENT_STRATEGIES))], vec![])),
                ],
                vec!["selector", "template"],
            ),
        )],
        vec!["spec"],
    )
}

fn stateful_set() -> Schema {
    resource(
        vec![(
            "spec",
            object(
                vec![
                    ("replicas", int_min(0)),
                    ("serviceName", string()),
                    ("selector", label_selector()),
                    ("template", pod_template(RESTART_POLICIES)),
                    ("volumeClaimTemplates", array(Schema::Any, 0)),
                ],
                vec!["selector", "template"],
            ),
        )],
        vec!["spec"],
    )
}

fn daemon_set() -> Schema {
    resource(
        vec![(
            "spec",
            object(
                vec![
                    ("selector", label_selector()),
                    ("template", pod_template(RESTART_POLICIES)),
                ],
                vec!["selector", "template"],
            ),
        )],
        vec!["spec"],
    )
}

fn service() -> Schema {
    resource(
        vec![(
            "spec",
            object(
                vec![
                    ("type", one_of(SERVICE_TYPES)),
                    ("selector", map_of(string())),
                    ("clusterIP", string()),
                    ("externalName", string()),
                    (
                        "ports",
                        array(
                            object(
                                vec![
                                    ("port", port()),
                                    (
                                        "targetPort",
                                        Schema::IntOrString {
                                            min: Some(1),
                                            max: Some(65535),
                                        },
                                    ),
                                    ("nodePort", port()),
                                    ("protocol", one_of(PROTOCOLS)),
                                    ("name", string()),
                                ],
                                vec!["port"],
                            ),
                            0,
                        ),
                    ),
                ],
                vec![],
            ),
        )],
        vec!["spec"],
    )
}

fn config_map() -> Schema {
    let mut schema = resource(
        vec![
            ("data", map_of(string())),
            ("binaryData", map_of(string())),
            ("immutable", Schema::Boolean),
        ],
        vec![],
    );
    if let Schema::Object(object) = &mut schema {
        object.recommended.push(CONFIGMAP_DATA);
    }
    schema
}

fn secret() -> Schema {
    let mut schema = resource(
        vec![
            ("type", string()),
            ("data", map_of(string())),
            ("stringData", map_of(string())),
            ("immutable", Schema::Boolean),
        ],
        vec![],
    );
    if let Schema::Object(object) = &mut schema {
        object.recommended.push(SECRET_DATA);
    }
    schema
}

fn pod() -> Schema {
    resource(vec![("spec", pod_spec(RESTART_POLICIES))], vec!["spec"])
}

fn namespace() -> Schema {
    object(
        vec![("metadata", metadata(StringFormat::Dns1123Label))],
        vec!["metadata"],
    )
}

fn service_account() -> Schema {
    resource(
        vec![
            ("automountServiceAccountToken", Schema::Boolean),
            ("secrets", array(Schema::Any, 0)),
            ("imagePullSecrets", array(Schema::Any, 0)),
        ],
        vec![],
    )
}

fn persistent_volume_claim() -> Schema {
    resource(
        vec![(
            "spec",
            object(
                vec![
                    ("accessModes", array(one_of(ACCESS_MODES), 1)),
                    ("storageClassName", string()),
                    ("volumeMode", one_of(&["Filesystem", "Block"])),
                    (
                        "resources",
                        object(vec![("requests", map_of(Schema::Any))], vec!["requests"]),
                    ),
                ],
                vec!["accessModes", "resources"],
            ),
        )],
        vec!["spec"],
    )
}

fn ingress() -> Schema {
    let path = object(
        vec![
            ("path", string()),
            ("pathType", one_of(PATH_TYPES)),
            ("backend", Schema::Any),
        ],
        vec!["pathType", "backend"],
    );
    let rule = object(
        vec![
            ("host", string()),
            ("http", object(vec![("paths", array(path, 1))], vec!["paths"])),
        ],
        vec![],
    );
    resource(
        vec![(
            "spec",
            object_any_of(
                vec![
                    ("ingressClassName", string()),
                    ("rules", array(rule, 0)),
                    ("defaultBackend", Schema::Any),
                    ("tls", array(Schema::Any, 0)),
                ],
                vec![],
                INGRESS_ROUTES,
            ),
        )],
        vec!["spec"],
    )
}

fn job_spec() -> Schema {
    object(
        vec![
            ("template", pod_template(JOB_RESTART_POLICIES)),
            ("backoffLimit", int_min(0)),
            ("completions", int_min(0)),
            ("parallelism", int_min(0)),
            ("activeDeadlineSeconds", int_min(1)),
        ],
        vec!["template"],
    )
}

fn job() -> Schema {
    resource(vec![("spec", job_spec())], vec!["spec"])
}

fn cron_job() -> Schema {
    resource(
        vec![(
            "spec",
            object(
                vec![
                    ("schedule", string()),
                    ("suspend", Schema::Boolean),
                    ("concurrencyPolicy", one_of(CONCURRENCY_POLICIES)),
                    ("successfulJobsHistoryLimit", int_min(0)),
                    ("failedJobsHistoryLimit", int_min(0)),
                    (
                        "jobTemplate",
                        object(
                            vec![("metadata", template_metadata()), ("spec", job_spec())],
                            vec!["spec"],
                        ),
                    ),
                ],
                vec!["schedule", "jobTemplate"],
            ),
        )],
        vec!["spec"],
    )
}

fn horizontal_pod_autoscaler() -> Schema {
    resource(
        vec![(
            "spec",
            object(
                vec![
                    (
                        "scaleTargetRef",
                        object(
                            vec![("apiVersion", string()), ("kind", string()), ("name", string())],
                            vec!["kind", "name"],
                        ),
                    ),
                    ("minReplicas", int_min(1)),
                    ("maxReplicas", int_min(1)),
                    ("metrics", array(Schema::Any, 0)),
                ],
                vec!["scaleTargetRef", "maxReplicas"],
            ),
        )],
        vec!["spec"],
    )
}

fn entry(group: &'static str, version: &'static str, kind: &'static str, schema: Schema) -> KindSchema {
    KindSchema {
        group,
        version,
        kind,
        schema,
    }
}

/// All built-in kinds. Core-group kinds use the group `"core"`.
pub fn builtin_kinds() -> Vec<KindSchema> {
    vec![
        entry("apps", "v1", "Deployment", deployment()),
        entry("apps", "v1", "StatefulSet", stateful_set()),
        entry("apps", "v1", "DaemonSet", daemon_set()),
        entry("core", "v1", "Service", service()),
        entry("core", "v1", "ConfigMap", config_map()),
        entry("core", "v1", "Secret", secret()),
        entry("core", "v1", "Pod", pod()),
        entry("core", "v1", "Namespace", namespace()),
        entry("core", "v1", "ServiceAccount", service_account()),
        entry("core", "v1", "PersistentVolumeClaim", persistent_volume_claim()),
        entry("networking.k8s.io", "v1", "Ingress", ingress()),
        entry("batch", "v1", "Job", job()),
        entry("batch", "v1", "CronJob", cron_job()),
        entry("autoscaling", "v2", "HorizontalPodAutoscaler", horizontal_pod_autoscaler()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::schema::validate;

    fn schema_for(kind: &str) -> Schema {
        builtin_kinds()
            .into_iter()
            .find(|k| k.kind == kind)
            .map(|k| k.schema)
            .unwrap()
    }

    fn check(kind: &str, doc: &str) -> Vec<String> {
        let value: serde_yaml::Value = serde_yaml::from_str(doc).unwrap();
        validate(&schema_for(kind), &value)
            .into_iter()
            .map(|v| v.to_string())
            .collect()
    }

    #[test]
    fn test_required_kinds_present() {
        let kinds = builtin_kinds();
        for (group, version, kind) in [
            ("apps", "v1", "Deployment"),
            ("core", "v1", "Service"),
            ("core", "v1", "ConfigMap"),
            ("core", "v1", "Secret"),
        ] {
            assert!(
                kinds
                    .iter()
                    .any(|k| k.group == group && k.version == version && k.kind == kind),
                "missing {}",
                kind
            );
        }
    }

    #[test]
    fn test_deployment_valid() {
        let doc = r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  replicas: 2
  selector:
    matchLabels:
      app: web
  template:
    metadata:
      labels:
        app: web
    spec:
      containers:
        - name: web
          image: nginx:1.25
          ports:
            - containerPort: 80
"#;
        assert!(check("Deployment", doc).is_empty());
    }

    #[test]
    fn test_deployment_violations() {
        let doc = r#"
metadata:
  name: Web_App
spec:
  replicas: -1
  template:
    spec:
      containers:
        - name: web
"#;
        let violations = check("Deployment", doc);
        assert!(violations.iter().any(|v| v.starts_with("metadata.name:")));
        assert!(violations.iter().any(|v| v.starts_with("spec.selector:")));
        assert!(violations.iter().any(|v| v.starts_with("spec.replicas:")));
        assert!(violations
            .iter()
            .any(|v| v.starts_with("spec.template.spec.containers[0].image:")));
    }

    #[test]
    fn test_service_type_and_ports() {
        let doc = "metadata:\n  name: web\nspec:\n  type: Internal\n  ports:\n    - port: 0\n      targetPort: http\n";
        let violations = check("Service", doc);
        assert_eq!(violations.len(), 2);
        assert!(violations[0].starts_with("spec.type:"));
        assert!(violations[1].starts_with("spec.ports[0].port:"));
    }

    #[test]
    fn test_configmap_and_secret_without_data_warn() {
        let value: serde_yaml::Value = serde_yaml::from_str("metadata:\n  name: cfg\n").unwrap();
        for kind in ["ConfigMap", "Secret"] {
            let violations = validate(&schema_for(kind), &value);
            assert_eq!(violations.len(), 1, "{}", kind);
            assert!(!violations[0].is_error(), "{}", kind);
        }
        assert!(check("ConfigMap", "metadata:\n  name: cfg\ndata:\n  k: v\n").is_empty());
        assert!(check("Secret", "metadata:\n  name: s\nstringData:\n  k: v\n").is_empty());
    }

    #[test]
    fn test_ingress_needs_routes() {
        let violations = check("Ingress", "metadata:\n  name: web\nspec:\n  tls: []\n");
        assert_eq!(violations.len(), 1);
        assert!(violations[0].starts_with("spec.rules:"));
    }

    #[test]
    fn test_job_restart_policy() {
        let doc = "metadata:\n  name: once\nspec:\n  template:\n    spec:\n      restartPolicy: Always\n      containers:\n        - name: run\n          image: busybox:1.36\n";
        let violations = check("Job", doc);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].starts_with("spec.template.spec.restartPolicy:"));
    }

    #[test]
    fn test_pod_spec_property_lookup() {
        if let Schema::Object(pod) = schema_for("Pod") {
            assert!(pod.property("spec").is_some());
            assert!(pod.property("status").is_none());
        } else {
            panic!("Pod schema is not an object");
        }
    }
}
