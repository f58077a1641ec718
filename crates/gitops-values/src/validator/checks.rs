//! # Custom Checks
//!
//! Schemas attach domain checks to a node with the `additionalChecks`
//! keyword:
//!
//! ```json
//! { "type": "string", "additionalChecks": ["serviceNameMatchesServiceFolder"] }
//! ```
//!
//! The set of checks is closed: [`CheckId`] enumerates them and
//! [`CheckId::from_name`] maps schema identifiers to variants. Identifiers
//! without a variant are skipped so that schemas can reference checks this
//! version does not know yet.

use std::fmt;
use std::sync::OnceLock;

use gitops_core::{Environment, PathSegment};
use gitops_schema::literal;
use regex::Regex;
use serde_json::Value;

use crate::chart::MANAGED_CHART_NAME;
use crate::instance::ServiceInstance;

/// `(private.)?<service>.<name>(-<n>)?(.<suffix>)?`
pub const TOPIC_NAME_PATTERN: &str =
    r"^(private\.)?(?P<serviceName>[a-z][a-z0-9-]*)\.[a-z][a-z0-9-]*(-[0-9]+)?(\.[a-z0-9]+)?$";

const TOPIC_BYTES_DOC_URL: &str = "https://kpler.atlassian.net/wiki/x/BgGKS";

const CONNECTION_INFO_DOC_URL: &str =
    "https://kpler.atlassian.net/l/cp/jb4uJQs3#Use-connection-information-in-environment-variables";

/// Environment variables injected by the platform.
pub const FORBIDDEN_ENVIRONMENT_VARIABLES: [&str; 3] = [
    "KAFKA_APPLICATION_ID",
    "KAFKA_BOOTSTRAP_SERVERS",
    "SCHEMA_REGISTRY_URL",
];

/// Topics allowed to raise `maxLocalTopicBytes`, per environment, with
/// their ceiling in bytes.
pub const TOPIC_BYTES_ALLOW_LIST: [(&str, Environment, u64); 2] = [
    ("ais-listener.nmea", Environment::Prod, 697_932_185_600),
    ("ais-listener.error.station", Environment::Prod, 536_870_912_000),
];

fn topic_name_regex() -> Option<&'static Regex> {
    static TOPIC_NAME: OnceLock<Option<Regex>> = OnceLock::new();
    TOPIC_NAME
        .get_or_init(|| Regex::new(TOPIC_NAME_PATTERN).ok())
        .as_ref()
}

/// A registered check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckId {
    /// The declared service name equals the folder name or `<folder>-<suffix>`.
    ServiceNameMatchesServiceFolder,
    /// Every key of a mapping satisfies the folder rule.
    ServiceKeysMatchServiceFolder,
    /// A topic named after a service is named after this one.
    TopicNameCompliance,
    /// `maxLocalTopicBytes` is only set on allow-listed topics, within bounds.
    MaxLocalTopicBytesCompliance,
    /// An environment mapping sets no platform-injected variable.
    ForbiddenEnvironmentVariables,
}

impl CheckId {
    /// All registered checks.
    pub const ALL: [CheckId; 5] = [
        CheckId::ServiceNameMatchesServiceFolder,
        CheckId::ServiceKeysMatchServiceFolder,
        CheckId::TopicNameCompliance,
        CheckId::MaxLocalTopicBytesCompliance,
        CheckId::ForbiddenEnvironmentVariables,
    ];

    /// Identifier used in schemas.
    pub fn name(self) -> &'static str {
        match self {
            Self::ServiceNameMatchesServiceFolder => "serviceNameMatchesServiceFolder",
            Self::ServiceKeysMatchServiceFolder => "serviceKeysMatchServiceFolder",
            Self::TopicNameCompliance => "topicNameCompliance",
            Self::MaxLocalTopicBytesCompliance => "maxLocalTopicBytesCompliance",
            Self::ForbiddenEnvironmentVariables => "forbiddenEnvironmentVariables",
        }
    }

    /// Look up a check by schema identifier.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.name() == name)
    }

    /// Run the check against `value`, the node the keyword is attached to.
    pub fn run(self, ctx: &CheckContext<'_>, value: &Value) -> Vec<CheckFailure> {
        match self {
            Self::ServiceNameMatchesServiceFolder => service_name_matches_folder(ctx, value),
            Self::ServiceKeysMatchServiceFolder => service_keys_match_folder(ctx, value),
            Self::TopicNameCompliance => topic_name_compliance(ctx, value),
            Self::MaxLocalTopicBytesCompliance => max_local_topic_bytes_compliance(ctx, value),
            Self::ForbiddenEnvironmentVariables => forbidden_environment_variables(value),
        }
    }
}

impl fmt::Display for CheckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a check can see besides the node itself.
#[derive(Debug, Clone, Copy)]
pub struct CheckContext<'a> {
    /// The instance being validated.
    pub instance: &'a ServiceInstance,
    /// Its merged values document.
    pub configuration: &'a Value,
    /// Location of the node in `configuration`.
    pub path: &'a [PathSegment],
}

impl CheckContext<'_> {
    /// The service the current node belongs to.
    ///
    /// Inside `platform-managed-chart.services.<name>` it is `<name>`;
    /// otherwise the declared `platform-managed-chart.serviceName`, falling
    /// back to the service group.
    pub fn current_service_name(&self) -> String {
        if let [PathSegment::Key(chart), PathSegment::Key(services), name, ..] = self.path {
            if chart == MANAGED_CHART_NAME && services == "services" {
                return name.to_string();
            }
        }
        self.configuration
            .get(MANAGED_CHART_NAME)
            .and_then(|chart| chart.get("serviceName"))
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.instance.service_group())
            .to_string()
    }
}

/// One check failure. `hint` overrides the node's description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckFailure {
    /// Message.
    pub message: String,
    /// Remediation, when the check provides its own.
    pub hint: Option<String>,
}

impl CheckFailure {
    fn new(message: String) -> Self {
        Self { message, hint: None }
    }
}

/// Strings bare, everything else as a literal.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => literal(other),
    }
}

fn folder_mismatch(ctx: &CheckContext<'_>, name: &str) -> Option<CheckFailure> {
    let folder = ctx.instance.folder_name();
    if name == folder || name.starts_with(&format!("{folder}-")) {
        return None;
    }
    Some(CheckFailure::new(format!(
        "'{name}' does not match the service folder name '{folder}' \
         Must be either '{folder}' or '{folder}-<suffix>'"
    )))
}

fn service_name_matches_folder(ctx: &CheckContext<'_>, value: &Value) -> Vec<CheckFailure> {
    value
        .as_str()
        .and_then(|name| folder_mismatch(ctx, name))
        .into_iter()
        .collect()
}

fn service_keys_match_folder(ctx: &CheckContext<'_>, value: &Value) -> Vec<CheckFailure> {
    let Some(services) = value.as_object() else {
        return Vec::new();
    };
    services
        .keys()
        .filter_map(|key| folder_mismatch(ctx, key))
        .collect()
}

fn topic_name_compliance(ctx: &CheckContext<'_>, value: &Value) -> Vec<CheckFailure> {
    let Some(topic) = value.as_str() else {
        return Vec::new();
    };
    let Some(embedded) = topic_name_regex()
        .and_then(|regex| regex.captures(topic))
        .and_then(|caps| caps.name("serviceName"))
    else {
        return Vec::new();
    };

    let service_name = ctx.current_service_name();
    let embedded = embedded.as_str();
    if embedded == service_name || embedded == ctx.instance.service_group() {
        return Vec::new();
    }
    vec![CheckFailure::new(format!(
        "topicName '{topic}' it not compliant, it should contain the service name '{service_name}'"
    ))]
}

fn max_local_topic_bytes_compliance(ctx: &CheckContext<'_>, value: &Value) -> Vec<CheckFailure> {
    let Some(topic) = value.as_object() else {
        return Vec::new();
    };
    let requested = match topic.get("maxLocalTopicBytes") {
        None | Some(Value::Null) => return Vec::new(),
        Some(requested) => requested,
    };

    let env = ctx.instance.env;
    let topic_name = topic.get("topicName").unwrap_or(&Value::Null);
    let ceiling = TOPIC_BYTES_ALLOW_LIST
        .iter()
        .find(|(name, allowed_env, _)| topic_name.as_str() == Some(*name) && *allowed_env == env)
        .map(|(_, _, ceiling)| *ceiling);
    let topic_name = display_value(topic_name);

    match ceiling {
        None => vec![CheckFailure::new(format!(
            "maxLocalTopicBytes can only be used with allowed topics and topic '{topic_name}' \
             is not allowed for environment '{env}'. See {TOPIC_BYTES_DOC_URL} for more information."
        ))],
        Some(ceiling) if exceeds(requested, ceiling) => vec![CheckFailure::new(format!(
            "maxLocalTopicBytes exceeds the allowed maximum of {ceiling} for topic '{topic_name}' \
             in environment '{env}'.\n See {TOPIC_BYTES_DOC_URL} for more information."
        ))],
        Some(_) => Vec::new(),
    }
}

fn exceeds(requested: &Value, ceiling: u64) -> bool {
    match requested {
        Value::Number(n) => match n.as_u64() {
            Some(bytes) => bytes > ceiling,
            None => n.as_f64().is_some_and(|bytes| bytes > ceiling as f64),
        },
        _ => false,
    }
}

fn forbidden_environment_variables(value: &Value) -> Vec<CheckFailure> {
    let Some(variables) = value.as_object() else {
        return Vec::new();
    };
    FORBIDDEN_ENVIRONMENT_VARIABLES
        .iter()
        .filter(|name| variables.contains_key(**name))
        .map(|name| CheckFailure {
            message: format!("Environment variable `{name}` is not allowed to be manually set"),
            hint: Some(format!(
                "Remove `{name}` from your environment variables.\n\
                 {name} is automatically set in your container and should not be overridden.\n\
                 More info at {CONNECTION_INFO_DOC_URL}"
            )),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn instance(env: Environment) -> ServiceInstance {
        ServiceInstance::new(
            "ais",
            "ais-listener",
            env,
            "main",
            "/repo/gitops/ais/ais-listener",
            "/repo",
        )
    }

    fn run(id: CheckId, env: Environment, path: &[PathSegment], value: Value) -> Vec<CheckFailure> {
        let instance = instance(env);
        let configuration = json!({"platform-managed-chart": {"serviceName": "ais-listener-nmea"}});
        let ctx = CheckContext {
            instance: &instance,
            configuration: &configuration,
            path,
        };
        id.run(&ctx, &value)
    }

    fn key(k: &str) -> PathSegment {
        PathSegment::Key(k.to_string())
    }

    #[test]
    fn registry_round_trips_names() {
        for id in CheckId::ALL {
            assert_eq!(CheckId::from_name(id.name()), Some(id));
        }
        assert_eq!(CheckId::from_name("notImplementedYet"), None);
    }

    #[test]
    fn service_name_folder_rule() {
        let id = CheckId::ServiceNameMatchesServiceFolder;
        assert!(run(id, Environment::Dev, &[], json!("ais-listener")).is_empty());
        assert!(run(id, Environment::Dev, &[], json!("ais-listener-nmea")).is_empty());
        let failures = run(id, Environment::Dev, &[], json!("sink"));
        assert_eq!(
            failures[0].message,
            "'sink' does not match the service folder name 'ais-listener' \
             Must be either 'ais-listener' or 'ais-listener-<suffix>'"
        );
    }

    #[test]
    fn service_keys_folder_rule() {
        let id = CheckId::ServiceKeysMatchServiceFolder;
        let failures = run(id, Environment::Dev, &[], json!({"ais-listener-a": {}, "other": {}, "ais-listenerx": {}}));
        let mut rejected: Vec<&str> = failures
            .iter()
            .filter_map(|f| f.message.split('\'').nth(1))
            .collect();
        rejected.sort_unstable();
        assert_eq!(rejected, vec!["ais-listenerx", "other"]);
        assert!(run(id, Environment::Dev, &[], json!(["not", "a", "mapping"])).is_empty());
    }

    #[test]
    fn topic_matching_declared_service_name() {
        let id = CheckId::TopicNameCompliance;
        assert!(run(id, Environment::Dev, &[], json!("ais-listener-nmea.positions")).is_empty());
        assert!(run(id, Environment::Dev, &[], json!("private.ais-listener.positions-2.avro")).is_empty());
    }

    #[test]
    fn topic_of_other_service_rejected() {
        let failures = run(CheckId::TopicNameCompliance, Environment::Dev, &[], json!("billing.invoices"));
        assert_eq!(
            failures,
            vec![CheckFailure::new(
                "topicName 'billing.invoices' it not compliant, it should contain the service name 'ais-listener-nmea'"
                    .to_string()
            )]
        );
    }

    #[test]
    fn topic_not_matching_pattern_is_not_checked() {
        assert!(run(CheckId::TopicNameCompliance, Environment::Dev, &[], json!("Billing_Invoices")).is_empty());
    }

    #[test]
    fn topic_under_services_uses_service_key() {
        let path = [key("platform-managed-chart"), key("services"), key("billing"), key("topics")];
        assert!(run(CheckId::TopicNameCompliance, Environment::Dev, &path, json!("billing.invoices")).is_empty());
        let failures = run(CheckId::TopicNameCompliance, Environment::Dev, &path, json!("payments.invoices"));
        assert!(failures[0].message.ends_with("'billing'"));
    }

    #[test]
    fn topic_bytes_above_ceiling() {
        let failures = run(
            CheckId::MaxLocalTopicBytesCompliance,
            Environment::Prod,
            &[],
            json!({"topicName": "ais-listener.nmea", "maxLocalTopicBytes": 700_000_000_000u64}),
        );
        assert_eq!(failures.len(), 1);
        assert!(failures[0].message.contains("exceeds the allowed maximum of 697932185600"));
        assert!(failures[0].message.contains(".\n See https://kpler.atlassian.net/wiki/x/BgGKS"));
    }

    #[test]
    fn topic_bytes_within_ceiling() {
        let failures = run(
            CheckId::MaxLocalTopicBytesCompliance,
            Environment::Prod,
            &[],
            json!({"topicName": "ais-listener.nmea", "maxLocalTopicBytes": 500_000_000_000u64}),
        );
        assert!(failures.is_empty());
    }

    #[test]
    fn topic_bytes_for_unlisted_topic() {
        let failures = run(
            CheckId::MaxLocalTopicBytesCompliance,
            Environment::Dev,
            &[],
            json!({"topicName": "foo.bar", "maxLocalTopicBytes": 1}),
        );
        assert_eq!(
            failures[0].message,
            "maxLocalTopicBytes can only be used with allowed topics and topic 'foo.bar' is not allowed \
             for environment 'dev'. See https://kpler.atlassian.net/wiki/x/BgGKS for more information."
        );
    }

    #[test]
    fn topic_bytes_listed_only_for_other_environment() {
        let failures = run(
            CheckId::MaxLocalTopicBytesCompliance,
            Environment::Dev,
            &[],
            json!({"topicName": "ais-listener.nmea", "maxLocalTopicBytes": 1}),
        );
        assert!(failures[0].message.contains("can only be used with allowed topics"));
    }

    #[test]
    fn topic_without_bytes_is_fine() {
        let failures = run(
            CheckId::MaxLocalTopicBytesCompliance,
            Environment::Dev,
            &[],
            json!({"topicName": "foo.bar"}),
        );
        assert!(failures.is_empty());
    }

    #[test]
    fn forbidden_variables_with_hint() {
        let failures = run(
            CheckId::ForbiddenEnvironmentVariables,
            Environment::Dev,
            &[],
            json!({"SCHEMA_REGISTRY_URL": "x", "LOG_LEVEL": "debug", "KAFKA_APPLICATION_ID": "y"}),
        );
        let messages: Vec<&str> = failures.iter().map(|f| f.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Environment variable `KAFKA_APPLICATION_ID` is not allowed to be manually set",
                "Environment variable `SCHEMA_REGISTRY_URL` is not allowed to be manually set",
            ]
        );
        let hint = failures[1].hint.as_deref().unwrap();
        assert!(hint.starts_with("Remove `SCHEMA_REGISTRY_URL` from your environment variables.\n"));
        assert!(hint.contains("SCHEMA_REGISTRY_URL is automatically set in your container"));
    }
}
