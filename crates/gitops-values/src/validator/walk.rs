//! Schema and document walked together to find `additionalChecks`.
//!
//! The walker follows the applicator keywords whose subschemas apply to a
//! known child or to the node itself: `$ref`, `allOf`, `properties`,
//! `patternProperties`, `additionalProperties`, `items`,
//! `additionalItems`, `then`/`else` (picked by evaluating `if`), and the
//! schema form of `dependencies` when its key is present. `anyOf`, `oneOf`
//! and `not` are not followed.
//!
//! Each schema node is addressed by a [`Resolved`] location so that `if`
//! conditions compile with their references intact. The document location
//! is an explicit stack of [`PathSegment`]s, pushed before descending into
//! a child and popped on return.

use std::collections::HashMap;

use gitops_core::{DocumentPath, PathSegment};
use gitops_schema::{FragmentValidator, Resolved, SchemaResolver, Scope, Violation};
use regex::Regex;
use serde_json::{json, Map, Value};

use super::checks::{CheckContext, CheckId};
use crate::instance::ServiceInstance;

const MAX_DEPTH: usize = 256;

const KEYWORD: &str = "additionalChecks";

pub(crate) struct CheckWalker<'a> {
    resolver: &'a SchemaResolver,
    instance: &'a ServiceInstance,
    configuration: &'a Value,
    path: Vec<PathSegment>,
    found: Vec<Violation>,
    conditions: HashMap<String, Option<FragmentValidator>>,
}

impl<'a> CheckWalker<'a> {
    pub(crate) fn new(
        resolver: &'a SchemaResolver,
        instance: &'a ServiceInstance,
        configuration: &'a Value,
    ) -> Self {
        Self {
            resolver,
            instance,
            configuration,
            path: Vec::new(),
            found: Vec::new(),
            conditions: HashMap::new(),
        }
    }

    /// Walk `scope`'s document against the configuration.
    pub(crate) fn run(mut self, scope: &Scope) -> Vec<Violation> {
        let root = Resolved {
            scope: scope.clone(),
            pointer: String::new(),
        };
        let configuration = self.configuration;
        self.visit(&root, configuration, 0);
        self.found
    }

    fn visit(&mut self, at: &Resolved, instance: &Value, depth: usize) {
        if depth > MAX_DEPTH {
            tracing::warn!(path = %DocumentPath::from(self.path.as_slice()), "schema nesting too deep, custom checks stopped");
            return;
        }
        let Some(schema) = at.node().and_then(Value::as_object) else {
            return;
        };

        // Draft 7: `$ref` replaces its siblings.
        if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
            match self.resolver.resolve(&at.scope, reference) {
                Ok(target) => self.visit(&target, instance, depth + 1),
                Err(e) => tracing::debug!(%reference, error = %e, "reference not followed"),
            }
            return;
        }

        if let Some(Value::Array(checks)) = schema.get(KEYWORD) {
            self.run_checks(schema, checks, instance);
        }

        if let Some(Value::Array(subschemas)) = schema.get("allOf") {
            for index in 0..subschemas.len() {
                self.visit(&at.child(&["allOf", &index.to_string()]), instance, depth + 1);
            }
        }

        if schema.contains_key("if") {
            let branch = match self.condition_holds(&at.child(&["if"]), instance) {
                Some(true) => Some("then"),
                Some(false) => Some("else"),
                None => None,
            };
            if let Some(branch) = branch.filter(|b| schema.contains_key(*b)) {
                self.visit(&at.child(&[branch]), instance, depth + 1);
            }
        }

        if let (Some(Value::Object(dependencies)), Value::Object(map)) = (schema.get("dependencies"), instance) {
            for (key, dependency) in dependencies {
                if map.contains_key(key) && !dependency.is_array() {
                    self.visit(&at.child(&["dependencies", key]), instance, depth + 1);
                }
            }
        }

        match instance {
            Value::Object(map) => self.visit_properties(at, schema, map, depth),
            Value::Array(items) => self.visit_items(at, schema, items, depth),
            _ => {}
        }
    }

    /// Evaluate the `if` subschema at `condition`; `None` when it cannot be
    /// compiled.
    fn condition_holds(&mut self, condition: &Resolved, instance: &Value) -> Option<bool> {
        let key = format!(
            "{}#{}",
            condition.scope.url().map(|u| u.as_str()).unwrap_or_default(),
            condition.pointer
        );
        let resolver = self.resolver;
        let validator = self.conditions.entry(key).or_insert_with(|| {
            resolver
                .fragment_validator(condition)
                .map_err(|e| tracing::debug!(pointer = %condition.pointer, error = %e, "condition not evaluated"))
                .ok()
        });
        validator.as_ref().map(|v| v.is_valid(instance))
    }

    fn visit_child(&mut self, at: &Resolved, segment: PathSegment, child: &Value, depth: usize) {
        self.path.push(segment);
        self.visit(at, child, depth + 1);
        self.path.pop();
    }

    fn visit_properties(&mut self, at: &Resolved, schema: &Map<String, Value>, map: &Map<String, Value>, depth: usize) {
        let properties = schema.get("properties").and_then(Value::as_object);
        let patterns: Vec<(Regex, &str)> = schema
            .get("patternProperties")
            .and_then(Value::as_object)
            .map(|patterns| {
                patterns
                    .keys()
                    .filter_map(|pattern| match Regex::new(pattern) {
                        Ok(regex) => Some((regex, pattern.as_str())),
                        Err(e) => {
                            tracing::debug!(%pattern, error = %e, "pattern not followed");
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();
        let has_additional = schema.contains_key("additionalProperties");

        for (key, child) in map {
            let declared = properties.is_some_and(|p| p.contains_key(key));
            if declared {
                self.visit_child(&at.child(&["properties", key]), PathSegment::Key(key.clone()), child, depth);
            }

            let mut matched = false;
            for (regex, pattern) in &patterns {
                if regex.is_match(key) {
                    matched = true;
                    self.visit_child(&at.child(&["patternProperties", pattern]), PathSegment::Key(key.clone()), child, depth);
                }
            }

            if !declared && !matched && has_additional {
                self.visit_child(&at.child(&["additionalProperties"]), PathSegment::Key(key.clone()), child, depth);
            }
        }
    }

    fn visit_items(&mut self, at: &Resolved, schema: &Map<String, Value>, items: &[Value], depth: usize) {
        match schema.get("items") {
            Some(Value::Array(tuple)) => {
                let has_additional = schema.contains_key("additionalItems");
                for (index, item) in items.iter().enumerate() {
                    let subschema = if index < tuple.len() {
                        at.child(&["items", &index.to_string()])
                    } else if has_additional {
                        at.child(&["additionalItems"])
                    } else {
                        break;
                    };
                    self.visit_child(&subschema, PathSegment::Index(index), item, depth);
                }
            }
            Some(_) => {
                let subschema = at.child(&["items"]);
                for (index, item) in items.iter().enumerate() {
                    self.visit_child(&subschema, PathSegment::Index(index), item, depth);
                }
            }
            None => {}
        }
    }

    fn run_checks(&mut self, schema: &Map<String, Value>, checks: &[Value], instance: &Value) {
        let ctx = CheckContext {
            instance: self.instance,
            configuration: self.configuration,
            path: &self.path,
        };
        let mut failures = Vec::new();
        for name in checks.iter().filter_map(Value::as_str) {
            match CheckId::from_name(name) {
                Some(check) => failures.extend(check.run(&ctx, instance)),
                None => tracing::debug!(check = %name, "unknown custom check skipped"),
            }
        }

        for failure in failures {
            let owner = match failure.hint {
                Some(hint) => json!({ "description": hint }),
                None => Value::Object(schema.clone()),
            };
            self.found.push(Violation {
                path: DocumentPath::from(self.path.as_slice()),
                message: failure.message,
                schema_path: String::new(),
                keyword: KEYWORD.to_string(),
                schema: Some(owner),
            });
        }
    }
}
