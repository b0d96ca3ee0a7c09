//! Variable substitution.
//!
//! Performs single-pass `${...}` substitution on string fields at step
//! execution time. Two namespaces are recognized: `${env.X}` reads the
//! process environment (after an optional overlay supplied on the command
//! line), `${vars.X}` reads the runtime variable environment. Any other
//! `${...}` form is an error. No recursive evaluation: substituted output
//! is never re-interpolated, which makes substitution idempotent.

use indexmap::IndexMap;
use regex::Regex;
use std::sync::LazyLock;

use crate::error::VarError;

/// Regex matching `${...}` references.
static TEMPLATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid regex"));

/// Sentinel marker for escaped `$${` sequences.
const ESCAPE_SENTINEL: &str = "\x00ESC_DOLLAR\x00";

/// A resolved environment reference, recorded for the run snapshot.
#[derive(Debug, Clone)]
pub struct EnvRef {
    /// Environment variable name
    pub name: String,
    /// Resolved value
    pub value: String,
    /// Whether the referring step was secret
    pub secret: bool,
}

/// The environment a substitution runs against.
///
/// `overlay` entries shadow the process environment; the runner populates
/// it from `--env KEY=VALUE` flags so CI can inject values without
/// mutating global state.
#[derive(Debug, Clone, Copy)]
pub struct TemplateEnv<'a> {
    /// Runtime variable environment (`${vars.X}`)
    pub vars: &'a IndexMap<String, String>,
    /// Overlay shadowing the process environment (`${env.X}`)
    pub overlay: &'a IndexMap<String, String>,
}

impl<'a> TemplateEnv<'a> {
    /// Creates a template environment.
    #[must_use]
    pub const fn new(
        vars: &'a IndexMap<String, String>,
        overlay: &'a IndexMap<String, String>,
    ) -> Self {
        Self { vars, overlay }
    }

    fn env_var(&self, name: &str) -> Option<String> {
        self.overlay
            .get(name)
            .cloned()
            .or_else(|| std::env::var(name).ok())
    }
}

/// Substitutes every `${env.X}` / `${vars.X}` reference in `input`.
///
/// `$${` escapes to a literal `${`. Resolved `env.` references are appended
/// to `env_refs` so the runner can snapshot them (masked when `secret`).
///
/// # Errors
///
/// Returns [`VarError::UnknownNamespace`] for any other `${...}` form and
/// [`VarError::Undefined`] for a reference to a missing variable, naming
/// the referring step.
pub fn substitute(
    input: &str,
    env: &TemplateEnv<'_>,
    step: &str,
    secret: bool,
    env_refs: &mut Vec<EnvRef>,
) -> Result<String, VarError> {
    if !input.contains("${") {
        return Ok(input.to_string());
    }

    let working = input.replace("$${", ESCAPE_SENTINEL);
    let mut error: Option<VarError> = None;

    let result = TEMPLATE_RE.replace_all(&working, |caps: &regex::Captures| {
        if error.is_some() {
            return String::new();
        }
        let expr = &caps[1];
        match resolve(expr, env, step, secret, env_refs) {
            Ok(value) => value,
            Err(e) => {
                error = Some(e);
                String::new()
            }
        }
    });

    if let Some(e) = error {
        return Err(e);
    }
    Ok(result.replace(ESCAPE_SENTINEL, "${"))
}

fn resolve(
    expr: &str,
    env: &TemplateEnv<'_>,
    step: &str,
    secret: bool,
    env_refs: &mut Vec<EnvRef>,
) -> Result<String, VarError> {
    let Some((namespace, name)) = expr.split_once('.') else {
        return Err(VarError::UnknownNamespace {
            expr: expr.to_string(),
            step: step.to_string(),
        });
    };
    match namespace {
        "env" => {
            let value = env.env_var(name).ok_or_else(|| VarError::Undefined {
                namespace: "env".to_string(),
                name: name.to_string(),
                step: step.to_string(),
            })?;
            env_refs.push(EnvRef {
                name: name.to_string(),
                value: value.clone(),
                secret,
            });
            Ok(value)
        }
        "vars" => env
            .vars
            .get(name)
            .cloned()
            .ok_or_else(|| VarError::Undefined {
                namespace: "vars".to_string(),
                name: name.to_string(),
                step: step.to_string(),
            }),
        _ => Err(VarError::UnknownNamespace {
            expr: expr.to_string(),
            step: step.to_string(),
        }),
    }
}

/// Substitutes every string scalar inside a YAML payload, in place.
///
/// Applied to a step payload just before dispatch so that all string-typed
/// step fields see the same environment.
///
/// # Errors
///
/// Propagates the first substitution error encountered.
pub fn substitute_value(
    value: &mut serde_yaml::Value,
    env: &TemplateEnv<'_>,
    step: &str,
    secret: bool,
    env_refs: &mut Vec<EnvRef>,
) -> Result<(), VarError> {
    match value {
        serde_yaml::Value::String(s) => {
            *s = substitute(s, env, step, secret, env_refs)?;
        }
        serde_yaml::Value::Sequence(items) => {
            for item in items {
                substitute_value(item, env, step, secret, env_refs)?;
            }
        }
        serde_yaml::Value::Mapping(map) => {
            for (_, v) in map.iter_mut() {
                substitute_value(v, env, step, secret, env_refs)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Returns the `${...}` expressions appearing in a string.
#[must_use]
pub fn references(input: &str) -> Vec<String> {
    TEMPLATE_RE
        .captures_iter(input)
        .map(|c| c[1].to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_of(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn substitutes_vars_namespace() {
        let vars = map_of(&[("user", "u@e.com")]);
        let overlay = IndexMap::new();
        let env = TemplateEnv::new(&vars, &overlay);
        let mut refs = Vec::new();
        let out = substitute("login as ${vars.user}", &env, "s", false, &mut refs).unwrap();
        assert_eq!(out, "login as u@e.com");
        assert!(refs.is_empty());
    }

    #[test]
    fn overlay_shadows_process_env() {
        let vars = IndexMap::new();
        let overlay = map_of(&[("PATH", "overridden")]);
        let env = TemplateEnv::new(&vars, &overlay);
        let mut refs = Vec::new();
        let out = substitute("${env.PATH}", &env, "s", true, &mut refs).unwrap();
        assert_eq!(out, "overridden");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].name, "PATH");
        assert!(refs[0].secret);
    }

    // PATH is always set, so the process-env path needs no test-local
    // environment mutation.
    #[test]
    fn falls_back_to_process_env() {
        let vars = IndexMap::new();
        let overlay = IndexMap::new();
        let env = TemplateEnv::new(&vars, &overlay);
        let mut refs = Vec::new();
        let out = substitute("${env.PATH}", &env, "s", false, &mut refs).unwrap();
        assert_eq!(out, std::env::var("PATH").unwrap_or_default());
        assert!(!out.is_empty());
    }

    #[test]
    fn undefined_var_names_step() {
        let vars = IndexMap::new();
        let overlay = IndexMap::new();
        let env = TemplateEnv::new(&vars, &overlay);
        let mut refs = Vec::new();
        let err = substitute("${vars.missing}", &env, "fill-email", false, &mut refs).unwrap_err();
        assert!(err.to_string().contains("vars.missing"));
        assert!(err.to_string().contains("fill-email"));
    }

    #[test]
    fn unknown_namespace_is_error() {
        let vars = IndexMap::new();
        let overlay = IndexMap::new();
        let env = TemplateEnv::new(&vars, &overlay);
        let mut refs = Vec::new();
        let err = substitute("${secrets.KEY}", &env, "s", false, &mut refs).unwrap_err();
        assert!(matches!(err, VarError::UnknownNamespace { .. }));
    }

    #[test]
    fn bare_expression_is_error() {
        let vars = IndexMap::new();
        let overlay = IndexMap::new();
        let env = TemplateEnv::new(&vars, &overlay);
        let mut refs = Vec::new();
        let err = substitute("${USER}", &env, "s", false, &mut refs).unwrap_err();
        assert!(matches!(err, VarError::UnknownNamespace { .. }));
    }

    #[test]
    fn escaped_dollar_is_literal() {
        let vars = IndexMap::new();
        let overlay = IndexMap::new();
        let env = TemplateEnv::new(&vars, &overlay);
        let mut refs = Vec::new();
        let out = substitute("price: $${vars.x}", &env, "s", false, &mut refs).unwrap();
        assert_eq!(out, "price: ${vars.x}");
    }

    #[test]
    fn substitution_is_idempotent() {
        let vars = map_of(&[("q", "hello"), ("p", "wor-ld_9")]);
        let overlay = IndexMap::new();
        let env = TemplateEnv::new(&vars, &overlay);
        let mut refs = Vec::new();
        let once = substitute("${vars.q} ${vars.p}!", &env, "s", false, &mut refs).unwrap();
        let twice = substitute(&once, &env, "s", false, &mut refs).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn substitute_value_walks_nested_payload() {
        let vars = map_of(&[("user", "bob")]);
        let overlay = IndexMap::new();
        let env = TemplateEnv::new(&vars, &overlay);
        let mut refs = Vec::new();
        let mut payload: serde_yaml::Value = serde_yaml::from_str(
            "by:\n  label: Email\nvalue: \"${vars.user}\"\nname: fill-email\n",
        )
        .unwrap();
        substitute_value(&mut payload, &env, "fill-email", false, &mut refs).unwrap();
        assert_eq!(
            payload.get("value").and_then(serde_yaml::Value::as_str),
            Some("bob")
        );
    }

    #[test]
    fn references_lists_expressions() {
        assert_eq!(
            references("${env.A} and ${vars.b}"),
            vec!["env.A".to_string(), "vars.b".to_string()]
        );
    }
}
