//! Navigation handlers: `goto`, `back`, `reload`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{StepCategory, StepContext, StepHandler, check_payload, parse_payload};
use crate::driver::Page;
use crate::error::RunError;
use crate::scenario::schema::StepCommon;

/// Payload for `goto`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GotoParams {
    /// Target URL, absolute or relative to the scenario base URL
    pub url: String,
    /// Shared step fields
    #[serde(flatten)]
    pub common: StepCommon,
}

/// Resolves a possibly-relative target against the scenario base URL.
#[must_use]
pub fn resolve_url(base: &str, url: &str) -> String {
    if url.contains("://") || url.starts_with("about:") {
        url.to_string()
    } else {
        format!("{}/{}", base.trim_end_matches('/'), url.trim_start_matches('/'))
    }
}

/// Navigate to a URL and await DOM-content-loaded.
pub struct Goto;

#[async_trait]
impl StepHandler for Goto {
    fn name(&self) -> &'static str {
        "goto"
    }
    fn category(&self) -> StepCategory {
        StepCategory::Navigation
    }
    fn schema(&self) -> &'static str {
        "url: string (absolute, or relative to baseUrl)"
    }
    fn check(&self, payload: &serde_yaml::Value) -> Result<(), String> {
        check_payload::<GotoParams>(payload)
    }

    async fn execute(
        &self,
        page: &dyn Page,
        payload: &serde_yaml::Value,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), RunError> {
        let params: GotoParams = parse_payload(self.name(), payload)?;
        let url = resolve_url(ctx.base_url, &params.url);
        info!(step = %ctx.step_name, url = %url, "navigating");
        page.goto(&url).await?;
        ctx.log(&format!("goto {url}"));
        Ok(())
    }
}

/// Navigate one entry back in history.
pub struct Back;

#[async_trait]
impl StepHandler for Back {
    fn name(&self) -> &'static str {
        "back"
    }
    fn category(&self) -> StepCategory {
        StepCategory::Navigation
    }
    fn schema(&self) -> &'static str {
        "no parameters"
    }
    fn check(&self, _payload: &serde_yaml::Value) -> Result<(), String> {
        Ok(())
    }

    async fn execute(
        &self,
        page: &dyn Page,
        _payload: &serde_yaml::Value,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), RunError> {
        page.back().await?;
        ctx.log("back");
        Ok(())
    }
}

/// Reload the current page.
pub struct Reload;

#[async_trait]
impl StepHandler for Reload {
    fn name(&self) -> &'static str {
        "reload"
    }
    fn category(&self) -> StepCategory {
        StepCategory::Navigation
    }
    fn schema(&self) -> &'static str {
        "no parameters"
    }
    fn check(&self, _payload: &serde_yaml::Value) -> Result<(), String> {
        Ok(())
    }

    async fn execute(
        &self,
        page: &dyn Page,
        _payload: &serde_yaml::Value,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), RunError> {
        page.reload().await?;
        ctx.log("reload");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_url_keeps_absolute() {
        assert_eq!(
            resolve_url("https://e.com", "https://other.com/x"),
            "https://other.com/x"
        );
    }

    #[test]
    fn resolve_url_joins_relative() {
        assert_eq!(resolve_url("https://e.com/", "/login"), "https://e.com/login");
        assert_eq!(resolve_url("https://e.com", "login"), "https://e.com/login");
    }
}
