//! Assertion handlers: `expectVisible`, `expectHidden`, `expectText`,
//! `expectUrl`.
//!
//! Assertion failures surface as [`RunError::Assertion`] with the observed
//! and expected values in the message.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{StepCategory, StepContext, StepHandler, check_payload, parse_payload, waits};
use crate::driver::Page;
use crate::error::RunError;
use crate::scenario::schema::{By, StepCommon};
use crate::steps::navigation::resolve_url;

/// Payload carrying only a selector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectByParams {
    /// Target selector
    pub by: By,
    /// Shared step fields
    #[serde(flatten)]
    pub common: StepCommon,
}

/// Payload for `expectText`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectTextParams {
    /// Target selector
    pub by: By,
    /// Expected text
    pub text: String,
    /// Require an exact match instead of containment
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub exact: bool,
    /// Shared step fields
    #[serde(flatten)]
    pub common: StepCommon,
}

/// Payload for `expectUrl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectUrlParams {
    /// Expected URL, absolute or relative to the scenario base URL
    pub url: String,
    /// Shared step fields
    #[serde(flatten)]
    pub common: StepCommon,
}

/// Assert that the selector resolves to a visible element.
pub struct ExpectVisible;

#[async_trait]
impl StepHandler for ExpectVisible {
    fn name(&self) -> &'static str {
        "expectVisible"
    }
    fn category(&self) -> StepCategory {
        StepCategory::Assertion
    }
    fn schema(&self) -> &'static str {
        "by: selector"
    }
    fn check(&self, payload: &serde_yaml::Value) -> Result<(), String> {
        check_payload::<ExpectByParams>(payload)
    }

    async fn execute(
        &self,
        page: &dyn Page,
        payload: &serde_yaml::Value,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), RunError> {
        let params: ExpectByParams = parse_payload(self.name(), payload)?;
        ctx.resolve(page, &params.by)
            .await
            .map_err(|e| RunError::Assertion {
                message: format!("expected {} to be visible: {e}", params.by),
            })?;
        Ok(())
    }
}

/// Assert that nothing visible matches the selector.
pub struct ExpectHidden;

#[async_trait]
impl StepHandler for ExpectHidden {
    fn name(&self) -> &'static str {
        "expectHidden"
    }
    fn category(&self) -> StepCategory {
        StepCategory::Assertion
    }
    fn schema(&self) -> &'static str {
        "by: selector"
    }
    fn check(&self, payload: &serde_yaml::Value) -> Result<(), String> {
        check_payload::<ExpectByParams>(payload)
    }

    async fn execute(
        &self,
        page: &dyn Page,
        payload: &serde_yaml::Value,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), RunError> {
        let params: ExpectByParams = parse_payload(self.name(), payload)?;
        waits::wait_hidden(page, &params.by, ctx.timeout)
            .await
            .map_err(|_| RunError::Assertion {
                message: format!("expected {} to be hidden", params.by),
            })
    }
}

/// Assert the element's text content.
pub struct ExpectText;

#[async_trait]
impl StepHandler for ExpectText {
    fn name(&self) -> &'static str {
        "expectText"
    }
    fn category(&self) -> StepCategory {
        StepCategory::Assertion
    }
    fn schema(&self) -> &'static str {
        "by: selector, text: string, exact: bool (default false)"
    }
    fn check(&self, payload: &serde_yaml::Value) -> Result<(), String> {
        check_payload::<ExpectTextParams>(payload)
    }

    async fn execute(
        &self,
        page: &dyn Page,
        payload: &serde_yaml::Value,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), RunError> {
        let params: ExpectTextParams = parse_payload(self.name(), payload)?;
        let handle = ctx.resolve(page, &params.by).await?;
        let actual = page.text_content(handle).await?;
        let holds = if params.exact {
            actual == params.text
        } else {
            actual.contains(&params.text)
        };
        if holds {
            Ok(())
        } else {
            Err(RunError::Assertion {
                message: format!(
                    "expected {} text {:?}, got {:?}",
                    params.by, params.text, actual
                ),
            })
        }
    }
}

/// Assert the current page URL.
pub struct ExpectUrl;

#[async_trait]
impl StepHandler for ExpectUrl {
    fn name(&self) -> &'static str {
        "expectUrl"
    }
    fn category(&self) -> StepCategory {
        StepCategory::Assertion
    }
    fn schema(&self) -> &'static str {
        "url: string (absolute, or relative to baseUrl)"
    }
    fn check(&self, payload: &serde_yaml::Value) -> Result<(), String> {
        check_payload::<ExpectUrlParams>(payload)
    }

    async fn execute(
        &self,
        page: &dyn Page,
        payload: &serde_yaml::Value,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), RunError> {
        let params: ExpectUrlParams = parse_payload(self.name(), payload)?;
        let expected = resolve_url(ctx.base_url, &params.url);
        let actual = page.url().await;
        if actual.trim_end_matches('/') == expected.trim_end_matches('/') {
            Ok(())
        } else {
            Err(RunError::Assertion {
                message: format!("expected url {expected:?}, got {actual:?}"),
            })
        }
    }
}
