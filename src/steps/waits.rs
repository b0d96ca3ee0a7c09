//! Wait handlers: `waitFor`, `waitForVisible`, `waitForHidden`,
//! `waitForNetworkIdle`.
//!
//! Interaction handlers rely on the driver's actionability auto-wait;
//! these exist for the cases the driver does not cover.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::{StepCategory, StepContext, StepHandler, check_payload, parse_payload};
use crate::driver::Page;
use crate::error::RunError;
use crate::resolver;
use crate::scenario::schema::{By, StepCommon};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Payload for `waitFor`: a selector, a fixed pause, or both.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitForParams {
    /// Wait until this selector resolves (visible, singular)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by: Option<By>,
    /// Fixed pause in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ms: Option<u64>,
    /// Shared step fields
    #[serde(flatten)]
    pub common: StepCommon,
}

/// Payload carrying only a selector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitByParams {
    /// Target selector
    pub by: By,
    /// Shared step fields
    #[serde(flatten)]
    pub common: StepCommon,
}

/// General-purpose wait: selector resolution, fixed pause, or both.
pub struct WaitFor;

#[async_trait]
impl StepHandler for WaitFor {
    fn name(&self) -> &'static str {
        "waitFor"
    }
    fn category(&self) -> StepCategory {
        StepCategory::Wait
    }
    fn schema(&self) -> &'static str {
        "by: selector (optional), ms: fixed pause (optional)"
    }
    fn check(&self, payload: &serde_yaml::Value) -> Result<(), String> {
        check_payload::<WaitForParams>(payload)
    }

    async fn execute(
        &self,
        page: &dyn Page,
        payload: &serde_yaml::Value,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), RunError> {
        let params: WaitForParams = parse_payload(self.name(), payload)?;
        if let Some(ms) = params.ms {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        if let Some(by) = &params.by {
            ctx.resolve(page, by).await?;
        }
        Ok(())
    }
}

/// Wait until the selector resolves to a visible, singular element.
pub struct WaitForVisible;

#[async_trait]
impl StepHandler for WaitForVisible {
    fn name(&self) -> &'static str {
        "waitForVisible"
    }
    fn category(&self) -> StepCategory {
        StepCategory::Wait
    }
    fn schema(&self) -> &'static str {
        "by: selector"
    }
    fn check(&self, payload: &serde_yaml::Value) -> Result<(), String> {
        check_payload::<WaitByParams>(payload)
    }

    async fn execute(
        &self,
        page: &dyn Page,
        payload: &serde_yaml::Value,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), RunError> {
        let params: WaitByParams = parse_payload(self.name(), payload)?;
        ctx.resolve(page, &params.by).await?;
        Ok(())
    }
}

/// Wait until no visible element matches the selector.
pub struct WaitForHidden;

#[async_trait]
impl StepHandler for WaitForHidden {
    fn name(&self) -> &'static str {
        "waitForHidden"
    }
    fn category(&self) -> StepCategory {
        StepCategory::Wait
    }
    fn schema(&self) -> &'static str {
        "by: selector"
    }
    fn check(&self, payload: &serde_yaml::Value) -> Result<(), String> {
        check_payload::<WaitByParams>(payload)
    }

    async fn execute(
        &self,
        page: &dyn Page,
        payload: &serde_yaml::Value,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), RunError> {
        let params: WaitByParams = parse_payload(self.name(), payload)?;
        wait_hidden(page, &params.by, ctx.timeout).await
    }
}

/// Polls until nothing visible matches `by`, bounded by `timeout`.
pub(crate) async fn wait_hidden(
    page: &dyn Page,
    by: &By,
    timeout: Duration,
) -> Result<(), RunError> {
    let deadline = Instant::now() + timeout;
    loop {
        let mut any_visible = false;
        if let Some(locator) = resolver::primitive(by) {
            for handle in page.locate(&locator).await.unwrap_or_default() {
                if page.is_visible(handle).await.unwrap_or(false) {
                    any_visible = true;
                    break;
                }
            }
        }
        if !any_visible {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(RunError::StepTimeout { timeout });
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Wait for the driver's network-idle signal.
pub struct WaitForNetworkIdle;

#[async_trait]
impl StepHandler for WaitForNetworkIdle {
    fn name(&self) -> &'static str {
        "waitForNetworkIdle"
    }
    fn category(&self) -> StepCategory {
        StepCategory::Wait
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
        page.wait_for_network_idle(ctx.timeout).await?;
        Ok(())
    }
}
