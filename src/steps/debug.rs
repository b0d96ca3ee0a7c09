//! Debug handlers: `screenshot`, `log`, `dumpDom`.
//!
//! The only step category where `strict: false` is honored.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{StepCategory, StepContext, StepHandler, check_payload, parse_payload};
use crate::driver::Page;
use crate::error::RunError;
use crate::scenario::schema::{ScreenshotPolicy, StepCommon};

/// Payload for `screenshot`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotParams {
    /// Shared step fields
    #[serde(flatten)]
    pub common: StepCommon,
}

/// Payload for `log`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogParams {
    /// Message to append to the run log
    pub message: String,
    /// Shared step fields
    #[serde(flatten)]
    pub common: StepCommon,
}

/// Capture an on-demand screenshot.
pub struct Screenshot;

#[async_trait]
impl StepHandler for Screenshot {
    fn name(&self) -> &'static str {
        "screenshot"
    }
    fn category(&self) -> StepCategory {
        StepCategory::Debug
    }
    fn schema(&self) -> &'static str {
        "name: string (optional)"
    }
    fn check(&self, payload: &serde_yaml::Value) -> Result<(), String> {
        check_payload::<ScreenshotParams>(payload)
    }

    async fn execute(
        &self,
        page: &dyn Page,
        _payload: &serde_yaml::Value,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), RunError> {
        let policy = ScreenshotPolicy::default();
        let bytes = page.screenshot(policy.format, policy.quality).await?;
        let path = ctx.artifacts.write_screenshot(
            ctx.ordinal,
            "debug",
            &ctx.step_name,
            policy.format.extension(),
            &bytes,
        )?;
        ctx.log(&format!("screenshot {}", path.display()));
        Ok(())
    }
}

/// Append a message to the run log.
pub struct Log;

#[async_trait]
impl StepHandler for Log {
    fn name(&self) -> &'static str {
        "log"
    }
    fn category(&self) -> StepCategory {
        StepCategory::Debug
    }
    fn schema(&self) -> &'static str {
        "message: string"
    }
    fn check(&self, payload: &serde_yaml::Value) -> Result<(), String> {
        check_payload::<LogParams>(payload)
    }

    async fn execute(
        &self,
        _page: &dyn Page,
        payload: &serde_yaml::Value,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), RunError> {
        let params: LogParams = parse_payload(self.name(), payload)?;
        info!(step = %ctx.step_name, "{}", params.message);
        ctx.log(&params.message);
        Ok(())
    }
}

/// Write the serialized DOM to the run logs.
pub struct DumpDom;

#[async_trait]
impl StepHandler for DumpDom {
    fn name(&self) -> &'static str {
        "dumpDom"
    }
    fn category(&self) -> StepCategory {
        StepCategory::Debug
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
        let html = page.content().await?;
        let path = ctx.artifacts.write_dom_dump(ctx.ordinal, &html)?;
        ctx.log(&format!("dumpDom {}", path.display()));
        Ok(())
    }
}
