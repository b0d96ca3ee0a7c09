//! Interaction handlers: `click`, `dblclick`, `fill`, `press`, `check`,
//! `uncheck`, `selectOption`.
//!
//! All of them resolve their selector strictly and rely on the driver's
//! actionability auto-wait for the interaction itself.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{StepCategory, StepContext, StepHandler, check_payload, parse_payload};
use crate::driver::Page;
use crate::error::RunError;
use crate::scenario::schema::{By, StepCommon};

/// Payload carrying only a selector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByParams {
    /// Target selector
    pub by: By,
    /// Shared step fields
    #[serde(flatten)]
    pub common: StepCommon,
}

/// Payload for `fill` and `selectOption`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueParams {
    /// Target selector
    pub by: By,
    /// Value to enter or option to select
    pub value: String,
    /// Shared step fields
    #[serde(flatten)]
    pub common: StepCommon,
}

/// Payload for `press`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PressParams {
    /// Target selector
    pub by: By,
    /// Key chord (e.g. "Enter", "Control+a")
    pub key: String,
    /// Shared step fields
    #[serde(flatten)]
    pub common: StepCommon,
}

/// Click the resolved element.
pub struct Click;

#[async_trait]
impl StepHandler for Click {
    fn name(&self) -> &'static str {
        "click"
    }
    fn category(&self) -> StepCategory {
        StepCategory::Interaction
    }
    fn schema(&self) -> &'static str {
        "by: selector"
    }
    fn check(&self, payload: &serde_yaml::Value) -> Result<(), String> {
        check_payload::<ByParams>(payload)
    }

    async fn execute(
        &self,
        page: &dyn Page,
        payload: &serde_yaml::Value,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), RunError> {
        let params: ByParams = parse_payload(self.name(), payload)?;
        let handle = ctx.resolve(page, &params.by).await?;
        page.click(handle).await?;
        ctx.log(&format!("click {}", params.by));
        Ok(())
    }
}

/// Double-click the resolved element.
pub struct DblClick;

#[async_trait]
impl StepHandler for DblClick {
    fn name(&self) -> &'static str {
        "dblclick"
    }
    fn category(&self) -> StepCategory {
        StepCategory::Interaction
    }
    fn schema(&self) -> &'static str {
        "by: selector"
    }
    fn check(&self, payload: &serde_yaml::Value) -> Result<(), String> {
        check_payload::<ByParams>(payload)
    }

    async fn execute(
        &self,
        page: &dyn Page,
        payload: &serde_yaml::Value,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), RunError> {
        let params: ByParams = parse_payload(self.name(), payload)?;
        let handle = ctx.resolve(page, &params.by).await?;
        page.dblclick(handle).await?;
        ctx.log(&format!("dblclick {}", params.by));
        Ok(())
    }
}

/// Replace the element's value.
///
/// When the step is `secret: true`, the substituted value is registered in
/// the secret vault before anything touches the driver or a log line.
pub struct Fill;

#[async_trait]
impl StepHandler for Fill {
    fn name(&self) -> &'static str {
        "fill"
    }
    fn category(&self) -> StepCategory {
        StepCategory::Interaction
    }
    fn schema(&self) -> &'static str {
        "by: selector, value: string"
    }
    fn check(&self, payload: &serde_yaml::Value) -> Result<(), String> {
        check_payload::<ValueParams>(payload)
    }

    async fn execute(
        &self,
        page: &dyn Page,
        payload: &serde_yaml::Value,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), RunError> {
        let params: ValueParams = parse_payload(self.name(), payload)?;
        if ctx.secret {
            ctx.artifacts.vault().register(&params.value);
        }
        let handle = ctx.resolve(page, &params.by).await?;
        page.fill(handle, &params.value).await?;
        debug!(step = %ctx.step_name, selector = %params.by, "filled");
        ctx.log(&format!("fill {} = {}", params.by, params.value));
        Ok(())
    }
}

/// Send a key chord to the resolved element.
pub struct Press;

#[async_trait]
impl StepHandler for Press {
    fn name(&self) -> &'static str {
        "press"
    }
    fn category(&self) -> StepCategory {
        StepCategory::Interaction
    }
    fn schema(&self) -> &'static str {
        "by: selector, key: string"
    }
    fn check(&self, payload: &serde_yaml::Value) -> Result<(), String> {
        check_payload::<PressParams>(payload)
    }

    async fn execute(
        &self,
        page: &dyn Page,
        payload: &serde_yaml::Value,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), RunError> {
        let params: PressParams = parse_payload(self.name(), payload)?;
        let handle = ctx.resolve(page, &params.by).await?;
        page.press(handle, &params.key).await?;
        ctx.log(&format!("press {} on {}", params.key, params.by));
        Ok(())
    }
}

/// Check a checkbox or radio.
pub struct Check;

#[async_trait]
impl StepHandler for Check {
    fn name(&self) -> &'static str {
        "check"
    }
    fn category(&self) -> StepCategory {
        StepCategory::Interaction
    }
    fn schema(&self) -> &'static str {
        "by: selector"
    }
    fn check(&self, payload: &serde_yaml::Value) -> Result<(), String> {
        check_payload::<ByParams>(payload)
    }

    async fn execute(
        &self,
        page: &dyn Page,
        payload: &serde_yaml::Value,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), RunError> {
        let params: ByParams = parse_payload(self.name(), payload)?;
        let handle = ctx.resolve(page, &params.by).await?;
        page.set_checked(handle, true).await?;
        ctx.log(&format!("check {}", params.by));
        Ok(())
    }
}

/// Uncheck a checkbox.
pub struct Uncheck;

#[async_trait]
impl StepHandler for Uncheck {
    fn name(&self) -> &'static str {
        "uncheck"
    }
    fn category(&self) -> StepCategory {
        StepCategory::Interaction
    }
    fn schema(&self) -> &'static str {
        "by: selector"
    }
    fn check(&self, payload: &serde_yaml::Value) -> Result<(), String> {
        check_payload::<ByParams>(payload)
    }

    async fn execute(
        &self,
        page: &dyn Page,
        payload: &serde_yaml::Value,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), RunError> {
        let params: ByParams = parse_payload(self.name(), payload)?;
        let handle = ctx.resolve(page, &params.by).await?;
        page.set_checked(handle, false).await?;
        ctx.log(&format!("uncheck {}", params.by));
        Ok(())
    }
}

/// Select an option in a native select element.
pub struct SelectOption;

#[async_trait]
impl StepHandler for SelectOption {
    fn name(&self) -> &'static str {
        "selectOption"
    }
    fn category(&self) -> StepCategory {
        StepCategory::Interaction
    }
    fn schema(&self) -> &'static str {
        "by: selector, value: option value or visible text"
    }
    fn check(&self, payload: &serde_yaml::Value) -> Result<(), String> {
        check_payload::<ValueParams>(payload)
    }

    async fn execute(
        &self,
        page: &dyn Page,
        payload: &serde_yaml::Value,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), RunError> {
        let params: ValueParams = parse_payload(self.name(), payload)?;
        if ctx.secret {
            ctx.artifacts.vault().register(&params.value);
        }
        let handle = ctx.resolve(page, &params.by).await?;
        page.select_option(handle, &params.value).await?;
        ctx.log(&format!("selectOption {} = {}", params.by, params.value));
        Ok(())
    }
}
