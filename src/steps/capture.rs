//! Capture handlers: `storeText`, `storeAttr`.
//!
//! Captured values extend the runtime variable environment; later steps
//! read them through `${vars.X}`. Values captured by a `secret: true` step
//! are registered in the secret vault before anything can log them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{StepCategory, StepContext, StepHandler, check_payload, parse_payload};
use crate::driver::Page;
use crate::error::RunError;
use crate::scenario::schema::{By, StepCommon};

/// Payload for `storeText`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreTextParams {
    /// Target selector
    pub by: By,
    /// Variable name to store into
    pub var: String,
    /// Shared step fields
    #[serde(flatten)]
    pub common: StepCommon,
}

/// Payload for `storeAttr`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreAttrParams {
    /// Target selector
    pub by: By,
    /// Attribute name to read
    pub attr: String,
    /// Variable name to store into
    pub var: String,
    /// Shared step fields
    #[serde(flatten)]
    pub common: StepCommon,
}

/// Store the element's text content into a variable.
pub struct StoreText;

#[async_trait]
impl StepHandler for StoreText {
    fn name(&self) -> &'static str {
        "storeText"
    }
    fn category(&self) -> StepCategory {
        StepCategory::Capture
    }
    fn schema(&self) -> &'static str {
        "by: selector, var: variable name"
    }
    fn check(&self, payload: &serde_yaml::Value) -> Result<(), String> {
        check_payload::<StoreTextParams>(payload)
    }

    async fn execute(
        &self,
        page: &dyn Page,
        payload: &serde_yaml::Value,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), RunError> {
        let params: StoreTextParams = parse_payload(self.name(), payload)?;
        let handle = ctx.resolve(page, &params.by).await?;
        let text = page.text_content(handle).await?;
        if ctx.secret {
            ctx.artifacts.vault().register(&text);
        }
        debug!(step = %ctx.step_name, var = %params.var, "stored text");
        ctx.log(&format!("storeText {} -> vars.{}", params.by, params.var));
        ctx.vars.insert(params.var, text);
        Ok(())
    }
}

/// Store an attribute value into a variable.
pub struct StoreAttr;

#[async_trait]
impl StepHandler for StoreAttr {
    fn name(&self) -> &'static str {
        "storeAttr"
    }
    fn category(&self) -> StepCategory {
        StepCategory::Capture
    }
    fn schema(&self) -> &'static str {
        "by: selector, attr: attribute name, var: variable name"
    }
    fn check(&self, payload: &serde_yaml::Value) -> Result<(), String> {
        check_payload::<StoreAttrParams>(payload)
    }

    async fn execute(
        &self,
        page: &dyn Page,
        payload: &serde_yaml::Value,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), RunError> {
        let params: StoreAttrParams = parse_payload(self.name(), payload)?;
        let handle = ctx.resolve(page, &params.by).await?;
        let value = page
            .attribute(handle, &params.attr)
            .await?
            .ok_or_else(|| RunError::Assertion {
                message: format!("{} has no attribute {:?}", params.by, params.attr),
            })?;
        if ctx.secret {
            ctx.artifacts.vault().register(&value);
        }
        ctx.log(&format!(
            "storeAttr {}@{} -> vars.{}",
            params.by, params.attr, params.var
        ));
        ctx.vars.insert(params.var, value);
        Ok(())
    }
}
