//! Session handlers: `useStorageState`, `saveStorageState`.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{StepCategory, StepContext, StepHandler, check_payload, parse_payload};
use crate::driver::Page;
use crate::error::RunError;
use crate::scenario::schema::StepCommon;

/// Payload for both session handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStateParams {
    /// Storage state JSON file
    pub path: PathBuf,
    /// Shared step fields
    #[serde(flatten)]
    pub common: StepCommon,
}

/// Restore cookies and local storage from a file.
pub struct UseStorageState;

#[async_trait]
impl StepHandler for UseStorageState {
    fn name(&self) -> &'static str {
        "useStorageState"
    }
    fn category(&self) -> StepCategory {
        StepCategory::Session
    }
    fn schema(&self) -> &'static str {
        "path: storage state JSON file"
    }
    fn check(&self, payload: &serde_yaml::Value) -> Result<(), String> {
        check_payload::<StorageStateParams>(payload)
    }

    async fn execute(
        &self,
        _page: &dyn Page,
        payload: &serde_yaml::Value,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), RunError> {
        let params: StorageStateParams = parse_payload(self.name(), payload)?;
        let raw = std::fs::read_to_string(&params.path)?;
        let state: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
            RunError::InvalidPayload {
                kind: self.name().to_string(),
                message: format!("{}: {e}", params.path.display()),
            }
        })?;
        ctx.browser.restore_storage_state(&state).await?;
        info!(step = %ctx.step_name, path = %params.path.display(), "storage state restored");
        ctx.log(&format!("useStorageState {}", params.path.display()));
        Ok(())
    }
}

/// Save cookies and local storage to a file.
pub struct SaveStorageState;

#[async_trait]
impl StepHandler for SaveStorageState {
    fn name(&self) -> &'static str {
        "saveStorageState"
    }
    fn category(&self) -> StepCategory {
        StepCategory::Session
    }
    fn schema(&self) -> &'static str {
        "path: destination JSON file"
    }
    fn check(&self, payload: &serde_yaml::Value) -> Result<(), String> {
        check_payload::<StorageStateParams>(payload)
    }

    async fn execute(
        &self,
        _page: &dyn Page,
        payload: &serde_yaml::Value,
        ctx: &mut StepContext<'_>,
    ) -> Result<(), RunError> {
        let params: StorageStateParams = parse_payload(self.name(), payload)?;
        let state = ctx.browser.storage_state().await?;
        let json = serde_json::to_string_pretty(&state).map_err(|e| RunError::InvalidPayload {
            kind: self.name().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = params.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Session files live outside the run directory; mask them anyway.
        std::fs::write(&params.path, ctx.artifacts.vault().mask(&json))?;
        ctx.log(&format!("saveStorageState {}", params.path.display()));
        Ok(())
    }
}
