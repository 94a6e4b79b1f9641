// src/workflow.rs

use crate::api::LogApi;
use crate::error::{Result, SinkError};
use crate::models::{Action, LogUsageRequest, LogUsageResponse, Tableware};
use tracing::{info, warn};

pub const MISSING_IMAGE: &str = "Please capture an image first";
pub const MISSING_FIELDS: &str = "Please fill in all fields";
pub const SUBMIT_SUCCESS: &str = "Successfully logged!";

/// 尚未提交的表单
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureDraft {
    pub name: String,
    pub tableware: Option<Tableware>,
    pub action: Action,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SubmitStatus {
    #[default]
    None,
    Pending,
    Success(String),
    Error(String),
}

pub struct CaptureWorkflow<A: LogApi> {
    api: A,
    draft: CaptureDraft,
    status: SubmitStatus,
}

impl<A: LogApi> CaptureWorkflow<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            draft: CaptureDraft::default(),
            status: SubmitStatus::None,
        }
    }

    pub fn draft(&self) -> &CaptureDraft {
        &self.draft
    }

    pub fn status(&self) -> &SubmitStatus {
        &self.status
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.draft.name = name.into();
    }

    pub fn set_tableware(&mut self, tableware: Option<Tableware>) {
        self.draft.tableware = tableware;
    }

    pub fn set_action(&mut self, action: Action) {
        self.draft.action = action;
    }

    /// 新的截图替换旧的，并清除上一次的提交状态
    pub fn capture_image(&mut self, image: String) {
        self.draft.image = Some(image);
        self.status = SubmitStatus::None;
    }

    /// Whether the submit control is enabled.
    pub fn can_submit(&self) -> bool {
        self.status != SubmitStatus::Pending && self.draft.image.is_some()
    }

    fn validate(&self) -> Result<LogUsageRequest> {
        let Some(image) = &self.draft.image else {
            return Err(SinkError::Validation(MISSING_IMAGE.to_string()));
        };
        let name = self.draft.name.trim();
        let tableware = match self.draft.tableware {
            Some(t) if !name.is_empty() => t,
            _ => return Err(SinkError::Validation(MISSING_FIELDS.to_string())),
        };
        Ok(LogUsageRequest {
            name: name.to_string(),
            tableware,
            image: image.clone(),
            action: self.draft.action,
        })
    }

    /// 校验并提交。成功后清空表单；失败时保留全部字段以便重试。
    ///
    /// `&mut self` is held across the request, so one submission runs at a
    /// time, and dropping the workflow drops the pending request with it.
    /// Dropping only the returned future leaves the draft as it was and the
    /// status back at `None`.
    pub async fn submit(&mut self) -> Result<LogUsageResponse> {
        let request = match self.validate() {
            Ok(request) => request,
            Err(e) => {
                self.status = SubmitStatus::Error(e.to_string());
                return Err(e);
            }
        };

        self.status = SubmitStatus::Pending;
        let result = {
            let guard = PendingGuard(&mut self.status);
            let result = self.api.submit_log(&request).await;
            drop(guard);
            result
        };
        match result {
            Ok(response) => {
                info!("Logged {} {} for {}", request.tableware, request.action, request.name);
                self.draft = CaptureDraft::default();
                self.status = SubmitStatus::Success(SUBMIT_SUCCESS.to_string());
                Ok(response)
            }
            Err(e) => {
                warn!("Submit failed: {}", e);
                self.status = SubmitStatus::Error(e.to_string());
                Err(e)
            }
        }
    }
}

/// 请求被中途丢弃时把 Pending 复位，提交按钮不会一直禁用
struct PendingGuard<'a>(&'a mut SubmitStatus);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if *self.0 == SubmitStatus::Pending {
            *self.0 = SubmitStatus::None;
        }
    }
}
