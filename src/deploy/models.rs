use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Notes written on every deployment created from the admin panel.
pub const ADMIN_PANEL_NOTES: &str = "Manual deployment triggered from admin panel";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Pending,
    Approved,
    Deploying,
    Deployed,
    Failed,
}

impl DeploymentStatus {
    pub const ALL: [DeploymentStatus; 5] = [
        Self::Pending,
        Self::Approved,
        Self::Deploying,
        Self::Deployed,
        Self::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Deploying => "deploying",
            Self::Deployed => "deployed",
            Self::Failed => "failed",
        }
    }

    /// `deployed` and `failed` end a deployment's life.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Deployed | Self::Failed)
    }

    /// The workflow has been (or is being) dispatched and CI owns the outcome.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Approved | Self::Deploying)
    }

    /// Whether a row in this status may move to `next`.
    ///
    /// `failed -> approved` is the manual retry path.
    pub fn can_transition_to(&self, next: DeploymentStatus) -> bool {
        use DeploymentStatus::*;
        match (self, next) {
            (Pending, Approved) | (Approved, Deploying) | (Deploying, Deployed) => true,
            (Failed, Approved) => true,
            (Approved, Deployed) => true,
            (Deployed, _) => false,
            (_, Failed) => true,
            _ => false,
        }
    }

    /// Every status that may move to `next`.
    pub fn sources_of(next: DeploymentStatus) -> impl Iterator<Item = DeploymentStatus> {
        Self::ALL.into_iter().filter(move |s| s.can_transition_to(next))
    }
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "deploying" => Ok(Self::Deploying),
            "deployed" => Ok(Self::Deployed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid deployment status: {}", s)),
        }
    }
}

/// One row of deployment history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Deployment {
    pub id: String,
    pub status: DeploymentStatus,
    pub created_at: String,
    pub approved_at: Option<String>,
    pub deployed_at: Option<String>,
    pub deployment_url: Option<String>,
    pub commit_hash: Option<String>,
    pub notes: Option<String>,
    pub error_message: Option<String>,
}

impl Deployment {
    /// What the history table shows in its notes column: the error wins over notes.
    pub fn summary(&self) -> Option<&str> {
        self.error_message.as_deref().or(self.notes.as_deref())
    }
}

/// Where a failure reason is written on the row.
///
/// The trigger function records its reason in `notes`; the admin request
/// path records what it saw in `error_message`.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureDetail {
    Notes(String),
    ErrorMessage(String),
}

/// Body returned by the trigger function on success.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriggerResponse {
    pub success: bool,
    pub message: String,
}

impl TriggerResponse {
    pub fn triggered() -> Self {
        Self {
            success: true,
            message: "Deployment triggered successfully".to_string(),
        }
    }
}

/// Terminal outcome reported back by the CI workflow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Deployed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionReport {
    pub status: CompletionStatus,
    #[serde(default)]
    pub commit_hash: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub deployment_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_and_display_agree() {
        for status in DeploymentStatus::ALL {
            assert_eq!(status.as_str().parse::<DeploymentStatus>().unwrap(), status);
            assert_eq!(status.to_string(), status.as_str());
        }
    }

    #[test]
    fn test_status_parse_rejects_unknown() {
        let err = "success".parse::<DeploymentStatus>().unwrap_err();
        assert!(err.contains("success"));
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&DeploymentStatus::Deploying).unwrap();
        assert_eq!(json, "\"deploying\"");
    }

    #[test]
    fn test_sources_of() {
        use DeploymentStatus::*;
        let approve: Vec<_> = DeploymentStatus::sources_of(Approved).collect();
        assert_eq!(approve, vec![Pending, Failed]);
        let deploying: Vec<_> = DeploymentStatus::sources_of(Deploying).collect();
        assert_eq!(deploying, vec![Approved]);
        let deployed: Vec<_> = DeploymentStatus::sources_of(Deployed).collect();
        assert_eq!(deployed, vec![Approved, Deploying]);
        assert!(!DeploymentStatus::sources_of(Failed).any(|s| s == Deployed));
    }

    #[test]
    fn test_happy_path_transitions() {
        assert!(DeploymentStatus::Pending.can_transition_to(DeploymentStatus::Approved));
        assert!(DeploymentStatus::Approved.can_transition_to(DeploymentStatus::Deploying));
        assert!(DeploymentStatus::Deploying.can_transition_to(DeploymentStatus::Deployed));
    }

    #[test]
    fn test_any_live_status_can_fail() {
        assert!(DeploymentStatus::Pending.can_transition_to(DeploymentStatus::Failed));
        assert!(DeploymentStatus::Approved.can_transition_to(DeploymentStatus::Failed));
        assert!(DeploymentStatus::Deploying.can_transition_to(DeploymentStatus::Failed));
    }

    #[test]
    fn test_failed_can_be_retried() {
        assert!(DeploymentStatus::Failed.can_transition_to(DeploymentStatus::Approved));
        assert!(!DeploymentStatus::Failed.can_transition_to(DeploymentStatus::Deploying));
    }

    #[test]
    fn test_deployed_is_final() {
        assert!(!DeploymentStatus::Deployed.can_transition_to(DeploymentStatus::Failed));
        assert!(!DeploymentStatus::Deployed.can_transition_to(DeploymentStatus::Approved));
    }

    #[test]
    fn test_cannot_skip_approval() {
        assert!(!DeploymentStatus::Pending.can_transition_to(DeploymentStatus::Deploying));
        assert!(!DeploymentStatus::Pending.can_transition_to(DeploymentStatus::Deployed));
    }

    #[test]
    fn test_terminal_and_in_flight() {
        assert!(DeploymentStatus::Deployed.is_terminal());
        assert!(DeploymentStatus::Failed.is_terminal());
        assert!(!DeploymentStatus::Pending.is_terminal());
        assert!(DeploymentStatus::Approved.is_in_flight());
        assert!(DeploymentStatus::Deploying.is_in_flight());
        assert!(!DeploymentStatus::Failed.is_in_flight());
    }

    #[test]
    fn test_summary_prefers_error_message() {
        let mut deployment = Deployment {
            id: "d1".into(),
            status: DeploymentStatus::Failed,
            created_at: "2024-01-01T00:00:00Z".into(),
            approved_at: None,
            deployed_at: None,
            deployment_url: None,
            commit_hash: None,
            notes: Some(ADMIN_PANEL_NOTES.into()),
            error_message: Some("GitHub API error: 404 Not Found".into()),
        };
        assert_eq!(deployment.summary(), Some("GitHub API error: 404 Not Found"));
        deployment.error_message = None;
        assert_eq!(deployment.summary(), Some(ADMIN_PANEL_NOTES));
    }

    #[test]
    fn test_completion_report_defaults() {
        let report: CompletionReport = serde_json::from_str(r#"{"status":"deployed"}"#).unwrap();
        assert_eq!(report.status, CompletionStatus::Deployed);
        assert!(report.commit_hash.is_none());
        assert!(report.error_message.is_none());
    }

    #[test]
    fn test_trigger_response_shape() {
        let json = serde_json::to_value(TriggerResponse::triggered()).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Deployment triggered successfully");
    }
}
